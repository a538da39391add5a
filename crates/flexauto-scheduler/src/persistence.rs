//! SQLite-backed persistence for scenarios and the settings record.
//! Survives restarts and is shared by the scheduler and the CLI.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use uuid::Uuid;

use flexauto_core::error::{FlexError, Result};
use flexauto_core::traits::ScenarioStore;
use flexauto_core::types::{AppSettings, Scenario};

const SCENARIO_COLUMNS: &str =
    "id, name, is_active, blocks_json, last_context_json, last_executed, color";

/// SQLite store for the scenario table and the single settings row.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the database, creating parent directories as needed.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(|e| FlexError::Store(format!("DB open: {e}")))?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| FlexError::Store(format!("DB open: {e}")))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let store = Self { conn: Mutex::new(conn) };
        store.migrate()?;
        Ok(store)
    }

    /// Run migrations to create tables.
    fn migrate(&self) -> Result<()> {
        self.with_conn("Migration", |conn| {
            conn.execute_batch(
                "
            -- Scenarios: one trigger plus an action chain, stored as JSON
            CREATE TABLE IF NOT EXISTS scenarios (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 0,
                blocks_json TEXT NOT NULL DEFAULT '[]',
                last_context_json TEXT,
                last_executed TEXT,              -- RFC 3339, UTC
                color TEXT NOT NULL DEFAULT '#673AB7'
            );

            -- Service credentials and chat binding (single row)
            CREATE TABLE IF NOT EXISTS settings (
                id TEXT PRIMARY KEY,
                youtube_api_key TEXT,
                tmdb_api_key TEXT,
                telegram_bot_token TEXT,
                telegram_chat_id INTEGER,
                pairing_code TEXT,
                telegram_enabled INTEGER NOT NULL DEFAULT 0
            );
         ",
            )
        })
    }

    fn with_conn<T>(
        &self,
        what: &str,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| FlexError::Store("connection lock poisoned".into()))?;
        f(&conn).map_err(|e| FlexError::Store(format!("{what}: {e}")))
    }
}

fn parse_dt(raw: Option<String>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|d| d.with_timezone(&Utc))
}

fn scenario_from_row(row: &Row<'_>) -> rusqlite::Result<Scenario> {
    let id: String = row.get(0)?;
    let id = Uuid::parse_str(&id).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Scenario {
        id,
        name: row.get(1)?,
        is_active: row.get::<_, i32>(2)? != 0,
        blocks_json: row.get(3)?,
        last_context_json: row.get(4)?,
        last_executed: parse_dt(row.get(5)?),
        color: row.get(6)?,
    })
}

#[async_trait]
impl ScenarioStore for SqliteStore {
    async fn all_scenarios(&self) -> Result<Vec<Scenario>> {
        self.with_conn("Load scenarios", |conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {SCENARIO_COLUMNS} FROM scenarios ORDER BY rowid"))?;
            let rows = stmt.query_map([], scenario_from_row)?;
            rows.collect()
        })
    }

    async fn active_scenarios(&self) -> Result<Vec<Scenario>> {
        self.with_conn("Load active scenarios", |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SCENARIO_COLUMNS} FROM scenarios WHERE is_active = 1 ORDER BY rowid"
            ))?;
            let rows = stmt.query_map([], scenario_from_row)?;
            rows.collect()
        })
    }

    async fn scenario(&self, id: Uuid) -> Result<Option<Scenario>> {
        self.with_conn("Load scenario", |conn| {
            conn.query_row(
                &format!("SELECT {SCENARIO_COLUMNS} FROM scenarios WHERE id = ?1"),
                [id.to_string()],
                scenario_from_row,
            )
            .optional()
        })
    }

    async fn add_scenario(&self, scenario: &Scenario) -> Result<()> {
        self.with_conn("Add scenario", |conn| {
            conn.execute(
                &format!("INSERT INTO scenarios ({SCENARIO_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
                params![
                    scenario.id.to_string(),
                    scenario.name,
                    scenario.is_active as i32,
                    scenario.blocks_json,
                    scenario.last_context_json,
                    scenario.last_executed.map(|t| t.to_rfc3339()),
                    scenario.color,
                ],
            )
        })?;
        Ok(())
    }

    async fn update_scenario(&self, scenario: &Scenario) -> Result<()> {
        let changed = self.with_conn("Update scenario", |conn| {
            conn.execute(
                "UPDATE scenarios SET name = ?2, is_active = ?3, blocks_json = ?4,
                 last_context_json = ?5, last_executed = ?6, color = ?7 WHERE id = ?1",
                params![
                    scenario.id.to_string(),
                    scenario.name,
                    scenario.is_active as i32,
                    scenario.blocks_json,
                    scenario.last_context_json,
                    scenario.last_executed.map(|t| t.to_rfc3339()),
                    scenario.color,
                ],
            )
        })?;
        if changed == 0 {
            return Err(FlexError::Store(format!("scenario {} not found", scenario.id)));
        }
        Ok(())
    }

    async fn set_last_executed(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        let changed = self.with_conn("Set last executed", |conn| {
            conn.execute(
                "UPDATE scenarios SET last_executed = ?2 WHERE id = ?1",
                params![id.to_string(), at.to_rfc3339()],
            )
        })?;
        if changed == 0 {
            return Err(FlexError::Store(format!("scenario {id} not found")));
        }
        Ok(())
    }

    async fn delete_scenario(&self, id: Uuid) -> Result<bool> {
        let changed = self.with_conn("Delete scenario", |conn| {
            conn.execute("DELETE FROM scenarios WHERE id = ?1", [id.to_string()])
        })?;
        Ok(changed > 0)
    }

    async fn settings(&self) -> Result<Option<AppSettings>> {
        self.with_conn("Load settings", |conn| {
            conn.query_row(
                "SELECT id, youtube_api_key, tmdb_api_key, telegram_bot_token, telegram_chat_id,
                        pairing_code, telegram_enabled FROM settings LIMIT 1",
                [],
                |row| {
                    let id: String = row.get(0)?;
                    Ok(AppSettings {
                        id: Uuid::parse_str(&id).unwrap_or_default(),
                        youtube_api_key: row.get(1)?,
                        tmdb_api_key: row.get(2)?,
                        telegram_bot_token: row.get(3)?,
                        telegram_chat_id: row.get(4)?,
                        pairing_code: row.get(5)?,
                        telegram_enabled: row.get::<_, i32>(6)? != 0,
                    })
                },
            )
            .optional()
        })
    }

    async fn save_settings(&self, settings: &AppSettings) -> Result<()> {
        self.with_conn("Save settings", |conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute("DELETE FROM settings WHERE id <> ?1", [settings.id.to_string()])?;
            tx.execute(
                "INSERT OR REPLACE INTO settings
                 (id, youtube_api_key, tmdb_api_key, telegram_bot_token, telegram_chat_id,
                  pairing_code, telegram_enabled)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    settings.id.to_string(),
                    settings.youtube_api_key,
                    settings.tmdb_api_key,
                    settings.telegram_bot_token,
                    settings.telegram_chat_id,
                    settings.pairing_code,
                    settings.telegram_enabled as i32,
                ],
            )?;
            tx.commit()
        })
    }
}
