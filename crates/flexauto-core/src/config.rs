//! FlexAuto configuration system.
//!
//! Only process-level knobs live here. Service credentials (API keys, bot
//! token, chat id) belong to the persisted settings record.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{FlexError, Result};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlexConfig {
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub hotkeys: HotkeyConfig,
}

fn default_database_path() -> String { "~/.flexauto/database/flex.db".into() }

impl Default for FlexConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            scheduler: SchedulerConfig::default(),
            telegram: TelegramConfig::default(),
            hotkeys: HotkeyConfig::default(),
        }
    }
}

impl FlexConfig {
    /// Load config from the default path (~/.flexauto/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| FlexError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| FlexError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Save config to the given path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| FlexError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the FlexAuto home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".flexauto")
    }

    /// Database path with `~` expanded.
    pub fn database_file(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.database_path).to_string())
    }
}

/// Timing knobs for the scheduler's reload protocol and polling loops.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Pause between two trigger checks of one polling loop.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Back-off after a trigger check failed.
    #[serde(default = "default_error_backoff_ms")]
    pub error_backoff_ms: u64,
    /// Upper bound for waiting on the previous generation's loops.
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,
    /// Settling delay between teardown and rebuild.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// Start jitter range for polling loops.
    #[serde(default = "default_min_start_jitter_ms")]
    pub min_start_jitter_ms: u64,
    #[serde(default = "default_max_start_jitter_ms")]
    pub max_start_jitter_ms: u64,
    /// Upper bound for waiting on in-flight runs at shutdown.
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
}

fn default_poll_interval_ms() -> u64 { 1000 }
fn default_error_backoff_ms() -> u64 { 5000 }
fn default_drain_timeout_ms() -> u64 { 1000 }
fn default_settle_delay_ms() -> u64 { 200 }
fn default_min_start_jitter_ms() -> u64 { 100 }
fn default_max_start_jitter_ms() -> u64 { 1000 }
fn default_shutdown_timeout_ms() -> u64 { 5000 }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            error_backoff_ms: default_error_backoff_ms(),
            drain_timeout_ms: default_drain_timeout_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            min_start_jitter_ms: default_min_start_jitter_ms(),
            max_start_jitter_ms: default_max_start_jitter_ms(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
        }
    }
}

impl SchedulerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Jitter range in milliseconds, always non-empty.
    pub fn start_jitter_range(&self) -> std::ops::Range<u64> {
        let min = self.min_start_jitter_ms;
        let max = self.max_start_jitter_ms.max(min + 1);
        min..max
    }
}

/// Telegram transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Long-poll timeout passed to getUpdates.
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
    #[serde(default = "default_pairing_timeout_secs")]
    pub pairing_timeout_secs: u64,
}

fn default_api_base() -> String { "https://api.telegram.org".into() }
fn default_poll_timeout_secs() -> u64 { 30 }
fn default_pairing_timeout_secs() -> u64 { 120 }

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            poll_timeout_secs: default_poll_timeout_secs(),
            pairing_timeout_secs: default_pairing_timeout_secs(),
        }
    }
}

/// Global key hook configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotkeyConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
}

fn bool_true() -> bool { true }

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: FlexConfig = toml::from_str(
            r#"
            database_path = "/tmp/flex.db"

            [scheduler]
            poll_interval_ms = 250
            "#,
        )
        .unwrap();
        assert_eq!(config.database_path, "/tmp/flex.db");
        assert_eq!(config.scheduler.poll_interval_ms, 250);
        assert_eq!(config.scheduler.error_backoff_ms, 5000);
        assert_eq!(config.telegram.poll_timeout_secs, 30);
        assert!(config.hotkeys.enabled);
    }

    #[test]
    fn test_save_and_load_roundtrip_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = FlexConfig::default();
        config.scheduler.settle_delay_ms = 10;
        config.save_to(&path).unwrap();

        let loaded = FlexConfig::load_from(&path).unwrap();
        assert_eq!(loaded.scheduler.settle_delay_ms, 10);
    }

    #[test]
    fn test_jitter_range_never_empty() {
        let config = SchedulerConfig {
            min_start_jitter_ms: 5,
            max_start_jitter_ms: 0,
            ..SchedulerConfig::default()
        };
        let range = config.start_jitter_range();
        assert!(range.start < range.end);
    }

    #[test]
    fn test_invalid_config_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "database_path = [").unwrap();
        assert!(matches!(FlexConfig::load_from(&path), Err(FlexError::Config(_))));
    }
}
