//! Persistence contract consumed by the scheduler and the CLI.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::types::{AppSettings, Scenario};

/// Scenario and settings persistence.
#[async_trait]
pub trait ScenarioStore: Send + Sync {
    /// All scenarios, active or not, in creation order.
    async fn all_scenarios(&self) -> Result<Vec<Scenario>>;

    /// Only scenarios with the active flag set.
    async fn active_scenarios(&self) -> Result<Vec<Scenario>> {
        Ok(self
            .all_scenarios()
            .await?
            .into_iter()
            .filter(|s| s.is_active)
            .collect())
    }

    async fn scenario(&self, id: Uuid) -> Result<Option<Scenario>>;

    async fn add_scenario(&self, scenario: &Scenario) -> Result<()>;

    /// Overwrite a scenario row.
    async fn update_scenario(&self, scenario: &Scenario) -> Result<()>;

    /// Persist only the last-execution timestamp.
    async fn set_last_executed(&self, id: Uuid, at: DateTime<Utc>) -> Result<()>;

    async fn delete_scenario(&self, id: Uuid) -> Result<bool>;

    async fn settings(&self) -> Result<Option<AppSettings>>;

    async fn save_settings(&self, settings: &AppSettings) -> Result<()>;
}
