//! Chat-bot transport contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use crate::error::Result;
use crate::types::{BotCommand, ChatCommandEvent};

/// A chat bot that receives commands and sends notifications.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Bind the transport to a bot token and (optionally) a paired chat.
    fn initialize(&self, token: &str, chat_id: Option<i64>) -> Result<()>;

    /// Whether `initialize` succeeded.
    fn is_configured(&self) -> bool;

    /// Start the background listener for inbound text.
    async fn start_listening(&self) -> Result<()>;

    fn stop_listening(&self);

    /// Send text to the paired chat.
    async fn send(&self, text: &str) -> Result<()>;

    /// Publish the command menu.
    async fn set_commands(&self, commands: Vec<BotCommand>) -> Result<()>;

    /// Whether `command` arrived strictly after `since` (or within the last
    /// 10 seconds when `since` is `None`).
    fn has_command_since(&self, command: &str, since: Option<DateTime<Utc>>) -> bool;

    /// Subscribe to inbound command events.
    fn subscribe(&self) -> broadcast::Receiver<ChatCommandEvent>;
}

/// Canonical form of a chat command: trimmed, slashes removed, lower-cased.
pub fn normalize_command(raw: &str) -> String {
    raw.trim().replace('/', "").to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_command() {
        assert_eq!(normalize_command("  /Status "), "status");
        assert_eq!(normalize_command("report_daily"), "report_daily");
        assert_eq!(normalize_command("/"), "");
    }
}
