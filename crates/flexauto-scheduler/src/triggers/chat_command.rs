//! Chat command trigger.
//!
//! Parameters: `Command` (with or without a leading slash) and an optional
//! `Description` shown in the bot menu.

use chrono::{DateTime, Utc};

use flexauto_core::error::{FlexError, Result};
use flexauto_core::traits::ChatTransport;
use flexauto_core::traits::chat::normalize_command;
use flexauto_core::types::BotCommand;

use crate::block::BlockHeader;

/// Menu descriptions longer than this are cut and suffixed with `...`.
pub const MAX_DESCRIPTION_CHARS: usize = 256;

#[derive(Debug)]
pub struct ChatCommandTrigger {
    pub header: BlockHeader,
}

impl ChatCommandTrigger {
    pub fn new(header: BlockHeader) -> Self {
        Self { header }
    }

    /// Normalized command text.
    pub fn command(&self) -> Result<String> {
        let command = normalize_command(self.header.require("Command")?);
        if command.is_empty() {
            return Err(FlexError::Block("TelegramCommandTrigger: empty command".into()));
        }
        Ok(command)
    }

    /// Menu entry for this trigger, described by the block or the scenario.
    pub fn menu_entry(&self, scenario_name: &str) -> Result<BotCommand> {
        let description = self
            .header
            .param("Description")
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or(scenario_name);
        Ok(BotCommand {
            command: self.command()?,
            description: truncate_description(description),
        })
    }

    pub(crate) fn should_fire(
        &self,
        last_executed: Option<DateTime<Utc>>,
        chat: &dyn ChatTransport,
    ) -> Result<bool> {
        if !chat.is_configured() {
            return Ok(false);
        }
        Ok(chat.has_command_since(&self.command()?, last_executed))
    }
}

pub fn truncate_description(description: &str) -> String {
    if description.chars().count() <= MAX_DESCRIPTION_CHARS {
        return description.to_string();
    }
    let cut: String = description.chars().take(MAX_DESCRIPTION_CHARS - 3).collect();
    format!("{cut}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_normalized() {
        let t = ChatCommandTrigger::new(
            BlockHeader::new("TelegramCommandTrigger").with_param("Command", " /Report "),
        );
        assert_eq!(t.command().unwrap(), "report");
    }

    #[test]
    fn test_menu_entry_falls_back_to_scenario_name() {
        let t = ChatCommandTrigger::new(
            BlockHeader::new("TelegramCommandTrigger").with_param("Command", "status"),
        );
        let entry = t.menu_entry("Daily status").unwrap();
        assert_eq!(entry.command, "status");
        assert_eq!(entry.description, "Daily status");
    }

    #[test]
    fn test_long_description_truncated() {
        let long = "я".repeat(300);
        let cut = truncate_description(&long);
        assert_eq!(cut.chars().count(), MAX_DESCRIPTION_CHARS);
        assert!(cut.ends_with("..."));
        assert_eq!(truncate_description("short"), "short");
    }

    #[test]
    fn test_slash_only_command_rejected() {
        let t = ChatCommandTrigger::new(
            BlockHeader::new("TelegramCommandTrigger").with_param("Command", "/"),
        );
        assert!(t.command().is_err());
    }
}
