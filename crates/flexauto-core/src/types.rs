//! Data model shared between the store, the scheduler and the transports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A persisted automation unit: one trigger followed by an action chain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Scenario {
    pub id: Uuid,
    pub name: String,
    pub is_active: bool,
    /// Serialized block chain (JSON array of blocks).
    pub blocks_json: String,
    /// Free-form context left by the editor; the engine never reads it.
    #[serde(default)]
    pub last_context_json: Option<String>,
    #[serde(default)]
    pub last_executed: Option<DateTime<Utc>>,
    /// Display color for the editor.
    #[serde(default = "default_color")]
    pub color: String,
}

fn default_color() -> String {
    "#673AB7".into()
}

impl Scenario {
    /// Create an inactive scenario with an empty chain.
    pub fn new(name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            is_active: false,
            blocks_json: "[]".into(),
            last_context_json: None,
            last_executed: None,
            color: default_color(),
        }
    }

    /// Builder-style helper used by tests and the CLI importer.
    pub fn with_blocks(mut self, blocks_json: impl Into<String>) -> Self {
        self.blocks_json = blocks_json.into();
        self
    }

    pub fn activated(mut self) -> Self {
        self.is_active = true;
        self
    }
}

/// The single settings record: service credentials and chat-bot binding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppSettings {
    pub id: Uuid,
    pub youtube_api_key: Option<String>,
    pub tmdb_api_key: Option<String>,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<i64>,
    pub pairing_code: Option<String>,
    pub telegram_enabled: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            youtube_api_key: None,
            tmdb_api_key: None,
            telegram_bot_token: None,
            telegram_chat_id: None,
            pairing_code: None,
            telegram_enabled: false,
        }
    }
}

impl AppSettings {
    /// Token usable for starting the bot, if the bot is switched on.
    pub fn active_bot_token(&self) -> Option<&str> {
        match self.telegram_bot_token.as_deref() {
            Some(token) if self.telegram_enabled && !token.trim().is_empty() => Some(token),
            _ => None,
        }
    }
}

/// One entry of the chat transport's command menu.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BotCommand {
    pub command: String,
    pub description: String,
}

/// Broadcast after a scenario run completed successfully.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScenarioExecuted {
    pub scenario_id: Uuid,
    pub executed_at: DateTime<Utc>,
}

/// Inbound command text accepted by the chat transport.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatCommandEvent {
    pub text: String,
    pub chat_id: i64,
    pub received_at: DateTime<Utc>,
}

/// A key plus a modifier set, normalized so equal combinations compare equal.
///
/// Keys are lower-cased; modifiers are lower-cased, deduplicated, sorted and
/// joined with `+` (`"Shift + Ctrl"` → `"ctrl+shift"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyCombo {
    pub key: String,
    pub modifiers: String,
}

impl KeyCombo {
    pub fn new(key: &str, modifiers: &str) -> Self {
        Self {
            key: normalize_key(key),
            modifiers: normalize_modifiers(modifiers),
        }
    }
}

/// Lowercase a key name and fold aliases (`Return` is `enter`).
pub fn normalize_key(key: &str) -> String {
    let key = key.trim().to_lowercase();
    match key.as_str() {
        "return" => "enter".to_string(),
        _ => key,
    }
}

impl std::fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.modifiers.is_empty() {
            write!(f, "{}", self.key)
        } else {
            write!(f, "{}+{}", self.modifiers, self.key)
        }
    }
}

/// Normalize a `+`-separated modifier list.
pub fn normalize_modifiers(modifiers: &str) -> String {
    let mut parts: Vec<String> = modifiers
        .split('+')
        .map(|m| m.trim().to_lowercase())
        .filter(|m| !m.is_empty())
        .map(|m| match m.as_str() {
            "control" => "ctrl".to_string(),
            "option" => "alt".to_string(),
            _ => m,
        })
        .collect();
    parts.sort();
    parts.dedup();
    parts.join("+")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_combo_normalization() {
        let a = KeyCombo::new("F9", "Shift + Ctrl");
        let b = KeyCombo::new("f9", "control+shift");
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "ctrl+shift+f9");
    }

    #[test]
    fn test_return_is_enter() {
        assert_eq!(KeyCombo::new("Return", "ctrl"), KeyCombo::new("enter", "Ctrl"));
        assert_eq!(KeyCombo::new(" RETURN ", "").key, "enter");
    }

    #[test]
    fn test_empty_modifiers() {
        let combo = KeyCombo::new("Space", "");
        assert_eq!(combo.modifiers, "");
        assert_eq!(combo.to_string(), "space");
    }

    #[test]
    fn test_active_bot_token_requires_enabled_flag() {
        let mut settings = AppSettings {
            telegram_bot_token: Some("123:abc".into()),
            ..AppSettings::default()
        };
        assert!(settings.active_bot_token().is_none());
        settings.telegram_enabled = true;
        assert_eq!(settings.active_bot_token(), Some("123:abc"));
    }
}
