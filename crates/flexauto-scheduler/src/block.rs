//! Block model. The tagged-variant contract for triggers and actions.
//!
//! A scenario chain is persisted as a JSON array:
//! ```text
//! [
//!   {"Type": "CyclicTrigger", "Id": "<uuid>", "Parameters": {"Interval": "5", "Unit": "Seconds"}},
//!   {"Type": "Delay",         "Id": "<uuid>", "Parameters": {"Milliseconds": "10"}}
//! ]
//! ```
//! The `Type` tag is resolved through [`BLOCK_TYPES`]; elements with an
//! unknown tag are dropped without failing the chain. Parameters stay
//! opaque strings until the variant itself evaluates or executes.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use flexauto_core::error::{FlexError, Result};

use crate::actions::{
    Action, CatalogCheckAction, ChatSendAction, DelayAction, KeyboardInputAction,
    MouseClickAction, ProcessAction, VideoCheckAction,
};
use crate::triggers::{
    ChatCommandTrigger, CyclicTrigger, FileChangeTrigger, HotkeyTrigger, TimeTrigger, Trigger,
};

/// Persisted part of every block: tag, stable id, parameter map.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlockHeader {
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(rename = "Id", default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(rename = "Parameters", default)]
    pub parameters: HashMap<String, String>,
}

impl BlockHeader {
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            id: Uuid::new_v4(),
            parameters: HashMap::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: &str) -> Self {
        self.parameters.insert(key.to_string(), value.to_string());
        self
    }

    /// A parameter value, treating empty strings as absent.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.parameters
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// A required parameter, or a block error naming it.
    pub fn require(&self, key: &str) -> Result<&str> {
        self.param(key)
            .ok_or_else(|| FlexError::Block(format!("{}: parameter '{key}' is not set", self.kind)))
    }

    /// A boolean parameter; anything but a literal `true` is false.
    pub fn flag(&self, key: &str) -> bool {
        self.param(key)
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
    }
}

/// A deserialized block: either trigger-capable or action-capable.
#[derive(Debug)]
pub enum Block {
    Trigger(Trigger),
    Action(Action),
}

impl Block {
    pub fn header(&self) -> &BlockHeader {
        match self {
            Block::Trigger(t) => t.header(),
            Block::Action(a) => a.header(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.header().id
    }

    pub fn kind(&self) -> &str {
        &self.header().kind
    }

    pub fn is_trigger(&self) -> bool {
        matches!(self, Block::Trigger(_))
    }
}

/// Value recorded in the execution context by a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlockValue {
    Text(String),
    List(Vec<String>),
}

impl From<String> for BlockValue {
    fn from(s: String) -> Self {
        BlockValue::Text(s)
    }
}

impl From<&str> for BlockValue {
    fn from(s: &str) -> Self {
        BlockValue::Text(s.to_string())
    }
}

impl From<Vec<String>> for BlockValue {
    fn from(list: Vec<String>) -> Self {
        BlockValue::List(list)
    }
}

impl fmt::Display for BlockValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockValue::Text(s) => write!(f, "{s}"),
            BlockValue::List(items) => write!(f, "{}", items.join(" ")),
        }
    }
}

/// Outcome of one action step.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionResult {
    /// Completed; the optional value is recorded under the block's id.
    Success(Option<BlockValue>),
    /// Chain must stop. `None` means "stopped, no data" rather than an error.
    Failure(Option<String>),
}

impl ActionResult {
    pub fn ok() -> Self {
        ActionResult::Success(None)
    }

    pub fn value(value: impl Into<BlockValue>) -> Self {
        ActionResult::Success(Some(value.into()))
    }

    pub fn failed(message: impl Into<String>) -> Self {
        ActionResult::Failure(Some(message.into()))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ActionResult::Success(_))
    }
}

type BlockCtor = fn(BlockHeader) -> Block;

fn time_trigger(h: BlockHeader) -> Block { Block::Trigger(Trigger::Time(TimeTrigger::new(h))) }
fn cyclic_trigger(h: BlockHeader) -> Block { Block::Trigger(Trigger::Cyclic(CyclicTrigger::new(h))) }
fn file_change_trigger(h: BlockHeader) -> Block { Block::Trigger(Trigger::FileChange(FileChangeTrigger::new(h))) }
fn hotkey_trigger(h: BlockHeader) -> Block { Block::Trigger(Trigger::Hotkey(HotkeyTrigger::new(h))) }
fn chat_command_trigger(h: BlockHeader) -> Block { Block::Trigger(Trigger::ChatCommand(ChatCommandTrigger::new(h))) }
fn delay_action(h: BlockHeader) -> Block { Block::Action(Action::Delay(DelayAction::new(h))) }
fn keyboard_action(h: BlockHeader) -> Block { Block::Action(Action::KeyboardInput(KeyboardInputAction::new(h))) }
fn mouse_action(h: BlockHeader) -> Block { Block::Action(Action::MouseClick(MouseClickAction::new(h))) }
fn process_action(h: BlockHeader) -> Block { Block::Action(Action::Process(ProcessAction::new(h))) }
fn video_action(h: BlockHeader) -> Block { Block::Action(Action::VideoCheck(VideoCheckAction::new(h))) }
fn catalog_action(h: BlockHeader) -> Block { Block::Action(Action::CatalogCheck(CatalogCheckAction::new(h))) }
fn chat_send_action(h: BlockHeader) -> Block { Block::Action(Action::ChatSend(ChatSendAction::new(h))) }

/// Every known type tag and its constructor. Adding a variant means adding
/// a row here.
pub static BLOCK_TYPES: &[(&str, BlockCtor)] = &[
    // Triggers
    ("TimeTrigger", time_trigger),
    ("CyclicTrigger", cyclic_trigger),
    ("FileChangeTrigger", file_change_trigger),
    ("HotkeyTrigger", hotkey_trigger),
    ("TelegramCommandTrigger", chat_command_trigger),
    // Actions
    ("Delay", delay_action),
    ("KeyboardInput", keyboard_action),
    ("MouseClick", mouse_action),
    ("ProcessAction", process_action),
    ("YouTubeCheck", video_action),
    ("TMDbCheck", catalog_action),
    ("TelegramSend", chat_send_action),
];

/// Build a block from its header, or `None` for an unknown tag.
pub fn build_block(header: BlockHeader) -> Option<Block> {
    BLOCK_TYPES
        .iter()
        .find(|(tag, _)| *tag == header.kind)
        .map(|(_, ctor)| ctor(header))
}

/// Deserialize a block chain. Malformed or unknown elements are dropped;
/// only a document that is not a JSON array at all is an error.
pub fn parse_chain(json: &str) -> Result<Vec<Block>> {
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }

    let items: Vec<serde_json::Value> = serde_json::from_str(json)?;
    let mut blocks = Vec::with_capacity(items.len());

    for item in items {
        let header: BlockHeader = match serde_json::from_value(item) {
            Ok(h) => h,
            Err(e) => {
                tracing::debug!("Dropping malformed block: {e}");
                continue;
            }
        };
        let kind = header.kind.clone();
        match build_block(header) {
            Some(block) => blocks.push(block),
            None => tracing::warn!("⚠️ Unknown block type '{kind}' dropped"),
        }
    }

    Ok(blocks)
}

/// Serialize headers back to the persisted chain format.
pub fn serialize_chain(headers: &[BlockHeader]) -> Result<String> {
    Ok(serde_json::to_string_pretty(headers)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_and_unknown_blocks() {
        let json = r#"[
            {"Type": "CyclicTrigger", "Id": "6f1c1f3e-9a4b-4d1c-8f7e-2b3c4d5e6f70", "Parameters": {"Interval": "5"}},
            {"Type": "Teleport", "Id": "0d6f5c1e-1111-4222-8333-944455556666", "Parameters": {}},
            {"Type": "Delay", "Parameters": {"Milliseconds": "10"}}
        ]"#;
        let blocks = parse_chain(json).unwrap();
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].is_trigger());
        assert_eq!(blocks[0].kind(), "CyclicTrigger");
        assert_eq!(
            blocks[0].id().to_string(),
            "6f1c1f3e-9a4b-4d1c-8f7e-2b3c4d5e6f70"
        );
        assert!(!blocks[1].is_trigger());
    }

    #[test]
    fn test_malformed_element_dropped() {
        let json = r#"[{"Parameters": {}}, 42, {"Type": "Delay"}]"#;
        let blocks = parse_chain(json).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].kind(), "Delay");
    }

    #[test]
    fn test_empty_and_invalid_documents() {
        assert!(parse_chain("").unwrap().is_empty());
        assert!(parse_chain("[]").unwrap().is_empty());
        assert!(parse_chain("{not json").is_err());
    }

    #[test]
    fn test_serialize_preserves_ids() {
        let header = BlockHeader::new("Delay").with_param("Milliseconds", "5");
        let json = serialize_chain(std::slice::from_ref(&header)).unwrap();
        assert!(json.contains("\"Type\": \"Delay\""));
        let blocks = parse_chain(&json).unwrap();
        assert_eq!(blocks[0].id(), header.id);
    }

    #[test]
    fn test_param_treats_empty_as_missing() {
        let header = BlockHeader::new("Delay")
            .with_param("Milliseconds", "")
            .with_param("Flag", "True");
        assert!(header.param("Milliseconds").is_none());
        assert!(header.require("Milliseconds").is_err());
        assert!(header.flag("Flag"));
        assert!(!header.flag("Other"));
    }

    #[test]
    fn test_every_tag_is_unique() {
        let mut tags: Vec<&str> = BLOCK_TYPES.iter().map(|(t, _)| *t).collect();
        tags.sort();
        tags.dedup();
        assert_eq!(tags.len(), BLOCK_TYPES.len());
    }
}
