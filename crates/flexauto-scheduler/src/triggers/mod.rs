//! Trigger variants. Blocks that decide whether a scenario should start.
//!
//! Time, Cyclic and FileChange triggers are polled by a per-scenario loop.
//! Hotkey and ChatCommand triggers are event-driven: the scheduler registers
//! them and runs their scenarios when a matching event arrives.

pub mod chat_command;
pub mod cyclic;
pub mod file_change;
pub mod hotkey;
pub mod time;

pub use chat_command::ChatCommandTrigger;
pub use cyclic::{CyclicTrigger, IntervalUnit};
pub use file_change::{FileChangeTrigger, FileEventKind, WatchHandle};
pub use hotkey::HotkeyTrigger;
pub use time::TimeTrigger;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use flexauto_core::error::Result;

use crate::block::{BlockHeader, BlockValue};
use crate::services::Services;

/// A trigger block with its per-instance state.
#[derive(Debug)]
pub enum Trigger {
    Time(TimeTrigger),
    Cyclic(CyclicTrigger),
    FileChange(FileChangeTrigger),
    Hotkey(HotkeyTrigger),
    ChatCommand(ChatCommandTrigger),
}

impl Trigger {
    pub fn header(&self) -> &BlockHeader {
        match self {
            Trigger::Time(t) => &t.header,
            Trigger::Cyclic(t) => &t.header,
            Trigger::FileChange(t) => &t.header,
            Trigger::Hotkey(t) => &t.header,
            Trigger::ChatCommand(t) => &t.header,
        }
    }

    /// Evaluate the firing condition. May consume internal state (a pending
    /// file event).
    pub async fn should_fire(
        &mut self,
        last_executed: Option<DateTime<Utc>>,
        services: &Services,
    ) -> Result<bool> {
        match self {
            Trigger::Time(t) => t.should_fire(last_executed),
            Trigger::Cyclic(t) => t.should_fire(last_executed),
            Trigger::FileChange(t) => Ok(t.should_fire()),
            Trigger::Hotkey(_) => Ok(false),
            Trigger::ChatCommand(t) => t.should_fire(last_executed, services.chat.as_ref()),
        }
    }

    /// Values the trigger hands to the run's execution context.
    pub fn take_bindings(&mut self) -> Vec<(Uuid, BlockValue)> {
        match self {
            Trigger::FileChange(t) => t
                .take_detected_path()
                .map(|path| (t.header.id, BlockValue::Text(path.display().to_string())))
                .into_iter()
                .collect(),
            _ => Vec::new(),
        }
    }
}
