//! # FlexAuto Scheduler
//!
//! Block interpreter and scenario scheduler.
//!
//! ## Pieces
//! - **block**: tagged block model and chain (de)serialization
//! - **triggers**: Time, Cyclic, FileChange, Hotkey, ChatCommand
//! - **actions**: Delay, keyboard/mouse input, processes, checks, chat send
//! - **context / template**: per-run values and `{LastResult}` / `{<id>}` substitution
//! - **executor**: runs one scenario chain
//! - **engine**: hot-reloading scheduler with polling loops and event dispatch
//! - **persistence**: SQLite store for scenarios and settings

pub mod actions;
pub mod block;
pub mod context;
pub mod engine;
pub mod events;
pub mod executor;
pub mod persistence;
pub mod registry;
pub mod services;
pub mod template;
pub mod triggers;

#[cfg(test)]
pub(crate) mod testing;

pub use block::{ActionResult, Block, BlockHeader, BlockValue, parse_chain, serialize_chain};
pub use context::ExecutionContext;
pub use engine::{ReloadSummary, Scheduler};
pub use events::ExecutionNotifier;
pub use executor::{RunOutcome, ScenarioExecutor};
pub use persistence::SqliteStore;
pub use services::Services;
