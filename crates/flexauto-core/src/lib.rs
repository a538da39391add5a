//! # FlexAuto Core
//!
//! Shared foundation for the FlexAuto workspace: the scenario data model,
//! the error type, configuration loading, and the traits every external
//! collaborator (store, chat transport, check services, OS drivers)
//! implements.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::FlexConfig;
pub use error::{FlexError, Result};
pub use types::{
    AppSettings, BotCommand, ChatCommandEvent, KeyCombo, Scenario, ScenarioExecuted,
};
