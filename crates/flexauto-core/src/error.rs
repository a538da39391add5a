//! Error type shared by every FlexAuto crate.

use thiserror::Error;

/// Unified error for stores, transports, watchers and block evaluation.
#[derive(Debug, Error)]
pub enum FlexError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Watch error: {0}")]
    Watch(String),

    #[error("Key hook error: {0}")]
    Hook(String),

    #[error("Block error: {0}")]
    Block(String),

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FlexError>;
