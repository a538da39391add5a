//! # FlexAuto Tools
//! Implementations of the collaborator traits that actions call into.
//!
//! - **youtube**: latest-upload check per channel
//! - **tmdb**: new-release check per genre and region
//! - **input**: keyboard/mouse simulation (`desktop` feature)
//! - **process**: open files and programs, kill processes by name

pub mod input;
pub mod process;
pub mod tmdb;
pub mod youtube;

pub use input::{NullInputDriver, default_input_driver};
pub use process::SystemProcesses;
pub use tmdb::TmdbService;
pub use youtube::YouTubeService;

#[cfg(feature = "desktop")]
pub use input::EnigoDriver;
