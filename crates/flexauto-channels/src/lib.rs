//! # FlexAuto Channels
//! Inbound event sources for the scheduler.
//!
//! - **telegram**: Bot API long polling, chat pairing, command menu
//! - **hotkey**: global key hook delivering key combinations over a channel

pub mod hotkey;
pub mod telegram;

pub use hotkey::KeyHook;
pub use telegram::TelegramBot;
