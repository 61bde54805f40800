//! Bot module for handling Telegram interactions
//!
//! This module is split into several submodules:
//! - `message_handler`: Turns incoming text messages into dialogue events
//! - `callback_handler`: Turns inline keyboard presses into dialogue events
//! - `telegram`: Bot API implementation of the message transport
//! - `ui_builder`: Creates inline and reply keyboards

pub mod callback_handler;
pub mod message_handler;
pub mod telegram;
pub mod ui_builder;

// Re-export main handler functions for use in main.rs
pub use callback_handler::callback_handler;
pub use message_handler::message_handler;

pub use telegram::TelegramTransport;
