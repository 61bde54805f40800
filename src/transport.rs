//! Messaging transport interface used to deliver rendered directives

use async_trait::async_trait;

use crate::dialogue::Keyboard;
use crate::errors::SendError;

/// Outbound side of the messaging platform
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_text(&self, chat_id: i64, text: &str, keyboard: Option<&Keyboard>) -> Result<(), SendError>;

    async fn send_photo(
        &self,
        chat_id: i64,
        path: &str,
        caption: Option<&str>,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), SendError>;

    async fn send_audio(
        &self,
        chat_id: i64,
        path: &str,
        caption: Option<&str>,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), SendError>;

    /// Stop the client's loading indicator for a button press, optionally
    /// showing `alert`
    async fn acknowledge_callback(&self, callback_id: &str, alert: Option<&str>) -> Result<(), SendError>;
}
