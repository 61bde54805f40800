//! Telegram implementation of the message transport

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{CallbackQueryId, InputFile, ParseMode};
use tracing::{debug, warn};

use crate::dialogue::Keyboard;
use crate::errors::SendError;
use crate::transport::Transport;

use super::ui_builder::reply_markup;

/// Sends directives through the Bot API; message text is HTML formatted
#[derive(Clone)]
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

/// Local media must exist before an upload is attempted
async fn ensure_media(chat_id: i64, path: &str) -> Result<(), SendError> {
    if tokio::fs::metadata(path).await.is_err() {
        warn!(user_id = chat_id, path = %path, "Media file not found, skipping");
        return Err(SendError::MissingMedia(path.to_string()));
    }
    Ok(())
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send_text(&self, chat_id: i64, text: &str, keyboard: Option<&Keyboard>) -> Result<(), SendError> {
        let mut request = self
            .bot
            .send_message(ChatId(chat_id), text)
            .parse_mode(ParseMode::Html);
        if let Some(keyboard) = keyboard {
            request = request.reply_markup(reply_markup(keyboard));
        }

        request.await?;
        debug!(user_id = chat_id, "Text message sent");
        Ok(())
    }

    async fn send_photo(
        &self,
        chat_id: i64,
        path: &str,
        caption: Option<&str>,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), SendError> {
        ensure_media(chat_id, path).await?;

        let mut request = self
            .bot
            .send_photo(ChatId(chat_id), InputFile::file(path))
            .parse_mode(ParseMode::Html);
        if let Some(caption) = caption.filter(|c| !c.is_empty()) {
            request = request.caption(caption);
        }
        if let Some(keyboard) = keyboard {
            request = request.reply_markup(reply_markup(keyboard));
        }

        request.await?;
        debug!(user_id = chat_id, path = %path, "Photo sent");
        Ok(())
    }

    async fn send_audio(
        &self,
        chat_id: i64,
        path: &str,
        caption: Option<&str>,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), SendError> {
        ensure_media(chat_id, path).await?;

        let mut request = self
            .bot
            .send_audio(ChatId(chat_id), InputFile::file(path))
            .parse_mode(ParseMode::Html);
        if let Some(caption) = caption.filter(|c| !c.is_empty()) {
            request = request.caption(caption);
        }
        if let Some(keyboard) = keyboard {
            request = request.reply_markup(reply_markup(keyboard));
        }

        request.await?;
        debug!(user_id = chat_id, path = %path, "Audio sent");
        Ok(())
    }

    async fn acknowledge_callback(&self, callback_id: &str, alert: Option<&str>) -> Result<(), SendError> {
        let mut request = self
            .bot
            .answer_callback_query(CallbackQueryId(callback_id.to_string()));
        if let Some(alert) = alert {
            request = request.text(alert).show_alert(true);
        }

        request.await?;
        Ok(())
    }
}
