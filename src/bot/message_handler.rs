//! Message Handler module for processing incoming Telegram messages

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::debug;

use crate::dialogue::{DialogueEngine, InboundEvent};

use super::telegram::TelegramTransport;

/// Build the inbound event for a message.
///
/// Captions count as text; messages with neither arrive as empty text, which
/// re-prompts the current state.
pub fn inbound_event(msg: &Message) -> InboundEvent {
    let text = msg.text().or_else(|| msg.caption()).unwrap_or_default();
    let user = msg.from.as_ref();

    InboundEvent::from_text(msg.chat.id.0, text)
        .with_username(user.and_then(|u| u.username.clone()))
        .with_language(user.and_then(|u| u.language_code.clone()))
}

pub async fn message_handler(bot: Bot, msg: Message, engine: Arc<DialogueEngine>) -> Result<()> {
    let event = inbound_event(&msg);
    debug!(
        user_id = %msg.chat.id,
        language_code = ?event.language_code,
        kind = ?event.kind,
        "Received message from user"
    );

    let transport = TelegramTransport::new(bot);
    let report = engine.handle(event, &transport).await;
    debug!(
        user_id = %msg.chat.id,
        sent = report.sent,
        failed = report.failed,
        timed_out = report.timed_out,
        "Message handled"
    );

    Ok(())
}
