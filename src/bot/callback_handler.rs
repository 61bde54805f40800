//! Callback Handler module for processing inline keyboard callback queries

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::{debug, warn};

use crate::dialogue::{DialogueEngine, InboundEvent};

use super::telegram::TelegramTransport;

/// Build the inbound event for a button press, or `None` when it carries no data
pub fn inbound_event(q: &CallbackQuery) -> Option<InboundEvent> {
    let payload = q.data.as_deref()?;
    // Presses on inaccessible messages still come from the user's private chat
    let chat_id = q
        .message
        .as_ref()
        .map(|m| m.chat().id)
        .unwrap_or(ChatId(q.from.id.0 as i64));

    Some(
        InboundEvent::callback(chat_id.0, q.id.0.clone(), payload)
            .with_username(q.from.username.clone())
            .with_language(q.from.language_code.clone()),
    )
}

/// Handle callback queries from inline keyboards
pub async fn callback_handler(bot: Bot, q: CallbackQuery, engine: Arc<DialogueEngine>) -> Result<()> {
    debug!(user_id = %q.from.id, data = ?q.data, "Received callback query from user");

    let Some(event) = inbound_event(&q) else {
        warn!(user_id = %q.from.id, "Callback query without data, acknowledging only");
        bot.answer_callback_query(q.id).await?;
        return Ok(());
    };

    let transport = TelegramTransport::new(bot);
    let report = engine.handle(event, &transport).await;
    debug!(
        user_id = %q.from.id,
        sent = report.sent,
        failed = report.failed,
        timed_out = report.timed_out,
        "Callback query handled"
    );

    Ok(())
}
