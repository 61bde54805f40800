//! UI Builder module for turning directive keyboards into Telegram markup

use teloxide::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup, ReplyMarkup,
};

use crate::dialogue::Keyboard;
use crate::state_store::QuickReply;
use crate::subscription::EffectiveButton;

/// Inline keyboard with one button per row; the callback data is the target state id
pub fn inline_keyboard(buttons: &[EffectiveButton]) -> InlineKeyboardMarkup {
    let rows: Vec<Vec<InlineKeyboardButton>> = buttons
        .iter()
        .map(|button| {
            vec![InlineKeyboardButton::callback(
                button.label.clone(),
                button.target.clone(),
            )]
        })
        .collect();

    InlineKeyboardMarkup::new(rows)
}

/// Persistent reply keyboard; rows are kept as configured and empty rows dropped
pub fn reply_keyboard(rows: &[Vec<QuickReply>]) -> KeyboardMarkup {
    let rows: Vec<Vec<KeyboardButton>> = rows
        .iter()
        .filter(|row| !row.is_empty())
        .map(|row| {
            row.iter()
                .map(|quick_reply| KeyboardButton::new(quick_reply.label.clone()))
                .collect()
        })
        .collect();

    KeyboardMarkup::new(rows).resize_keyboard()
}

pub fn reply_markup(keyboard: &Keyboard) -> ReplyMarkup {
    match keyboard {
        Keyboard::Inline(buttons) => ReplyMarkup::InlineKeyboard(inline_keyboard(buttons)),
        Keyboard::Reply(rows) => ReplyMarkup::Keyboard(reply_keyboard(rows)),
    }
}
