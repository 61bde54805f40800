//! Outbound directives produced by the renderer

use std::time::Duration;

use crate::state_store::QuickReply;
use crate::subscription::EffectiveButton;

/// Keyboard attached to an outbound message
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Keyboard {
    /// Buttons under the message; pressing one delivers its target as a callback
    Inline(Vec<EffectiveButton>),
    /// Persistent reply keyboard; pressing a button sends its label as text
    Reply(Vec<Vec<QuickReply>>),
}

/// One step of a reply sequence, executed in order
#[derive(Clone, Debug, PartialEq)]
pub enum Directive {
    SendText {
        text: String,
        keyboard: Option<Keyboard>,
    },
    SendPhoto {
        path: String,
        caption: String,
        keyboard: Option<Keyboard>,
    },
    SendAudio {
        path: String,
        caption: String,
        keyboard: Option<Keyboard>,
    },
    /// Trailing message whose only purpose is to show the quick replies
    SendQuickReplyPrompt {
        text: String,
        rows: Vec<Vec<QuickReply>>,
    },
    /// Suspend before the next directive
    Pause(Duration),
}

impl Directive {
    /// Plain text message without keyboard
    pub fn text(text: impl Into<String>) -> Self {
        Directive::SendText {
            text: text.into(),
            keyboard: None,
        }
    }

    /// Whether executing the directive sends a message
    pub fn is_send(&self) -> bool {
        !matches!(self, Directive::Pause(_))
    }

    pub fn keyboard(&self) -> Option<&Keyboard> {
        match self {
            Directive::SendText { keyboard, .. }
            | Directive::SendPhoto { keyboard, .. }
            | Directive::SendAudio { keyboard, .. } => keyboard.as_ref(),
            Directive::SendQuickReplyPrompt { .. } | Directive::Pause(_) => None,
        }
    }
}
