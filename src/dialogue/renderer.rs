//! Dialogue Renderer: turns a state into the ordered directives that show it
//! to one user.
//!
//! Rendering a known state records it as the user's current state, gates its
//! buttons on the user's entitlement, expands `{{key}}` templates and lays the
//! message parts out with explicit [`Directive::Pause`] steps. The first part
//! is sent as photos when the state has images, otherwise as audio when it
//! has audio, otherwise as text; images always take precedence over audio.

use std::collections::HashMap;
use std::sync::Arc;
use teloxide::utils::html;
use tracing::{debug, error, warn};

use crate::config::DialogueConfig;
use crate::localization::LocalizationManager;
use crate::session::SessionStore;
use crate::state_store::{QuickReply, State, StateStore};
use crate::subscription::resolve_all;
use crate::template::{expand, placeholders};

use super::directive::{Directive, Keyboard};

/// What a render call did
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenderStatus {
    /// The state was shown and recorded as the user's current state
    Rendered(String),
    /// The id is not in the store; the session was left untouched
    UnknownState(String),
    /// The session store failed; only a generic error is shown
    SessionError,
    /// A fixed notice unrelated to any state
    Notice,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Rendering {
    pub status: RenderStatus,
    pub directives: Vec<Directive>,
}

/// Renders states for users; cheap to clone
#[derive(Clone)]
pub struct Renderer {
    pub(crate) states: Arc<StateStore>,
    pub(crate) sessions: Arc<dyn SessionStore>,
    pub(crate) l10n: Arc<LocalizationManager>,
    pub(crate) config: Arc<DialogueConfig>,
}

impl Renderer {
    pub fn new(
        states: Arc<StateStore>,
        sessions: Arc<dyn SessionStore>,
        l10n: Arc<LocalizationManager>,
        config: Arc<DialogueConfig>,
    ) -> Self {
        Self {
            states,
            sessions,
            l10n,
            config,
        }
    }

    /// Show `state_id` to `chat_id` and make it the user's current state
    pub async fn render(&self, chat_id: i64, language_code: Option<&str>, state_id: &str) -> Rendering {
        let Some(state) = self.states.get(state_id) else {
            warn!(user_id = chat_id, state_id = %state_id, "Requested state does not exist");
            return Rendering {
                status: RenderStatus::UnknownState(state_id.to_string()),
                directives: vec![Directive::text(
                    self.l10n.t_lang("unknown-state", language_code),
                )],
            };
        };

        if let Err(e) = self.sessions.set_state(chat_id, state_id).await {
            error!(user_id = chat_id, state_id = %state_id, error = %e, "Failed to record state transition");
            return self.failure(language_code);
        }

        let (is_premium, attributes) = match tokio::try_join!(
            self.sessions.is_premium(chat_id),
            self.sessions.get_attributes(chat_id)
        ) {
            Ok(session_data) => session_data,
            Err(e) => {
                error!(user_id = chat_id, state_id = %state_id, error = %e, "Failed to read session data");
                return self.failure(language_code);
            }
        };

        let prompt = self.l10n.t_lang("quick-reply-prompt", language_code);
        let directives = compose(&state, &attributes, is_premium, &self.config, &prompt);
        debug!(
            user_id = chat_id,
            state_id = %state_id,
            directives = directives.len(),
            is_premium,
            "State rendered"
        );

        Rendering {
            status: RenderStatus::Rendered(state_id.to_string()),
            directives,
        }
    }

    /// Generic retry-later reply for collaborator failures
    pub fn failure(&self, language_code: Option<&str>) -> Rendering {
        Rendering {
            status: RenderStatus::SessionError,
            directives: vec![Directive::text(
                self.l10n.t_lang("error-generic", language_code),
            )],
        }
    }

    /// A single localized notice
    pub fn notice(&self, key: &str, args: &[(&str, &str)], language_code: Option<&str>) -> Rendering {
        Rendering {
            status: RenderStatus::Notice,
            directives: vec![Directive::text(
                self.l10n.t_args_lang(key, args, language_code),
            )],
        }
    }
}

/// Quick-reply rows to show after `state`: its own rows verbatim, otherwise
/// the configured defaults unless the state opts out of them
pub fn quick_reply_rows(state: &State, config: &DialogueConfig, is_premium: bool) -> Vec<Vec<QuickReply>> {
    if !state.quick_replies.is_empty() {
        return state
            .quick_replies
            .iter()
            .map(|row| row.buttons.clone())
            .collect();
    }

    if config.shows_default_quick_replies(&state.id) {
        config.default_rows(is_premium)
    } else {
        Vec::new()
    }
}

/// Lay out `state` as directives for a user with the given session data
pub fn compose(
    state: &State,
    attributes: &HashMap<String, String>,
    is_premium: bool,
    config: &DialogueConfig,
    quick_reply_prompt: &str,
) -> Vec<Directive> {
    let buttons = resolve_all(&state.buttons, is_premium);
    let keyboard = (!buttons.is_empty()).then(|| Keyboard::Inline(buttons));
    let rows = quick_reply_rows(state, config, is_premium);

    // Message text is sent as HTML; captured values are plain text
    let attributes: HashMap<String, String> = attributes
        .iter()
        .map(|(key, value)| (key.clone(), html::escape(value)))
        .collect();

    let mut directives = Vec::new();
    let last = state.message_parts.len().saturating_sub(1);

    for (i, part) in state.message_parts.iter().enumerate() {
        if i > 0 {
            if let Some(delay) = state.message_parts[i - 1].delay() {
                directives.push(Directive::Pause(delay));
            }
        }

        let text = expand(&part.text, &attributes).into_owned();
        let unresolved = placeholders(&text);
        if !unresolved.is_empty() {
            debug!(state_id = %state.id, part = i, keys = ?unresolved, "Template keys without a value");
        }

        let part_keyboard = if i == last { keyboard.clone() } else { None };

        if i == 0 && !state.images.is_empty() {
            push_media(&mut directives, &state.images, config, |path| Directive::SendPhoto {
                path: path.to_string(),
                caption: text.clone(),
                keyboard: part_keyboard.clone(),
            });
        } else if i == 0 && !state.audio.is_empty() {
            push_media(&mut directives, &state.audio, config, |path| Directive::SendAudio {
                path: path.to_string(),
                caption: text.clone(),
                keyboard: part_keyboard.clone(),
            });
        } else {
            directives.push(Directive::SendText {
                text,
                keyboard: part_keyboard,
            });
        }
    }

    if rows.iter().any(|row| !row.is_empty()) {
        directives.push(Directive::SendQuickReplyPrompt {
            text: quick_reply_prompt.to_string(),
            rows,
        });
    }

    directives
}

fn push_media(
    directives: &mut Vec<Directive>,
    paths: &[String],
    config: &DialogueConfig,
    make: impl Fn(&str) -> Directive,
) {
    for (n, path) in paths.iter().enumerate() {
        if n > 0 && !config.media_gap.is_zero() {
            directives.push(Directive::Pause(config.media_gap));
        }
        directives.push(make(path));
    }
}
