//! Router: decides which state an inbound event leads to and hands it to the
//! renderer.

use std::sync::Arc;
use teloxide::utils::html;
use tracing::{error, info, warn};

use crate::config::QuickReplyScope;
use crate::session::SessionStore;
use crate::state_store::{QuickReply, StateStore};
use crate::subscription::{gate_callback, CallbackGate};

use super::renderer::{Renderer, Rendering};

pub const START_COMMAND: &str = "start";
pub const RELOAD_COMMAND: &str = "reload";

/// Kind of an inbound chat event
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventKind {
    /// `/name ...`; `text` is the full raw message
    Command { name: String, text: String },
    /// Free text, including quick-reply taps
    Text { text: String },
    /// Inline button press; `payload` is the target state id
    Callback { callback_id: String, payload: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundEvent {
    pub chat_id: i64,
    pub username: Option<String>,
    pub language_code: Option<String>,
    pub kind: EventKind,
}

impl InboundEvent {
    /// Classify a typed message as a command or plain text
    pub fn from_text(chat_id: i64, text: impl Into<String>) -> Self {
        let text = text.into();
        let kind = match parse_command(&text) {
            Some(name) => EventKind::Command { name, text },
            None => EventKind::Text { text },
        };
        Self::new(chat_id, kind)
    }

    pub fn callback(chat_id: i64, callback_id: impl Into<String>, payload: impl Into<String>) -> Self {
        Self::new(
            chat_id,
            EventKind::Callback {
                callback_id: callback_id.into(),
                payload: payload.into(),
            },
        )
    }

    pub fn new(chat_id: i64, kind: EventKind) -> Self {
        Self {
            chat_id,
            username: None,
            language_code: None,
            kind,
        }
    }

    pub fn with_username(mut self, username: Option<String>) -> Self {
        self.username = username;
        self
    }

    pub fn with_language(mut self, language_code: Option<String>) -> Self {
        self.language_code = language_code;
        self
    }
}

/// Command name of `/name@bot args`, lowercased
fn parse_command(text: &str) -> Option<String> {
    let first = text.split_whitespace().next()?;
    let name = first.strip_prefix('/')?;
    let name = name.split('@').next().unwrap_or(name);
    (!name.is_empty()).then(|| name.to_ascii_lowercase())
}

/// Acknowledgement owed to the platform for a callback event
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallbackAck {
    pub callback_id: String,
    /// Shown to the user as an alert when set
    pub alert: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RouteOutcome {
    pub rendering: Rendering,
    pub callback_ack: Option<CallbackAck>,
}

/// Resolves inbound events to state transitions
#[derive(Clone)]
pub struct Router {
    renderer: Renderer,
    admin_chat_ids: Arc<Vec<i64>>,
}

impl Router {
    pub fn new(renderer: Renderer, admin_chat_ids: Vec<i64>) -> Self {
        Self {
            renderer,
            admin_chat_ids: Arc::new(admin_chat_ids),
        }
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    fn sessions(&self) -> &dyn SessionStore {
        self.renderer.sessions.as_ref()
    }

    fn states(&self) -> &StateStore {
        &self.renderer.states
    }

    /// Route one event and render its outcome
    pub async fn route(&self, event: &InboundEvent) -> RouteOutcome {
        let chat_id = event.chat_id;
        let lang = event.language_code.as_deref();

        if let Err(e) = self
            .sessions()
            .get_or_create(chat_id, event.username.as_deref())
            .await
        {
            error!(user_id = chat_id, error = %e, "Failed to load user session");
            return RouteOutcome {
                rendering: self.renderer.failure(lang),
                callback_ack: plain_ack(&event.kind),
            };
        }

        match &event.kind {
            EventKind::Command { name, .. } if name == START_COMMAND => {
                info!(user_id = chat_id, "Entry command received");
                let entry = &self.renderer.config.entry_state;
                self.outcome(self.renderer.render(chat_id, lang, entry).await)
            }
            EventKind::Command { name, .. }
                if name == RELOAD_COMMAND && self.admin_chat_ids.contains(&chat_id) =>
            {
                self.outcome(self.reload_states(chat_id, lang))
            }
            // Unhandled commands still match labels but are never captured as input
            EventKind::Command { text, .. } => {
                self.outcome(self.route_text(chat_id, lang, text, false).await)
            }
            EventKind::Text { text } => self.outcome(self.route_text(chat_id, lang, text, true).await),
            EventKind::Callback {
                callback_id,
                payload,
            } => self.route_callback(chat_id, lang, callback_id, payload).await,
        }
    }

    fn outcome(&self, rendering: Rendering) -> RouteOutcome {
        RouteOutcome {
            rendering,
            callback_ack: None,
        }
    }

    async fn route_text(
        &self,
        chat_id: i64,
        lang: Option<&str>,
        text: &str,
        allow_capture: bool,
    ) -> Rendering {
        let config = &self.renderer.config;

        let mut current = None;
        if config.quick_reply_scope == QuickReplyScope::Current {
            match self.sessions().get_state(chat_id).await {
                Ok(state) => current = Some(state),
                Err(e) => {
                    error!(user_id = chat_id, error = %e, "Failed to read current state");
                    return self.renderer.failure(lang);
                }
            }
        }

        if let Some(target) = self.match_quick_reply(text, current.as_deref()) {
            info!(user_id = chat_id, target = %target, "Quick reply matched");
            return self.renderer.render(chat_id, lang, &target).await;
        }

        let current = match current {
            Some(state) => state,
            None => match self.sessions().get_state(chat_id).await {
                Ok(state) => state,
                Err(e) => {
                    error!(user_id = chat_id, error = %e, "Failed to read current state");
                    return self.renderer.failure(lang);
                }
            },
        };

        if let Some(rule) = config.capture_rule(&current) {
            if allow_capture && !text.is_empty() {
                if let Err(e) = self
                    .sessions()
                    .set_attribute(chat_id, &rule.attribute, text)
                    .await
                {
                    error!(user_id = chat_id, attribute = %rule.attribute, error = %e, "Failed to store captured input");
                    return self.renderer.failure(lang);
                }
                info!(user_id = chat_id, attribute = %rule.attribute, successor = %rule.successor, "Captured user input");
                return self.renderer.render(chat_id, lang, &rule.successor).await;
            }
        }

        // Anything else re-prompts the current state
        self.renderer.render(chat_id, lang, &current).await
    }

    /// Target of the first quick reply labelled exactly `text`.
    ///
    /// With `current` set only that state's rows are searched, otherwise all
    /// states in ascending id order; the default set is searched last.
    pub fn match_quick_reply(&self, text: &str, current: Option<&str>) -> Option<String> {
        let snapshot = self.states().snapshot();
        let config = &self.renderer.config;

        let from_states: Box<dyn Iterator<Item = &QuickReply> + '_> = match current {
            Some(id) => Box::new(snapshot.get(id).into_iter().flat_map(|s| s.quick_reply_buttons())),
            None => Box::new(snapshot.values().flat_map(|s| s.quick_reply_buttons())),
        };

        let target = from_states
            .chain(config.default_quick_reply_buttons())
            .find(|qr| qr.label == text)
            .map(|qr| qr.next_state.clone());
        target
    }

    async fn route_callback(
        &self,
        chat_id: i64,
        lang: Option<&str>,
        callback_id: &str,
        payload: &str,
    ) -> RouteOutcome {
        let l10n = &self.renderer.l10n;

        let is_premium = match self.sessions().is_premium(chat_id).await {
            Ok(is_premium) => is_premium,
            Err(e) => {
                error!(user_id = chat_id, error = %e, "Failed to check subscription");
                return RouteOutcome {
                    rendering: self.renderer.failure(lang),
                    callback_ack: Some(CallbackAck {
                        callback_id: callback_id.to_string(),
                        alert: Some(l10n.t_lang("premium-check-failed", lang)),
                    }),
                };
            }
        };

        let gate = gate_callback(&self.states().snapshot(), payload, is_premium);
        let alert = match &gate {
            CallbackGate::Redirected { requested, target } => {
                info!(user_id = chat_id, requested = %requested, target = %target, "Premium target redirected to fallback");
                Some(l10n.t_lang("premium-required", lang))
            }
            CallbackGate::Allowed { .. } => None,
        };

        RouteOutcome {
            rendering: self.renderer.render(chat_id, lang, gate.target()).await,
            callback_ack: Some(CallbackAck {
                callback_id: callback_id.to_string(),
                alert,
            }),
        }
    }

    fn reload_states(&self, chat_id: i64, lang: Option<&str>) -> Rendering {
        match self.states().reload() {
            Ok(()) => {
                let count = self.states().len().to_string();
                info!(user_id = chat_id, states = %count, "State documents reloaded by admin");
                self.renderer.notice("reload-success", &[("count", count.as_str())], lang)
            }
            Err(e) => {
                warn!(user_id = chat_id, error = %e, "Admin reload failed");
                let reason = html::escape(&e.to_string());
                self.renderer.notice("reload-failed", &[("error", reason.as_str())], lang)
            }
        }
    }
}

fn plain_ack(kind: &EventKind) -> Option<CallbackAck> {
    match kind {
        EventKind::Callback { callback_id, .. } => Some(CallbackAck {
            callback_id: callback_id.clone(),
            alert: None,
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("/start"), Some("start".to_string()));
        assert_eq!(parse_command("/Start@scenario_bot payload"), Some("start".to_string()));
        assert_eq!(parse_command("  /reload  "), Some("reload".to_string()));
        assert_eq!(parse_command("start"), None);
        assert_eq!(parse_command("/"), None);
        assert_eq!(parse_command(""), None);
    }

    #[test]
    fn test_event_classification() {
        let event = InboundEvent::from_text(1, "/start");
        assert_eq!(
            event.kind,
            EventKind::Command {
                name: "start".to_string(),
                text: "/start".to_string()
            }
        );

        let event = InboundEvent::from_text(1, "Alice").with_language(Some("ru".to_string()));
        assert_eq!(event.kind, EventKind::Text { text: "Alice".to_string() });
        assert_eq!(event.language_code.as_deref(), Some("ru"));
    }
}
