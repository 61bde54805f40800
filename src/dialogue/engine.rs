//! Event execution: per-chat serialization, routing and paced delivery

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

use crate::config::BotConfig;
use crate::localization::LocalizationManager;
use crate::session::SessionStore;
use crate::state_store::StateStore;
use crate::transport::Transport;

use super::directive::{Directive, Keyboard};
use super::renderer::Renderer;
use super::router::{InboundEvent, RouteOutcome, Router};

/// Idle chat locks are pruned once the map grows past this size
const CHAT_LOCK_PRUNE_THRESHOLD: usize = 1024;

/// One mutex per chat so that a chat's events run strictly one after another
/// while different chats proceed independently
#[derive(Debug, Default)]
pub struct ChatLocks {
    locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl ChatLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `chat_id`
    pub async fn acquire(&self, chat_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            if locks.len() > CHAT_LOCK_PRUNE_THRESHOLD {
                locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            Arc::clone(locks.entry(chat_id).or_default())
        };
        lock.lock_owned().await
    }

    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }
}

/// Result of delivering one event's directives
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub sent: usize,
    pub failed: usize,
    /// The time budget ran out before every directive was executed
    pub timed_out: bool,
}

/// Execute `directives` in order, sleeping on pauses.
///
/// A failed send is logged and delivery continues with the next directive.
/// Whatever is left when `budget` runs out is dropped.
pub async fn deliver(
    transport: &dyn Transport,
    chat_id: i64,
    directives: &[Directive],
    budget: Duration,
) -> DeliveryReport {
    let mut report = DeliveryReport::default();

    let outcome = tokio::time::timeout(budget, send_all(transport, chat_id, directives, &mut report)).await;
    if outcome.is_err() {
        warn!(
            user_id = chat_id,
            sent = report.sent,
            remaining = directives.iter().filter(|d| d.is_send()).count() - report.sent - report.failed,
            "Delivery budget exhausted, dropping remaining messages"
        );
        report.timed_out = true;
    }

    report
}

async fn send_all(
    transport: &dyn Transport,
    chat_id: i64,
    directives: &[Directive],
    report: &mut DeliveryReport,
) {
    for directive in directives {
        let result = match directive {
            Directive::Pause(delay) => {
                tokio::time::sleep(*delay).await;
                continue;
            }
            Directive::SendText { text, keyboard } => {
                transport.send_text(chat_id, text, keyboard.as_ref()).await
            }
            Directive::SendPhoto {
                path,
                caption,
                keyboard,
            } => {
                transport
                    .send_photo(chat_id, path, Some(caption), keyboard.as_ref())
                    .await
            }
            Directive::SendAudio {
                path,
                caption,
                keyboard,
            } => {
                transport
                    .send_audio(chat_id, path, Some(caption), keyboard.as_ref())
                    .await
            }
            Directive::SendQuickReplyPrompt { text, rows } => {
                let keyboard = Keyboard::Reply(rows.clone());
                transport.send_text(chat_id, text, Some(&keyboard)).await
            }
        };

        match result {
            Ok(()) => report.sent += 1,
            Err(e) => {
                report.failed += 1;
                warn!(user_id = chat_id, error = %e, "Failed to deliver message, continuing");
            }
        }
    }
}

/// Entry point for inbound events: routes them and delivers the replies
pub struct DialogueEngine {
    router: Router,
    chat_locks: ChatLocks,
    render_budget: Duration,
}

impl DialogueEngine {
    pub fn new(router: Router, render_budget: Duration) -> Self {
        Self {
            router,
            chat_locks: ChatLocks::new(),
            render_budget,
        }
    }

    /// Assemble the engine from process configuration and its collaborators
    pub fn from_config(
        config: &BotConfig,
        states: Arc<StateStore>,
        sessions: Arc<dyn SessionStore>,
        l10n: Arc<LocalizationManager>,
    ) -> Self {
        let renderer = Renderer::new(states, sessions, l10n, Arc::new(config.dialogue.clone()));
        let router = Router::new(renderer, config.admin_chat_ids.clone());
        Self::new(router, config.render_budget)
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Handle one event to completion, including paced delivery.
    ///
    /// Events of the same chat are serialized; the next one starts only after
    /// this one's transition is committed and its replies are sent.
    pub async fn handle(&self, event: InboundEvent, transport: &dyn Transport) -> DeliveryReport {
        let _guard = self.chat_locks.acquire(event.chat_id).await;

        let RouteOutcome {
            rendering,
            callback_ack,
        } = self.router.route(&event).await;
        debug!(user_id = event.chat_id, status = ?rendering.status, "Event routed");

        if let Some(ack) = callback_ack {
            if let Err(e) = transport
                .acknowledge_callback(&ack.callback_id, ack.alert.as_deref())
                .await
            {
                warn!(user_id = event.chat_id, error = %e, "Failed to answer callback query");
            }
        }

        deliver(transport, event.chat_id, &rendering.directives, self.render_budget).await
    }
}
