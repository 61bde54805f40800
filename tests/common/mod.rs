//! Shared fixtures for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use scenario_bot::config::DialogueConfig;
use scenario_bot::dialogue::{Keyboard, Renderer, Router};
use scenario_bot::errors::SendError;
use scenario_bot::localization::LocalizationManager;
use scenario_bot::session::{InMemorySessionStore, SessionStore};
use scenario_bot::state_store::{Button, MessagePart, QuickReply, QuickReplyRow, State, StateStore};
use scenario_bot::transport::Transport;

pub const ADMIN_CHAT: i64 = 900;

/// Something a [`RecordingTransport`] was asked to do
#[derive(Clone, Debug, PartialEq)]
pub enum Sent {
    Text {
        chat_id: i64,
        text: String,
        keyboard: Option<Keyboard>,
    },
    Photo {
        chat_id: i64,
        path: String,
    },
    Audio {
        chat_id: i64,
        path: String,
    },
    Ack {
        callback_id: String,
        alert: Option<String>,
    },
}

/// Transport double that records every call with the time it happened
#[derive(Default)]
pub struct RecordingTransport {
    log: Mutex<Vec<(Instant, Sent)>>,
    failing_texts: HashSet<String>,
    send_delay: Duration,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text sends whose body equals `text` fail
    pub fn failing_on(mut self, text: &str) -> Self {
        self.failing_texts.insert(text.to_string());
        self
    }

    /// Every send takes `delay`
    pub fn with_send_delay(mut self, delay: Duration) -> Self {
        self.send_delay = delay;
        self
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.log.lock().unwrap().iter().map(|(_, s)| s.clone()).collect()
    }

    pub fn timed(&self) -> Vec<(Instant, Sent)> {
        self.log.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Text { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    fn record(&self, sent: Sent) {
        self.log.lock().unwrap().push((Instant::now(), sent));
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_text(&self, chat_id: i64, text: &str, keyboard: Option<&Keyboard>) -> Result<(), SendError> {
        tokio::time::sleep(self.send_delay).await;
        if self.failing_texts.contains(text) {
            return Err(SendError::Transport("simulated failure".to_string()));
        }
        self.record(Sent::Text {
            chat_id,
            text: text.to_string(),
            keyboard: keyboard.cloned(),
        });
        Ok(())
    }

    async fn send_photo(
        &self,
        chat_id: i64,
        path: &str,
        _caption: Option<&str>,
        _keyboard: Option<&Keyboard>,
    ) -> Result<(), SendError> {
        tokio::time::sleep(self.send_delay).await;
        self.record(Sent::Photo {
            chat_id,
            path: path.to_string(),
        });
        Ok(())
    }

    async fn send_audio(
        &self,
        chat_id: i64,
        path: &str,
        _caption: Option<&str>,
        _keyboard: Option<&Keyboard>,
    ) -> Result<(), SendError> {
        tokio::time::sleep(self.send_delay).await;
        self.record(Sent::Audio {
            chat_id,
            path: path.to_string(),
        });
        Ok(())
    }

    async fn acknowledge_callback(&self, callback_id: &str, alert: Option<&str>) -> Result<(), SendError> {
        self.record(Sent::Ack {
            callback_id: callback_id.to_string(),
            alert: alert.map(str::to_string),
        });
        Ok(())
    }
}

fn text_state(id: &str, text: &str) -> State {
    let mut state = State::new(id);
    state.message_parts = vec![MessagePart::new(text, 0.0)];
    state
}

/// Small scenario covering capture, premium gating and quick replies
pub fn scenario_states() -> Vec<State> {
    let start = text_state("start", "What is your name?");

    let mut user_name = text_state("user_name", "Nice to meet you, {{Username}}!");
    user_name.buttons = vec![
        Button::new("Gallery", "all_emotions"),
        Button::new("Course", "full_course").premium("paywall"),
    ];

    let mut diaries = text_state("diaries", "Diaries");
    diaries.quick_replies = vec![QuickReplyRow {
        buttons: vec![QuickReply::new("Evening", "diary_evening")],
    }];

    vec![
        start,
        user_name,
        text_state("all_emotions", "Gallery"),
        diaries,
        text_state("diary_evening", "Evening diary"),
        text_state("meditations", "Meditations"),
        text_state("full_course", "Full course"),
        text_state("paywall", "Paywall"),
        text_state("buy_access", "Buy access"),
    ]
}

pub struct Fixture {
    pub states: Arc<StateStore>,
    pub sessions: Arc<InMemorySessionStore>,
    pub router: Router,
}

pub fn fixture_with(states: Vec<State>, config: DialogueConfig) -> Fixture {
    let states = Arc::new(StateStore::from_states(states));
    let sessions = Arc::new(InMemorySessionStore::default());
    let l10n = Arc::new(LocalizationManager::new().expect("Failed to create localization manager"));

    let renderer = Renderer::new(
        Arc::clone(&states),
        Arc::clone(&sessions) as Arc<dyn SessionStore>,
        l10n,
        Arc::new(config),
    );
    let router = Router::new(renderer, vec![ADMIN_CHAT]);

    Fixture {
        states,
        sessions,
        router,
    }
}

pub fn fixture() -> Fixture {
    fixture_with(scenario_states(), DialogueConfig::default())
}
