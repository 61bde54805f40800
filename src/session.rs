//! # Session Module
//!
//! Per-user dialogue position, captured attributes and entitlement, behind
//! the [`SessionStore`] trait. [`InMemorySessionStore`] keeps everything in
//! process memory; the PostgreSQL store lives in `db`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::config::DEFAULT_ENTRY_STATE;
use crate::errors::SessionStoreError;

/// One user's persisted dialogue session
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserSession {
    pub chat_id: i64,
    pub username: Option<String>,
    pub current_state_id: String,
    pub attributes: HashMap<String, String>,
    pub is_premium: bool,
    pub created_at: DateTime<Utc>,
}

impl UserSession {
    pub fn new(chat_id: i64, username: Option<&str>, entry_state: &str) -> Self {
        Self {
            chat_id,
            username: username.map(str::to_string),
            current_state_id: entry_state.to_string(),
            attributes: HashMap::new(),
            is_premium: false,
            created_at: Utc::now(),
        }
    }
}

/// Storage collaborator for user sessions.
///
/// Every write is an independent, idempotent upsert. Implementations must not
/// make two different users contend, and must serialize writes for one user.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetch the session, creating it on first contact
    async fn get_or_create(
        &self,
        chat_id: i64,
        display_name: Option<&str>,
    ) -> Result<UserSession, SessionStoreError>;

    /// Current state id; the entry state for unknown users
    async fn get_state(&self, chat_id: i64) -> Result<String, SessionStoreError>;

    async fn set_state(&self, chat_id: i64, state_id: &str) -> Result<(), SessionStoreError>;

    async fn get_attributes(&self, chat_id: i64) -> Result<HashMap<String, String>, SessionStoreError>;

    async fn set_attribute(&self, chat_id: i64, key: &str, value: &str) -> Result<(), SessionStoreError>;

    /// Entitlement flag; false for unknown users
    async fn is_premium(&self, chat_id: i64) -> Result<bool, SessionStoreError>;

    async fn set_premium(&self, chat_id: i64, is_premium: bool) -> Result<(), SessionStoreError>;
}

type SessionSlot = Arc<Mutex<UserSession>>;

/// Process-local session store.
///
/// The outer map is only locked to find or insert a user's slot; all reads
/// and writes of one session then go through that user's own mutex.
#[derive(Debug)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<i64, SessionSlot>>,
    entry_state: String,
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_ENTRY_STATE)
    }
}

impl InMemorySessionStore {
    pub fn new(entry_state: impl Into<String>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            entry_state: entry_state.into(),
        }
    }

    async fn existing(&self, chat_id: i64) -> Option<SessionSlot> {
        self.sessions.read().await.get(&chat_id).cloned()
    }

    async fn slot(&self, chat_id: i64, display_name: Option<&str>) -> SessionSlot {
        if let Some(slot) = self.existing(chat_id).await {
            return slot;
        }

        let mut sessions = self.sessions.write().await;
        Arc::clone(sessions.entry(chat_id).or_insert_with(|| {
            Arc::new(Mutex::new(UserSession::new(
                chat_id,
                display_name,
                &self.entry_state,
            )))
        }))
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get_or_create(
        &self,
        chat_id: i64,
        display_name: Option<&str>,
    ) -> Result<UserSession, SessionStoreError> {
        let slot = self.slot(chat_id, display_name).await;
        let session = slot.lock().await.clone();
        Ok(session)
    }

    async fn get_state(&self, chat_id: i64) -> Result<String, SessionStoreError> {
        Ok(match self.existing(chat_id).await {
            Some(slot) => slot.lock().await.current_state_id.clone(),
            None => self.entry_state.clone(),
        })
    }

    async fn set_state(&self, chat_id: i64, state_id: &str) -> Result<(), SessionStoreError> {
        let slot = self.slot(chat_id, None).await;
        slot.lock().await.current_state_id = state_id.to_string();
        Ok(())
    }

    async fn get_attributes(&self, chat_id: i64) -> Result<HashMap<String, String>, SessionStoreError> {
        Ok(match self.existing(chat_id).await {
            Some(slot) => slot.lock().await.attributes.clone(),
            None => HashMap::new(),
        })
    }

    async fn set_attribute(&self, chat_id: i64, key: &str, value: &str) -> Result<(), SessionStoreError> {
        let slot = self.slot(chat_id, None).await;
        slot.lock()
            .await
            .attributes
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn is_premium(&self, chat_id: i64) -> Result<bool, SessionStoreError> {
        Ok(match self.existing(chat_id).await {
            Some(slot) => slot.lock().await.is_premium,
            None => false,
        })
    }

    async fn set_premium(&self, chat_id: i64, is_premium: bool) -> Result<(), SessionStoreError> {
        let slot = self.slot(chat_id, None).await;
        slot.lock().await.is_premium = is_premium;
        Ok(())
    }
}
