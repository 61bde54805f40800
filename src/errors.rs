//! # Error Types Module
//!
//! Error types shared by the dialogue engine and its collaborators. Each
//! variant is terminal for the event that produced it: handlers log it and
//! report it to the user, nothing is retried within the same event.

use thiserror::Error;

/// Failure while reading or parsing state documents
#[derive(Debug, Error)]
pub enum LoadError {
    /// A state file could not be read
    #[error("failed to read state document {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// A document is not valid JSON or does not match the state schema
    #[error("malformed state document #{index}: {source}")]
    Parse {
        index: usize,
        #[source]
        source: serde_json::Error,
    },
    /// A document declares a schema version this build does not understand
    #[error("state document #{index} has unsupported schema_version {version}")]
    UnsupportedVersion { index: usize, version: u64 },
    /// A document parsed but violates a content rule
    #[error("invalid state '{state_id}' in document #{index}: {reason}")]
    Invalid {
        index: usize,
        state_id: String,
        reason: String,
    },
    /// `reload` was requested before any file-backed load succeeded
    #[error("no state files have been loaded yet")]
    NothingToReload,
}

/// Failure of the session storage collaborator
#[derive(Debug, Error)]
pub enum SessionStoreError {
    /// Backend (database, network) failure
    #[error("session backend error: {0}")]
    Backend(String),
    /// The backend returned data the store could not interpret
    #[error("corrupt session data for chat {chat_id}: {reason}")]
    Corrupt { chat_id: i64, reason: String },
}

impl From<sqlx::Error> for SessionStoreError {
    fn from(err: sqlx::Error) -> Self {
        SessionStoreError::Backend(err.to_string())
    }
}

/// Failure delivering one outbound directive
#[derive(Debug, Error)]
pub enum SendError {
    /// The messaging platform rejected or failed the request
    #[error("transport error: {0}")]
    Transport(String),
    /// A referenced local media file does not exist
    #[error("media file not found: {0}")]
    MissingMedia(String),
}

impl From<teloxide::RequestError> for SendError {
    fn from(err: teloxide::RequestError) -> Self {
        SendError::Transport(err.to_string())
    }
}

/// Invalid process configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is absent
    #[error("{0} must be set")]
    Missing(&'static str),
    /// An environment variable holds a value that cannot be parsed
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}
