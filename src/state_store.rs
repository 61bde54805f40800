//! # State Store Module
//!
//! In-memory catalogue of dialogue states, loaded from one or more JSON
//! documents. Later documents overwrite earlier ones on id collision and the
//! merged map replaces the active snapshot in a single swap, so readers only
//! ever see a complete catalogue.
//!
//! ## Document shapes
//!
//! - Versioned: `{"schema_version": 1, "states": {"start": {...}}}`
//! - Legacy: the top-level object is the state map itself, read as version 1
//!
//! `schema_version` is therefore a reserved key and cannot name a state in a
//! legacy document.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::errors::LoadError;

/// Highest state document schema version this build understands
pub const CURRENT_SCHEMA_VERSION: u64 = 1;

const SCHEMA_VERSION_KEY: &str = "schema_version";

/// Longest pause a message part may request, in seconds
pub const MAX_PART_SLEEP_SECS: f64 = 3600.0;

/// One piece of a state's message, sent as its own chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MessagePart {
    pub text: String,
    /// Pause in seconds inserted after this part, before the next one
    #[serde(rename = "sleep", default)]
    pub delay_seconds: f64,
}

impl MessagePart {
    pub fn new(text: impl Into<String>, delay_seconds: f64) -> Self {
        Self {
            text: text.into(),
            delay_seconds,
        }
    }

    /// Pause to honor after this part, if any
    pub fn delay(&self) -> Option<Duration> {
        if self.delay_seconds > 0.0 {
            Duration::try_from_secs_f64(self.delay_seconds).ok()
        } else {
            None
        }
    }
}

/// Inline button attached to the last message of a state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Button {
    #[serde(rename = "text")]
    pub label: String,
    pub next_state: String,
    #[serde(default)]
    pub requires_premium: bool,
    #[serde(default)]
    pub fallback_state: String,
}

impl Button {
    pub fn new(label: impl Into<String>, next_state: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            next_state: next_state.into(),
            requires_premium: false,
            fallback_state: String::new(),
        }
    }

    /// Builder for a button that sends non-premium users to `fallback_state`
    pub fn premium(mut self, fallback_state: impl Into<String>) -> Self {
        self.requires_premium = true;
        self.fallback_state = fallback_state.into();
        self
    }
}

/// Reply keyboard button, matched by its label when the user taps it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuickReply {
    #[serde(rename = "text")]
    pub label: String,
    pub next_state: String,
}

impl QuickReply {
    pub fn new(label: impl Into<String>, next_state: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            next_state: next_state.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuickReplyRow {
    pub buttons: Vec<QuickReply>,
}

/// A node of the dialogue graph
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct State {
    /// Map key of the state; not part of the document body
    #[serde(skip)]
    pub id: String,
    #[serde(rename = "message", default)]
    pub message_parts: Vec<MessagePart>,
    #[serde(default)]
    pub buttons: Vec<Button>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub audio: Vec<String>,
    #[serde(default)]
    pub quick_replies: Vec<QuickReplyRow>,
}

impl State {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// All quick replies of the state, row by row
    pub fn quick_reply_buttons(&self) -> impl Iterator<Item = &QuickReply> {
        self.quick_replies.iter().flat_map(|row| row.buttons.iter())
    }

    fn validate(&self, index: usize) -> Result<(), LoadError> {
        let invalid = |reason: String| LoadError::Invalid {
            index,
            state_id: self.id.clone(),
            reason,
        };

        for (i, part) in self.message_parts.iter().enumerate() {
            if !(0.0..=MAX_PART_SLEEP_SECS).contains(&part.delay_seconds) {
                return Err(invalid(format!(
                    "message part {i} has invalid sleep {}",
                    part.delay_seconds
                )));
            }
        }

        for button in &self.buttons {
            if button.requires_premium && button.fallback_state.is_empty() {
                return Err(invalid(format!(
                    "premium button '{}' has no fallback_state",
                    button.label
                )));
            }
        }

        Ok(())
    }
}

/// Ordered map of state id to state; iteration order is ascending id
pub type StateMap = BTreeMap<String, State>;

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct VersionedDocument {
    schema_version: u64,
    states: StateMap,
}

/// Parse one state document, migrating the legacy shape to the current one
pub fn parse_document(index: usize, source: &str) -> Result<StateMap, LoadError> {
    let parse_err = |source| LoadError::Parse { index, source };

    let raw: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(source).map_err(parse_err)?;

    let mut states = if raw.contains_key(SCHEMA_VERSION_KEY) {
        let doc: VersionedDocument =
            serde_json::from_value(serde_json::Value::Object(raw)).map_err(parse_err)?;
        if doc.schema_version == 0 || doc.schema_version > CURRENT_SCHEMA_VERSION {
            return Err(LoadError::UnsupportedVersion {
                index,
                version: doc.schema_version,
            });
        }
        doc.states
    } else {
        debug!(document = index, "Migrating unversioned state document");
        serde_json::from_value::<StateMap>(serde_json::Value::Object(raw)).map_err(parse_err)?
    };

    for (id, state) in states.iter_mut() {
        state.id = id.clone();
        state.validate(index)?;
    }

    Ok(states)
}

/// Read-mostly store of dialogue states with atomic reload
#[derive(Debug, Default)]
pub struct StateStore {
    snapshot: RwLock<Arc<StateMap>>,
    files: Mutex<Vec<PathBuf>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store directly from already constructed states
    pub fn from_states(states: impl IntoIterator<Item = State>) -> Self {
        let map = states.into_iter().map(|s| (s.id.clone(), s)).collect();
        Self {
            snapshot: RwLock::new(Arc::new(map)),
            files: Mutex::new(Vec::new()),
        }
    }

    /// Parse and merge `sources` left to right, then swap them in.
    ///
    /// On any failure the active snapshot is left untouched.
    pub fn load<S: AsRef<str>>(&self, sources: &[S]) -> Result<(), LoadError> {
        let mut merged = StateMap::new();
        for (index, source) in sources.iter().enumerate() {
            let states = parse_document(index, source.as_ref())?;
            for (id, state) in states {
                if merged.insert(id.clone(), state).is_some() {
                    debug!(state_id = %id, document = index, "State redefined by later document");
                }
            }
        }

        let count = merged.len();
        *self
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(merged);
        info!(states = count, documents = sources.len(), "State store loaded");
        Ok(())
    }

    /// Read every file in order and load them as one batch
    pub fn load_files<P: AsRef<Path>>(&self, paths: &[P]) -> Result<(), LoadError> {
        let mut sources = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
                path: path.display().to_string(),
                source,
            })?;
            sources.push(content);
        }

        self.load(&sources)?;

        *self.files.lock().unwrap_or_else(PoisonError::into_inner) =
            paths.iter().map(|p| p.as_ref().to_path_buf()).collect();
        Ok(())
    }

    /// Re-read the files of the last successful `load_files`
    pub fn reload(&self) -> Result<(), LoadError> {
        let files = self
            .files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if files.is_empty() {
            return Err(LoadError::NothingToReload);
        }

        self.load_files(&files).inspect_err(|e| {
            warn!(error = %e, "State reload rejected, keeping previous snapshot");
        })
    }

    /// Current snapshot; stays valid even if a reload swaps it afterwards
    pub fn snapshot(&self) -> Arc<StateMap> {
        Arc::clone(&self.snapshot.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn get(&self, id: &str) -> Option<State> {
        self.snapshot().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.snapshot().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }
}
