//! # Configuration Module
//!
//! Process configuration read from the environment (after `.env` has been
//! loaded by `main`) and the dialogue defaults that shape routing and
//! rendering.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::ConfigError;
use crate::state_store::QuickReply;

// Constants for dialogue configuration
pub const DEFAULT_ENTRY_STATE: &str = "start";
pub const DEFAULT_STATE_FILES: &str = "states/states.json";
pub const DEFAULT_RENDER_BUDGET_SECS: u64 = 120;
pub const PHOTO_GAP_MS: u64 = 300;

/// Free-text capture: while a user sits in `state`, any unmatched text is
/// stored under `attribute` and the user advances to `successor`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRule {
    pub state: String,
    pub attribute: String,
    pub successor: String,
}

impl CaptureRule {
    pub fn new(
        state: impl Into<String>,
        attribute: impl Into<String>,
        successor: impl Into<String>,
    ) -> Self {
        Self {
            state: state.into(),
            attribute: attribute.into(),
            successor: successor.into(),
        }
    }
}

/// Which quick-reply labels a typed message is matched against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuickReplyScope {
    /// Labels of every loaded state plus the default set
    #[default]
    Global,
    /// Labels of the user's current state plus the default set
    Current,
}

impl FromStr for QuickReplyScope {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "global" => Ok(QuickReplyScope::Global),
            "current" => Ok(QuickReplyScope::Current),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(()),
        }
    }
}

/// Routing and rendering behavior that is not part of the state documents
#[derive(Debug, Clone)]
pub struct DialogueConfig {
    /// State entered on `/start` and assumed for unseen users
    pub entry_state: String,
    pub capture_rules: Vec<CaptureRule>,
    /// States that never get the synthesized quick-reply keyboard
    pub no_quick_reply_states: Vec<String>,
    /// Quick-reply rows shown when a state declares none of its own
    pub default_quick_replies: Vec<Vec<QuickReply>>,
    /// Extra row appended to the defaults for users without premium
    pub buy_access: QuickReply,
    /// Gap between successive photos or audio files of one message part
    pub media_gap: Duration,
    pub quick_reply_scope: QuickReplyScope,
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            entry_state: DEFAULT_ENTRY_STATE.to_string(),
            capture_rules: vec![CaptureRule::new(DEFAULT_ENTRY_STATE, "Username", "user_name")],
            no_quick_reply_states: vec![DEFAULT_ENTRY_STATE.to_string(), "user_name".to_string()],
            default_quick_replies: vec![
                vec![
                    QuickReply::new("🧰 Emotion gallery", "all_emotions"),
                    QuickReply::new("📚 Diaries", "diaries"),
                ],
                vec![QuickReply::new("🧘 Meditations", "meditations")],
            ],
            buy_access: QuickReply::new("Buy full access 🚀", "buy_access"),
            media_gap: Duration::from_millis(PHOTO_GAP_MS),
            quick_reply_scope: QuickReplyScope::default(),
        }
    }
}

impl DialogueConfig {
    pub fn capture_rule(&self, state_id: &str) -> Option<&CaptureRule> {
        self.capture_rules.iter().find(|rule| rule.state == state_id)
    }

    pub fn shows_default_quick_replies(&self, state_id: &str) -> bool {
        !self.no_quick_reply_states.iter().any(|s| s == state_id)
    }

    /// Synthesized quick-reply rows for a state without its own
    pub fn default_rows(&self, is_premium: bool) -> Vec<Vec<QuickReply>> {
        let mut rows = self.default_quick_replies.clone();
        if !is_premium {
            rows.push(vec![self.buy_access.clone()]);
        }
        rows
    }

    /// Every default label a typed message may match, buy-access included
    pub fn default_quick_reply_buttons(&self) -> impl Iterator<Item = &QuickReply> {
        self.default_quick_replies
            .iter()
            .flatten()
            .chain(std::iter::once(&self.buy_access))
    }
}

/// Top-level process configuration
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub telegram_token: String,
    /// Absent means sessions are kept in process memory only
    pub database_url: Option<String>,
    pub state_files: Vec<PathBuf>,
    /// Chats allowed to run `/reload`
    pub admin_chat_ids: Vec<i64>,
    /// Upper bound on delivering the replies to one event
    pub render_budget: Duration,
    pub log_format: LogFormat,
    pub dialogue: DialogueConfig,
}

impl BotConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`, which maps a variable name to its value
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let telegram_token =
            non_empty("TELEGRAM_BOT_TOKEN").ok_or(ConfigError::Missing("TELEGRAM_BOT_TOKEN"))?;

        let state_files = non_empty("STATE_FILES")
            .unwrap_or_else(|| DEFAULT_STATE_FILES.to_string())
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .collect();

        let admin_chat_ids = match non_empty("ADMIN_CHAT_IDS") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(|id| {
                    id.parse::<i64>().map_err(|_| ConfigError::Invalid {
                        key: "ADMIN_CHAT_IDS",
                        value: raw.clone(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        let render_budget = match non_empty("RENDER_BUDGET_SECS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "RENDER_BUDGET_SECS",
                        value: raw,
                    })
                }
            },
            None => Duration::from_secs(DEFAULT_RENDER_BUDGET_SECS),
        };

        let log_format = parse_or_default(non_empty("LOG_FORMAT"), "LOG_FORMAT")?;

        let dialogue = DialogueConfig {
            quick_reply_scope: parse_or_default(non_empty("QUICK_REPLY_SCOPE"), "QUICK_REPLY_SCOPE")?,
            ..DialogueConfig::default()
        };

        Ok(Self {
            telegram_token,
            database_url: non_empty("DATABASE_URL"),
            state_files,
            admin_chat_ids,
            render_budget,
            log_format,
            dialogue,
        })
    }
}

fn parse_or_default<T: FromStr + Default>(
    raw: Option<String>,
    key: &'static str,
) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(T::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_with_token_only() {
        let config = BotConfig::from_lookup(lookup(&[("TELEGRAM_BOT_TOKEN", "123:abc")])).unwrap();
        assert_eq!(config.telegram_token, "123:abc");
        assert!(config.database_url.is_none());
        assert_eq!(config.state_files, vec![PathBuf::from(DEFAULT_STATE_FILES)]);
        assert!(config.admin_chat_ids.is_empty());
        assert_eq!(config.render_budget, Duration::from_secs(DEFAULT_RENDER_BUDGET_SECS));
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(config.dialogue.quick_reply_scope, QuickReplyScope::Global);
    }

    #[test]
    fn test_missing_token() {
        let result = BotConfig::from_lookup(lookup(&[]));
        assert!(matches!(result, Err(ConfigError::Missing("TELEGRAM_BOT_TOKEN"))));
    }

    #[test]
    fn test_full_environment() {
        let config = BotConfig::from_lookup(lookup(&[
            ("TELEGRAM_BOT_TOKEN", "t"),
            ("DATABASE_URL", "postgres://localhost/bot"),
            ("STATE_FILES", "states/base.json, states/extra.json,"),
            ("ADMIN_CHAT_IDS", "42, -1001"),
            ("RENDER_BUDGET_SECS", "30"),
            ("LOG_FORMAT", "json"),
            ("QUICK_REPLY_SCOPE", "current"),
        ]))
        .unwrap();

        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/bot"));
        assert_eq!(
            config.state_files,
            vec![PathBuf::from("states/base.json"), PathBuf::from("states/extra.json")]
        );
        assert_eq!(config.admin_chat_ids, vec![42, -1001]);
        assert_eq!(config.render_budget, Duration::from_secs(30));
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.dialogue.quick_reply_scope, QuickReplyScope::Current);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let bad_admin = BotConfig::from_lookup(lookup(&[
            ("TELEGRAM_BOT_TOKEN", "t"),
            ("ADMIN_CHAT_IDS", "42,abc"),
        ]));
        assert!(matches!(bad_admin, Err(ConfigError::Invalid { key: "ADMIN_CHAT_IDS", .. })));

        let bad_budget = BotConfig::from_lookup(lookup(&[
            ("TELEGRAM_BOT_TOKEN", "t"),
            ("RENDER_BUDGET_SECS", "0"),
        ]));
        assert!(matches!(bad_budget, Err(ConfigError::Invalid { .. })));

        let bad_scope = BotConfig::from_lookup(lookup(&[
            ("TELEGRAM_BOT_TOKEN", "t"),
            ("QUICK_REPLY_SCOPE", "everywhere"),
        ]));
        assert!(matches!(bad_scope, Err(ConfigError::Invalid { key: "QUICK_REPLY_SCOPE", .. })));
    }

    #[test]
    fn test_dialogue_defaults() {
        let dialogue = DialogueConfig::default();
        assert_eq!(dialogue.entry_state, "start");

        let rule = dialogue.capture_rule("start").unwrap();
        assert_eq!(rule.attribute, "Username");
        assert_eq!(rule.successor, "user_name");
        assert!(dialogue.capture_rule("diaries").is_none());

        assert!(!dialogue.shows_default_quick_replies("start"));
        assert!(!dialogue.shows_default_quick_replies("user_name"));
        assert!(dialogue.shows_default_quick_replies("diaries"));

        let free_rows = dialogue.default_rows(false);
        let premium_rows = dialogue.default_rows(true);
        assert_eq!(free_rows.len(), premium_rows.len() + 1);
        assert_eq!(free_rows.last().unwrap()[0].next_state, "buy_access");
        assert!(dialogue
            .default_quick_reply_buttons()
            .any(|b| b.next_state == "buy_access"));
    }
}
