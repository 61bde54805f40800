//! # Localization Tests
//!
//! This module contains unit tests for the localization functionality,
//! testing message retrieval and formatting with various edge cases.

use scenario_bot::localization::{detect_language, LocalizationManager};
use std::collections::HashMap;

#[cfg(test)]
mod tests {
    use super::*;

    const KEYS: &[&str] = &[
        "unknown-state",
        "error-generic",
        "quick-reply-prompt",
        "premium-required",
        "premium-check-failed",
        "reload-success",
        "reload-failed",
    ];

    fn setup_localization() -> LocalizationManager {
        // Create a new localization manager for each test
        LocalizationManager::new().expect("Failed to create localization manager")
    }

    #[test]
    fn test_every_notice_translated() {
        let manager = setup_localization();

        for key in KEYS {
            for language in ["en", "ru"] {
                let message = manager.get_message_in_language(key, language, None);
                assert!(!message.starts_with("Missing"), "{key} missing in {language}");
            }
        }
    }

    #[test]
    fn test_get_message_nonexistent_key() {
        let manager = setup_localization();

        let message = manager.get_message_in_language("nonexistent-key", "en", None);
        assert!(message.starts_with("Missing translation:"));
    }

    #[test]
    fn test_get_message_unsupported_language() {
        let manager = setup_localization();

        // Should fall back to English
        let message = manager.get_message_in_language("unknown-state", "de", None);
        assert_eq!(message, manager.get_message("unknown-state", None));
    }

    #[test]
    fn test_get_message_with_args() {
        let manager = setup_localization();

        let mut args = HashMap::new();
        args.insert("count", "12");
        let message = manager.get_message_in_language("reload-success", "en", Some(&args));
        assert!(message.contains("12"));
        // No bidi isolation marks around arguments
        assert!(!message.contains('\u{2068}'));

        let message = manager.t_args_lang("reload-failed", &[("error", "bad json")], Some("ru"));
        assert!(message.contains("bad json"));
    }

    #[test]
    fn test_russian_localization() {
        let manager = setup_localization();

        let russian = manager.t_lang("premium-required", Some("ru-RU"));
        let english = manager.t_lang("premium-required", Some("en"));
        assert!(!russian.is_empty());
        assert_ne!(russian, english);
    }

    #[test]
    fn test_language_detection() {
        assert_eq!(detect_language(Some("en")), "en");
        assert_eq!(detect_language(Some("en-US")), "en");
        assert_eq!(detect_language(Some("ru")), "ru");
        assert_eq!(detect_language(Some("RU_ru")), "ru");
        assert_eq!(detect_language(None), "en"); // Default to English
        assert_eq!(detect_language(Some("unsupported")), "en"); // Fallback to English
    }
}
