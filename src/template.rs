//! # Template Module
//!
//! Expands `{{key}}` placeholders in authored message text from a user's
//! attribute map. Unknown keys stay verbatim and substituted values are never
//! scanned again.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::collections::HashMap;

lazy_static! {
    static ref PLACEHOLDER: Regex = Regex::new(r"\{\{([^{}]*)\}\}").unwrap();
}

/// Substitute every `{{key}}` present in `attributes`
pub fn expand<'a>(text: &'a str, attributes: &HashMap<String, String>) -> Cow<'a, str> {
    if attributes.is_empty() {
        return Cow::Borrowed(text);
    }

    PLACEHOLDER.replace_all(text, |caps: &Captures| match attributes.get(&caps[1]) {
        Some(value) => value.clone(),
        None => caps[0].to_string(),
    })
}

/// Keys referenced by placeholders in `text`, in order of appearance
pub fn placeholders(text: &str) -> Vec<&str> {
    PLACEHOLDER
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect()
}
