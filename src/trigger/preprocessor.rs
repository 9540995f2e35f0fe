//! Message preprocessor.
//!
//! Cheap first gate for every message: is there text to look at, and does
//! it carry a message prefix when one is required?

use super::match_prefix;
use crate::event::BotEvent;

/// Outcome of a successful pre-check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreprocessResult {
    /// Trimmed first text segment, prefix included.
    pub command_text: String,
    /// Longest configured prefix found, or `""`.
    pub matched_prefix: String,
}

/// Pre-check configuration.
#[derive(Debug, Clone)]
pub struct MessagePreprocessor {
    prefixes: Vec<String>,
    require_prefix: bool,
    case_sensitive: bool,
}

impl MessagePreprocessor {
    pub fn new<I, S>(prefixes: I, require_prefix: bool, case_sensitive: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list: Vec<String> = Vec::new();
        for prefix in prefixes {
            let prefix = prefix.into();
            if !prefix.is_empty() && !list.contains(&prefix) {
                list.push(prefix);
            }
        }

        Self {
            prefixes: list,
            require_prefix,
            case_sensitive,
        }
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    /// Extract the command candidate from `event`.
    ///
    /// Returns `None` if the first segment is not text, the text is blank, or
    /// a required prefix is missing. The matched prefix is only a candidate:
    /// the resolved command's own prefixes decide in the end.
    pub fn precheck(&self, event: &dyn BotEvent) -> Option<PreprocessResult> {
        let text = event.first_text()?.trim();
        if text.is_empty() {
            return None;
        }

        let matched = match_prefix(text, &self.prefixes, self.case_sensitive);
        if self.require_prefix && matched.is_none() {
            return None;
        }

        Some(PreprocessResult {
            command_text: text.to_string(),
            matched_prefix: matched.map(|(_, prefix)| prefix.to_string()).unwrap_or_default(),
        })
    }
}
