//! Trigger engine: from message text to a bound command.
//!
//! - `preprocessor` - first-segment extraction and prefix pre-check
//! - `resolver` - trie index over command paths with conflict detection
//! - `binder` - maps the remaining tokens onto declared parameters

mod binder;
mod preprocessor;
mod resolver;

pub use binder::{ArgumentBinder, BindResult};
pub use preprocessor::{MessagePreprocessor, PreprocessResult};
pub use resolver::{CommandResolver, MatchResult, ResolverState};

/// Case-fold `s` unless matching is case sensitive.
pub(crate) fn normalize(s: &str, case_sensitive: bool) -> String {
    if case_sensitive {
        s.to_string()
    } else {
        s.to_lowercase()
    }
}

/// Longest prefix in `prefixes` that `text` starts with.
///
/// Returns the byte length of the matched prefix in `text` and the prefix as
/// configured.
pub(crate) fn match_prefix<'a>(
    text: &str,
    prefixes: &'a [String],
    case_sensitive: bool,
) -> Option<(usize, &'a str)> {
    prefixes
        .iter()
        .filter(|prefix| !prefix.is_empty())
        .filter(|prefix| {
            text.get(..prefix.len())
                .is_some_and(|head| normalize(head, case_sensitive) == normalize(prefix, case_sensitive))
        })
        .max_by_key(|prefix| prefix.len())
        .map(|prefix| (prefix.len(), prefix.as_str()))
}
