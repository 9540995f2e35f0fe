//! Command resolver.
//!
//! Builds a trie over normalized command paths and resolves token streams
//! against it. All ambiguity is rejected while building, so resolution
//! never needs a tie-break: the deepest command reached along the tokens
//! is the only candidate.
//!
//! ## States
//!
//! `Empty -> Building -> Built`, or `Building -> Error` when the registry
//! holds conflicting prefixes or paths.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::{debug, error, info};

use super::{match_prefix, normalize};
use crate::command::{CommandPath, CommandSpec, Token, TokenKind};
use crate::error::BuildError;

/// Lifecycle of a resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverState {
    Empty,
    Building,
    Built,
    Error,
}

/// A successful structural match.
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub command: Arc<CommandSpec>,
    /// Number of tokens the path consumed.
    pub path_len: usize,
    pub via_alias: bool,
}

#[derive(Default)]
struct TrieNode {
    children: HashMap<String, TrieNode>,
    command: Option<(Arc<CommandSpec>, bool)>,
}

/// Trie-backed resolver over one registry snapshot.
pub struct CommandResolver {
    prefixes: Vec<String>,
    case_sensitive: bool,
    state: ResolverState,
    root: TrieNode,
    commands: Vec<Arc<CommandSpec>>,
    paths: Vec<CommandPath>,
}

impl CommandResolver {
    pub fn new<I, S>(prefixes: I, case_sensitive: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list: Vec<String> = Vec::new();
        for prefix in prefixes {
            let prefix: String = prefix.into();
            let prefix = normalize(&prefix, case_sensitive);
            if !prefix.is_empty() && !list.contains(&prefix) {
                list.push(prefix);
            }
        }

        Self {
            prefixes: list,
            case_sensitive,
            state: ResolverState::Empty,
            root: TrieNode::default(),
            commands: Vec::new(),
            paths: Vec::new(),
        }
    }

    pub fn state(&self) -> ResolverState {
        self.state
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    /// Build the index from canonical commands and aliases.
    ///
    /// On error the resolver is left in [`ResolverState::Error`] with an
    /// empty index; a partial index is never kept.
    pub fn build_index(
        &mut self,
        commands: &BTreeMap<CommandPath, Arc<CommandSpec>>,
        aliases: &BTreeMap<CommandPath, Arc<CommandSpec>>,
    ) -> Result<(), BuildError> {
        self.state = ResolverState::Building;
        self.reset_index();

        match self.try_build(commands, aliases) {
            Ok(()) => {
                self.state = ResolverState::Built;
                info!(
                    "Command index built: {} commands, {} aliases, prefixes {:?}",
                    commands.len(),
                    aliases.len(),
                    self.prefixes
                );
                Ok(())
            }
            Err(e) => {
                error!("Command index build failed: {}", e);
                self.reset_index();
                self.state = ResolverState::Error;
                Err(e)
            }
        }
    }

    fn try_build(
        &mut self,
        commands: &BTreeMap<CommandPath, Arc<CommandSpec>>,
        aliases: &BTreeMap<CommandPath, Arc<CommandSpec>>,
    ) -> Result<(), BuildError> {
        self.check_prefix_conflicts()?;

        let entries = commands
            .iter()
            .map(|(path, spec)| (path, spec, false))
            .chain(aliases.iter().map(|(path, spec)| (path, spec, true)));

        for (path, spec, via_alias) in entries {
            let words: CommandPath = path.iter().map(|w| normalize(w, self.case_sensitive)).collect();
            self.check_first_word(&words)?;
            self.insert(&words, spec, via_alias)?;
            self.paths.push(words);
        }

        self.commands = commands.values().cloned().collect();
        Ok(())
    }

    /// No message prefix may be a prefix of another (`!` vs `!!`), and none
    /// may contain whitespace.
    fn check_prefix_conflicts(&self) -> Result<(), BuildError> {
        if let Some(prefix) = self.prefixes.iter().find(|p| p.chars().any(char::is_whitespace)) {
            return Err(BuildError::WhitespacePrefix { prefix: prefix.clone() });
        }
        for (i, shorter) in self.prefixes.iter().enumerate() {
            for (j, longer) in self.prefixes.iter().enumerate() {
                if i != j && longer.starts_with(shorter.as_str()) {
                    return Err(BuildError::PrefixConflict {
                        shorter: shorter.clone(),
                        longer: longer.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn check_first_word(&self, words: &[String]) -> Result<(), BuildError> {
        let Some(first) = words.first() else {
            return Ok(());
        };
        match self.prefixes.iter().find(|p| first.starts_with(p.as_str())) {
            Some(prefix) => Err(BuildError::PrefixedPathWord {
                path: words.join(" "),
                prefix: prefix.clone(),
            }),
            None => Ok(()),
        }
    }

    fn insert(&mut self, words: &[String], spec: &Arc<CommandSpec>, via_alias: bool) -> Result<(), BuildError> {
        let mut node = &mut self.root;
        for word in words {
            node = node.children.entry(word.clone()).or_default();
        }

        match &node.command {
            Some((existing, _)) if Arc::ptr_eq(existing, spec) => Ok(()),
            Some((existing, _)) => Err(BuildError::PathConflict {
                path: words.join(" "),
                existing: format!("{} ({})", existing.name(), existing.owning_plugin),
                incoming: format!("{} ({})", spec.name(), spec.owning_plugin),
            }),
            None => {
                node.command = Some((Arc::clone(spec), via_alias));
                Ok(())
            }
        }
    }

    fn reset_index(&mut self) {
        self.root = TrieNode::default();
        self.commands.clear();
        self.paths.clear();
    }

    /// Resolve a token stream to `(matched_prefix, match)`.
    ///
    /// The first token must be a word; the longest message prefix is
    /// stripped from it before the trie walk. Path words are only matched
    /// against plain words, never quoted strings or options.
    pub fn resolve_from_tokens(&self, tokens: &[Token]) -> (String, Option<MatchResult>) {
        if self.state != ResolverState::Built {
            return (String::new(), None);
        }

        let Some(first) = tokens.first().filter(|t| t.kind == TokenKind::Word) else {
            return (String::new(), None);
        };

        let (prefix_len, prefix) = match_prefix(&first.value, &self.prefixes, self.case_sensitive)
            .map(|(len, prefix)| (len, prefix.to_string()))
            .unwrap_or_default();
        let head = normalize(&first.value[prefix_len..], self.case_sensitive);
        if head.is_empty() {
            return (prefix, None);
        }

        let Some(mut node) = self.root.children.get(&head) else {
            return (prefix, None);
        };

        let mut best = node.command.as_ref().map(|entry| (entry, 1));
        for (depth, token) in tokens.iter().enumerate().skip(1) {
            if token.kind != TokenKind::Word {
                break;
            }
            let word = normalize(&token.value, self.case_sensitive);
            match node.children.get(&word) {
                Some(child) => node = child,
                None => break,
            }
            if let Some(entry) = &node.command {
                best = Some((entry, depth + 1));
            }
        }

        let matched = best.map(|((command, via_alias), path_len)| MatchResult {
            command: Arc::clone(command),
            path_len,
            via_alias: *via_alias,
        });

        if let Some(m) = &matched {
            debug!("Resolved '{}' (depth {}, prefix '{}')", m.command.name(), m.path_len, prefix);
        }

        (prefix, matched)
    }

    /// Canonical commands of the current index.
    pub fn commands(&self) -> &[Arc<CommandSpec>] {
        &self.commands
    }

    /// Every indexed path, canonical and alias, normalized.
    pub fn indexed_paths(&self) -> &[CommandPath] {
        &self.paths
    }

    /// Cheap rejection: can `first_word` possibly start a command?
    pub fn may_match(&self, first_word: &str) -> bool {
        let word = normalize(first_word, self.case_sensitive);
        self.paths
            .iter()
            .filter_map(|path| path.first())
            .any(|head| word.ends_with(head.as_str()))
    }

    pub fn clear(&mut self) {
        self.reset_index();
        self.state = ResolverState::Empty;
    }
}

impl std::fmt::Debug for CommandResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandResolver")
            .field("state", &self.state)
            .field("prefixes", &self.prefixes)
            .field("paths", &self.paths.len())
            .finish()
    }
}
