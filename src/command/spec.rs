//! Command specifications.
//!
//! A [`CommandSpec`] is the explicit registration record for one command:
//! its path, aliases, accepted prefixes, parameter schema, filters, handler
//! and owning plugin.

use std::fmt;

use super::{Handler, Value};
use crate::filters::{Filter, HandlerMeta};

/// Prefixes a command accepts when none are given explicitly.
pub const DEFAULT_PREFIXES: &[&str] = &["/", "!"];

/// A command path: ordered, lower-cased words.
pub type CommandPath = Vec<String>;

/// Declared type of a parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamType {
    Str,
    Int,
    Float,
    /// `true/false/1/0/yes/no`, case-insensitive.
    Bool,
    /// One of a fixed set of words, case-insensitive.
    Choice(Vec<String>),
    /// A mention segment or an `@<id>` word.
    Mention,
    /// All remaining words joined by a single space.
    Rest,
    /// All remaining arguments, each coerced to the inner type.
    List(Box<ParamType>),
    /// One contiguous argument per named field.
    Record(Vec<(String, ParamType)>),
}

impl ParamType {
    /// Human-readable type name used in bind errors.
    pub fn label(&self) -> String {
        match self {
            Self::Str | Self::Rest => "text".to_string(),
            Self::Int => "an integer".to_string(),
            Self::Float => "a number".to_string(),
            Self::Bool => "true/false/yes/no/1/0".to_string(),
            Self::Choice(options) => format!("one of {}", options.join("|")),
            Self::Mention => "a mention".to_string(),
            Self::List(inner) => format!("a list of {}", inner.label()),
            Self::Record(fields) => {
                let names: Vec<&str> = fields.iter().map(|(name, _)| name.as_str()).collect();
                format!("fields {}", names.join(" "))
            }
        }
    }
}

/// A positional parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub ty: ParamType,
    pub required: bool,
    pub default: Option<Value>,
    pub description: String,
}

impl ParamSpec {
    pub fn required(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            ty,
            required: true,
            default: None,
            description: String::new(),
        }
    }

    pub fn optional(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            required: false,
            ..Self::required(name, ty)
        }
    }

    #[must_use]
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Whether an option is a bare switch or carries a value.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionKind {
    Flag,
    Value(ParamType),
}

/// A named option, addressed as `--name` or `-s`.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionSpec {
    pub name: String,
    pub short: Option<char>,
    pub kind: OptionKind,
    pub default: Option<Value>,
    pub description: String,
}

impl OptionSpec {
    pub fn flag(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            short: None,
            kind: OptionKind::Flag,
            default: None,
            description: String::new(),
        }
    }

    pub fn value(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            kind: OptionKind::Value(ty),
            ..Self::flag(name)
        }
    }

    #[must_use]
    pub fn short(mut self, short: char) -> Self {
        self.short = Some(short);
        self
    }

    #[must_use]
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn takes_value(&self) -> bool {
        matches!(self.kind, OptionKind::Value(_))
    }
}

/// Registration record for one command.
#[derive(Clone)]
pub struct CommandSpec {
    pub path_words: CommandPath,
    pub aliases: Vec<CommandPath>,
    pub prefixes: Vec<String>,
    pub params: Vec<ParamSpec>,
    pub options: Vec<OptionSpec>,
    pub filters: Vec<Filter>,
    pub handler: Handler,
    pub owning_plugin: String,
    pub description: String,
}

impl CommandSpec {
    /// Create a command from a whitespace-separated path such as `"user info"`.
    pub fn new(path: &str, handler: Handler) -> Self {
        Self {
            path_words: parse_path(path),
            aliases: Vec::new(),
            prefixes: DEFAULT_PREFIXES.iter().map(|p| p.to_string()).collect(),
            params: Vec::new(),
            options: Vec::new(),
            filters: Vec::new(),
            handler,
            owning_plugin: String::new(),
            description: String::new(),
        }
    }

    #[must_use]
    pub fn alias(mut self, path: &str) -> Self {
        let alias = parse_path(path);
        if !alias.is_empty() && alias != self.path_words && !self.aliases.contains(&alias) {
            self.aliases.push(alias);
        }
        self
    }

    /// Replace the accepted prefixes. `""` allows prefix-less invocation.
    #[must_use]
    pub fn prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prefixes.clear();
        for prefix in prefixes {
            let prefix = prefix.into();
            if !self.prefixes.contains(&prefix) {
                self.prefixes.push(prefix);
            }
        }
        self
    }

    #[must_use]
    pub fn param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    #[must_use]
    pub fn option(mut self, option: OptionSpec) -> Self {
        self.options.push(option);
        self
    }

    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    #[must_use]
    pub fn owned_by(mut self, plugin: impl Into<String>) -> Self {
        self.owning_plugin = plugin.into();
        self
    }

    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Display name: path words joined by spaces.
    pub fn name(&self) -> String {
        self.path_words.join(" ")
    }

    pub fn meta(&self) -> HandlerMeta {
        HandlerMeta::new(self.name(), self.owning_plugin.clone())
    }

    /// Whether a resolved message prefix is valid for this command.
    pub fn accepts_prefix(&self, prefix: &str, case_sensitive: bool) -> bool {
        self.prefixes.iter().any(|p| {
            if case_sensitive {
                p == prefix
            } else {
                p.to_lowercase() == prefix.to_lowercase()
            }
        })
    }

    pub fn find_option(&self, name: &str) -> Option<&OptionSpec> {
        self.options.iter().find(|o| o.name == name)
    }

    pub fn find_short_option(&self, short: char) -> Option<&OptionSpec> {
        self.options.iter().find(|o| o.short == Some(short))
    }

    /// One-line usage string, e.g. `user list [page] [--verbose]`.
    pub fn usage(&self) -> String {
        let mut usage = self.name();
        for param in &self.params {
            if param.required && param.default.is_none() {
                usage.push_str(&format!(" <{}>", param.name));
            } else {
                usage.push_str(&format!(" [{}]", param.name));
            }
        }
        for option in &self.options {
            match option.kind {
                OptionKind::Flag => usage.push_str(&format!(" [--{}]", option.name)),
                OptionKind::Value(_) => usage.push_str(&format!(" [--{} <value>]", option.name)),
            }
        }
        usage
    }
}

impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSpec")
            .field("path_words", &self.path_words)
            .field("aliases", &self.aliases)
            .field("prefixes", &self.prefixes)
            .field("params", &self.params.len())
            .field("options", &self.options.len())
            .field("filters", &self.filters.len())
            .field("owning_plugin", &self.owning_plugin)
            .finish()
    }
}

/// Split and lower-case a path into its canonical words.
pub fn parse_path(path: &str) -> CommandPath {
    path.split_whitespace().map(str::to_lowercase).collect()
}
