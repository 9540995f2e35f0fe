//! Error types for registration, index building and argument binding.

/// Errors raised when adding commands to the registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The command was registered without any path words.
    #[error("command path must contain at least one word")]
    EmptyPath,

    /// Another plugin already owns this path.
    #[error("path `{path}` is already registered by plugin `{existing}` (requested by `{requested}`)")]
    DuplicatePath {
        path: String,
        existing: String,
        requested: String,
    },
}

/// Fatal configuration errors found while building the resolver index.
///
/// Dispatch of commands is refused until the registry is fixed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    /// Two message prefixes where one contains the other (e.g. `!` and `!!`).
    #[error("prefix conflict: `{shorter}` is a prefix of `{longer}`")]
    PrefixConflict { shorter: String, longer: String },

    /// A message prefix containing whitespace. Prefixes are matched
    /// against the first word of a message, so it could never match.
    #[error("prefix `{prefix}` contains whitespace")]
    WhitespacePrefix { prefix: String },

    /// Two distinct commands occupy the same normalized path.
    #[error("path conflict at `{path}`: `{existing}` vs `{incoming}`")]
    PathConflict {
        path: String,
        existing: String,
        incoming: String,
    },

    /// A first path word starts with an active message prefix, so its
    /// tokenization would be ambiguous.
    #[error("path `{path}` starts with message prefix `{prefix}`")]
    PrefixedPathWord { path: String, prefix: String },
}

/// Per-invocation argument binding failures.
///
/// The display text is meant to be shown to the user as-is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindError {
    #[error("missing required argument `{name}`")]
    MissingArgument { name: String },

    #[error("argument `{name}` expects {expected}, got `{found}`")]
    TypeMismatch {
        name: String,
        expected: String,
        found: String,
    },

    #[error("unknown option `{option}`")]
    UnknownOption { option: String },

    #[error("option `{option}` requires a value")]
    MissingOptionValue { option: String },

    #[error("too many arguments: unexpected `{found}`")]
    TooManyArguments { found: String },
}

/// Errors raised while loading a plugin.
///
/// A plugin failing with either variant is rolled back completely.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PluginError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Build(#[from] BuildError),
}
