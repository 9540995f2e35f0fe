//! Command system.
//!
//! ## Components
//!
//! - `lexer` - Tokenizes message text into words, quoted strings and options
//! - `spec` - Command registration records and parameter schemas
//! - `handler` - Sync/async handler functions and their invocation
//! - `registry` - Path-keyed command registry with per-plugin revocation
//! - `value` - Coerced argument values

mod handler;
pub mod lexer;
mod registry;
mod spec;
mod value;

pub use handler::{AsyncHandlerFn, Handler, Invocation, PluginContext, SyncHandlerFn};
pub use lexer::{Token, TokenKind, tokenize};
pub use registry::{CommandRegistry, RegistrySnapshot};
pub use spec::{
    CommandPath, CommandSpec, DEFAULT_PREFIXES, OptionKind, OptionSpec, ParamSpec, ParamType, parse_path,
};
pub use value::Value;
