// Public API
pub mod cli;
pub mod commands;
pub mod ui;

// Core domain types
pub mod cache;
pub mod facts;
pub mod log_level;
pub mod mode;
pub mod runner;
pub mod script;
pub mod util;
pub mod value;

// Re-export main types
pub use cache::{Cache, CacheError, CacheRegistry, CachedValue, RehashCondition, StoreLocation};
pub use facts::{Facts, Platform};
pub use log_level::{LogLevel, LogSettings};
pub use mode::{create, AliasWraps, CapabilityError, Dialect, Mode, PathOrder, Scope};
pub use runner::{ModeState, Translator};
pub use script::{Script, ScriptError};
pub use value::{Value, ValueError, VarName};
