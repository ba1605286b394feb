//! Backend emitters: one [`Mode`] per target shell dialect.
//!
//! A mode turns capability calls (`export`, `alias`, `extend_path`, `block`,
//! ...) into dialect-specific source text, appending to an ordered buffer.
//! Statements come out in exactly the order the calls were made.

mod fish;
mod output;
pub mod quote;
mod xonsh;
mod zsh;

use serde::Deserialize;
use std::fmt;
use std::path::Path;

use crate::log_level::{LogLevel, LogSettings, StyleOverrides};
use crate::value::{path_text, validate_alias_name, validate_identifier, Value, ValueError};

pub use fish::FishMode;
pub use output::{BlockFrame, EmitState, Output};
pub use xonsh::XonshMode;
pub use zsh::ZshMode;

/// Message used by `require_var_equals` diagnostics.
pub(crate) fn unexpected_value_message(name: &str) -> String {
    format!("Unexpected value for {name}: `")
}

/// Target shell dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// POSIX-style shell (zsh)
    Zsh,
    /// Interactive shell with array-centric variables (fish)
    Fish,
    /// Python-hosted shell (xonsh)
    Xonsh,
}

impl Dialect {
    pub fn as_str(self) -> &'static str {
        match self {
            Dialect::Zsh => "zsh",
            Dialect::Fish => "fish",
            Dialect::Xonsh => "xonsh",
        }
    }

    pub fn all() -> [Dialect; 3] {
        [Dialect::Zsh, Dialect::Fish, Dialect::Xonsh]
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a PATH-like entry is inserted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathOrder {
    /// Before every existing entry.
    Prepend,
    /// After the user's own entries (fish keeps these apart from the
    /// inherited system list).
    #[default]
    #[serde(alias = "append")]
    AppendUser,
    /// After every existing entry, system ones included.
    AppendSystem,
}

impl PathOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            PathOrder::Prepend => "prepend",
            PathOrder::AppendUser => "append_user",
            PathOrder::AppendSystem => "append_system",
        }
    }
}

/// Declaration scope of an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Process wide, inherited by children when exported.
    Export,
    /// Lives until the enclosing block closes.
    Local,
    /// Rebinds a command name.
    Alias,
}

/// Which real command an alias stands in for, for completion purposes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AliasWraps {
    #[default]
    None,
    /// The command the alias expands to.
    Updated,
    /// The command the alias shadows (its own name).
    Original,
    Custom(String),
}

/// Fatal precondition failures raised by emitters.
#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    #[error("local assignment to {name} outside of a block")]
    LocalOutsideBlock { name: String },

    #[error("{dialect} cannot represent an empty list")]
    EmptyList { dialect: Dialect },

    #[error("{dialect} cannot represent nested lists")]
    NestedList { dialect: Dialect },

    #[error("{dialect} does not support {what}")]
    Unsupported { dialect: Dialect, what: &'static str },

    #[error("extend_path expects a path or text value, got {0:?}")]
    InvalidPathValue(Value),

    #[error("emitter is finalized; no further statements allowed")]
    Finalized,

    #[error("no block is open")]
    NoOpenBlock,

    #[error("{0} block(s) still open at the end of the run")]
    UnclosedBlocks(usize),

    #[error(transparent)]
    Value(#[from] ValueError),
}

/// Capability set implemented once per dialect.
///
/// Required methods render one capability; provided methods hold the
/// validation shared by every dialect.
pub trait Mode {
    fn dialect(&self) -> Dialect;
    fn output(&self) -> &Output;
    fn output_mut(&mut self) -> &mut Output;
    fn settings(&self) -> &LogSettings;

    /// Render a value as dialect source text.
    fn quote(&self, value: &Value) -> Result<String, CapabilityError>;

    /// Helper definitions emitted before the script's own statements.
    fn prologue(&self) -> Vec<String> {
        Vec::new()
    }

    /// Teardown emitted once the script completes.
    fn epilogue(&self) -> Vec<String> {
        Vec::new()
    }

    fn assign_impl(
        &mut self,
        name: &str,
        value: &Value,
        scope: Scope,
        export: bool,
    ) -> Result<(), CapabilityError>;

    fn alias_impl(
        &mut self,
        name: &str,
        value: &Value,
        wraps: &AliasWraps,
        description: Option<&str>,
    ) -> Result<(), CapabilityError>;

    fn extend_path_impl(
        &mut self,
        dir: &str,
        var: &str,
        order: PathOrder,
    ) -> Result<(), CapabilityError>;

    fn begin_block(&mut self) -> Result<(), CapabilityError>;
    fn end_block(&mut self) -> Result<(), CapabilityError>;

    fn eval_text(&mut self, text: &str) -> Result<(), CapabilityError>;
    fn source_file(&mut self, path: &Path) -> Result<(), CapabilityError>;

    fn require_var_equals_impl(&mut self, name: &str, value: &Value)
        -> Result<(), CapabilityError>;

    /// Emit a statement printing `text` verbatim to stderr.
    fn print_message(&mut self, text: &str) -> Result<(), CapabilityError>;

    fn start(&mut self) -> Result<(), CapabilityError> {
        for line in self.prologue() {
            self.output_mut().write(line)?;
        }
        Ok(())
    }

    fn assign(
        &mut self,
        name: &str,
        value: &Value,
        scope: Scope,
        export: bool,
    ) -> Result<(), CapabilityError> {
        if scope == Scope::Alias {
            return self.alias(name, value, &AliasWraps::None, None);
        }
        validate_identifier(name)?;
        if scope == Scope::Local && !self.output().in_block() {
            return Err(CapabilityError::LocalOutsideBlock {
                name: name.to_string(),
            });
        }
        self.assign_impl(name, value, scope, export)
    }

    fn export(&mut self, name: &str, value: &Value) -> Result<(), CapabilityError> {
        self.assign(name, value, Scope::Export, true)
    }

    fn set_local(&mut self, name: &str, value: &Value, export: bool) -> Result<(), CapabilityError> {
        self.assign(name, value, Scope::Local, export)
    }

    fn alias(
        &mut self,
        name: &str,
        value: &Value,
        wraps: &AliasWraps,
        description: Option<&str>,
    ) -> Result<(), CapabilityError> {
        validate_alias_name(name)?;
        self.alias_impl(name, value, wraps, description)
    }

    /// Add a directory to a PATH-like variable (`PATH` by default).
    ///
    /// A leading `~` is expanded at translation time.
    fn extend_path(
        &mut self,
        value: &Value,
        var: Option<&str>,
        order: PathOrder,
    ) -> Result<(), CapabilityError> {
        let raw = match value {
            Value::Path(path) => path_text(path),
            Value::Text(text) => text.clone(),
            other => return Err(CapabilityError::InvalidPathValue(other.clone())),
        };
        let dir = shellexpand::tilde(&raw).into_owned();
        let var = var.unwrap_or("PATH");
        validate_identifier(var)?;
        if !var.contains("PATH") {
            tracing::warn!("Unexpected variable name for extend_path: {var:?}");
        }
        self.extend_path_impl(&dir, var, order)
    }

    fn require_var_equals(&mut self, name: &str, value: &Value) -> Result<(), CapabilityError> {
        validate_identifier(name)?;
        if value.is_list() {
            return Err(CapabilityError::Unsupported {
                dialect: self.dialect(),
                what: "comparing a variable against a list",
            });
        }
        self.require_var_equals_impl(name, value)
    }

    /// Run `command` with quoted arguments.
    fn exec_cmd(&mut self, command: &str, args: &[Value]) -> Result<(), CapabilityError> {
        let mut parts = vec![command.to_string()];
        for arg in args {
            parts.push(self.quote(arg)?);
        }
        self.output_mut().write(parts.join(" "))
    }

    /// Print a leveled diagnostic when the run's verbosity allows it.
    fn log(
        &mut self,
        level: LogLevel,
        message: &str,
        overrides: Option<&StyleOverrides>,
    ) -> Result<(), CapabilityError> {
        let settings = *self.settings();
        if !settings.enabled(level) {
            return Ok(());
        }
        let text = settings.format_message(level, message, overrides);
        self.print_message(&text)
    }

    /// Append the epilogue and return the finished statement list.
    fn finish(&mut self) -> Result<Vec<String>, CapabilityError> {
        let epilogue = self.epilogue();
        self.output_mut().finalize(&epilogue)
    }
}

impl<'m> dyn Mode + 'm {
    /// Emit `body` inside a lexical block.
    ///
    /// The closing statement is written even when `body` fails.
    pub fn block<T, E, F>(&mut self, body: F) -> Result<T, E>
    where
        F: FnOnce(&mut (dyn Mode + 'm)) -> Result<T, E>,
        E: From<CapabilityError>,
    {
        self.begin_block()?;
        let result = body(self);
        let closed = self.end_block();
        let value = result?;
        closed?;
        Ok(value)
    }
}

/// Construct the emitter for `dialect`.
pub fn create(dialect: Dialect, settings: LogSettings) -> Box<dyn Mode> {
    match dialect {
        Dialect::Zsh => Box::new(ZshMode::new(settings)),
        Dialect::Fish => Box::new(FishMode::new(settings)),
        Dialect::Xonsh => Box::new(XonshMode::new(settings)),
    }
}
