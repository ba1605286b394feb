//! Configuration script format: a versioned list of typed directives.

use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::facts::Platform;
use crate::log_level::{LogLevel, StyleOverrides};
use crate::mode::{AliasWraps, Dialect, PathOrder};

/// The only script format version this build understands.
pub const SCRIPT_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("failed to read script {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse script {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error(
        "unsupported script version {found} in {} (expected {expected})",
        path.display(),
        expected = SCRIPT_VERSION
    )]
    Version { path: PathBuf, found: u32 },

    #[error("invalid module name: {0:?}")]
    InvalidModuleName(String),

    #[error("cannot find module {name:?} (searched: {searched})")]
    ModuleNotFound { name: String, searched: String },

    #[error("include cycle: {0}")]
    IncludeCycle(String),

    #[error("unknown binding {0:?}")]
    UnknownBinding(String),

    #[error("lookup {bind:?} needs exactly one of `command` or `which`")]
    InvalidLookup { bind: String },

    #[error("cannot expand {input:?}: {reason}")]
    Expand { input: String, reason: String },

    #[error("command `{command}` failed: {reason}")]
    CommandFailed { command: String, reason: String },

    /// Raised by the `fail` directive.
    #[error("{0}")]
    Failed(String),
}

/// One parsed configuration script.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Script {
    pub version: u32,
    /// Cache namespace for `lookup` steps; defaults to the module name.
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Script {
    pub fn load(path: &Path) -> Result<Self, ScriptError> {
        let text = fs::read_to_string(path).map_err(|source| ScriptError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }

    /// Parse `text`; `origin` only labels errors.
    pub fn parse(text: &str, origin: &Path) -> Result<Self, ScriptError> {
        let script: Script = toml::from_str(text).map_err(|source| ScriptError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
        if script.version != SCRIPT_VERSION {
            return Err(ScriptError::Version {
                path: origin.to_path_buf(),
                found: script.version,
            });
        }
        Ok(script)
    }
}

/// A directive guarded by an optional condition.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "RawStep")]
pub struct Step {
    pub when: Option<Condition>,
    /// Steps run instead when `when` is false.
    pub otherwise: Vec<Step>,
    pub directive: Directive,
}

/// A step as written: the guard keys plus everything else, which must form
/// exactly one directive.
#[derive(Deserialize)]
struct RawStep {
    #[serde(default)]
    when: Option<Condition>,
    #[serde(default)]
    otherwise: Vec<Step>,
    #[serde(flatten)]
    rest: toml::Table,
}

impl TryFrom<RawStep> for Step {
    type Error = toml::de::Error;

    fn try_from(raw: RawStep) -> Result<Self, Self::Error> {
        let directive = toml::Value::Table(raw.rest).try_into()?;
        Ok(Step {
            when: raw.when,
            otherwise: raw.otherwise,
            directive,
        })
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case", deny_unknown_fields)]
pub enum Directive {
    Export {
        name: String,
        value: ValueSpec,
    },
    SetGlobal {
        name: String,
        value: ValueSpec,
    },
    SetLocal {
        name: String,
        value: ValueSpec,
        #[serde(default = "default_true")]
        export: bool,
    },
    Alias {
        name: String,
        value: ValueSpec,
        #[serde(default)]
        wraps: Option<String>,
        #[serde(default)]
        description: Option<String>,
    },
    ExtendPath {
        value: ValueSpec,
        #[serde(default)]
        var: Option<String>,
        #[serde(default)]
        order: PathOrder,
    },
    /// Make a directory searchable for later `include`s in this run.
    ExtendModulePath {
        value: ValueSpec,
        #[serde(default)]
        var: Option<String>,
    },
    Block {
        steps: Vec<Step>,
    },
    Group {
        steps: Vec<Step>,
    },
    Eval {
        text: String,
    },
    Source {
        path: String,
    },
    Exec {
        command: String,
        #[serde(default)]
        args: Vec<ValueSpec>,
    },
    RequireVarEquals {
        name: String,
        value: ValueSpec,
    },
    Log {
        level: LogLevel,
        message: String,
        #[serde(default)]
        style: Option<StyleOverrides>,
    },
    Lookup(LookupSpec),
    Include {
        module: String,
    },
    Fail {
        message: String,
    },
}

/// Right-hand side of an assignment as written in a script.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ValueSpec {
    Text(String),
    Integer(i64),
    List(Vec<ValueSpec>),
    Path { path: String },
    Var { var: String },
    Binding { binding: String },
}

/// Memoized external lookup whose result is bound to a name.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LookupSpec {
    pub bind: String,
    /// Cache key, defaults to `bind`.
    #[serde(default)]
    pub key: Option<String>,
    /// Program and arguments; stdout (trimmed) is the value.
    #[serde(default)]
    pub command: Option<Vec<String>>,
    /// Executable to locate on `$PATH`; empty when missing.
    #[serde(default)]
    pub which: Option<String>,
    #[serde(default)]
    pub rehash: RehashSpec,
    /// Seconds between validity checks.
    #[serde(default)]
    pub check_frequency: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RehashKind {
    Always,
    Never,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RehashSpec {
    Kind(RehashKind),
    Files { files: Vec<String> },
}

impl Default for RehashSpec {
    fn default() -> Self {
        RehashSpec::Kind(RehashKind::Always)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// Executable found on `$PATH`.
    Command(String),
    Platform(Platform),
    Desktop(bool),
    Shell(Dialect),
    Host(String),
    EnvSet(String),
    EnvEquals { name: String, value: String },
    Exists(String),
    IsDir(String),
    /// A `lookup` bound a non-empty value.
    Bound(String),
    Not(Box<Condition>),
    All(Vec<Condition>),
    Any(Vec<Condition>),
}

/// Interpret the `wraps` field of an alias.
pub fn parse_wraps(text: Option<&str>) -> AliasWraps {
    match text {
        None => AliasWraps::None,
        Some("updated") => AliasWraps::Updated,
        Some("original") => AliasWraps::Original,
        Some(command) => AliasWraps::Custom(command.to_string()),
    }
}
