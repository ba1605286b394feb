use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

static IDENTIFIER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier pattern"));

/// Errors raised while constructing or resolving a [`Value`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    /// A variable reference contains whitespace, a quote or `$`.
    #[error("forbidden characters in variable name {name:?} ({forbidden:?})")]
    ForbiddenChars { name: String, forbidden: Vec<char> },

    /// Empty names are never valid.
    #[error("variable name must not be empty")]
    EmptyName,

    /// Assignment targets must be plain shell identifiers.
    #[error("not a valid shell identifier: {0:?}")]
    InvalidIdentifier(String),

    /// Alias names are command words.
    #[error("not a valid alias name: {0:?}")]
    InvalidAliasName(String),

    /// A variable reference was used where the text must be known up front.
    #[error("cannot resolve a variable reference statically: ${0}")]
    NotStatic(String),
}

/// Name of a shell variable referenced from a value.
///
/// Whitespace, quote characters and `$` are rejected at construction so a
/// reference can be spliced into any dialect without quoting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarName(String);

impl VarName {
    pub fn new(name: impl Into<String>) -> Result<Self, ValueError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ValueError::EmptyName);
        }

        let mut forbidden: Vec<char> = name
            .chars()
            .filter(|c| c.is_whitespace() || matches!(c, '\'' | '"' | '$'))
            .collect();
        if !forbidden.is_empty() {
            forbidden.dedup();
            return Err(ValueError::ForbiddenChars { name, forbidden });
        }

        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VarName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.0)
    }
}

/// A value that can appear on the right-hand side of an emitted statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Path(PathBuf),
    Text(String),
    Integer(i64),
    Var(VarName),
    List(Vec<Value>),
}

impl Value {
    pub fn text(value: impl Into<String>) -> Self {
        Value::Text(value.into())
    }

    pub fn path(value: impl Into<PathBuf>) -> Self {
        Value::Path(value.into())
    }

    pub fn var(name: impl Into<String>) -> Result<Self, ValueError> {
        VarName::new(name).map(Value::Var)
    }

    /// The string a dialect's evaluator should produce for this value.
    ///
    /// Variable references render as `$NAME`; lists are space separated.
    pub fn textual_form(&self) -> String {
        match self {
            Value::Path(path) => path_text(path),
            Value::Text(text) => text.clone(),
            Value::Integer(value) => value.to_string(),
            Value::Var(name) => name.to_string(),
            Value::List(items) => items
                .iter()
                .map(Value::textual_form)
                .collect::<Vec<_>>()
                .join(" "),
        }
    }

    /// Resolve the value to text without consulting the shell.
    pub fn static_text(&self) -> Result<String, ValueError> {
        match self {
            Value::Var(name) => Err(ValueError::NotStatic(name.as_str().to_string())),
            Value::List(items) => Ok(items
                .iter()
                .map(Value::static_text)
                .collect::<Result<Vec<_>, _>>()?
                .join(" ")),
            other => Ok(other.textual_form()),
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Value::List(_))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<PathBuf> for Value {
    fn from(value: PathBuf) -> Self {
        Value::Path(value)
    }
}

impl From<&Path> for Value {
    fn from(value: &Path) -> Self {
        Value::Path(value.to_path_buf())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<VarName> for Value {
    fn from(value: VarName) -> Self {
        Value::Var(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

pub(crate) fn path_text(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Check that `name` can be used as an assignment target in every dialect.
pub fn validate_identifier(name: &str) -> Result<(), ValueError> {
    if IDENTIFIER_PATTERN.is_match(name) {
        Ok(())
    } else {
        Err(ValueError::InvalidIdentifier(name.to_string()))
    }
}

/// Check that `name` is usable as a command word for an alias.
pub fn validate_alias_name(name: &str) -> Result<(), ValueError> {
    let valid = !name.is_empty()
        && !name.starts_with('-')
        && name
            .chars()
            .all(|c| !c.is_whitespace() && !c.is_control() && !"'\"$=/\\;&|()<>`".contains(c));
    if valid {
        Ok(())
    } else {
        Err(ValueError::InvalidAliasName(name.to_string()))
    }
}
