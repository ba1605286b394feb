use std::path::Path;

use super::quote::quote_word;
use super::{
    unexpected_value_message, AliasWraps, CapabilityError, Dialect, Mode, Output, PathOrder, Scope,
};
use crate::log_level::{LogLevel, LogSettings};
use crate::value::{path_text, Value};

/// Characters that keep their meaning inside zsh double quotes.
const BAD_CHARS: &[char] = &['"', '\\', '$', '`'];

const PRINT_HELPER: &str = "__translate_shell_print";

/// Emitter for zsh.
#[derive(Debug)]
pub struct ZshMode {
    out: Output,
    settings: LogSettings,
}

impl ZshMode {
    pub fn new(settings: LogSettings) -> Self {
        Self {
            out: Output::new(),
            settings,
        }
    }

    fn quote_text(text: &str) -> String {
        quote_word(text, '"', BAD_CHARS)
    }

    /// Body of a double-quoted string without the surrounding quotes.
    fn escape_body(text: &str) -> String {
        let mut res = String::with_capacity(text.len());
        for c in text.chars() {
            if BAD_CHARS.contains(&c) {
                res.push('\\');
            }
            res.push(c);
        }
        res
    }
}

impl Mode for ZshMode {
    fn dialect(&self) -> Dialect {
        Dialect::Zsh
    }

    fn output(&self) -> &Output {
        &self.out
    }

    fn output_mut(&mut self) -> &mut Output {
        &mut self.out
    }

    fn settings(&self) -> &LogSettings {
        &self.settings
    }

    fn quote(&self, value: &Value) -> Result<String, CapabilityError> {
        Ok(match value {
            Value::Integer(number) => number.to_string(),
            Value::Var(name) => name.to_string(),
            Value::Text(text) => Self::quote_text(text),
            Value::Path(path) => Self::quote_text(&path_text(path)),
            Value::List(items) => {
                let mut parts = Vec::with_capacity(items.len());
                for item in items {
                    if item.is_list() {
                        return Err(CapabilityError::NestedList {
                            dialect: Dialect::Zsh,
                        });
                    }
                    parts.push(self.quote(item)?);
                }
                format!("({})", parts.join(" "))
            }
        })
    }

    fn prologue(&self) -> Vec<String> {
        vec![format!("{PRINT_HELPER}() {{ print -r -- \"$*\" >&2; }}")]
    }

    fn epilogue(&self) -> Vec<String> {
        vec![format!("unfunction {PRINT_HELPER}")]
    }

    fn assign_impl(
        &mut self,
        name: &str,
        value: &Value,
        scope: Scope,
        export: bool,
    ) -> Result<(), CapabilityError> {
        if export && value.is_list() {
            return Err(CapabilityError::Unsupported {
                dialect: Dialect::Zsh,
                what: "exporting an array",
            });
        }
        let quoted = self.quote(value)?;
        let line = match (scope, export) {
            (Scope::Local, true) => format!("local -x {name}={quoted}"),
            (Scope::Local, false) => format!("local {name}={quoted}"),
            (_, true) => format!("export {name}={quoted}"),
            (_, false) => format!("typeset -g {name}={quoted}"),
        };
        self.out.write(line)
    }

    fn alias_impl(
        &mut self,
        name: &str,
        value: &Value,
        _wraps: &AliasWraps,
        _description: Option<&str>,
    ) -> Result<(), CapabilityError> {
        let command = Self::quote_text(&value.textual_form());
        self.out.write(format!("alias {name}={command}"))
    }

    fn extend_path_impl(
        &mut self,
        dir: &str,
        var: &str,
        order: PathOrder,
    ) -> Result<(), CapabilityError> {
        let dir = Self::quote_text(dir);
        match order {
            PathOrder::Prepend => {
                self.out.write(format!("if [[ -d {dir} ]]; then"))?;
                self.out.indent();
                self.out.write("() {")?;
                self.out.indent();
                self.out
                    .write(format!("local -a entries=(${{(s.:.){var}}})"))?;
                self.out
                    .write(format!("entries=({dir} ${{entries:#{dir}}})"))?;
                self.out.write(format!("export {var}=${{(j.:.)entries}}"))?;
                self.out.dedent();
                self.out.write("}")?;
            }
            PathOrder::AppendUser | PathOrder::AppendSystem => {
                self.out.write(format!(
                    "if [[ -d {dir} && \":${{{var}}}:\" != *:{dir}:* ]]; then"
                ))?;
                self.out.indent();
                self.out
                    .write(format!("export {var}=\"${{{var}:+${{{var}}}:}}\"{dir}"))?;
            }
        }
        self.out.dedent();
        self.out.write("fi")
    }

    fn begin_block(&mut self) -> Result<(), CapabilityError> {
        self.out.write("() {")?;
        self.out.open_block()?;
        self.out.indent();
        Ok(())
    }

    fn end_block(&mut self) -> Result<(), CapabilityError> {
        // an empty function body is a syntax error
        if self.out.current_block().is_some_and(|frame| frame.statements == 0) {
            self.out.write(":")?;
        }
        self.out.close_block()?;
        self.out.dedent();
        self.out.write("}")
    }

    fn eval_text(&mut self, text: &str) -> Result<(), CapabilityError> {
        self.out.write(format!("eval {}", Self::quote_text(text)))
    }

    fn source_file(&mut self, path: &Path) -> Result<(), CapabilityError> {
        self.out
            .write(format!("source {}", Self::quote_text(&path_text(path))))
    }

    fn require_var_equals_impl(
        &mut self,
        name: &str,
        value: &Value,
    ) -> Result<(), CapabilityError> {
        let expected = self.quote(value)?;
        let head =
            self.settings
                .format_message(LogLevel::Warning, &unexpected_value_message(name), None);
        self.out
            .write(format!("if test \"${{{name}}}\" != {expected}; then"))?;
        self.out.indent();
        self.out.write(format!(
            "{PRINT_HELPER} \"{}${{{name}}}{}\"",
            Self::escape_body(&head),
            Self::escape_body("`")
        ))?;
        self.out.dedent();
        self.out.write("fi")
    }

    fn print_message(&mut self, text: &str) -> Result<(), CapabilityError> {
        self.out
            .write(format!("{PRINT_HELPER} {}", Self::quote_text(text)))
    }
}
