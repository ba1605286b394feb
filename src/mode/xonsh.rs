use std::path::Path;

use super::quote::python_literal;
use super::{
    unexpected_value_message, AliasWraps, CapabilityError, Dialect, Mode, Output, PathOrder, Scope,
};
use crate::log_level::{LogLevel, LogSettings};
use crate::value::{path_text, Value};

const EXTEND_PATH_HELPER: &str = "_translate_shell_extend_path";
const STDERR: &str = "file=__import__('sys').stderr";

/// Emitter for xonsh.
///
/// Python has no block scope, so each block becomes a uniquely named
/// function that is defined, called and deleted again.
#[derive(Debug)]
pub struct XonshMode {
    out: Output,
    settings: LogSettings,
}

impl XonshMode {
    pub fn new(settings: LogSettings) -> Self {
        Self {
            out: Output::new(),
            settings,
        }
    }

    fn block_name(id: usize) -> String {
        format!("_block_{id}")
    }
}

impl Mode for XonshMode {
    fn dialect(&self) -> Dialect {
        Dialect::Xonsh
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
            Value::Text(text) => python_literal(text),
            Value::Path(path) => python_literal(&path_text(path)),
            Value::List(items) => {
                let items = items
                    .iter()
                    .map(|item| self.quote(item))
                    .collect::<Result<Vec<_>, _>>()?;
                format!("[{}]", items.join(", "))
            }
        })
    }

    fn prologue(&self) -> Vec<String> {
        [
            "def _translate_shell_extend_path(value, var, order):",
            "    import os",
            "    if not os.path.isdir(value):",
            "        return",
            "    current = [str(entry) for entry in ${...}.get(var, [])]",
            "    if order == 'prepend':",
            "        ${...}[var] = [value] + [entry for entry in current if entry != value]",
            "    elif value not in current:",
            "        ${...}[var] = current + [value]",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }

    fn epilogue(&self) -> Vec<String> {
        vec![format!("del {EXTEND_PATH_HELPER}")]
    }

    fn assign_impl(
        &mut self,
        name: &str,
        value: &Value,
        scope: Scope,
        export: bool,
    ) -> Result<(), CapabilityError> {
        let quoted = self.quote(value)?;
        match (scope, export) {
            (_, true) => {
                if scope == Scope::Local {
                    self.out.record_exported_local(name)?;
                }
                self.out.write(format!("${name} = {quoted}"))
            }
            (Scope::Local, false) => self.out.write(format!("{name} = {quoted}")),
            (_, false) => {
                if self.out.in_block() {
                    self.out.write(format!("global {name}"))?;
                }
                self.out.write(format!("{name} = {quoted}"))
            }
        }
    }

    fn alias_impl(
        &mut self,
        name: &str,
        value: &Value,
        _wraps: &AliasWraps,
        _description: Option<&str>,
    ) -> Result<(), CapabilityError> {
        self.out.write(format!(
            "aliases[{}] = {}",
            python_literal(name),
            python_literal(&value.textual_form())
        ))
    }

    fn extend_path_impl(
        &mut self,
        dir: &str,
        var: &str,
        order: PathOrder,
    ) -> Result<(), CapabilityError> {
        self.out.write(format!(
            "{EXTEND_PATH_HELPER}({}, {}, {})",
            python_literal(dir),
            python_literal(var),
            python_literal(order.as_str())
        ))
    }

    fn begin_block(&mut self) -> Result<(), CapabilityError> {
        let name = Self::block_name(self.out.next_block_id());
        self.out.write(format!("def {name}():"))?;
        self.out.open_block()?;
        self.out.indent();
        Ok(())
    }

    fn end_block(&mut self) -> Result<(), CapabilityError> {
        if self.out.current_block().is_some_and(|frame| frame.statements == 0) {
            self.out.write("pass")?;
        }
        let frame = self.out.close_block()?;
        self.out.dedent();
        let name = Self::block_name(frame.id);
        self.out.write(format!("{name}()"))?;
        for local in &frame.exported_locals {
            self.out.write(format!("del ${local}"))?;
        }
        self.out.write(format!("del {name}"))
    }

    fn eval_text(&mut self, text: &str) -> Result<(), CapabilityError> {
        self.out.write(format!("execx({})", python_literal(text)))
    }

    fn source_file(&mut self, path: &Path) -> Result<(), CapabilityError> {
        self.out
            .write(format!("source {}", python_literal(&path_text(path))))
    }

    fn require_var_equals_impl(
        &mut self,
        name: &str,
        value: &Value,
    ) -> Result<(), CapabilityError> {
        // env values may be typed (ints, bools), so compare text forms
        let expected = match value {
            Value::Var(_) => format!("str({})", self.quote(value)?),
            other => python_literal(&other.textual_form()),
        };
        let current = format!("${{...}}.get({})", python_literal(name));
        let head =
            self.settings
                .format_message(LogLevel::Warning, &unexpected_value_message(name), None);
        self.out
            .write(format!("if str({current}) != {expected}:"))?;
        self.out.indent();
        self.out.write(format!(
            "print({} + str({current}) + '`', {STDERR})",
            python_literal(&head)
        ))?;
        self.out.dedent();
        Ok(())
    }

    fn print_message(&mut self, text: &str) -> Result<(), CapabilityError> {
        self.out
            .write(format!("print({}, {STDERR})", python_literal(text)))
    }
}
