use std::path::Path;

use super::quote::quote_word;
use super::{
    unexpected_value_message, AliasWraps, CapabilityError, Dialect, Mode, Output, PathOrder, Scope,
};
use crate::log_level::{LogLevel, LogSettings};
use crate::value::{path_text, Value};

const BAD_CHARS: &[char] = &['\'', '\\'];

/// Characters escaped inside fish double quotes.
const DOUBLE_QUOTE_BAD_CHARS: &[char] = &['"', '\\', '$'];

const PRINT_HELPER: &str = "__translate_shell_print";

/// Inferred alias descriptions must stay shorter than this.
const DESCRIPTION_LIMIT: usize = 40;

/// Emitter for fish.
#[derive(Debug)]
pub struct FishMode {
    out: Output,
    settings: LogSettings,
}

impl FishMode {
    pub fn new(settings: LogSettings) -> Self {
        Self {
            out: Output::new(),
            settings,
        }
    }

    fn quote_text(text: &str) -> String {
        quote_word(text, '\'', BAD_CHARS)
    }

    fn write_set(&mut self, flags: &str, name: &str, value: &str) -> Result<(), CapabilityError> {
        self.out.write(format!("set {flags} {name} {value}"))
    }
}

fn escape_double_quoted(text: &str) -> String {
    let mut res = String::with_capacity(text.len());
    for c in text.chars() {
        if DOUBLE_QUOTE_BAD_CHARS.contains(&c) {
            res.push('\\');
        }
        res.push(c);
    }
    res
}

/// Command passed to `--wraps`, if any.
fn wrapped_command(
    name: &str,
    value: &Value,
    wraps: &AliasWraps,
) -> Result<Option<String>, CapabilityError> {
    Ok(match wraps {
        AliasWraps::None => None,
        AliasWraps::Updated => Some(value.static_text()?),
        AliasWraps::Original => Some(name.to_string()),
        AliasWraps::Custom(command) => Some(command.clone()),
    })
}

fn acceptable_description(candidate: &str) -> bool {
    candidate.chars().count() < DESCRIPTION_LIMIT
        && !candidate.contains('\n')
        && !candidate.contains("&&")
}

/// Pick a short human-readable description for an alias.
pub(crate) fn infer_description(name: &str, value: &Value, wrapped: Option<&str>) -> String {
    wrapped
        .map(|command| format!("alias {name} wraps {command}"))
        .into_iter()
        .chain([format!("alias {name}={}", value.textual_form())])
        .find(|candidate| acceptable_description(candidate))
        .unwrap_or_else(|| format!("alias for {name} (very complex definition)"))
}

impl Mode for FishMode {
    fn dialect(&self) -> Dialect {
        Dialect::Fish
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
            // every fish variable is a list, so nesting just flattens
            Value::List(items) => {
                if items.is_empty() {
                    return Err(CapabilityError::EmptyList {
                        dialect: Dialect::Fish,
                    });
                }
                items
                    .iter()
                    .map(|item| self.quote(item))
                    .collect::<Result<Vec<_>, _>>()?
                    .join(" ")
            }
        })
    }

    fn prologue(&self) -> Vec<String> {
        vec![
            format!("function {PRINT_HELPER}"),
            "    printf '%s\\n' $argv >&2".to_string(),
            "end".to_string(),
        ]
    }

    fn epilogue(&self) -> Vec<String> {
        vec![format!("functions --erase {PRINT_HELPER}")]
    }

    fn assign_impl(
        &mut self,
        name: &str,
        value: &Value,
        scope: Scope,
        export: bool,
    ) -> Result<(), CapabilityError> {
        let quoted = self.quote(value)?;
        let flags = match (scope, export) {
            (Scope::Local, true) => "--local --export",
            (Scope::Local, false) => "--local",
            (_, true) => "--global --export",
            (_, false) => "--global",
        };
        self.write_set(flags, name, &quoted)
    }

    fn alias_impl(
        &mut self,
        name: &str,
        value: &Value,
        wraps: &AliasWraps,
        description: Option<&str>,
    ) -> Result<(), CapabilityError> {
        let wrapped = wrapped_command(name, value, wraps)?;
        let description = match description {
            Some(text) => text.to_string(),
            None => infer_description(name, value, wrapped.as_deref()),
        };

        self.out.write(format!("function {name} \\"))?;
        self.out.indent();
        match &wrapped {
            Some(command) => {
                self.out.write(format!(
                    "--description {} \\",
                    Self::quote_text(&description)
                ))?;
                self.out
                    .write(format!("--wraps {}", Self::quote_text(command)))?;
            }
            None => {
                self.out
                    .write(format!("--description {}", Self::quote_text(&description)))?;
            }
        }
        self.out.write(format!("{} $argv", value.textual_form()))?;
        self.out.dedent();
        self.out.write("end")
    }

    fn extend_path_impl(
        &mut self,
        dir: &str,
        var: &str,
        order: PathOrder,
    ) -> Result<(), CapabilityError> {
        let dir = Self::quote_text(dir);
        if var == "PATH" {
            let flags = match order {
                PathOrder::Prepend => "--global --path --move --prepend",
                PathOrder::AppendUser => "--global --append",
                PathOrder::AppendSystem => "--global --path --append",
            };
            return self.out.write(format!("fish_add_path {flags} {dir}"));
        }

        match order {
            PathOrder::Prepend => {
                self.out.write(format!("if test -d {dir}"))?;
                self.out.indent();
                self.write_set(
                    "--global --export",
                    var,
                    &format!("{dir} (string match --invert -- {dir} ${var})"),
                )?;
            }
            PathOrder::AppendUser | PathOrder::AppendSystem => {
                self.out.write(format!(
                    "if test -d {dir}; and not contains -- {dir} ${var}"
                ))?;
                self.out.indent();
                self.write_set("--global --export --append", var, &dir)?;
            }
        }
        self.out.dedent();
        self.out.write("end")
    }

    fn begin_block(&mut self) -> Result<(), CapabilityError> {
        self.out.write("begin")?;
        self.out.open_block()?;
        self.out.indent();
        Ok(())
    }

    fn end_block(&mut self) -> Result<(), CapabilityError> {
        self.out.close_block()?;
        self.out.dedent();
        self.out.write("end")
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
            .write(format!("if test \"${name}\" != {expected}"))?;
        self.out.indent();
        self.out.write(format!(
            "{PRINT_HELPER} \"{}${name}`\"",
            escape_double_quoted(&head)
        ))?;
        self.out.dedent();
        self.out.write("end")
    }

    fn print_message(&mut self, text: &str) -> Result<(), CapabilityError> {
        self.out
            .write(format!("{PRINT_HELPER} {}", Self::quote_text(text)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn mode() -> FishMode {
        FishMode::new(LogSettings {
            level: LogLevel::Info,
            color: false,
        })
    }

    /// Split fish source words and evaluate the quoting we emit.
    fn evaluate(source: &str) -> Vec<String> {
        let mut words = Vec::new();
        let mut current = String::new();
        let mut in_word = false;
        let mut chars = source.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '\'' => {
                    in_word = true;
                    while let Some(c) = chars.next() {
                        match c {
                            '\'' => break,
                            '\\' if matches!(chars.peek(), Some('\'' | '\\')) => {
                                current.extend(chars.next());
                            }
                            c => current.push(c),
                        }
                    }
                }
                ' ' => {
                    if in_word {
                        words.push(std::mem::take(&mut current));
                        in_word = false;
                    }
                }
                c => {
                    in_word = true;
                    current.push(c);
                }
            }
        }
        if in_word {
            words.push(current);
        }
        words
    }

    #[rstest]
    #[case("hello world")]
    #[case("it's")]
    #[case("back\\slash")]
    #[case("\\'")]
    #[case("$HOME is literal")]
    fn quoting_round_trips(#[case] text: &str) {
        let quoted = mode().quote(&Value::text(text)).unwrap();
        assert_eq!(evaluate(&quoted), [text]);
    }

    #[test]
    fn lists_flatten() {
        let list = Value::List(vec![
            Value::text("a b"),
            Value::List(vec![Value::text("c"), Value::Integer(2)]),
        ]);
        let quoted = mode().quote(&list).unwrap();
        assert_eq!(quoted, "'a b' c 2");
        assert_eq!(evaluate(&quoted), ["a b", "c", "2"]);
    }

    #[test]
    fn empty_lists_are_rejected() {
        assert!(matches!(
            mode().quote(&Value::List(vec![])),
            Err(CapabilityError::EmptyList { .. })
        ));
        let nested = Value::List(vec![Value::text("a"), Value::List(vec![])]);
        assert!(matches!(
            mode().quote(&nested),
            Err(CapabilityError::EmptyList { .. })
        ));
    }

    #[test]
    fn assignment_forms() {
        let mut mode = mode();
        mode.export("EDITOR", &Value::text("nvim")).unwrap();
        mode.assign("fish_greeting", &Value::text(""), Scope::Export, false)
            .unwrap();
        mode.begin_block().unwrap();
        mode.set_local("LANG", &Value::text("C"), true).unwrap();
        mode.end_block().unwrap();
        assert_eq!(
            mode.output().lines(),
            [
                "set --global --export EDITOR nvim",
                "set --global fish_greeting ''",
                "begin",
                "    set --local --export LANG C",
                "end",
            ]
        );
    }

    #[rstest]
    #[case(PathOrder::Prepend, "fish_add_path --global --path --move --prepend /opt/bin")]
    #[case(PathOrder::AppendUser, "fish_add_path --global --append /opt/bin")]
    #[case(PathOrder::AppendSystem, "fish_add_path --global --path --append /opt/bin")]
    fn extend_path_uses_builtin(#[case] order: PathOrder, #[case] expected: &str) {
        let mut mode = mode();
        mode.extend_path(&Value::path("/opt/bin"), None, order)
            .unwrap();
        assert_eq!(mode.output().lines(), [expected]);
    }

    #[test]
    fn extend_other_variable_checks_membership() {
        let mut mode = mode();
        mode.extend_path(
            &Value::path("/opt/man"),
            Some("MANPATH"),
            PathOrder::AppendUser,
        )
        .unwrap();
        mode.extend_path(
            &Value::path("/opt/lib"),
            Some("PYTHONPATH"),
            PathOrder::Prepend,
        )
        .unwrap();
        assert_eq!(
            mode.output().lines(),
            [
                "if test -d /opt/man; and not contains -- /opt/man $MANPATH",
                "    set --global --export --append MANPATH /opt/man",
                "end",
                "if test -d /opt/lib",
                "    set --global --export PYTHONPATH /opt/lib (string match --invert -- /opt/lib $PYTHONPATH)",
                "end",
            ]
        );
    }

    #[test]
    fn alias_with_wraps_and_inferred_description() {
        let mut mode = mode();
        mode.alias("ls", &Value::text("lsd"), &AliasWraps::Updated, None)
            .unwrap();
        assert_eq!(
            mode.output().lines(),
            [
                "function ls \\",
                "    --description 'alias ls wraps lsd' \\",
                "    --wraps lsd",
                "    lsd $argv",
                "end",
            ]
        );
    }

    #[test]
    fn alias_without_wraps() {
        let mut mode = mode();
        mode.alias("ll", &Value::text("ls -l"), &AliasWraps::None, None)
            .unwrap();
        assert_eq!(
            mode.output().lines(),
            [
                "function ll \\",
                "    --description 'alias ll=ls -l'",
                "    ls -l $argv",
                "end",
            ]
        );
    }

    #[rstest]
    #[case(Some("lsd"), "alias ls wraps lsd")]
    #[case(None, "alias ls=lsd --group-directories-first")]
    fn description_prefers_wraps_form(#[case] wrapped: Option<&str>, #[case] expected: &str) {
        let value = Value::text("lsd --group-directories-first");
        assert_eq!(infer_description("ls", &value, wrapped), expected);
    }

    #[test]
    fn description_falls_back_for_complex_aliases() {
        let value = Value::text("cd ~/src && git pull --rebase");
        assert_eq!(
            infer_description("update", &value, None),
            "alias for update (very complex definition)"
        );
        let long = Value::text("x".repeat(60));
        assert_eq!(
            infer_description("long", &long, Some("also-a-very-long-command-name")),
            "alias for long (very complex definition)"
        );
    }

    #[test]
    fn explicit_description_wins() {
        let mut mode = mode();
        mode.alias(
            "g",
            &Value::text("git"),
            &AliasWraps::Original,
            Some("short git"),
        )
        .unwrap();
        assert_eq!(mode.output().lines()[1], "    --description 'short git' \\");
        assert_eq!(mode.output().lines()[2], "    --wraps g");
    }

    #[test]
    fn require_var_equals_prints_current_value() {
        let mut mode = mode();
        mode.require_var_equals("TERM", &Value::text("xterm-kitty"))
            .unwrap();
        assert_eq!(
            mode.output().lines(),
            [
                "if test \"$TERM\" != xterm-kitty",
                "    __translate_shell_print \"WARNING: Unexpected value for TERM: `$TERM`\"",
                "end",
            ]
        );
    }
}
