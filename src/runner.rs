//! Script runner: drives one [`Mode`] through a configuration script.
//!
//! A run owns a fresh emitter and [`ModeState`]. Statements come out in the
//! order the script's directives execute; any error discards the whole
//! emitter so a failed module never yields partial output.

use anyhow::{bail, Context, Result};
use std::borrow::Cow;
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use crate::cache::{CacheRegistry, CachedValue, RehashCondition};
use crate::facts::Facts;
use crate::log_level::LogSettings;
use crate::mode::{self, Dialect, Mode, PathOrder, Scope};
use crate::script::{
    parse_wraps, Condition, Directive, LookupSpec, RehashKind, RehashSpec, Script, ScriptError,
    Step, ValueSpec,
};
use crate::value::{path_text, Value};

/// Per-run state, created when a run starts and dropped when it ends.
#[derive(Debug, Default)]
pub struct ModeState {
    added_module_paths: Vec<PathBuf>,
}

impl ModeState {
    pub fn added_module_paths(&self) -> &[PathBuf] {
        &self.added_module_paths
    }

    fn add_module_path(&mut self, dir: PathBuf) {
        if !self.added_module_paths.contains(&dir) {
            self.added_module_paths.push(dir);
        }
    }
}

/// Cache namespace used when a script does not name one.
pub fn default_namespace(module: &str) -> String {
    module
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Map a dotted module name to its relative script path (`a.b` → `a/b.toml`).
pub fn module_relative_path(name: &str) -> Result<PathBuf, ScriptError> {
    let invalid = || ScriptError::InvalidModuleName(name.to_string());
    if name.is_empty() {
        return Err(invalid());
    }
    let mut path = PathBuf::new();
    for part in name.split(['.', '/']) {
        if part.is_empty() || part == ".." {
            return Err(invalid());
        }
        path.push(part);
    }
    path.set_extension("toml");
    Ok(path)
}

/// Long-lived translator: facts, search path and caches shared across runs.
pub struct Translator {
    facts: Facts,
    search_path: Vec<PathBuf>,
    caches: CacheRegistry,
    settings: LogSettings,
}

impl Translator {
    pub fn new(
        facts: Facts,
        search_path: Vec<PathBuf>,
        caches: CacheRegistry,
        settings: LogSettings,
    ) -> Self {
        Self {
            facts,
            search_path,
            caches,
            settings,
        }
    }

    /// Translate one module for `dialect`, returning the finished statements.
    pub fn translate(&mut self, dialect: Dialect, module: &str) -> Result<Vec<String>> {
        let mut run = Run {
            facts: &self.facts,
            search_path: &self.search_path,
            caches: &mut self.caches,
            dialect,
            state: ModeState::default(),
            bindings: HashMap::new(),
            include_stack: Vec::new(),
            namespace: default_namespace(module),
        };
        let path = run.resolve_module(module)?;
        let script = Script::load(&path)?;

        let mut emitter = mode::create(dialect, self.settings);
        emitter.start()?;
        run.run_script(emitter.as_mut(), module, &path, &script)
            .with_context(|| format!("Failed to translate module {module} for {dialect}"))?;
        let lines = emitter.finish()?;

        tracing::debug!(
            "Translated {module} to {} {dialect} lines ({} module paths added)",
            lines.len(),
            run.state.added_module_paths().len()
        );
        Ok(lines)
    }
}

struct Run<'r> {
    facts: &'r Facts,
    search_path: &'r [PathBuf],
    caches: &'r mut CacheRegistry,
    dialect: Dialect,
    state: ModeState,
    bindings: HashMap<String, String>,
    include_stack: Vec<PathBuf>,
    namespace: String,
}

impl Run<'_> {
    fn resolve_module(&self, name: &str) -> Result<PathBuf, ScriptError> {
        let relative = module_relative_path(name)?;
        let dirs: Vec<&Path> = self
            .search_path
            .iter()
            .chain(self.state.added_module_paths())
            .map(PathBuf::as_path)
            .collect();
        dirs.iter()
            .map(|dir| dir.join(&relative))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| ScriptError::ModuleNotFound {
                name: name.to_string(),
                searched: dirs
                    .iter()
                    .map(|dir| dir.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }

    fn run_script(
        &mut self,
        mode: &mut dyn Mode,
        module: &str,
        path: &Path,
        script: &Script,
    ) -> Result<()> {
        let identity = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if self.include_stack.contains(&identity) {
            let chain = self
                .include_stack
                .iter()
                .chain([&identity])
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(ScriptError::IncludeCycle(chain).into());
        }

        let namespace = script
            .namespace
            .clone()
            .unwrap_or_else(|| default_namespace(module));
        let outer_namespace = std::mem::replace(&mut self.namespace, namespace);
        self.include_stack.push(identity);
        let result = self.run_steps(mode, &script.steps);
        self.include_stack.pop();
        self.namespace = outer_namespace;
        result
    }

    fn run_steps(&mut self, mode: &mut dyn Mode, steps: &[Step]) -> Result<()> {
        for step in steps {
            self.run_step(mode, step)?;
        }
        Ok(())
    }

    fn run_step(&mut self, mode: &mut dyn Mode, step: &Step) -> Result<()> {
        let active = match &step.when {
            Some(condition) => self.evaluate(condition)?,
            None => true,
        };
        if active {
            self.apply(mode, &step.directive)
        } else {
            self.run_steps(mode, &step.otherwise)
        }
    }

    fn apply(&mut self, mode: &mut dyn Mode, directive: &Directive) -> Result<()> {
        match directive {
            Directive::Export { name, value } => {
                let value = self.resolve_value(value)?;
                mode.export(name, &value)?;
            }
            Directive::SetGlobal { name, value } => {
                let value = self.resolve_value(value)?;
                mode.assign(name, &value, Scope::Export, false)?;
            }
            Directive::SetLocal {
                name,
                value,
                export,
            } => {
                let value = self.resolve_value(value)?;
                mode.set_local(name, &value, *export)?;
            }
            Directive::Alias {
                name,
                value,
                wraps,
                description,
            } => {
                let value = self.resolve_value(value)?;
                mode.alias(
                    name,
                    &value,
                    &parse_wraps(wraps.as_deref()),
                    description.as_deref(),
                )?;
            }
            Directive::ExtendPath { value, var, order } => {
                let value = self.resolve_value(value)?;
                mode.extend_path(&value, var.as_deref(), *order)?;
            }
            Directive::ExtendModulePath { value, var } => {
                let dir = match self.resolve_value(value)? {
                    Value::Path(path) => path,
                    Value::Text(text) => self.expand_path(&text)?,
                    other => bail!("extend_module_path expects a path, got {other:?}"),
                };
                if let Some(var) = var {
                    mode.extend_path(&Value::Path(dir.clone()), Some(var), PathOrder::AppendUser)?;
                }
                self.state.add_module_path(dir);
            }
            Directive::Block { steps } => {
                mode.block(|mode| self.run_steps(mode, steps))?;
            }
            Directive::Group { steps } => self.run_steps(mode, steps)?,
            Directive::Eval { text } => mode.eval_text(text)?,
            Directive::Source { path } => {
                let path = self.expand_path(path)?;
                mode.source_file(&path)?;
            }
            Directive::Exec { command, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.resolve_value(arg))
                    .collect::<Result<Vec<_>>>()?;
                mode.exec_cmd(command, &args)?;
            }
            Directive::RequireVarEquals { name, value } => {
                let value = self.resolve_value(value)?;
                mode.require_var_equals(name, &value)?;
            }
            Directive::Log {
                level,
                message,
                style,
            } => mode.log(*level, message, style.as_ref())?,
            Directive::Lookup(spec) => self.lookup(spec)?,
            Directive::Include { module } => self.include(mode, module)?,
            Directive::Fail { message } => return Err(ScriptError::Failed(message.clone()).into()),
        }
        Ok(())
    }

    fn include(&mut self, mode: &mut dyn Mode, module: &str) -> Result<()> {
        let path = self.resolve_module(module)?;
        let script = Script::load(&path)?;
        tracing::debug!("Including {module} from {}", path.display());
        self.run_script(mode, module, &path, &script)
            .with_context(|| format!("In included module {module}"))
    }

    fn evaluate(&self, condition: &Condition) -> Result<bool> {
        Ok(match condition {
            Condition::Command(name) => self.facts.which(name).is_some(),
            Condition::Platform(platform) => self.facts.platform == *platform,
            Condition::Desktop(expected) => self.facts.is_desktop() == *expected,
            Condition::Shell(dialect) => self.dialect == *dialect,
            Condition::Host(host) => self.facts.hostname == *host,
            Condition::EnvSet(name) => env::var_os(name).is_some(),
            Condition::EnvEquals { name, value } => {
                env::var(name).is_ok_and(|current| current == *value)
            }
            Condition::Exists(path) => self.expand_path(path)?.exists(),
            Condition::IsDir(path) => self.expand_path(path)?.is_dir(),
            Condition::Bound(name) => self
                .bindings
                .get(name)
                .is_some_and(|value| !value.is_empty()),
            Condition::Not(inner) => !self.evaluate(inner)?,
            Condition::All(items) => {
                for item in items {
                    if !self.evaluate(item)? {
                        return Ok(false);
                    }
                }
                true
            }
            Condition::Any(items) => {
                for item in items {
                    if self.evaluate(item)? {
                        return Ok(true);
                    }
                }
                false
            }
        })
    }

    fn resolve_value(&self, spec: &ValueSpec) -> Result<Value> {
        Ok(match spec {
            ValueSpec::Text(text) => Value::Text(text.clone()),
            ValueSpec::Integer(number) => Value::Integer(*number),
            ValueSpec::List(items) => Value::List(
                items
                    .iter()
                    .map(|item| self.resolve_value(item))
                    .collect::<Result<_>>()?,
            ),
            ValueSpec::Path { path } => Value::Path(self.expand_path(path)?),
            ValueSpec::Var { var } => Value::var(var.as_str())?,
            ValueSpec::Binding { binding } => Value::Text(
                self.bindings
                    .get(binding)
                    .cloned()
                    .ok_or_else(|| ScriptError::UnknownBinding(binding.clone()))?,
            ),
        })
    }

    /// Look up `$NAME` in facts, then bindings, then the environment.
    fn variable(&self, name: &str) -> Option<String> {
        if name == "SHELL_BACKEND" {
            return Some(self.dialect.as_str().to_string());
        }
        self.facts
            .lookup(name)
            .or_else(|| self.bindings.get(name).cloned())
            .or_else(|| env::var(name).ok())
    }

    fn expand<'a>(&self, input: &'a str) -> Result<Cow<'a, str>, ScriptError> {
        shellexpand::full_with_context(
            input,
            || Some(path_text(&self.facts.home)),
            |name| match self.variable(name) {
                Some(value) => Ok(Some(value)),
                None => Err(format!("${name} is not set")),
            },
        )
        .map_err(|err| ScriptError::Expand {
            input: input.to_string(),
            reason: err.to_string(),
        })
    }

    fn expand_path(&self, input: &str) -> Result<PathBuf, ScriptError> {
        Ok(PathBuf::from(self.expand(input)?.into_owned()))
    }

    fn lookup(&mut self, spec: &LookupSpec) -> Result<()> {
        enum Source<'s> {
            Command(&'s [String]),
            Which(&'s str),
        }
        let source = match (&spec.command, &spec.which) {
            (Some(argv), None) if !argv.is_empty() => Source::Command(argv),
            (None, Some(name)) => Source::Which(name),
            _ => {
                return Err(ScriptError::InvalidLookup {
                    bind: spec.bind.clone(),
                }
                .into())
            }
        };
        let rehash_files = match &spec.rehash {
            RehashSpec::Files { files } => Some(
                files
                    .iter()
                    .map(|file| self.expand_path(file))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            RehashSpec::Kind(_) => None,
        };

        let key = spec.key.as_deref().unwrap_or(&spec.bind);
        let facts = self.facts;
        let cache = self.caches.namespace(&self.namespace)?;
        let value: String = cache
            .get_or_load(key, || -> Result<CachedValue<String>> {
                let value = match source {
                    Source::Command(argv) => run_command(argv)?,
                    Source::Which(name) => facts
                        .which(name)
                        .map(|path| path_text(&path))
                        .unwrap_or_default(),
                };
                let rehash = match (&spec.rehash, rehash_files) {
                    (_, Some(files)) => RehashCondition::files_changed(files)?,
                    (RehashSpec::Kind(RehashKind::Never), None) => RehashCondition::Never,
                    _ => RehashCondition::Always,
                };
                let mut cached = CachedValue::new(value).with_rehash(rehash);
                if let Some(seconds) = spec.check_frequency {
                    cached = cached.with_check_frequency(Duration::from_secs(seconds));
                }
                Ok(cached)
            })
            .with_context(|| format!("Lookup {:?} failed", spec.bind))?;

        tracing::debug!("Bound {} = {value:?}", spec.bind);
        self.bindings.insert(spec.bind.clone(), value);
        Ok(())
    }
}

fn run_command(argv: &[String]) -> Result<String> {
    let display = argv.join(" ");
    let (program, args) = argv
        .split_first()
        .context("lookup command must not be empty")?;
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stderr(Stdio::inherit())
        .output()
        .map_err(|err| ScriptError::CommandFailed {
            command: display.clone(),
            reason: err.to_string(),
        })?;
    if !output.status.success() {
        return Err(ScriptError::CommandFailed {
            command: display,
            reason: output.status.to_string(),
        }
        .into());
    }
    let stdout = String::from_utf8(output.stdout)
        .with_context(|| format!("`{display}` printed non UTF-8 output"))?;
    Ok(stdout.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::StoreLocation;
    use crate::facts::tests::fake_facts;
    use crate::log_level::LogLevel;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        temp: TempDir,
        translator: Translator,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            let facts = fake_facts(temp.path());
            fs::create_dir_all(&facts.dotfiles).unwrap();
            fs::create_dir_all(temp.path().join("bin")).unwrap();
            let translator = Translator::new(
                facts.clone(),
                vec![facts.dotfiles.clone()],
                CacheRegistry::new(StoreLocation::Memory),
                LogSettings {
                    level: LogLevel::Info,
                    color: false,
                },
            );
            Self { temp, translator }
        }

        fn dotfiles(&self) -> PathBuf {
            self.temp.path().join("dotfiles")
        }

        fn write(&self, relative: &str, text: &str) -> PathBuf {
            let path = self.dotfiles().join(relative);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, text).unwrap();
            path
        }

        /// Script body without the prologue and epilogue.
        fn body(&mut self, dialect: Dialect, module: &str) -> Vec<String> {
            let lines = self.translator.translate(dialect, module).unwrap();
            let emitter = mode::create(dialect, LogSettings::default());
            let (head, tail) = (emitter.prologue().len(), emitter.epilogue().len());
            lines[head..lines.len() - tail].to_vec()
        }
    }

    #[test]
    fn statements_follow_directive_order() {
        let mut fx = Fixture::new();
        fx.write(
            "common.toml",
            r#"
            version = 1
            [[steps]]
            op = "export"
            name = "EDITOR"
            value = "nvim"

            [[steps]]
            op = "alias"
            name = "g"
            value = "git"

            [[steps]]
            op = "block"
            steps = [
                { op = "set_local", name = "TMPX", value = "1", export = false },
                { op = "eval", text = "echo $TMPX" },
            ]
            "#,
        );
        assert_eq!(
            fx.body(Dialect::Zsh, "common"),
            [
                "export EDITOR=nvim",
                "alias g=git",
                "() {",
                "    local TMPX=1",
                "    eval \"echo \\$TMPX\"",
                "}",
            ]
        );
    }

    #[test]
    fn full_output_has_prologue_and_epilogue() {
        let mut fx = Fixture::new();
        fx.write("empty.toml", "version = 1\n");
        let lines = fx.translator.translate(Dialect::Fish, "empty").unwrap();
        assert_eq!(lines.first().map(String::as_str), Some("function __translate_shell_print"));
        assert_eq!(
            lines.last().map(String::as_str),
            Some("functions --erase __translate_shell_print")
        );
    }

    #[cfg(unix)]
    #[test]
    fn conditions_choose_branches() {
        let mut fx = Fixture::new();
        crate::facts::tests::install_executable(&fx.temp.path().join("bin"), "lsd", "#!/bin/sh\n");
        fx.write(
            "aliases.toml",
            r#"
            version = 1
            [[steps]]
            op = "alias"
            name = "ls"
            value = "lsd"
            when = { command = "lsd" }

            [[steps]]
            op = "alias"
            name = "cat"
            value = "bat"
            when = { command = "bat" }
            otherwise = [ { op = "log", level = "warning", message = "Cannot find bat" } ]

            [[steps]]
            op = "export"
            name = "ON_FISH"
            value = 1
            when = { all = [ { shell = "fish" }, { platform = "linux" }, { host = "testhost" } ] }
            "#,
        );
        assert_eq!(
            fx.body(Dialect::Fish, "aliases"),
            [
                "function ls \\",
                "    --description 'alias ls=lsd'",
                "    lsd $argv",
                "end",
                "__translate_shell_print 'WARNING: Cannot find bat'",
                "set --global --export ON_FISH 1",
            ]
        );
        assert_eq!(
            fx.body(Dialect::Zsh, "aliases"),
            [
                "alias ls=lsd",
                "__translate_shell_print \"WARNING: Cannot find bat\""
            ]
        );
    }

    #[test]
    fn path_values_expand_facts() {
        let mut fx = Fixture::new();
        fx.write(
            "paths.toml",
            r#"
            version = 1
            [[steps]]
            op = "export"
            name = "SHELLRC"
            value = { path = "$DOTFILES_PATH/shellrc-$SHELL_BACKEND" }
            "#,
        );
        let expected = format!(
            "$SHELLRC = '{}'",
            fx.dotfiles().join("shellrc-xonsh").display()
        );
        assert_eq!(fx.body(Dialect::Xonsh, "paths"), [expected]);
    }

    #[test]
    fn unknown_variable_in_path_is_an_error() {
        let mut fx = Fixture::new();
        fx.write(
            "broken.toml",
            r#"
            version = 1
            [[steps]]
            op = "source"
            path = "$TRANSLATE_SHELL_SURELY_UNSET_VAR/init.zsh"
            "#,
        );
        let err = fx.translator.translate(Dialect::Zsh, "broken").unwrap_err();
        assert!(format!("{err:#}").contains("TRANSLATE_SHELL_SURELY_UNSET_VAR"));
    }

    #[test]
    fn capability_error_aborts_without_output() {
        let mut fx = Fixture::new();
        fx.write(
            "local.toml",
            r#"
            version = 1
            [[steps]]
            op = "export"
            name = "OK"
            value = "1"

            [[steps]]
            op = "set_local"
            name = "OOPS"
            value = "1"
            "#,
        );
        let err = fx.translator.translate(Dialect::Fish, "local").unwrap_err();
        assert!(format!("{err:#}").contains("outside of a block"));
    }

    #[test]
    fn fail_directive_aborts() {
        let mut fx = Fixture::new();
        fx.write(
            "fail.toml",
            r#"
            version = 1
            [[steps]]
            op = "fail"
            message = "unsupported machine"
            when = { not = { host = "testhost" } }

            [[steps]]
            op = "fail"
            message = "this host is not configured"
            "#,
        );
        let err = fx.translator.translate(Dialect::Zsh, "fail").unwrap_err();
        assert!(format!("{err:#}").contains("this host is not configured"));
    }

    #[test]
    fn block_closes_when_body_fails() {
        let mut fx = Fixture::new();
        fx.write(
            "block.toml",
            r#"
            version = 1
            [[steps]]
            op = "block"
            steps = [ { op = "export", name = "bad name", value = "1" } ]
            "#,
        );
        // the error must be the invalid name, not an unclosed block
        let err = fx.translator.translate(Dialect::Xonsh, "block").unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("not a valid shell identifier"), "{message}");
    }

    #[test]
    fn includes_resolve_dotted_names_and_module_paths() {
        let mut fx = Fixture::new();
        fx.write(
            "machines/laptop.toml",
            r#"
            version = 1
            [[steps]]
            op = "extend_module_path"
            value = { path = "$DOTFILES_PATH/extra" }

            [[steps]]
            op = "include"
            module = "helpers.git"
            "#,
        );
        fx.write(
            "extra/helpers/git.toml",
            r#"
            version = 1
            [[steps]]
            op = "alias"
            name = "gs"
            value = "git status"
            "#,
        );
        assert_eq!(
            fx.body(Dialect::Zsh, "machines.laptop"),
            ["alias gs=\"git status\""]
        );

        // module paths added during a run do not leak into the next one
        fx.write(
            "other.toml",
            r#"
            version = 1
            [[steps]]
            op = "include"
            module = "helpers.git"
            "#,
        );
        let err = fx.translator.translate(Dialect::Zsh, "other").unwrap_err();
        assert!(format!("{err:#}").contains("cannot find module"));
    }

    #[test]
    fn include_cycles_are_detected() {
        let mut fx = Fixture::new();
        fx.write(
            "a.toml",
            "version = 1\n[[steps]]\nop = \"include\"\nmodule = \"b\"\n",
        );
        fx.write(
            "b.toml",
            "version = 1\n[[steps]]\nop = \"include\"\nmodule = \"a\"\n",
        );
        let err = fx.translator.translate(Dialect::Fish, "a").unwrap_err();
        assert!(format!("{err:#}").contains("include cycle"));
    }

    #[cfg(unix)]
    #[test]
    fn lookup_is_memoized_and_bound() {
        let mut fx = Fixture::new();
        let counter = fx.temp.path().join("count");
        let script = format!(
            "#!/bin/sh\necho x >> '{}'\necho /opt/homebrew\n",
            counter.display()
        );
        crate::facts::tests::install_executable(&fx.temp.path().join("bin"), "fake-brew", &script);
        let brew = fx.temp.path().join("bin/fake-brew");
        fx.write(
            "brew.toml",
            &format!(
                r#"
                version = 1
                [[steps]]
                op = "lookup"
                bind = "brew_prefix"
                command = ["{}", "--prefix"]
                rehash = "never"

                [[steps]]
                op = "export"
                name = "HOMEBREW_PREFIX"
                value = {{ binding = "brew_prefix" }}
                when = {{ bound = "brew_prefix" }}
                "#,
                brew.display()
            ),
        );

        for _ in 0..2 {
            assert_eq!(
                fx.body(Dialect::Zsh, "brew"),
                ["export HOMEBREW_PREFIX=/opt/homebrew"]
            );
        }
        let runs = fs::read_to_string(&counter).unwrap();
        assert_eq!(runs.lines().count(), 1, "command should run once");
    }

    #[cfg(unix)]
    #[test]
    fn which_lookup_binds_empty_when_missing() {
        let mut fx = Fixture::new();
        fx.write(
            "which.toml",
            r#"
            version = 1
            [[steps]]
            op = "lookup"
            bind = "nvim"
            which = "nvim"

            [[steps]]
            op = "export"
            name = "EDITOR"
            value = { binding = "nvim" }
            when = { bound = "nvim" }
            otherwise = [ { op = "export", name = "EDITOR", value = "vi" } ]
            "#,
        );
        assert_eq!(fx.body(Dialect::Zsh, "which"), ["export EDITOR=vi"]);
    }

    #[test]
    fn lookup_requires_one_source() {
        let mut fx = Fixture::new();
        fx.write(
            "bad.toml",
            "version = 1\n[[steps]]\nop = \"lookup\"\nbind = \"x\"\n",
        );
        let err = fx.translator.translate(Dialect::Zsh, "bad").unwrap_err();
        assert!(format!("{err:#}").contains("exactly one of"));
    }

    #[test]
    fn module_names_map_to_paths() {
        assert_eq!(
            module_relative_path("machines.laptop").unwrap(),
            PathBuf::from("machines/laptop.toml")
        );
        assert_eq!(
            module_relative_path("common").unwrap(),
            PathBuf::from("common.toml")
        );
        assert!(module_relative_path("").is_err());
        assert!(module_relative_path("a..b").is_err());
        assert!(module_relative_path("../etc").is_err());
    }

    #[test]
    fn default_namespace_is_a_valid_cache_name() {
        assert_eq!(default_namespace("machines.laptop"), "machines_laptop");
        assert!(crate::cache::validate_namespace(&default_namespace("a/b.c-d")).is_ok());
    }
}
