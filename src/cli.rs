use clap::Parser;
use std::path::PathBuf;

use crate::mode::Dialect;

/// Translate shell configuration modules into zsh, fish or xonsh source
///
/// Each `--module` names one configuration script (dotted names map to
/// directories, `machines.laptop` → `machines/laptop.toml`). Modules are
/// looked up in `--mod-path` directories first, then in `$DOTFILES_PATH`.
/// With a single module and no `--out`, the result goes to standard output.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Shell dialect to emit
    #[arg(long, value_enum, value_name = "DIALECT")]
    pub mode: Dialect,

    /// Configuration module to translate (repeatable)
    #[arg(short = 'm', long = "module", value_name = "NAME", required = true)]
    pub modules: Vec<String>,

    /// Search this directory for modules before the defaults (repeatable)
    #[arg(long = "mod-path", value_name = "DIR", value_parser = existing_dir)]
    pub mod_paths: Vec<PathBuf>,

    /// Output file, paired positionally with each --module (repeatable)
    #[arg(short = 'o', long = "out", value_name = "FILE")]
    pub outputs: Vec<PathBuf>,
}

/// Flag combinations clap cannot express on its own.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum UsageError {
    #[error("got {modules} modules but {outputs} output files; pass one --out per --module")]
    OutputCountMismatch { modules: usize, outputs: usize },

    #[error("--out is required when translating more than one module")]
    MissingOutputs,
}

/// Where one module's translation is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Stdout,
    File(PathBuf),
}

impl Cli {
    /// Pair every module with its destination.
    pub fn jobs(&self) -> Result<Vec<(&str, Destination)>, UsageError> {
        let modules = self.modules.iter().map(String::as_str);
        match (self.modules.len(), self.outputs.len()) {
            (1, 0) => Ok(modules.map(|m| (m, Destination::Stdout)).collect()),
            (_, 0) => Err(UsageError::MissingOutputs),
            (m, o) if m == o => Ok(modules
                .zip(self.outputs.iter().cloned().map(Destination::File))
                .collect()),
            (modules, outputs) => Err(UsageError::OutputCountMismatch { modules, outputs }),
        }
    }
}

fn existing_dir(raw: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(raw);
    if path.is_dir() {
        Ok(path)
    } else {
        Err(format!("{raw} is not a directory"))
    }
}
