use anyhow::{Context, Result};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::cache::{CacheRegistry, StoreLocation};
use crate::cli::Destination;
use crate::facts::Facts;
use crate::log_level::LogSettings;
use crate::mode::Dialect;
use crate::runner::Translator;
use crate::ui;
use crate::util::xdg;

pub fn execute(dialect: Dialect, mod_paths: &[PathBuf], jobs: &[(&str, Destination)]) -> Result<()> {
    for (module, _) in jobs {
        if module.contains('/') {
            ui::warn(format!(
                "Module name {module:?} contains '/'; use '.' to separate path components"
            ));
        }
    }

    let facts = Facts::detect()?;
    let search_path = module_search_path(mod_paths, &facts);
    let store = xdg::store_path()?;
    tracing::debug!("Using cache store {}", store.display());

    let mut translator = Translator::new(
        facts,
        search_path,
        CacheRegistry::new(StoreLocation::File(store)),
        LogSettings::from_env(),
    );

    for (module, destination) in jobs {
        let lines = translator.translate(dialect, module)?;
        write_output(destination, &lines)?;
    }
    Ok(())
}

/// `--mod-path` directories in the order given, then the dotfiles root.
fn module_search_path(mod_paths: &[PathBuf], facts: &Facts) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = mod_paths.to_vec();
    if !dirs.contains(&facts.dotfiles) {
        dirs.push(facts.dotfiles.clone());
    }
    dirs
}

fn render(lines: &[String]) -> String {
    let mut text = lines.join("\n");
    text.push('\n');
    text
}

fn write_output(destination: &Destination, lines: &[String]) -> Result<()> {
    let text = render(lines);
    match destination {
        Destination::Stdout => {
            let mut stdout = io::stdout().lock();
            stdout
                .write_all(text.as_bytes())
                .and_then(|()| stdout.flush())
                .context("Failed to write to stdout")
        }
        Destination::File(path) => write_file(path, &text),
    }
}

fn write_file(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))?;
    ui::success("Wrote", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::tests::fake_facts;
    use tempfile::TempDir;

    #[test]
    fn rendered_output_ends_with_newline() {
        assert_eq!(render(&["a".to_string(), "b".to_string()]), "a\nb\n");
    }

    #[test]
    fn mod_paths_come_before_dotfiles() {
        let temp = TempDir::new().unwrap();
        let facts = fake_facts(temp.path());
        let extra = temp.path().join("extra");
        assert_eq!(
            module_search_path(&[extra.clone()], &facts),
            vec![extra, facts.dotfiles.clone()]
        );
        assert_eq!(
            module_search_path(&[facts.dotfiles.clone()], &facts),
            vec![facts.dotfiles.clone()]
        );
    }

    #[test]
    fn files_are_written_with_parents() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("out/nested/common.zsh");
        write_output(&Destination::File(path.clone()), &["export A=1".to_string()]).unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "export A=1\n");
    }
}
