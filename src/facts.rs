//! Read-only facts about the host, consumed by configuration scripts.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use whoami::fallible;

use crate::util::xdg;

/// Root of the dotfiles checkout, used to resolve relative script paths.
pub const DOTFILES_PATH_ENV: &str = "DOTFILES_PATH";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Linux,
    #[serde(alias = "darwin")]
    Macos,
}

impl Platform {
    pub fn current() -> Result<Self> {
        match env::consts::OS {
            "linux" => Ok(Platform::Linux),
            "macos" => Ok(Platform::Macos),
            other => bail!("Unsupported platform: {other}"),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Linux => "linux",
            Platform::Macos => "macos",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of the host environment taken once per process.
#[derive(Debug, Clone)]
pub struct Facts {
    pub platform: Platform,
    /// Lowercase hostname slug, e.g. `macbook-2021`
    pub hostname: String,
    pub home: PathBuf,
    pub user_config_dir: PathBuf,
    pub user_data_dir: PathBuf,
    pub dotfiles: PathBuf,
    /// Directories searched by [`Facts::which`], in `$PATH` order.
    pub search_path: Vec<PathBuf>,
}

impl Facts {
    pub fn detect() -> Result<Self> {
        let dotfiles = match env::var_os(DOTFILES_PATH_ENV) {
            Some(path) if !path.is_empty() => PathBuf::from(path),
            _ => env::current_dir().context("Failed to determine current directory")?,
        };

        let search_path = match env::var_os("PATH") {
            Some(path) => env::split_paths(&path).collect(),
            None => {
                tracing::warn!("Missing $PATH variable");
                Vec::new()
            }
        };

        Ok(Self {
            platform: Platform::current()?,
            hostname: host_slug(),
            home: xdg::home_dir()?,
            user_config_dir: xdg::user_config_dir()?,
            user_data_dir: xdg::user_data_dir()?,
            dotfiles,
            search_path,
        })
    }

    /// Locate an executable on the search path.
    pub fn which(&self, command: &str) -> Option<PathBuf> {
        if command.contains('/') {
            let path = PathBuf::from(command);
            return is_executable(&path).then_some(path);
        }
        self.search_path
            .iter()
            .map(|dir| dir.join(command))
            .find(|candidate| is_executable(candidate))
    }

    /// Linux counts as a desktop when an X server is installed; macs always do.
    pub fn is_desktop(&self) -> bool {
        match self.platform {
            Platform::Linux => self.which("Xorg").is_some(),
            Platform::Macos => true,
        }
    }

    /// Value of a named fact, as exposed to path expansion.
    pub fn lookup(&self, name: &str) -> Option<String> {
        let text = |path: &Path| path.to_string_lossy().into_owned();
        match name {
            "DOTFILES_PATH" => Some(text(&self.dotfiles)),
            "PLATFORM" => Some(self.platform.as_str().to_string()),
            "HOSTNAME" => Some(self.hostname.clone()),
            "USER_CONFIG_DIR" => Some(text(&self.user_config_dir)),
            "USER_DATA_DIR" => Some(text(&self.user_data_dir)),
            "HOME" => Some(text(&self.home)),
            _ => None,
        }
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

fn host_slug() -> String {
    let raw = fallible::hostname()
        .ok()
        .filter(|value| !value.trim().is_empty())
        .or_else(|| env::var("HOSTNAME").ok().filter(|value| !value.trim().is_empty()))
        .or_else(|| env::var("HOST").ok().filter(|value| !value.trim().is_empty()))
        .unwrap_or_else(|| "local".to_string());
    slugify(raw.split('.').next().unwrap_or_default())
}

fn slugify(raw: &str) -> String {
    let mut slug = String::new();
    let mut previous_dash = false;

    for ch in raw.chars() {
        let mapped = if ch.is_ascii_alphanumeric() {
            previous_dash = false;
            ch.to_ascii_lowercase()
        } else {
            if previous_dash {
                continue;
            }
            previous_dash = true;
            '-'
        };
        slug.push(mapped);
    }

    let slug = slug.trim_matches('-').to_string();
    if slug.is_empty() {
        "local".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rstest::rstest;
    use std::fs;
    use tempfile::TempDir;

    /// Facts rooted in a scratch directory, independent of the host.
    pub(crate) fn fake_facts(root: &Path) -> Facts {
        Facts {
            platform: Platform::Linux,
            hostname: "testhost".to_string(),
            home: root.join("home"),
            user_config_dir: root.join("home/.config"),
            user_data_dir: root.join("home/.local/share"),
            dotfiles: root.join("dotfiles"),
            search_path: vec![root.join("bin")],
        }
    }

    #[cfg(unix)]
    pub(crate) fn install_executable(dir: &Path, name: &str, script: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        fs::create_dir_all(dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, script).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[rstest]
    #[case("MacBook-Pro.local", "macbook-pro-local")]
    #[case("raspberrypi4_2022", "raspberrypi4-2022")]
    #[case("--", "local")]
    #[case("a  b", "a-b")]
    fn test_slugify(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(slugify(raw), expected);
    }

    #[test]
    fn test_host_slug_is_lowercase() {
        let slug = host_slug();
        assert!(!slug.is_empty());
        assert_eq!(slug, slug.to_lowercase());
    }

    #[cfg(unix)]
    #[test]
    fn test_which_requires_executable_bit() {
        let temp = TempDir::new().unwrap();
        let facts = fake_facts(temp.path());
        install_executable(&temp.path().join("bin"), "lsd", "#!/bin/sh\n");
        fs::write(temp.path().join("bin/notes.txt"), "").unwrap();

        assert_eq!(facts.which("lsd"), Some(temp.path().join("bin/lsd")));
        assert_eq!(facts.which("notes.txt"), None);
        assert_eq!(facts.which("missing"), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_linux_desktop_needs_xorg() {
        let temp = TempDir::new().unwrap();
        let facts = fake_facts(temp.path());
        assert!(!facts.is_desktop());
        install_executable(&temp.path().join("bin"), "Xorg", "#!/bin/sh\n");
        assert!(facts.is_desktop());

        let mac = Facts {
            platform: Platform::Macos,
            ..facts
        };
        assert!(mac.is_desktop());
    }

    #[test]
    fn test_lookup_named_facts() {
        let temp = TempDir::new().unwrap();
        let facts = fake_facts(temp.path());
        assert_eq!(facts.lookup("PLATFORM").as_deref(), Some("linux"));
        assert_eq!(facts.lookup("HOSTNAME").as_deref(), Some("testhost"));
        assert_eq!(
            facts.lookup("DOTFILES_PATH"),
            Some(temp.path().join("dotfiles").to_string_lossy().into_owned())
        );
        assert_eq!(facts.lookup("EDITOR"), None);
    }
}
