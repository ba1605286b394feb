use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

/// Explicit location of the cache store, overriding the XDG default.
pub const CACHE_PATH_ENV: &str = "TRANSLATE_SHELL_CACHE";

const APP_NAME: &str = "translate-shell";
const STORE_FILE: &str = "cache.sqlite3";

fn base_dirs() -> Result<directories::BaseDirs> {
    directories::BaseDirs::new().context("Failed to get home directory")
}

/// Get the XDG cache directory for translate-shell
///
/// Returns `$XDG_CACHE_HOME/translate-shell` or `~/.cache/translate-shell` if not set
pub fn cache_dir() -> Result<PathBuf> {
    let base = match env::var_os("XDG_CACHE_HOME") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => base_dirs()?.home_dir().join(".cache"),
    };

    Ok(base.join(APP_NAME))
}

/// Path of the SQLite file backing the cache
pub fn store_path() -> Result<PathBuf> {
    match env::var_os(CACHE_PATH_ENV) {
        Some(path) if !path.is_empty() => Ok(PathBuf::from(path)),
        _ => Ok(cache_dir()?.join(STORE_FILE)),
    }
}

/// Platform config directory (`~/.config` on Linux, `~/Library/Application Support` on macOS)
pub fn user_config_dir() -> Result<PathBuf> {
    Ok(base_dirs()?.config_dir().to_path_buf())
}

/// Platform data directory (`~/.local/share` on Linux)
pub fn user_data_dir() -> Result<PathBuf> {
    Ok(base_dirs()?.data_dir().to_path_buf())
}

/// Get the home directory
pub fn home_dir() -> Result<PathBuf> {
    base_dirs().map(|bd| bd.home_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_cache_dir_honours_xdg() {
        let original = env::var_os("XDG_CACHE_HOME");
        env::set_var("XDG_CACHE_HOME", "/tmp/xdg-cache");
        let dir = cache_dir().unwrap();
        match original {
            Some(value) => env::set_var("XDG_CACHE_HOME", value),
            None => env::remove_var("XDG_CACHE_HOME"),
        }
        assert_eq!(dir, PathBuf::from("/tmp/xdg-cache/translate-shell"));
    }

    #[test]
    #[serial]
    fn test_store_path_override() {
        let original = env::var_os(CACHE_PATH_ENV);
        env::set_var(CACHE_PATH_ENV, "/tmp/custom.sqlite3");
        let path = store_path().unwrap();
        env::remove_var(CACHE_PATH_ENV);
        let default = store_path().unwrap();
        if let Some(value) = original {
            env::set_var(CACHE_PATH_ENV, value);
        }
        assert_eq!(path, PathBuf::from("/tmp/custom.sqlite3"));
        assert!(default.ends_with("translate-shell/cache.sqlite3"));
    }

    #[test]
    fn test_home_dir() {
        let dir = home_dir().unwrap();
        assert!(dir.is_absolute());
    }

    #[test]
    fn test_user_dirs_are_absolute() {
        assert!(user_config_dir().unwrap().is_absolute());
        assert!(user_data_dir().unwrap().is_absolute());
    }
}
