//! Configuration file support for lego-console.
//!
//! Loads optional `<config dir>/lego-console/config.toml`. Every field has a
//! default; command-line flags override what the file says.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::types::ColorMode;

pub const DEFAULT_HISTORY_SIZE: usize = 1000;
pub const DEFAULT_MAX_SLOTS: usize = 10;
pub const DEFAULT_EDITOR: &str = "vim";

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Connect on startup, prompting when several ports are present.
    pub auto_connect: bool,
    pub history_file: Option<PathBuf>,
    pub history_size: usize,
    /// Fallback editor when `EDITOR` is unset.
    pub editor: Option<String>,
    pub max_slots: usize,
    pub color: ColorMode,
    /// Remote files that must never be overwritten or removed.
    pub protected_paths: Vec<String>,
    /// Remote directories whose contents are protected.
    pub protected_dirs: Vec<String>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            auto_connect: true,
            history_file: default_history_file(),
            history_size: DEFAULT_HISTORY_SIZE,
            editor: None,
            max_slots: DEFAULT_MAX_SLOTS,
            color: ColorMode::Auto,
            protected_paths: [
                "/boot.py",
                "/main.py",
                "/hub_runtime.mpy",
                "/local_name.txt",
                "/version.py",
                "/projects/.slots",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            protected_dirs: ["/runtime", "/spike", "/mindstorms", "/system", "/util"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

fn default_history_file() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".lego_console_history"))
}

/// Default location of the configuration file.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("lego-console").join("config.toml"))
}

impl ConsoleConfig {
    /// Load config from the default location.
    /// Returns default config if file doesn't exist or is invalid.
    pub fn load() -> Self {
        match default_config_path() {
            Some(path) => Self::load_from_path(&path),
            None => Self::default(),
        }
    }

    /// Load config from a specific path.
    pub fn load_from_path(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Editor for the edit-in-place workflow: `EDITOR`, then config, then vim.
    pub fn editor(&self) -> String {
        std::env::var("EDITOR")
            .ok()
            .filter(|e| !e.trim().is_empty())
            .or_else(|| self.editor.clone())
            .unwrap_or_else(|| DEFAULT_EDITOR.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = ConsoleConfig::default();
        assert!(config.auto_connect);
        assert_eq!(config.history_size, DEFAULT_HISTORY_SIZE);
        assert_eq!(config.max_slots, DEFAULT_MAX_SLOTS);
        assert!(config.protected_paths.contains(&"/projects/.slots".to_string()));
    }

    #[test]
    fn test_load_missing_file() {
        let temp = TempDir::new().expect("temp dir");
        let config = ConsoleConfig::load_from_path(&temp.path().join("config.toml"));
        assert_eq!(config.max_slots, DEFAULT_MAX_SLOTS);
    }

    #[test]
    fn test_load_valid_config() {
        let temp = TempDir::new().expect("temp dir");
        let config_path = temp.path().join("config.toml");
        let mut file = std::fs::File::create(&config_path).expect("create config");
        writeln!(
            file,
            r#"
auto_connect = false
history_size = 50
editor = "nano"
max_slots = 20
color = "never"
protected_paths = ["/keep.py"]
"#
        )
        .expect("write config");

        let config = ConsoleConfig::load_from_path(&config_path);
        assert!(!config.auto_connect);
        assert_eq!(config.history_size, 50);
        assert_eq!(config.editor.as_deref(), Some("nano"));
        assert_eq!(config.max_slots, 20);
        assert_eq!(config.color, ColorMode::Never);
        assert_eq!(config.protected_paths, vec!["/keep.py".to_string()]);
        // untouched fields keep their defaults
        assert!(!config.protected_dirs.is_empty());
    }

    #[test]
    fn test_load_invalid_config_falls_back() {
        let temp = TempDir::new().expect("temp dir");
        let config_path = temp.path().join("config.toml");
        std::fs::write(&config_path, "history_size = \"lots\"").expect("write config");

        let config = ConsoleConfig::load_from_path(&config_path);
        assert_eq!(config.history_size, DEFAULT_HISTORY_SIZE);
    }
}
