//! Shell configuration: built-in defaults with an optional TOML overlay.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG: &str = include_str!("../config.default.toml");

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    pub shell: ShellSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ShellSettings {
    /// Text shown before every input line.
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingSettings {
    /// `tracing_subscriber::EnvFilter` directives.
    pub filter: String,
}

/// A user file: every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct Overlay {
    #[serde(default)]
    shell: ShellOverlay,
    #[serde(default)]
    logging: LoggingOverlay,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ShellOverlay {
    prompt: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct LoggingOverlay {
    filter: Option<String>,
}

impl Config {
    /// Configuration compiled into the binary.
    pub fn default_config() -> Result<Config> {
        toml::from_str(DEFAULT_CONFIG).context("built-in configuration is invalid")
    }

    /// Defaults overlaid with `~/.config/tinysh/config.toml` when that file exists.
    pub fn load() -> Result<Config> {
        match user_config_path() {
            Some(path) if path.is_file() => Self::load_from(&path),
            _ => Self::default_config(),
        }
    }

    /// Defaults overlaid with the file at `path`, which must exist.
    pub fn load_from(path: &Path) -> Result<Config> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        let mut config = Self::default_config()?;
        config.apply(&text).with_context(|| format!("{}", path.display()))?;
        Ok(config)
    }

    fn apply(&mut self, text: &str) -> Result<()> {
        let overlay: Overlay = toml::from_str(text)?;
        if let Some(prompt) = overlay.shell.prompt {
            self.shell.prompt = prompt;
        }
        if let Some(filter) = overlay.logging.filter {
            self.logging.filter = filter;
        }
        Ok(())
    }
}

fn user_config_path() -> Option<PathBuf> {
    let home = std::env::var_os("HOME")?;
    Some(PathBuf::from(home).join(".config").join("tinysh").join("config.toml"))
}
