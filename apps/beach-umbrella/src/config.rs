//! Client configuration: built-in defaults, then `~/.umbrella/config.toml`
//! (or `--config`), then `UMBRELLA_*` environment variables, then CLI flags.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use directories::BaseDirs;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::screen::DEFAULT_HISTORY_BUDGET;
use crate::surface::TerminalSize;

pub const DEFAULT_BACKEND_URL: &str = "ws://127.0.0.1:8765/term";
pub const DEFAULT_SCROLL_LINES: u16 = 5;

pub const BACKEND_URL_ENV: &str = "UMBRELLA_BACKEND_URL";
pub const HISTORY_BUDGET_ENV: &str = "UMBRELLA_HISTORY_BUDGET";
pub const SCROLL_LINES_ENV: &str = "UMBRELLA_SCROLL_LINES";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("unable to determine home directory")]
    HomeDirUnavailable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub backend_url: String,
    /// Scrollback budget in surface extent units.
    pub history_budget: u32,
    /// Rows scrolled per mouse wheel notch.
    pub scroll_lines: u16,
    /// Grid size assumed until the first measurement.
    pub initial_size: TerminalSize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            history_budget: DEFAULT_HISTORY_BUDGET,
            scroll_lines: DEFAULT_SCROLL_LINES,
            initial_size: TerminalSize::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    backend_url: Option<String>,
    history_budget: Option<u32>,
    scroll_lines: Option<u16>,
    initial_lines: Option<u16>,
    initial_cols: Option<u16>,
}

impl Config {
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let base = BaseDirs::new().ok_or(ConfigError::HomeDirUnavailable)?;
        Ok(base.home_dir().join(".umbrella").join("config.toml"))
    }

    /// Defaults, then the config file, then the environment. An explicit
    /// path must exist; the default path is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Config::default();
        match explicit {
            Some(path) => config.merge_file(path)?,
            None => match Self::default_path() {
                Ok(path) if path.exists() => config.merge_file(&path)?,
                Ok(_) => {}
                Err(err) => debug!(target: "umbrella::config", error = %err, "skipping config file"),
            },
        }
        config.merge_env(|key| env::var(key).ok());
        Ok(config)
    }

    fn merge_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file: ConfigFile = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(target: "umbrella::config", path = %path.display(), "loaded config file");
        self.merge(file);
        Ok(())
    }

    fn merge(&mut self, file: ConfigFile) {
        if let Some(url) = file.backend_url {
            self.backend_url = url;
        }
        if let Some(budget) = file.history_budget {
            self.history_budget = budget;
        }
        if let Some(lines) = file.scroll_lines {
            self.scroll_lines = lines;
        }
        if let Some(lines) = file.initial_lines {
            self.initial_size.lines = lines.max(1);
        }
        if let Some(cols) = file.initial_cols {
            self.initial_size.cols = cols.max(1);
        }
    }

    /// Applies `UMBRELLA_*` overrides read through `lookup`. Unparseable
    /// values are logged and ignored.
    pub fn merge_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(BACKEND_URL_ENV).filter(|url| !url.trim().is_empty()) {
            self.backend_url = url;
        }
        if let Some(budget) = parse_env(&lookup, HISTORY_BUDGET_ENV) {
            self.history_budget = budget;
        }
        if let Some(lines) = parse_env(&lookup, SCROLL_LINES_ENV) {
            self.scroll_lines = lines;
        }
    }

    /// CLI flags win over everything else.
    pub fn with_overrides(mut self, backend: Option<String>, history_budget: Option<u32>) -> Self {
        if let Some(url) = backend {
            self.backend_url = url;
        }
        if let Some(budget) = history_budget {
            self.history_budget = budget;
        }
        self
    }
}

fn parse_env<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(target: "umbrella::config", key, value = %raw, "ignoring unparseable environment override");
            None
        }
    }
}
