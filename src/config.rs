//! YAML configuration (`init.yaml`).

use crate::{DebuggerError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_CONFIG_FILE: &str = "init.yaml";
pub const DEFAULT_LISTEN: &str = "127.0.0.1:9003";
pub const DEFAULT_ACCEPT_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Prefix stripped from engine file URIs, e.g. `file:///path/to/project/`.
    pub base_path: String,
    /// Shell command that makes the engine connect back (for instance a `curl` to
    /// the app with `XDEBUG_TRIGGER` set).
    #[serde(rename = "init", skip_serializing_if = "Option::is_none")]
    pub init_command: Option<String>,
    /// `"<file relative to base_path> <line>"` entries replayed on every start.
    pub breakpoints: Vec<String>,
    pub listen: String,
    pub accept_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_path: String::new(),
            init_command: None,
            breakpoints: Vec::new(),
            listen: DEFAULT_LISTEN.to_string(),
            accept_timeout_secs: DEFAULT_ACCEPT_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Load `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(DebuggerError::ConfigError(format!(
                    "{} open. error: {}",
                    path.display(),
                    e
                )))
            }
        };

        let config = Self::from_yaml(&contents).map_err(|e| match e {
            DebuggerError::ConfigError(msg) => {
                DebuggerError::ConfigError(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })?;
        info!(path = %path.display(), breakpoints = config.breakpoints.len(), "loaded config");
        Ok(config)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(contents)
            .map_err(|e| DebuggerError::ConfigError(format!("decode error: {}", e)))
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| DebuggerError::ConfigError(e.to_string()))
    }

    pub fn accept_timeout(&self) -> Duration {
        Duration::from_secs(self.accept_timeout_secs)
    }

    /// The init command, if one is configured and non-blank.
    pub fn init_command(&self) -> Option<&str> {
        self.init_command
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    /// Engine path relative to `base_path`, or the path unchanged when it lies elsewhere.
    pub fn strip_base_path<'a>(&self, file: &'a str) -> &'a str {
        if self.base_path.is_empty() {
            return file;
        }
        file.strip_prefix(self.base_path.as_str()).unwrap_or(file)
    }
}

/// `init.yaml` in the current directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from(DEFAULT_CONFIG_FILE)
}
