//! Operator settings
//!
//! Settings live in an optional YAML file (default `~/.pcsctl/config`). Every
//! field has a default, so an absent default file is not an error.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gateway::PushScope;

/// Default number of seconds to wait for a resource state
pub const DEFAULT_WAIT_TIMEOUT_SECS: u64 = 60;

/// Default number of seconds between two status checks
pub const DEFAULT_WAIT_SLEEP_SECS: u64 = 2;

/// Default config file location: ~/.pcsctl/config
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".pcsctl")
        .join("config")
}

/// Errors for loading the settings file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read config: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(String),
}

/// Locations of the cluster command-line tools
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolPaths {
    #[serde(default = "default_pcs")]
    pub pcs: String,
    #[serde(default = "default_crm_mon")]
    pub crm_mon: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            pcs: default_pcs(),
            crm_mon: default_crm_mon(),
        }
    }
}

fn default_pcs() -> String {
    "pcs".to_string()
}

fn default_crm_mon() -> String {
    "crm_mon".to_string()
}

/// Defaults for `wait-for` when not given on the command line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitDefaults {
    #[serde(default)]
    pub delay: u64,
    #[serde(default = "default_wait_timeout")]
    pub timeout: u64,
    #[serde(default = "default_wait_sleep")]
    pub sleep: u64,
}

impl Default for WaitDefaults {
    fn default() -> Self {
        Self {
            delay: 0,
            timeout: DEFAULT_WAIT_TIMEOUT_SECS,
            sleep: DEFAULT_WAIT_SLEEP_SECS,
        }
    }
}

fn default_wait_timeout() -> u64 {
    DEFAULT_WAIT_TIMEOUT_SECS
}

fn default_wait_sleep() -> u64 {
    DEFAULT_WAIT_SLEEP_SECS
}

/// The complete settings file structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub tools: ToolPaths,

    /// Push scope for non-multistate resources when `--force-resource-update`
    /// is not given. Multistate resources always default to `resources`.
    #[serde(default)]
    pub primitive_push_scope: PushScope,

    #[serde(default)]
    pub wait: WaitDefaults,
}

// ============================================================================
// SBIO: Pure business logic (no I/O)
// ============================================================================

/// Parse settings from YAML
pub fn parse_settings(content: &str) -> Result<Settings, ConfigError> {
    if content.trim().is_empty() {
        return Ok(Settings::default());
    }
    let mut settings: Settings =
        serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    settings.tools.pcs = expand_path(&settings.tools.pcs);
    settings.tools.crm_mon = expand_path(&settings.tools.crm_mon);
    Ok(settings)
}

/// Expand `~` and environment variables in a user supplied path. Input that
/// cannot be expanded is returned as-is.
pub fn expand_path(raw: &str) -> String {
    shellexpand::full(raw)
        .map(|expanded| expanded.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

// ============================================================================
// SBIO: I/O wrapper
// ============================================================================

/// Load settings from an explicit path, or from the default location if it
/// exists.
pub fn load_settings(path: Option<&Path>) -> Result<Settings, ConfigError> {
    let (path, required) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => (default_config_path(), false),
    };

    if !path.exists() {
        return if required {
            Err(ConfigError::NotFound(path))
        } else {
            Ok(Settings::default())
        };
    }

    let content = std::fs::read_to_string(&path)?;
    parse_settings(&content)
}
