//! TOML-based application configuration.
//!
//! Stores the tunable limits applied by the challenge services:
//! - Per-day cap on routine instances (custom additions included)
//! - Maximum lengths for routine names and challenge titles
//!
//! Configuration is stored at `~/.config/habitroom/config.toml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::{ConfigError, Result};

/// Limits enforced at the service boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Routine instances allowed on any one day.
    #[serde(default = "default_max_daily_routine_count")]
    pub max_daily_routine_count: u32,
    #[serde(default = "default_max_routine_name_len")]
    pub max_routine_name_len: usize,
    #[serde(default = "default_max_title_len")]
    pub max_title_len: usize,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/habitroom/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub limits: LimitsConfig,
}

// Default functions
fn default_max_daily_routine_count() -> u32 {
    5
}
fn default_max_routine_name_len() -> usize {
    30
}
fn default_max_title_len() -> usize {
    50
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_daily_routine_count: default_max_daily_routine_count(),
            max_routine_name_len: default_max_routine_name_len(),
            max_title_len: default_max_title_len(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn path() -> Result<PathBuf> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk or return default.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path()?)
    }

    /// Load from `path`, writing defaults there if the file is missing.
    pub fn load_from(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(err) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: err.to_string(),
            }
            .into()),
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Reject limits no challenge could satisfy.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.max_daily_routine_count == 0 {
            return Err(ConfigError::InvalidValue {
                key: "limits.max_daily_routine_count".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.limits.max_routine_name_len == 0 || self.limits.max_title_len == 0 {
            return Err(ConfigError::InvalidValue {
                key: "limits".to_string(),
                message: "length limits must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a numeric config value by dot-separated key.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value is not a
    /// positive integer.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let parsed: u64 = value.parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("cannot parse '{value}' as a number"),
        })?;
        let too_large = || ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{value} is too large"),
        };

        let mut next = self.clone();
        match key {
            "limits.max_daily_routine_count" => {
                next.limits.max_daily_routine_count =
                    u32::try_from(parsed).map_err(|_| too_large())?;
            }
            "limits.max_routine_name_len" => {
                next.limits.max_routine_name_len =
                    usize::try_from(parsed).map_err(|_| too_large())?;
            }
            "limits.max_title_len" => {
                next.limits.max_title_len = usize::try_from(parsed).map_err(|_| too_large())?;
            }
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        next.validate()?;
        *self = next;
        Ok(())
    }
}
