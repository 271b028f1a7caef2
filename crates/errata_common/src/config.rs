//! Errata Configuration
//!
//! Config file: ~/.config/errata/config.toml or /etc/errata/config.toml

use crate::aggregator::AggregatorSettings;
use crate::store::DbLocation;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment override for developer mode
pub const DEVELOPER_MODE_ENV: &str = "ERRATA_DEVELOPER_MODE";

/// Developer settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevConfig {
    /// Do not persist error reports (local development)
    /// Can also be enabled via ERRATA_DEVELOPER_MODE=1
    #[serde(default)]
    pub developer_mode: bool,
}

impl DevConfig {
    /// Check if developer mode is enabled (config or env)
    pub fn is_developer_mode(&self) -> bool {
        self.developer_mode
            || std::env::var(DEVELOPER_MODE_ENV)
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false)
    }
}

/// Storage settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database file; defaults to the system or user data directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrataConfig {
    #[serde(default)]
    pub dev: DevConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

impl ErrataConfig {
    /// Get default user config path: ~/.config/errata/config.toml
    pub fn user_config_path() -> Result<PathBuf> {
        let config_dir = if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            PathBuf::from(xdg_config)
        } else {
            let home = std::env::var("HOME").context("Cannot determine home directory")?;
            Path::new(&home).join(".config")
        };

        Ok(config_dir.join("errata").join("config.toml"))
    }

    /// Get system config path: /etc/errata/config.toml
    pub fn system_config_path() -> PathBuf {
        PathBuf::from("/etc/errata/config.toml")
    }

    /// Load configuration
    ///
    /// Priority:
    /// 1. User config (~/.config/errata/config.toml)
    /// 2. System config (/etc/errata/config.toml)
    /// 3. Defaults
    pub fn load() -> Result<Self> {
        if let Ok(user_path) = Self::user_config_path() {
            if user_path.exists() {
                return Self::load_from(&user_path);
            }
        }

        let system_path = Self::system_config_path();
        if system_path.exists() {
            return Self::load_from(&system_path);
        }

        Ok(Self::default())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Save configuration to the user config file
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::user_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let toml_string =
            toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        fs::write(path, toml_string).with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Set a value by dotted key, e.g. `dev.developer_mode=true`
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        match key.trim() {
            "dev.developer_mode" => {
                self.dev.developer_mode = match value.trim().to_lowercase().as_str() {
                    "on" | "yes" | "true" | "1" => true,
                    "off" | "no" | "false" | "0" => false,
                    _ => anyhow::bail!(
                        "Invalid value for dev.developer_mode: '{}'. Valid values: true, false",
                        value
                    ),
                };
            }
            "storage.path" => {
                let value = value.trim();
                self.storage.path = if value.is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                };
            }
            other => anyhow::bail!(
                "Unknown configuration key: '{}'. Valid keys: dev.developer_mode, storage.path",
                other
            ),
        }
        Ok(())
    }

    pub fn db_location(&self) -> DbLocation {
        match self.storage.path {
            Some(ref path) => DbLocation::Custom(path.clone()),
            None => DbLocation::auto_detect(),
        }
    }

    pub fn aggregator_settings(&self) -> AggregatorSettings {
        AggregatorSettings {
            developer_mode: self.dev.is_developer_mode(),
            ..AggregatorSettings::default()
        }
    }
}
