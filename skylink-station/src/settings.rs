//! Station settings file

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use skylink_relay::RelayConfig;

/// Everything the `run` command reads from disk
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Settings {
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub status: StatusSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusSettings {
    /// Seconds between status log lines, 0 to disable
    #[serde(default = "default_status_interval")]
    pub interval_secs: u64,
}

fn default_status_interval() -> u64 {
    10
}

impl Default for StatusSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_status_interval(),
        }
    }
}

impl Settings {
    /// Config directory for skylink
    ///
    /// Uses `$XDG_CONFIG_HOME/skylink` when set, the platform config
    /// directory otherwise.
    fn config_dir() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_config);
            if path.is_absolute() {
                return Some(path.join("skylink"));
            }
        }
        dirs::config_dir().map(|d| d.join("skylink"))
    }

    /// Default settings file path
    pub fn default_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("settings.json"))
    }

    /// Read settings, writing the defaults first if the file does not exist
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if !path.exists() {
            let settings = Settings::default();
            settings.save(path)?;
            tracing::info!("Created default settings at {}", path.display());
            return Ok(settings);
        }

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings from {}", path.display()))?;
        let settings: Settings = serde_json::from_str(&text)
            .with_context(|| format!("invalid settings in {}", path.display()))?;
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("failed to serialize settings")?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write settings to {}", path.display()))?;
        Ok(())
    }
}
