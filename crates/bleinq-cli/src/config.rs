//! Configuration file management.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bleinq_types::Timeout;
use serde::{Deserialize, Serialize};

/// Overrides the config file location.
pub const CONFIG_ENV: &str = "BLEINQ_CONFIG";

/// Configuration file structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Default device address
    #[serde(default)]
    pub device: Option<String>,

    /// Scan timeout in seconds
    #[serde(default)]
    pub scan_timeout: Option<u64>,

    /// Read timeout in seconds
    #[serde(default)]
    pub read_timeout: Option<u64>,

    /// Device aliases (friendly name -> device address)
    #[serde(default)]
    pub aliases: HashMap<String, String>,

    /// Custom display names (device address -> name)
    #[serde(default)]
    pub names: HashMap<String, String>,
}

impl Config {
    /// Get the config file path
    pub fn path() -> PathBuf {
        if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
            return PathBuf::from(path);
        }
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("bleinq")
            .join("config.toml")
    }

    /// Load config from file, or return default if not found
    pub fn load() -> Self {
        Self::load_from(&Self::path())
    }

    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        eprintln!("Warning: Failed to parse config: {}", e);
                    }
                },
                Err(e) => {
                    eprintln!("Warning: Failed to read config: {}", e);
                }
            }
        }
        Self::default()
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }
}

/// Resolve device from arg, env var, or config.
/// Also resolves aliases: if the device matches an alias name, returns the address.
pub fn resolve_device(device: Option<String>, config: &Config) -> Option<String> {
    device
        .map(|d| resolve_alias(&d, config))
        .or_else(|| config.device.as_deref().map(|d| resolve_alias(d, config)))
}

/// Resolve an alias to its device address, or return the original if not an alias.
pub fn resolve_alias(device: &str, config: &Config) -> String {
    config
        .aliases
        .get(device)
        .cloned()
        .unwrap_or_else(|| device.to_string())
}

/// Print alias resolution feedback if the user is not in quiet mode.
pub fn print_alias_feedback(original: &str, resolved: &str, quiet: bool) {
    if !quiet && original != resolved {
        eprintln!("Using device '{}' -> {}", original, resolved);
    }
}

/// Resolve a timeout: explicit flag, then config, then the built-in default.
pub fn resolve_timeout(flag: Option<u64>, config: Option<u64>, default: Timeout) -> Timeout {
    flag.or(config).map(Timeout::secs).unwrap_or(default)
}
