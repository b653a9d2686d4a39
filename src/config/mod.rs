//! Configuration file management
//!
//! Loads TOML configuration files and provides pipeline settings.
//! Default config path: ~/.config/seatwire/config.toml

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Application settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seat settings
    pub seat: SeatConfig,
    /// Device monitor settings
    pub monitor: MonitorConfig,
    /// Log settings
    pub log: LogConfig,
}

/// Seat settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeatConfig {
    /// Seat to bind input devices to (XDG_SEAT takes precedence, "seat0" if unset)
    pub name: Option<String>,
}

/// Device monitor settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// DRM minor whose hotplug events are reported (card0 -> 0)
    pub display_controller: u32,
}

/// Log settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter ("error", "warn", "info", "debug", "trace"); RUST_LOG overrides
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl Config {
    /// System-wide config path
    const SYSTEM_CONFIG_PATH: &'static str = "/etc/seatwire/config.toml";

    /// Get the path that would be used for loading config
    /// Returns None if using built-in defaults
    pub fn config_path() -> Option<PathBuf> {
        // 1. SEATWIRE_CONFIG environment variable
        if let Ok(path) = std::env::var("SEATWIRE_CONFIG") {
            let p = Path::new(&path);
            if p.exists() {
                return Some(p.to_path_buf());
            }
        }

        // 2. User config: ~/.config/seatwire/config.toml
        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join("seatwire").join("config.toml");
            if config_path.exists() {
                return Some(config_path);
            }
        }

        // 3. System config: /etc/seatwire/config.toml
        let system_config = Path::new(Self::SYSTEM_CONFIG_PATH);
        if system_config.exists() {
            return Some(system_config.to_path_buf());
        }

        None
    }

    /// Load configuration with priority:
    /// 1. SEATWIRE_CONFIG environment variable
    /// 2. ~/.config/seatwire/config.toml (user config)
    /// 3. /etc/seatwire/config.toml (system config)
    /// 4. Built-in defaults
    pub fn load() -> Self {
        if let Some(path) = Self::config_path() {
            match Self::load_from_file(&path) {
                Ok(config) => {
                    info!("Loaded config: {}", path.display());
                    return config;
                }
                Err(e) => {
                    warn!("{}", e);
                }
            }
        }
        info!("Using built-in default config");
        Self::default()
    }

    /// Load settings from specified path
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::parse(&content).map_err(|message| Error::Config {
            path: path.to_path_buf(),
            message,
        })
    }

    fn parse(content: &str) -> std::result::Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Seat name from the config, if one is set
    pub fn seat_name(&self) -> Option<&str> {
        self.seat.name.as_deref().filter(|s| !s.is_empty())
    }
}
