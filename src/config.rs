//! Configuration loading and management

use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Environment variable overriding the settings file location
pub const SETTINGS_ENV: &str = "RAPIDFIRE_SETTINGS";

/// Settings file name used when no override is given
pub const DEFAULT_SETTINGS_FILE: &str = "autoclicker_settings.json";

/// Process configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path of the JSON settings file
    pub settings_path: PathBuf,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        Ok(Self {
            settings_path: settings_path(std::env::var_os(SETTINGS_ENV))?,
        })
    }
}

fn settings_path(from_env: Option<OsString>) -> Result<PathBuf> {
    match from_env {
        Some(path) if !path.is_empty() => Ok(PathBuf::from(path)),
        _ => Ok(std::env::current_dir()
            .context("failed to resolve working directory")?
            .join(DEFAULT_SETTINGS_FILE)),
    }
}
