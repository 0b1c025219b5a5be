//! Settings persistence
//!
//! A flat JSON object on disk. Loading never fails: a missing or malformed
//! file yields the defaults, and each field that is absent or invalid falls
//! back to its own default independently of the others.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::engine::{parse_rate, ActionConfig, ActionKind, ClickLocation, MouseButton, DEFAULT_RATE};
use crate::hotkey::{is_action_key, parse_key, DEFAULT_ACTION_KEY, DEFAULT_TOGGLE_KEY};

/// Stored value of the informational delay field
pub const DEFAULT_DELAY: &str = "0.001";

/// Snapshot of the action configuration and toggle key as stored on disk
///
/// Every field deserializes leniently: a missing or invalid value becomes
/// that field's default without affecting the others.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsRecord {
    #[serde(deserialize_with = "word")]
    pub action_type: ActionKind,
    #[serde(deserialize_with = "word")]
    pub mouse_button: MouseButton,
    #[serde(deserialize_with = "action_key")]
    pub keyboard_key: String,
    /// Rate as typed by the user
    #[serde(deserialize_with = "rate_text")]
    pub cps: String,
    /// Kept for the file format only; the loop derives its delay from `cps`
    #[serde(deserialize_with = "delay_text")]
    pub delay: String,
    #[serde(deserialize_with = "flag")]
    pub randomize: bool,
    #[serde(deserialize_with = "word")]
    pub click_location: ClickLocation,
    #[serde(deserialize_with = "toggle_key")]
    pub toggle_key: String,
}

impl Default for SettingsRecord {
    fn default() -> Self {
        Self {
            action_type: ActionKind::Mouse,
            mouse_button: MouseButton::Left,
            keyboard_key: DEFAULT_ACTION_KEY.to_string(),
            cps: DEFAULT_RATE.to_string(),
            delay: DEFAULT_DELAY.to_string(),
            randomize: false,
            click_location: ClickLocation::Current,
            toggle_key: DEFAULT_TOGGLE_KEY.to_string(),
        }
    }
}

impl SettingsRecord {
    /// Build a record from parsed JSON, defaulting field by field
    pub fn from_json(value: &Value) -> Self {
        Self::deserialize(value).unwrap_or_else(|e| {
            warn!(%e, "settings are not a JSON object, using defaults");
            Self::default()
        })
    }

    /// Record describing the given live configuration
    pub fn snapshot(config: &ActionConfig, toggle_key: &str, delay: &str) -> Self {
        Self {
            action_type: config.action_kind,
            mouse_button: config.mouse_button,
            keyboard_key: config.key_symbol.clone(),
            cps: config.rate_per_second.to_string(),
            delay: delay.to_string(),
            randomize: config.randomize,
            click_location: config.click_location,
            toggle_key: toggle_key.to_string(),
        }
    }

    /// The action configuration this record describes
    pub fn action_config(&self) -> ActionConfig {
        ActionConfig {
            action_kind: self.action_type,
            mouse_button: self.mouse_button,
            key_symbol: self.keyboard_key.clone(),
            rate_per_second: parse_rate(&self.cps).unwrap_or(DEFAULT_RATE),
            randomize: self.randomize,
            click_location: self.click_location,
        }
    }
}

/// Any JSON value; the field helpers below decide what to keep
fn raw<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Value, D::Error> {
    Value::deserialize(deserializer)
}

fn fallback<T>(value: &Value, default: T) -> T {
    warn!(%value, "invalid setting, using default");
    default
}

fn word<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + Default,
{
    let value = raw(deserializer)?;
    Ok(match value.as_str().and_then(|text| text.parse().ok()) {
        Some(parsed) => parsed,
        None => fallback(&value, T::default()),
    })
}

fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let value = raw(deserializer)?;
    Ok(value.as_bool().unwrap_or_else(|| fallback(&value, false)))
}

fn action_key<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = raw(deserializer)?;
    Ok(match value.as_str() {
        Some(name) if is_action_key(name) => name.to_string(),
        _ => fallback(&value, DEFAULT_ACTION_KEY.to_string()),
    })
}

fn toggle_key<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = raw(deserializer)?;
    Ok(match value.as_str() {
        Some(name) if parse_key(name).is_some() => name.to_string(),
        _ => fallback(&value, DEFAULT_TOGGLE_KEY.to_string()),
    })
}

fn rate_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = raw(deserializer)?;
    Ok(number_text(&value).unwrap_or_else(|| fallback(&value, DEFAULT_RATE.to_string())))
}

fn delay_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = raw(deserializer)?;
    Ok(number_text(&value).unwrap_or_else(|| fallback(&value, DEFAULT_DELAY.to_string())))
}

/// Numbers are stored as strings but plain JSON numbers are accepted too
fn number_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Errors that can occur while saving settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to encode settings: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to write settings to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Reads and writes the settings file
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load settings, falling back to defaults on any problem
    pub fn load(&self) -> SettingsRecord {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = ?self.path, "no settings file, using defaults");
                return SettingsRecord::default();
            }
            Err(e) => {
                warn!(path = ?self.path, %e, "failed to read settings, using defaults");
                return SettingsRecord::default();
            }
        };

        match serde_json::from_str::<Value>(&text) {
            Ok(value) => {
                let record = SettingsRecord::from_json(&value);
                info!(path = ?self.path, "settings loaded");
                record
            }
            Err(e) => {
                warn!(path = ?self.path, %e, "malformed settings file, using defaults");
                SettingsRecord::default()
            }
        }
    }

    pub fn save(&self, record: &SettingsRecord) -> Result<(), SettingsError> {
        let json = serde_json::to_string_pretty(record)?;
        std::fs::write(&self.path, json).map_err(|source| SettingsError::Write {
            path: self.path.clone(),
            source,
        })?;
        debug!(path = ?self.path, "settings saved");
        Ok(())
    }
}
