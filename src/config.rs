use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
    time::Duration,
};

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ingest::DEFAULT_EVENTS_URL;
use crate::utils;

const DEFAULT_TIMEOUT_SECS: u64 = 15;
const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_TIMEZONE: Tz = chrono_tz::Europe::Paris;
const DEFAULT_REMINDER_DELAY_SECS: u64 = 10;

const ENV_EVENTS_URL: &str = "COMPANION_EVENTS_URL";
const ENV_GEMINI_API_KEY: &str = "GEMINI_API_KEY";
const ENV_GEMINI_MODEL: &str = "GEMINI_MODEL";
const ENV_GEMINI_ENDPOINT: &str = "GEMINI_ENDPOINT";
const ENV_TIMEZONE: &str = "COMPANION_TIMEZONE";
const OVERRIDE_VARS: [&str; 5] = [
    ENV_EVENTS_URL,
    ENV_GEMINI_API_KEY,
    ENV_GEMINI_MODEL,
    ENV_GEMINI_ENDPOINT,
    ENV_TIMEZONE,
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub events_url: String,
    pub request_timeout_secs: u64,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_endpoint: String,
    pub timezone: String,
    pub reminder_delay_seconds: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            events_url: DEFAULT_EVENTS_URL.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            gemini_api_key: None,
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            gemini_endpoint: DEFAULT_GEMINI_ENDPOINT.to_string(),
            timezone: DEFAULT_TIMEZONE.name().to_string(),
            reminder_delay_seconds: DEFAULT_REMINDER_DELAY_SECS,
        }
    }
}

impl AppConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Configured zone, or Europe/Paris when the name is unknown.
    pub fn tz(&self) -> Tz {
        self.timezone.parse::<Tz>().unwrap_or_else(|_| {
            tracing::warn!("unknown timezone '{}', using {}", self.timezone, DEFAULT_TIMEZONE);
            DEFAULT_TIMEZONE
        })
    }

    pub fn gemini_key(&self) -> Option<&str> {
        self.gemini_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    /// Layers override values on top of file values; blank ones are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let present = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        if let Some(url) = present(ENV_EVENTS_URL) {
            self.events_url = url;
        }
        if let Some(key) = present(ENV_GEMINI_API_KEY) {
            self.gemini_api_key = Some(key);
        }
        if let Some(model) = present(ENV_GEMINI_MODEL) {
            self.gemini_model = model;
        }
        if let Some(endpoint) = present(ENV_GEMINI_ENDPOINT) {
            self.gemini_endpoint = endpoint;
        }
        if let Some(zone) = present(ENV_TIMEZONE) {
            self.timezone = zone;
        }
    }
}

/// Holds the file-backed config. Environment overrides are captured at load
/// and only layered on in `read`, so `update` never writes them to disk.
pub struct ConfigStore {
    path: PathBuf,
    file: Mutex<AppConfig>,
    overrides: HashMap<&'static str, String>,
}

impl ConfigStore {
    pub fn load() -> Self {
        Self::load_from(utils::config_path())
    }

    pub fn load_from(path: PathBuf) -> Self {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    pub fn load_with<F>(path: PathBuf, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let file = read_config(&path).unwrap_or_else(|err| {
            tracing::warn!("ignoring unreadable config {:?}: {err}", path);
            AppConfig::default()
        });
        let overrides = OVERRIDE_VARS
            .iter()
            .filter_map(|&key| lookup(key).map(|value| (key, value)))
            .collect();
        Self {
            path,
            file: Mutex::new(file),
            overrides,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Effective config: file values with environment overrides applied.
    pub fn read(&self) -> AppConfig {
        self.effective(&self.guard())
    }

    /// Changes and persists the file config only; returns the effective one.
    pub fn update<F>(&self, transform: F) -> Result<AppConfig, ConfigError>
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut guard = self.guard();
        let mut next = guard.clone();
        transform(&mut next);
        write_config(&self.path, &next)?;
        *guard = next;
        Ok(self.effective(&guard))
    }

    fn effective(&self, file: &AppConfig) -> AppConfig {
        let mut config = file.clone();
        config.apply_overrides(|key| self.overrides.get(key).cloned());
        config
    }

    fn guard(&self) -> MutexGuard<'_, AppConfig> {
        self.file.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn read_config(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

fn write_config(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let contents = serde_json::to_string_pretty(config)?;
    fs::write(path, contents)?;
    Ok(())
}
