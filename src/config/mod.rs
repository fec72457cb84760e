//! User settings.
//!
//! [`Settings`] are read from an optional JSON file and then overridden by
//! environment variables. The poller reloads them every cycle and applies
//! changes live.
mod error;

use std::path::{Path, PathBuf};
use std::time::Duration;

pub use error::{Error, Result};

use crate::engine::{Endpoint, default_candidates};

/// Environment variable naming the settings file.
pub const SETTINGS_PATH_ENV: &str = "DOCKWATCH_SETTINGS";
pub const DEFAULT_SETTINGS_PATH: &str = "settings.json";

/// Environment variable with the listen address of the status API.
pub const API_ADDR_ENV: &str = "DOCKWATCH_API_ADDR";
pub const DEFAULT_API_ADDR: &str = "127.0.0.1:3000";

/// Environment variable naming the persisted alert log.
pub const ALERT_LOG_ENV: &str = "DOCKWATCH_ALERT_LOG";
pub const DEFAULT_ALERT_LOG_PATH: &str = "alerts.json";

const ENGINE_API_URL_ENV: &str = "ENGINE_API_URL";
const REFRESH_INTERVAL_ENV: &str = "REFRESH_INTERVAL_SECONDS";
const SHOW_NOTIFICATIONS_ENV: &str = "SHOW_NOTIFICATIONS";

pub const DEFAULT_ENGINE_API_URL: &str = "http://localhost:2375";
pub const DEFAULT_REFRESH_INTERVAL_SECONDS: u64 = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    #[serde(alias = "dockerApiUrl")]
    pub engine_api_url: String,
    pub refresh_interval_seconds: u64,
    pub show_notifications: bool,
    pub theme: Theme,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            engine_api_url: DEFAULT_ENGINE_API_URL.to_owned(),
            refresh_interval_seconds: DEFAULT_REFRESH_INTERVAL_SECONDS,
            show_notifications: true,
            theme: Theme::default(),
        }
    }
}

impl Settings {
    /// Loads the settings file at `path` (defaults if it does not exist),
    /// applies environment overrides and validates the result.
    pub fn load(path: &Path) -> Result<Self> {
        let mut settings = Self::from_file(path)?;
        settings.apply_overrides(|name| std::env::var(name).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reads settings from a JSON file. Missing keys take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        match std::fs::read(path) {
            Ok(raw) => serde_json::from_slice(&raw).map_err(|source| Error::Parse {
                path: path.to_owned(),
                source,
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(Error::Read {
                path: path.to_owned(),
                source,
            }),
        }
    }

    /// Overrides fields from variables returned by `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENGINE_API_URL_ENV) {
            self.engine_api_url = url;
        }
        if let Some(value) = lookup(REFRESH_INTERVAL_ENV) {
            self.refresh_interval_seconds =
                value.trim().parse().map_err(|_| Error::InvalidEnv {
                    name: REFRESH_INTERVAL_ENV,
                    value: value.clone(),
                })?;
        }
        if let Some(value) = lookup(SHOW_NOTIFICATIONS_ENV) {
            self.show_notifications = parse_flag(&value).ok_or(Error::InvalidEnv {
                name: SHOW_NOTIFICATIONS_ENV,
                value,
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.refresh_interval_seconds < 1 {
            return Err(Error::InvalidRefreshInterval(self.refresh_interval_seconds));
        }
        self.engine_endpoint()?;
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_seconds.max(1))
    }

    pub fn engine_endpoint(&self) -> Result<Endpoint> {
        Ok(Endpoint::parse(&self.engine_api_url)?)
    }

    /// Ordered probe candidates, with the configured url after the local socket.
    pub fn candidates(&self) -> Result<Vec<Endpoint>> {
        Ok(default_candidates(Some(self.engine_endpoint()?)))
    }
}

/// Settings file location from [`SETTINGS_PATH_ENV`], or [`DEFAULT_SETTINGS_PATH`].
pub fn settings_path() -> PathBuf {
    env_path(SETTINGS_PATH_ENV, DEFAULT_SETTINGS_PATH)
}

/// Alert log location from [`ALERT_LOG_ENV`], or [`DEFAULT_ALERT_LOG_PATH`].
pub fn alert_log_path() -> PathBuf {
    env_path(ALERT_LOG_ENV, DEFAULT_ALERT_LOG_PATH)
}

pub fn api_addr() -> String {
    std::env::var(API_ADDR_ENV).unwrap_or_else(|_| DEFAULT_API_ADDR.to_owned())
}

fn env_path(name: &str, default: &str) -> PathBuf {
    std::env::var_os(name)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
