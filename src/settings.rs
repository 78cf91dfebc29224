use anyhow::{anyhow, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::PathBuf,
    sync::RwLock,
    time::Duration,
};

use crate::timer::TimerConfig;

pub const API_URL_ENV: &str = "FOCUS_TIMER_API_URL";
pub const TOKEN_ENV: &str = "FOCUS_TIMER_TOKEN";
pub const DEBUG_ENV: &str = "FOCUS_TIMER_DEBUG";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
    /// Sent as the `token` cookie.
    pub token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000/api".into(),
            token: None,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimerSettings {
    pub warning_threshold_secs: Option<u64>,
    pub tick_interval_ms: u64,
    pub resync_every_ticks: Option<u32>,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            warning_threshold_secs: Some(12),
            tick_interval_ms: 1000,
            resync_every_ticks: Some(10),
        }
    }
}

impl TimerSettings {
    /// Debug mode re-derives the countdown from the wall clock on every tick.
    pub fn to_config(&self, debug: bool) -> TimerConfig {
        TimerConfig {
            tick_interval: Duration::from_millis(self.tick_interval_ms.max(1)),
            warning_threshold_secs: self.warning_threshold_secs,
            resync_every_ticks: if debug {
                Some(1)
            } else {
                self.resync_every_ticks
            },
        }
    }
}

impl From<&TimerSettings> for TimerConfig {
    fn from(settings: &TimerSettings) -> Self {
        settings.to_config(debug_enabled())
    }
}

/// `FOCUS_TIMER_DEBUG=1` or `FOCUS_TIMER_DEBUG=true`.
pub fn debug_enabled() -> bool {
    env::var(DEBUG_ENV)
        .map(|value| is_debug_value(&value))
        .unwrap_or(false)
}

fn is_debug_value(value: &str) -> bool {
    let value = value.trim();
    value == "1" || value.eq_ignore_ascii_case("true")
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub api: ApiSettings,
    pub timer: TimerSettings,
}

impl Settings {
    /// Applies `FOCUS_TIMER_API_URL` and `FOCUS_TIMER_TOKEN` on top of the file.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                self.api.base_url = url;
            }
        }
        if let Ok(token) = env::var(TOKEN_ENV) {
            self.api.token = Some(token);
        }
        self
    }
}

pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("focus-timer").join("settings.json"))
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<Settings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!(
                    "Ignoring unreadable settings at {}: {}",
                    path.display(),
                    err
                );
                Settings::default()
            })
        } else {
            Settings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn settings(&self) -> Result<Settings> {
        self.data
            .read()
            .map(|guard| guard.clone())
            .map_err(|_| anyhow!("settings lock poisoned"))
    }

    pub fn update_api(&self, api: ApiSettings) -> Result<()> {
        let mut guard = self
            .data
            .write()
            .map_err(|_| anyhow!("settings lock poisoned"))?;
        guard.api = api;
        self.persist(&guard)
    }

    fn persist(&self, data: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
