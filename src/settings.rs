use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

const SETTINGS_FILE: &str = "settings.json";
const APP_DIR: &str = "tarkov-presence";

const DEFAULT_EXE_PATH: &str = r"C:\Battlestate Games\EFT (live)\EscapeFromTarkov.exe";

/// Seconds between liveness re-probes while a session is active.
const DEFAULT_POLL_INTERVAL_SECS: u64 = 15;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    /// Full path to the game executable; the log directory is derived from it.
    pub exe_path: PathBuf,
    #[serde(default = "default_true")]
    pub is_enabled: bool,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            exe_path: PathBuf::from(DEFAULT_EXE_PATH),
            is_enabled: true,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
        }
    }
}

impl AppSettings {
    /// Directory the game writes its logs to, next to the executable.
    pub fn logs_dir(&self) -> PathBuf {
        self.exe_path
            .parent()
            .map_or_else(|| PathBuf::from("Logs"), |dir| dir.join("Logs"))
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("no config directory available on this platform")]
    NoConfigDir,

    #[error("failed to access settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] serde_json::Error),
}

fn settings_path() -> Result<PathBuf, SettingsError> {
    let dir = dirs::config_dir()
        .ok_or(SettingsError::NoConfigDir)?
        .join(APP_DIR);
    fs::create_dir_all(&dir)?;
    Ok(dir.join(SETTINGS_FILE))
}

pub fn load_settings() -> Result<AppSettings, SettingsError> {
    tracing::debug!("Loading settings");
    load_from(&settings_path()?)
}

pub fn save_settings(settings: &AppSettings) -> Result<(), SettingsError> {
    tracing::debug!("Saving settings");
    save_to(&settings_path()?, settings)
}

fn load_from(path: &Path) -> Result<AppSettings, SettingsError> {
    if !path.exists() {
        return Ok(AppSettings::default());
    }

    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(error) => {
            tracing::warn!("Failed to read settings file, using defaults: {}", error);
            return Ok(AppSettings::default());
        }
    };

    if contents.trim().is_empty() {
        tracing::warn!("Settings file is empty, using defaults");
        return Ok(AppSettings::default());
    }

    match serde_json::from_str(&contents) {
        Ok(settings) => Ok(settings),
        Err(error) => {
            tracing::warn!("Failed to parse settings file, using defaults: {}", error);
            Ok(AppSettings::default())
        }
    }
}

fn save_to(path: &Path, settings: &AppSettings) -> Result<(), SettingsError> {
    let contents = serde_json::to_string_pretty(settings)?;
    fs::write(path, contents)?;
    Ok(())
}
