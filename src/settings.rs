use crate::cooldown::QUICK_ACTION_COOLDOWN_MS;
use crate::error::{AppError, AppResult};
use crate::transport::DeviceAddress;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static DEVICE_ADDRESS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,3}\.){3}\d{1,3}(:\d{1,5})?$").expect("device address pattern is valid")
});

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Saved Roku IP with optional `:port`.
    #[serde(default)]
    pub device_address: Option<String>,
    #[serde(default = "default_cooldown_ms")]
    pub quick_action_cooldown_ms: u64,
    /// Kid-mode button file; `quick_actions.json` in the app data dir when unset.
    #[serde(default)]
    pub quick_actions_path: Option<PathBuf>,
}

fn default_cooldown_ms() -> u64 {
    QUICK_ACTION_COOLDOWN_MS
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            device_address: None,
            quick_action_cooldown_ms: QUICK_ACTION_COOLDOWN_MS,
            quick_actions_path: None,
        }
    }
}

impl Settings {
    /// Validates and stores a dotted IPv4 address with an optional port.
    pub fn set_device_address(&mut self, raw: &str) -> AppResult<()> {
        let address = raw.trim();
        if address.is_empty() {
            return Err(AppError::config("Enter the Roku IP address in settings."));
        }
        if !DEVICE_ADDRESS_PATTERN.is_match(address) {
            return Err(AppError::config(format!(
                "'{}' is not a valid Roku IP address (e.g. 192.168.1.100 or 192.168.1.100:8060).",
                address
            )));
        }
        self.device_address = Some(address.to_string());
        Ok(())
    }

    /// `None` when no address is saved or the saved one no longer parses.
    pub fn device(&self) -> Option<DeviceAddress> {
        let raw = self.device_address.as_deref()?;
        match DeviceAddress::parse(raw) {
            Ok(device) => Some(device),
            Err(e) => {
                log::warn!("Ignoring saved device address '{}': {}", raw, e);
                None
            }
        }
    }

    pub fn quick_actions_file(&self, app_data_dir: &Path) -> PathBuf {
        self.quick_actions_path
            .clone()
            .unwrap_or_else(|| app_data_dir.join("quick_actions.json"))
    }
}

pub fn get_settings_file_path(app_data_dir: &Path) -> PathBuf {
    app_data_dir.join("settings.json")
}

pub fn load_settings(app_data_dir: &Path) -> AppResult<Settings> {
    let settings_file = get_settings_file_path(app_data_dir);

    if !settings_file.exists() {
        return Ok(Settings::default()); // No settings file, return defaults
    }

    let content = fs::read_to_string(&settings_file)?;
    let settings: Settings = serde_json::from_str(&content)
        .map_err(|e| AppError::config(format!("Failed to parse settings file: {}", e)))?;

    Ok(settings)
}

pub fn save_settings(app_data_dir: &Path, settings: &Settings) -> AppResult<()> {
    // Create directory if it doesn't exist
    if !app_data_dir.exists() {
        fs::create_dir_all(app_data_dir)?;
    }

    let settings_file = get_settings_file_path(app_data_dir);
    let settings_json = serde_json::to_string_pretty(settings)?;
    fs::write(&settings_file, settings_json)?;

    Ok(())
}
