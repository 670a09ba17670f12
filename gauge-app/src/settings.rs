//! Application settings

use std::path::{Path, PathBuf};

use gauge_station::{LoopTiming, StationConfig};
use serde::{Deserialize, Serialize};
use tracing::Level;

use crate::broadcast_layer::parse_level;

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Discovery, probe and device timing plus pinned ports
    pub station: StationConfig,
    /// Measurement loop delays
    pub measure_loop: LoopTiming,
    /// Minimum weight change in grams that counts as a new object
    pub weight_threshold: u32,
    /// Ports whose names contain any of these are never probed
    pub skip_patterns: Vec<String>,
    /// Queue length of each log subscriber
    pub log_capacity: usize,
    /// Initial level of the console log feed (`off`, `error`, ... `trace`)
    pub console_log_level: String,
    /// Append every result to this file as well
    pub result_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            station: StationConfig::default(),
            measure_loop: LoopTiming::default(),
            weight_threshold: 1,
            skip_patterns: vec!["Bluetooth".to_string(), "debug".to_string()],
            log_capacity: 100,
            console_log_level: "off".to_string(),
            result_file: None,
        }
    }
}

impl Settings {
    /// Get the XDG config directory for gauge
    /// Uses $XDG_CONFIG_HOME/gauge on Linux/macOS, falls back to ~/.config/gauge
    fn config_dir() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_config);
            if path.is_absolute() {
                return Some(path.join("gauge"));
            }
        }

        dirs::home_dir().map(|h| h.join(".config").join("gauge"))
    }

    /// Get the settings file path
    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("settings.json"))
    }

    /// Load settings from disk; missing or unreadable files give defaults
    pub fn load() -> Self {
        Self::settings_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    pub fn load_from(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    /// Save settings to disk
    pub fn save(&self) -> Result<(), String> {
        let path =
            Self::settings_path().ok_or_else(|| "Could not determine settings path".to_string())?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create settings directory: {}", e))?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;

        std::fs::write(path, json).map_err(|e| format!("Failed to write settings: {}", e))?;

        Ok(())
    }

    /// Console log level; an unknown name means off
    pub fn console_level(&self) -> Option<Level> {
        parse_level(&self.console_log_level).flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("gauge-settings-{}-{}", std::process::id(), name))
            .join("settings.json")
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.station.discovery.scale.max_retries, 2);
        assert_eq!(settings.station.discovery.deadline, Duration::from_secs(30));
        assert_eq!(settings.weight_threshold, 1);
        assert_eq!(settings.log_capacity, 100);
        assert_eq!(settings.console_level(), None);
    }

    #[test]
    fn test_save_and_load() {
        let path = temp_path("roundtrip");
        let mut settings = Settings::default();
        settings.weight_threshold = 5;
        settings.station.scale_port = Some("/dev/ttyUSB1".to_string());
        settings.save_to(&path).unwrap();

        assert_eq!(Settings::load_from(&path), settings);
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_partial_and_corrupt_files() {
        let path = temp_path("partial");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();

        std::fs::write(&path, r#"{"weight_threshold": 20, "console_log_level": "info"}"#).unwrap();
        let settings = Settings::load_from(&path);
        assert_eq!(settings.weight_threshold, 20);
        assert_eq!(settings.console_level(), Some(Level::INFO));
        assert_eq!(settings.log_capacity, 100);

        std::fs::write(&path, "not json").unwrap();
        assert_eq!(Settings::load_from(&path), Settings::default());
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
