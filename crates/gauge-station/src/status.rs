//! Device status snapshot

use serde::{Deserialize, Serialize};

/// Port field value when a device was not found
pub const NOT_FOUND: &str = "not found";

/// Connection state of both devices and the latest readings
///
/// Field names are the JSON names status consumers rely on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStatus {
    pub arduino_connected: bool,
    pub arduino_port: String,
    pub scale_connected: bool,
    pub scale_port: String,
    /// Grams
    pub last_weight: u32,
    /// Last result string, `weight:length:width:height` or `weight`
    pub last_dimensions: String,
}

impl DeviceStatus {
    pub fn set_sensor(&mut self, port: Option<&str>) {
        self.arduino_connected = port.is_some();
        self.arduino_port = port.unwrap_or(NOT_FOUND).to_string();
    }

    pub fn set_scale(&mut self, port: Option<&str>) {
        self.scale_connected = port.is_some();
        self.scale_port = port.unwrap_or(NOT_FOUND).to_string();
    }

    /// One-line summary for the console
    pub fn summary(&self) -> String {
        format!(
            "Sensor: {} ({}), Scale: {} ({})",
            connection_word(self.arduino_connected),
            self.arduino_port,
            connection_word(self.scale_connected),
            self.scale_port
        )
    }
}

fn connection_word(connected: bool) -> &'static str {
    if connected {
        "connected"
    } else {
        "disconnected"
    }
}

impl Default for DeviceStatus {
    fn default() -> Self {
        Self {
            arduino_connected: false,
            arduino_port: NOT_FOUND.to_string(),
            scale_connected: false,
            scale_port: NOT_FOUND.to_string(),
            last_weight: 0,
            last_dimensions: String::new(),
        }
    }
}
