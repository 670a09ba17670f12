//! Virtual dimension sensor
//!
//! Tracks the state the microcontroller firmware keeps (LED, started flag,
//! per-axis thresholds) and answers PING and GET_DIMENSIONS.

use gauge_protocol::dimension::encode_reply;
use gauge_protocol::{sensor_op, Dimensions, Threshold};
use tracing::debug;

/// Threshold value after power-up or RESET_SENSORS
pub const DEFAULT_THRESHOLD: u8 = 255;

/// Simulated dimension sensor state
#[derive(Debug, Clone)]
pub struct VirtualSensor {
    dimensions: Dimensions,
    started: bool,
    led_on: bool,
    top_max: u8,
    width_max: u8,
    length_max: u8,
    /// Set after a SET_*_MAX opcode; the next byte is its value
    pending: Option<Threshold>,
    received: Vec<u8>,
}

impl VirtualSensor {
    pub fn new(dimensions: Dimensions) -> Self {
        Self {
            dimensions,
            started: false,
            led_on: false,
            top_max: DEFAULT_THRESHOLD,
            width_max: DEFAULT_THRESHOLD,
            length_max: DEFAULT_THRESHOLD,
            pending: None,
            received: Vec::new(),
        }
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Place a new object under the sensor
    pub fn set_dimensions(&mut self, dimensions: Dimensions) {
        self.dimensions = dimensions;
    }

    pub fn started(&self) -> bool {
        self.started
    }

    pub fn led_on(&self) -> bool {
        self.led_on
    }

    pub fn threshold(&self, threshold: Threshold) -> u8 {
        match threshold {
            Threshold::Top => self.top_max,
            Threshold::Width => self.width_max,
            Threshold::Length => self.length_max,
        }
    }

    pub fn received(&self) -> &[u8] {
        &self.received
    }

    /// Handle bytes written to the sensor, returning its reply
    pub fn process(&mut self, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        for &byte in data {
            self.received.push(byte);

            if let Some(threshold) = self.pending.take() {
                self.set_threshold(threshold, byte);
                continue;
            }

            match byte {
                sensor_op::PING => out.extend_from_slice(b"OK\r\n"),
                sensor_op::GET_DIMENSIONS => out.extend(encode_reply(self.dimensions)),
                sensor_op::START => self.started = true,
                sensor_op::LED_ON => self.led_on = true,
                sensor_op::LED_OFF => self.led_on = false,
                sensor_op::RESET_SENSORS => {
                    self.top_max = DEFAULT_THRESHOLD;
                    self.width_max = DEFAULT_THRESHOLD;
                    self.length_max = DEFAULT_THRESHOLD;
                }
                op => match Threshold::from_opcode(op) {
                    Some(threshold) => self.pending = Some(threshold),
                    None => debug!("Virtual sensor ignoring byte 0x{:02X}", op),
                },
            }
        }
        out
    }

    fn set_threshold(&mut self, threshold: Threshold, value: u8) {
        debug!("Virtual sensor {} set to {}", threshold.command_name(), value);
        match threshold {
            Threshold::Top => self.top_max = value,
            Threshold::Width => self.width_max = value,
            Threshold::Length => self.length_max = value,
        }
    }
}

impl Default for VirtualSensor {
    fn default() -> Self {
        Self::new(Dimensions::UNKNOWN)
    }
}
