//! Station context
//!
//! [`Station`] owns the links to both devices and the status snapshot. It is
//! the single place where discovery results turn into device handles, and
//! every device operation goes through it so status stays consistent.

use std::sync::Arc;

use gauge_detect::{discover_scale, discover_sensor, DiscoveryConfig, PortOpener, PortScanner};
use gauge_protocol::{Device, Dimensions, SensorCommand};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::dispatcher;
use crate::error::StationError;
use crate::measurement::Measurement;
use crate::scale::{Scale, ScaleTiming};
use crate::sensor::{DimensionSensor, SensorTiming};
use crate::status::DeviceStatus;

/// Device timing and port preferences
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationConfig {
    pub discovery: DiscoveryConfig,
    pub sensor: SensorTiming,
    pub scale: ScaleTiming,
    /// Probed first when looking for the sensor
    pub sensor_port: Option<String>,
    /// Probed along with the other candidates when looking for the scale
    pub scale_port: Option<String>,
}

/// Ports to probe during one connect
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Candidates {
    /// USB-attached ports from OS enumeration
    pub usb: Vec<String>,
    /// Every plausible port, with fallback names
    pub all: Vec<String>,
}

impl Candidates {
    pub fn scan(scanner: &PortScanner) -> Self {
        Self {
            usb: scanner.usb_ports(),
            all: scanner.candidate_ports(),
        }
    }

    /// Candidates without USB information
    pub fn from_ports(ports: Vec<String>) -> Self {
        Self {
            usb: Vec::new(),
            all: ports,
        }
    }

    /// USB ports, or every port when none is known to be USB
    fn sensor_ports(&self, pinned: Option<&str>) -> Vec<String> {
        let base = if self.usb.is_empty() {
            &self.all
        } else {
            &self.usb
        };
        pinned
            .map(str::to_string)
            .into_iter()
            .chain(base.iter().cloned())
            .collect()
    }

    fn scale_ports(&self, pinned: Option<&str>, exclude: Option<&str>) -> Vec<String> {
        pinned
            .map(str::to_string)
            .into_iter()
            .chain(self.all.iter().cloned())
            .filter(|port| Some(port.as_str()) != exclude)
            .collect()
    }
}

/// Both device links plus the status snapshot
pub struct Station<O: PortOpener> {
    opener: Arc<O>,
    config: StationConfig,
    sensor: Option<DimensionSensor<O::Io>>,
    scale: Option<Scale<O::Io>>,
    status: DeviceStatus,
}

impl<O: PortOpener> Station<O> {
    pub fn new(opener: Arc<O>, config: StationConfig) -> Self {
        Self {
            opener,
            config,
            sensor: None,
            scale: None,
            status: DeviceStatus::default(),
        }
    }

    pub fn status(&self) -> &DeviceStatus {
        &self.status
    }

    pub fn sensor_connected(&self) -> bool {
        self.sensor.is_some()
    }

    pub fn scale_connected(&self) -> bool {
        self.scale.is_some()
    }

    /// Close both links and look for both devices again
    ///
    /// The sensor is searched for first; its port is then left out of the
    /// scale search. A device that is not found leaves its status entry at
    /// "not found"; nothing here is fatal.
    pub async fn connect(&mut self, candidates: &Candidates) -> &DeviceStatus {
        self.disconnect();
        info!(source = "system", "Searching for devices");

        let sensor_ports = candidates.sensor_ports(self.config.sensor_port.as_deref());
        match discover_sensor(&*self.opener, &sensor_ports, &self.config.discovery.sensor).await {
            Ok(link) => {
                self.status.set_sensor(Some(link.port_name()));
                self.sensor = Some(DimensionSensor::with_timing(link, self.config.sensor));
            }
            Err(e) => {
                warn!(source = "arduino", "Dimension sensor unavailable: {}", e);
                self.status.set_sensor(None);
            }
        }

        let sensor_port = self.sensor.as_ref().map(|s| s.port_name().to_string());
        let scale_ports =
            candidates.scale_ports(self.config.scale_port.as_deref(), sensor_port.as_deref());
        match discover_scale(Arc::clone(&self.opener), &scale_ports, &self.config.discovery).await {
            Ok(link) => {
                self.status.set_scale(Some(link.port_name()));
                self.scale = Some(Scale::with_timing(link, self.config.scale));
            }
            Err(e) => {
                warn!(source = "scale", "Scale unavailable: {}", e);
                self.status.set_scale(None);
            }
        }

        info!(source = "system", "{}", self.status.summary());
        &self.status
    }

    /// Close both links
    pub fn disconnect(&mut self) {
        if let Some(sensor) = self.sensor.take() {
            sensor.close();
        }
        if let Some(scale) = self.scale.take() {
            scale.close();
        }
        self.status.set_sensor(None);
        self.status.set_scale(None);
    }

    fn scale_mut(&mut self) -> Result<&mut Scale<O::Io>, StationError> {
        self.scale
            .as_mut()
            .ok_or(StationError::NotConnected(Device::Scale))
    }

    fn sensor_mut(&mut self) -> Result<&mut DimensionSensor<O::Io>, StationError> {
        self.sensor
            .as_mut()
            .ok_or(StationError::NotConnected(Device::DimensionSensor))
    }

    /// Read the scale once without touching the status
    pub async fn read_weight(&mut self) -> Result<u32, StationError> {
        self.scale_mut()?.read_weight().await
    }

    pub fn record_weight(&mut self, grams: u32) {
        self.status.last_weight = grams;
    }

    pub async fn dimensions(&mut self) -> Result<Dimensions, StationError> {
        self.sensor_mut()?.get_dimensions().await
    }

    /// Tell the sensor to start measuring
    pub async fn start_sensor(&mut self) -> Result<(), StationError> {
        self.sensor_mut()?.send_command(&SensorCommand::Start).await
    }

    /// Weigh, then measure dimensions when the sensor is connected
    pub async fn measure(&mut self) -> Result<Measurement, StationError> {
        let weight = self.read_weight().await?;
        let measurement = match self.sensor.as_mut() {
            Some(sensor) => Measurement::with_dimensions(weight, sensor.get_dimensions().await?),
            None => Measurement::weight_only(weight),
        };
        self.record_measurement(&measurement);
        Ok(measurement)
    }

    pub fn record_measurement(&mut self, measurement: &Measurement) {
        self.status.last_weight = measurement.weight;
        self.status.last_dimensions = measurement.to_string();
    }

    /// Run an operator command against the sensor
    pub async fn sensor_command(&mut self, input: &str) -> Result<String, StationError> {
        let sensor = self.sensor_mut()?;
        Ok(dispatcher::execute(sensor, input).await)
    }
}

impl<O: PortOpener> Drop for Station<O> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensor_ports_prefer_usb() {
        let candidates = Candidates {
            usb: vec!["/dev/ttyACM0".to_string()],
            all: vec!["/dev/ttyS0".to_string(), "/dev/ttyACM0".to_string()],
        };
        assert_eq!(candidates.sensor_ports(None), vec!["/dev/ttyACM0"]);
        assert_eq!(
            candidates.sensor_ports(Some("/dev/ttyUSB3")),
            vec!["/dev/ttyUSB3", "/dev/ttyACM0"]
        );

        let no_usb = Candidates::from_ports(vec!["/dev/ttyS0".to_string()]);
        assert_eq!(no_usb.sensor_ports(None), vec!["/dev/ttyS0"]);
    }

    #[test]
    fn test_scale_ports_skip_sensor_port() {
        let candidates = Candidates::from_ports(vec![
            "/dev/ttyACM0".to_string(),
            "/dev/ttyUSB0".to_string(),
        ]);
        assert_eq!(
            candidates.scale_ports(None, Some("/dev/ttyACM0")),
            vec!["/dev/ttyUSB0"]
        );
    }
}
