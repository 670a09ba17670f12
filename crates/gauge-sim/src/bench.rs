//! A simulated set of serial ports
//!
//! [`SimBench`] implements [`PortOpener`] by handing out one end of a
//! `tokio::io::duplex` pipe per open and serving the other end with either a
//! virtual device or a silent port. Each port can be restricted to answer
//! only at one link configuration, and only from its n-th open at that
//! configuration, which is how scale units that need a retry behave.

use std::collections::HashMap;
use std::sync::Mutex;

use gauge_detect::{DetectError, LinkConfig, PortOpener, SCALE_LINKS, SENSOR_LINK};
use tokio::io::DuplexStream;
use tracing::debug;

use crate::device::{run_silent_port, run_virtual_device, SharedDevice};

const PIPE_CAPACITY: usize = 1024;

/// Behaviour of one simulated port
#[derive(Debug, Clone)]
pub struct BenchPort {
    device: Option<SharedDevice>,
    answers_at: Option<LinkConfig>,
    /// 1-based open count at which the device starts answering
    first_answer: usize,
}

impl BenchPort {
    /// A port with nothing attached
    pub fn silent() -> Self {
        Self {
            device: None,
            answers_at: None,
            first_answer: 1,
        }
    }

    /// A port with `device` attached, answering at any configuration
    pub fn device(device: SharedDevice) -> Self {
        Self {
            device: Some(device),
            answers_at: None,
            first_answer: 1,
        }
    }

    /// Only answer when opened at `config`
    pub fn only_at(mut self, config: LinkConfig) -> Self {
        self.answers_at = Some(config);
        self
    }

    /// Stay silent for the first `n - 1` opens at the answering configuration
    pub fn from_open(mut self, n: usize) -> Self {
        self.first_answer = n.max(1);
        self
    }
}

#[derive(Debug, Default)]
struct OpenCounts {
    total: HashMap<String, usize>,
    per_config: HashMap<(String, LinkConfig), usize>,
}

/// Port opener backed by virtual devices
#[derive(Debug, Default)]
pub struct SimBench {
    ports: Vec<(String, BenchPort)>,
    opens: Mutex<OpenCounts>,
}

impl SimBench {
    pub fn new() -> Self {
        Self::default()
    }

    /// Typical station wiring: sensor, an empty port, then the scale at 9600-8-N-1
    pub fn station(scale: SharedDevice, sensor: SharedDevice) -> Self {
        Self::new()
            .with_port("/dev/ttySIM0", BenchPort::device(sensor).only_at(SENSOR_LINK))
            .with_port("/dev/ttySIM1", BenchPort::silent())
            .with_port(
                "/dev/ttySIM2",
                BenchPort::device(scale).only_at(SCALE_LINKS[1]),
            )
    }

    /// Add or replace a port
    pub fn with_port(mut self, name: impl Into<String>, port: BenchPort) -> Self {
        let name = name.into();
        self.ports.retain(|(existing, _)| *existing != name);
        self.ports.push((name, port));
        self
    }

    /// Port names in the order they were added
    pub fn port_names(&self) -> Vec<String> {
        self.ports.iter().map(|(name, _)| name.clone()).collect()
    }

    /// Number of times `port` was opened at any configuration
    pub fn opens(&self, port: &str) -> usize {
        self.counts().total.get(port).copied().unwrap_or(0)
    }

    /// Number of times `port` was opened at `config`
    pub fn opens_at(&self, port: &str, config: &LinkConfig) -> usize {
        self.counts()
            .per_config
            .get(&(port.to_string(), *config))
            .copied()
            .unwrap_or(0)
    }

    fn counts(&self) -> std::sync::MutexGuard<'_, OpenCounts> {
        self.opens.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record_open(&self, port: &str, config: &LinkConfig) -> usize {
        let mut counts = self.counts();
        *counts.total.entry(port.to_string()).or_default() += 1;
        let at_config = counts
            .per_config
            .entry((port.to_string(), *config))
            .or_default();
        *at_config += 1;
        *at_config
    }
}

impl PortOpener for SimBench {
    type Io = DuplexStream;

    fn open(&self, port: &str, config: &LinkConfig) -> Result<DuplexStream, DetectError> {
        let Some((_, entry)) = self.ports.iter().find(|(name, _)| name == port) else {
            return Err(DetectError::OpenFailed {
                port: port.to_string(),
                reason: "no such simulated port".to_string(),
            });
        };

        let nth = self.record_open(port, config);
        let (station_end, device_end) = tokio::io::duplex(PIPE_CAPACITY);

        let answering = entry
            .device
            .as_ref()
            .filter(|_| entry.answers_at.map_or(true, |at| at == *config))
            .filter(|_| nth >= entry.first_answer);

        match answering {
            Some(device) => {
                debug!("Simulated {} answering on {} at {}", device.kind().name(), port, config);
                tokio::spawn(run_virtual_device(device_end, device.clone()));
            }
            None => {
                tokio::spawn(run_silent_port(device_end));
            }
        }

        Ok(station_end)
    }
}
