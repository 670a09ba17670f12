//! Link configurations and established device links
//!
//! A [`Link`] owns the I/O object for one open port. It is generic over the
//! I/O type so the same probing and device code runs against a real
//! `SerialStream` or a virtual device behind `tokio::io::duplex()`.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::debug;

use crate::error::DetectError;

/// Serial parity setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Parity {
    None,
    Even,
    Odd,
}

impl Parity {
    fn letter(&self) -> char {
        match self {
            Parity::None => 'N',
            Parity::Even => 'E',
            Parity::Odd => 'O',
        }
    }
}

impl From<Parity> for tokio_serial::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => tokio_serial::Parity::None,
            Parity::Even => tokio_serial::Parity::Even,
            Parity::Odd => tokio_serial::Parity::Odd,
        }
    }
}

/// Immutable serial line settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkConfig {
    pub baud_rate: u32,
    /// 5 to 8
    pub data_bits: u8,
    pub parity: Parity,
    /// 1 or 2
    pub stop_bits: u8,
}

impl LinkConfig {
    pub const fn new(baud_rate: u32, data_bits: u8, parity: Parity, stop_bits: u8) -> Self {
        Self {
            baud_rate,
            data_bits,
            parity,
            stop_bits,
        }
    }

    fn serial_data_bits(&self) -> tokio_serial::DataBits {
        match self.data_bits {
            5 => tokio_serial::DataBits::Five,
            6 => tokio_serial::DataBits::Six,
            7 => tokio_serial::DataBits::Seven,
            _ => tokio_serial::DataBits::Eight,
        }
    }

    fn serial_stop_bits(&self) -> tokio_serial::StopBits {
        match self.stop_bits {
            2 => tokio_serial::StopBits::Two,
            _ => tokio_serial::StopBits::One,
        }
    }
}

impl fmt::Display for LinkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}-{}",
            self.baud_rate,
            self.data_bits,
            self.parity.letter(),
            self.stop_bits
        )
    }
}

/// The dimension sensor's only configuration
pub const SENSOR_LINK: LinkConfig = LinkConfig::new(115_200, 8, Parity::None, 1);

/// Scale configurations in the order they are tried
pub const SCALE_LINKS: [LinkConfig; 4] = [
    LinkConfig::new(4800, 8, Parity::Even, 1),
    LinkConfig::new(9600, 8, Parity::None, 1),
    LinkConfig::new(2400, 8, Parity::Even, 1),
    LinkConfig::new(9600, 8, Parity::Even, 1),
];

/// Opens candidate ports at a given configuration
///
/// Production code uses [`SerialOpener`]; tests and simulation provide an
/// opener that hands out virtual devices.
pub trait PortOpener: Send + Sync + 'static {
    /// I/O object for an open port
    type Io: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Open `port` at `config`
    fn open(&self, port: &str, config: &LinkConfig) -> Result<Self::Io, DetectError>;
}

/// Opens real serial ports through tokio-serial
#[derive(Debug, Clone)]
pub struct SerialOpener {
    /// Blocking timeout configured on the port itself
    pub timeout: Duration,
}

impl Default for SerialOpener {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(100),
        }
    }
}

impl PortOpener for SerialOpener {
    type Io = SerialStream;

    fn open(&self, port: &str, config: &LinkConfig) -> Result<SerialStream, DetectError> {
        debug!("Opening {} at {}", port, config);

        tokio_serial::new(port, config.baud_rate)
            .data_bits(config.serial_data_bits())
            .parity(config.parity.into())
            .stop_bits(config.serial_stop_bits())
            .timeout(self.timeout)
            .open_native_async()
            .map_err(|e| DetectError::OpenFailed {
                port: port.to_string(),
                reason: e.to_string(),
            })
    }
}

/// An established, exclusively owned connection to one device
///
/// Dropping the link closes the port.
pub struct Link<T = SerialStream> {
    io: T,
    port_name: String,
    config: LinkConfig,
}

impl<T> Link<T> {
    pub fn new(io: T, port_name: impl Into<String>, config: LinkConfig) -> Self {
        Self {
            io,
            port_name: port_name.into(),
            config,
        }
    }

    /// Port this link is bound to
    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Line settings the link was established at
    pub fn config(&self) -> LinkConfig {
        self.config
    }

    pub fn io_mut(&mut self) -> &mut T {
        &mut self.io
    }

    /// Close the link, releasing the port
    pub fn close(self) {
        debug!("Closing link on {} ({})", self.port_name, self.config);
    }
}

impl<T> fmt::Debug for Link<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Link")
            .field("port_name", &self.port_name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_names() {
        let names: Vec<String> = SCALE_LINKS.iter().map(|c| c.to_string()).collect();
        assert_eq!(
            names,
            vec!["4800-8-E-1", "9600-8-N-1", "2400-8-E-1", "9600-8-E-1"]
        );
        assert_eq!(SENSOR_LINK.to_string(), "115200-8-N-1");
    }

    #[test]
    fn test_link_accessors() {
        let (io, _peer) = tokio::io::duplex(16);
        let link = Link::new(io, "/dev/ttyUSB0", SCALE_LINKS[1]);
        assert_eq!(link.port_name(), "/dev/ttyUSB0");
        assert_eq!(link.config(), SCALE_LINKS[1]);
        assert!(format!("{:?}", link).contains("/dev/ttyUSB0"));
    }
}
