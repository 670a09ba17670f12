//! Error types for device detection

use std::time::Duration;

use gauge_protocol::Device;
use thiserror::Error;

/// Errors that can occur during detection
#[derive(Debug, Error)]
pub enum DetectError {
    /// Failed to enumerate serial ports
    #[error("failed to enumerate ports: {0}")]
    EnumerationFailed(String),

    /// Failed to open serial port
    #[error("failed to open port {port}: {reason}")]
    OpenFailed { port: String, reason: String },

    /// Non-timeout I/O error during a probe
    #[error("I/O error on {port}: {reason}")]
    IoError { port: String, reason: String },

    /// Port answered, but not the way the device does
    #[error("no valid reply on {port}")]
    NoValidReply { port: String },

    /// Probe stopped because another probe won or the deadline passed
    #[error("probe cancelled")]
    Cancelled,

    /// Nothing to probe
    #[error("no candidate ports to probe for the {}", .0.name())]
    NoCandidates(Device),

    /// Every candidate was probed without success
    #[error("{} not found on any port{}", .device.name(), last_error_suffix(.last_error))]
    NotFound {
        device: Device,
        last_error: Option<Box<DetectError>>,
    },

    /// Overall discovery deadline elapsed
    #[error("{} discovery timed out after {}s", .device.name(), .after.as_secs())]
    DiscoveryTimeout { device: Device, after: Duration },
}

impl DetectError {
    pub(crate) fn io(port: &str, err: std::io::Error) -> Self {
        DetectError::IoError {
            port: port.to_string(),
            reason: err.to_string(),
        }
    }
}

fn last_error_suffix(last_error: &Option<Box<DetectError>>) -> String {
    match last_error {
        Some(e) => format!(" (last error: {})", e),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_mentions_last_error() {
        let err = DetectError::NotFound {
            device: Device::Scale,
            last_error: Some(Box::new(DetectError::NoValidReply {
                port: "/dev/ttyUSB1".to_string(),
            })),
        };
        assert_eq!(
            err.to_string(),
            "scale not found on any port (last error: no valid reply on /dev/ttyUSB1)"
        );

        let err = DetectError::NotFound {
            device: Device::DimensionSensor,
            last_error: None,
        };
        assert_eq!(err.to_string(), "dimension sensor not found on any port");
    }
}
