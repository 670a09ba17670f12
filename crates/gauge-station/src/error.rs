//! Error types for the station

use gauge_detect::DetectError;
use gauge_protocol::{CommandError, Device};
use thiserror::Error;

/// Errors that can occur while operating the station
#[derive(Debug, Error)]
pub enum StationError {
    /// Device has no open link
    #[error("{} not connected", .0.name())]
    NotConnected(Device),

    /// Weight reply missing or malformed
    #[error("could not read weight: {0}")]
    WeightUnavailable(String),

    /// I/O error on an open link
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Discovery error
    #[error(transparent)]
    Detect(#[from] DetectError),

    /// Operator command rejected
    #[error(transparent)]
    Command(#[from] CommandError),
}
