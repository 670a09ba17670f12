//! Measurement results and where they go

use std::fmt;

use gauge_protocol::Dimensions;
use serde::{Deserialize, Serialize};

/// One completed measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measurement {
    /// Grams
    pub weight: u32,
    /// Absent when no dimension sensor is connected
    pub dimensions: Option<Dimensions>,
}

impl Measurement {
    pub fn weight_only(weight: u32) -> Self {
        Self {
            weight,
            dimensions: None,
        }
    }

    pub fn with_dimensions(weight: u32, dimensions: Dimensions) -> Self {
        Self {
            weight,
            dimensions: Some(dimensions),
        }
    }
}

/// `weight:length:width:height`, or just `weight`
impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.dimensions {
            Some(d) => write!(f, "{}:{}:{}:{}", self.weight, d.length, d.width, d.height),
            None => write!(f, "{}", self.weight),
        }
    }
}

/// Error type returned by result sinks
pub type SinkError = Box<dyn std::error::Error + Send + Sync>;

/// Receives every accepted measurement
pub trait ResultSink: Send + Sync {
    fn deliver(&self, measurement: &Measurement) -> Result<(), SinkError>;
}
