//! Measuring Station Protocol Library
//!
//! This crate provides parsing and encoding for the two serial devices of a
//! measuring station:
//!
//! - **Dimension sensor**: a microcontroller that answers single-byte opcodes
//!   and reports readings as runs of 4-byte `[0x2D, id, value, 0x7B]` frames
//! - **Scale**: answers a weight request with a fixed 5-byte binary frame
//!
//! Everything here is pure: no I/O, no timing. Decoders are functions of the
//! accumulated bytes and degrade to sentinel values instead of failing when
//! a device has nothing useful to report.
//!
//! # Example
//!
//! ```rust
//! use gauge_protocol::dimension::{decode_dimensions, encode_reply, Dimensions};
//! use gauge_protocol::scale::decode_weight;
//!
//! let reply = encode_reply(Dimensions::new(30, 20, 10));
//! assert_eq!(decode_dimensions(&reply), Dimensions::new(30, 20, 10));
//!
//! assert_eq!(decode_weight(&[128, 0, 0x00, 0x01, 0]), Ok(256));
//! ```

pub mod command;
pub mod dimension;
pub mod display;
pub mod error;
pub mod scale;

pub use command::{scale_op, sensor_op, SensorCommand, Threshold};
pub use dimension::Dimensions;
pub use error::{CommandError, ParseError};
pub use scale::{LivenessMatch, WeightMode, WeightReply};

/// Identifies one of the two station devices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Device {
    /// Microcontroller reporting object dimensions
    DimensionSensor,
    /// Digital scale
    Scale,
}

impl Device {
    /// Returns a human-readable name for the device
    pub fn name(&self) -> &'static str {
        match self {
            Device::DimensionSensor => "dimension sensor",
            Device::Scale => "scale",
        }
    }

    /// Source tag attached to log events about this device
    pub fn log_source(&self) -> &'static str {
        match self {
            Device::DimensionSensor => "arduino",
            Device::Scale => "scale",
        }
    }
}

/// Trait for commands that can be encoded to bytes
pub trait EncodeCommand {
    /// Encode this command to its wire format
    fn encode(&self) -> Vec<u8>;
}
