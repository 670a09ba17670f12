//! Error types for station protocol parsing and operator commands

use thiserror::Error;

/// Errors that can occur while decoding device replies
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Reply had the wrong length
    #[error("expected {expected} bytes, got {actual}")]
    WrongLength { expected: usize, actual: usize },

    /// Invalid frame structure
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
}

/// Errors raised while interpreting an operator command line
///
/// These are rejected locally and never reach the device.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Command name is not part of the sensor command set
    #[error("unrecognized command: {0}")]
    Unrecognized(String),

    /// Parameterised command given without a value
    #[error("no value given for {0}")]
    MissingValue(&'static str),

    /// Value is not an integer in 1..=255
    #[error("invalid value {value:?} for {command} (expected 1-255)")]
    InvalidValue {
        command: &'static str,
        value: String,
    },
}
