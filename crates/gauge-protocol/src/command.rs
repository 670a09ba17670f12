//! Device opcodes and the operator command grammar
//!
//! Operator commands are short text lines such as `led_on` or
//! `set_top_max:50`. Parsing validates parameters locally so that malformed
//! input is never written to the device.

use std::fmt;
use std::str::FromStr;

use crate::error::CommandError;
use crate::EncodeCommand;

/// Dimension sensor opcodes
pub mod sensor_op {
    /// Start a measuring cycle
    pub const START: u8 = 0x95;
    /// Request the current dimensions
    pub const GET_DIMENSIONS: u8 = 0x89;
    /// Set maximum height threshold (followed by one value byte)
    pub const SET_TOP_MAX: u8 = 0x90;
    /// Set maximum width threshold (followed by one value byte)
    pub const SET_WIDTH_MAX: u8 = 0x91;
    /// Set maximum length threshold (followed by one value byte)
    pub const SET_LENGTH_MAX: u8 = 0x92;
    /// Reset all sensors
    pub const RESET_SENSORS: u8 = 0x93;
    /// Turn indicator LEDs on
    pub const LED_ON: u8 = 0x66;
    /// Turn indicator LEDs off
    pub const LED_OFF: u8 = 0x55;
    /// Liveness check; the sensor answers with text containing "OK"
    pub const PING: u8 = 0x77;
}

/// Scale opcodes
pub mod scale_op {
    /// Request a 5-byte weight reply
    pub const WEIGHT_REQUEST: u8 = 0x4A;
    /// Liveness poll used during discovery
    pub const LIVENESS: u8 = 0x48;
}

/// Threshold parameter for the `set_*_max` commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Threshold {
    /// Maximum height (`set_top_max`)
    Top,
    /// Maximum width (`set_width_max`)
    Width,
    /// Maximum length (`set_length_max`)
    Length,
}

impl Threshold {
    pub fn opcode(&self) -> u8 {
        match self {
            Threshold::Top => sensor_op::SET_TOP_MAX,
            Threshold::Width => sensor_op::SET_WIDTH_MAX,
            Threshold::Length => sensor_op::SET_LENGTH_MAX,
        }
    }

    pub fn command_name(&self) -> &'static str {
        match self {
            Threshold::Top => "set_top_max",
            Threshold::Width => "set_width_max",
            Threshold::Length => "set_length_max",
        }
    }

    /// Human-readable name of the limited dimension
    pub fn dimension(&self) -> &'static str {
        match self {
            Threshold::Top => "height",
            Threshold::Width => "width",
            Threshold::Length => "length",
        }
    }

    pub fn from_opcode(op: u8) -> Option<Self> {
        match op {
            sensor_op::SET_TOP_MAX => Some(Threshold::Top),
            sensor_op::SET_WIDTH_MAX => Some(Threshold::Width),
            sensor_op::SET_LENGTH_MAX => Some(Threshold::Length),
            _ => None,
        }
    }
}

/// A command for the dimension sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorCommand {
    Start,
    Ping,
    ResetSensors,
    LedOn,
    LedOff,
    GetDimensions,
    /// Set a threshold; value is always in 1..=255
    SetMax { threshold: Threshold, value: u8 },
}

impl SensorCommand {
    /// Command name as typed by the operator
    pub fn name(&self) -> &'static str {
        match self {
            SensorCommand::Start => "start",
            SensorCommand::Ping => "ping",
            SensorCommand::ResetSensors => "reset_sensors",
            SensorCommand::LedOn => "led_on",
            SensorCommand::LedOff => "led_off",
            SensorCommand::GetDimensions => "get_dimensions",
            SensorCommand::SetMax { threshold, .. } => threshold.command_name(),
        }
    }

    /// Opcode written first for this command
    pub fn opcode(&self) -> u8 {
        match self {
            SensorCommand::Start => sensor_op::START,
            SensorCommand::Ping => sensor_op::PING,
            SensorCommand::ResetSensors => sensor_op::RESET_SENSORS,
            SensorCommand::LedOn => sensor_op::LED_ON,
            SensorCommand::LedOff => sensor_op::LED_OFF,
            SensorCommand::GetDimensions => sensor_op::GET_DIMENSIONS,
            SensorCommand::SetMax { threshold, .. } => threshold.opcode(),
        }
    }
}

impl EncodeCommand for SensorCommand {
    fn encode(&self) -> Vec<u8> {
        match self {
            SensorCommand::SetMax { threshold, value } => vec![threshold.opcode(), *value],
            other => vec![other.opcode()],
        }
    }
}

impl fmt::Display for SensorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorCommand::SetMax { threshold, value } => {
                write!(f, "{}:{}", threshold.command_name(), value)
            }
            other => f.write_str(other.name()),
        }
    }
}

fn parse_threshold_value(
    threshold: Threshold,
    arg: Option<&str>,
) -> Result<SensorCommand, CommandError> {
    let command = threshold.command_name();
    let raw = arg.ok_or(CommandError::MissingValue(command))?;

    let value = raw
        .parse::<i64>()
        .ok()
        .filter(|v| (1..=255).contains(v))
        .ok_or_else(|| CommandError::InvalidValue {
            command,
            value: raw.to_string(),
        })?;

    Ok(SensorCommand::SetMax {
        threshold,
        value: value as u8,
    })
}

impl FromStr for SensorCommand {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Anything after a second ':' is ignored
        let mut parts = s.trim().split(':');
        let name = parts.next().unwrap_or_default();
        let arg = parts.next();

        match name {
            "start" => Ok(SensorCommand::Start),
            "ping" => Ok(SensorCommand::Ping),
            "reset_sensors" => Ok(SensorCommand::ResetSensors),
            "led_on" => Ok(SensorCommand::LedOn),
            "led_off" => Ok(SensorCommand::LedOff),
            "get_dimensions" => Ok(SensorCommand::GetDimensions),
            "set_top_max" => parse_threshold_value(Threshold::Top, arg),
            "set_width_max" => parse_threshold_value(Threshold::Width, arg),
            "set_length_max" => parse_threshold_value(Threshold::Length, arg),
            other => Err(CommandError::Unrecognized(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_commands() {
        let cases = [
            ("start", 0x95),
            ("ping", 0x77),
            ("reset_sensors", 0x93),
            ("led_on", 0x66),
            ("led_off", 0x55),
            ("get_dimensions", 0x89),
        ];
        for (text, op) in cases {
            let cmd: SensorCommand = text.parse().unwrap();
            assert_eq!(cmd.encode(), vec![op], "{}", text);
            assert_eq!(cmd.to_string(), text);
        }
    }

    #[test]
    fn test_set_top_max_encodes_two_bytes() {
        let cmd: SensorCommand = "set_top_max:50".parse().unwrap();
        assert_eq!(cmd.encode(), vec![0x90, 50]);

        let cmd: SensorCommand = "set_width_max:1".parse().unwrap();
        assert_eq!(cmd.encode(), vec![0x91, 1]);

        let cmd: SensorCommand = "set_length_max:255".parse().unwrap();
        assert_eq!(cmd.encode(), vec![0x92, 255]);
    }

    #[test]
    fn test_out_of_range_rejected() {
        for text in ["set_top_max:300", "set_top_max:0", "set_top_max:-4"] {
            assert!(matches!(
                text.parse::<SensorCommand>(),
                Err(CommandError::InvalidValue {
                    command: "set_top_max",
                    ..
                })
            ));
        }
    }

    #[test]
    fn test_non_numeric_rejected() {
        let err = "set_width_max:abc".parse::<SensorCommand>().unwrap_err();
        assert_eq!(
            err,
            CommandError::InvalidValue {
                command: "set_width_max",
                value: "abc".to_string()
            }
        );
    }

    #[test]
    fn test_value_grammar() {
        let cmd: SensorCommand = "set_top_max:50:x".parse().unwrap();
        assert_eq!(cmd.encode(), vec![0x90, 50]);

        assert_eq!(
            "set_top_max: 50".parse::<SensorCommand>(),
            Err(CommandError::InvalidValue {
                command: "set_top_max",
                value: " 50".to_string()
            })
        );
    }

    #[test]
    fn test_missing_value() {
        assert_eq!(
            "set_length_max".parse::<SensorCommand>(),
            Err(CommandError::MissingValue("set_length_max"))
        );
    }

    #[test]
    fn test_unrecognized() {
        let err = "dance".parse::<SensorCommand>().unwrap_err();
        assert_eq!(err, CommandError::Unrecognized("dance".to_string()));
        assert!(err.to_string().contains("unrecognized"));
    }

    #[test]
    fn test_threshold_from_opcode() {
        assert_eq!(Threshold::from_opcode(0x90), Some(Threshold::Top));
        assert_eq!(Threshold::from_opcode(0x92), Some(Threshold::Length));
        assert_eq!(Threshold::from_opcode(0x93), None);
    }
}
