//! Dimension sensor frame codec
//!
//! The sensor answers a GET_DIMENSIONS request with a run of 4-byte frames:
//!
//! ```text
//! [0x2D] [SENSOR_ID] [VALUE] [0x7B]
//! ```
//!
//! `VALUE` is a raw 8-bit magnitude with no unit conversion. A complete reply
//! is ten frames plus one trailing byte (41 bytes). Only three positions in
//! the run carry the reading: width at frame 7, height at frame 8 and length
//! at frame 9. The same sensor IDs seen at other positions are ignored.
//!
//! Decoding never fails: short or garbled input degrades to the all-zero
//! [`Dimensions::UNKNOWN`] reading.

use std::fmt;

/// First byte of every sensor frame
pub const FRAME_START: u8 = 0x2D;

/// Last byte of every sensor frame
pub const FRAME_END: u8 = 0x7B;

/// Size of one sensor frame
pub const FRAME_LEN: usize = 4;

/// Length of a complete dimension reply window
pub const REPLY_WINDOW: usize = 41;

/// Maximum number of frames inspected in a reply
pub const MAX_FRAMES: usize = 10;

/// Minimum run of consecutive well-formed frames that marks a valid reply
pub const MIN_RUN: usize = 8;

/// Sensor IDs reported by the dimension sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorId {
    /// Width sensor (0x0B)
    Width,
    /// Height sensor (0x16)
    Height,
    /// Length sensor (0x21)
    Length,
    /// Right-hand sensor (0xBB), reported but not used for dimensions
    Right,
    /// Any other ID
    Other(u8),
}

impl SensorId {
    /// Frame index at which this sensor's value is committed, if any
    pub fn committed_index(&self) -> Option<usize> {
        match self {
            SensorId::Width => Some(7),
            SensorId::Height => Some(8),
            SensorId::Length => Some(9),
            _ => None,
        }
    }

    /// Short label used in log output
    pub fn label(&self) -> String {
        match self {
            SensorId::Width => "WIDTH".to_string(),
            SensorId::Height => "HEIGHT".to_string(),
            SensorId::Length => "LENGTH".to_string(),
            SensorId::Right => "Right Sensor".to_string(),
            SensorId::Other(id) => format!("SENSOR_0x{:02X}", id),
        }
    }
}

impl From<u8> for SensorId {
    fn from(value: u8) -> Self {
        match value {
            0x0B => SensorId::Width,
            0x16 => SensorId::Height,
            0x21 => SensorId::Length,
            0xBB => SensorId::Right,
            other => SensorId::Other(other),
        }
    }
}

impl From<SensorId> for u8 {
    fn from(id: SensorId) -> Self {
        match id {
            SensorId::Width => 0x0B,
            SensorId::Height => 0x16,
            SensorId::Length => 0x21,
            SensorId::Right => 0xBB,
            SensorId::Other(other) => other,
        }
    }
}

/// One decoded sensor frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorFrame {
    pub sensor: SensorId,
    pub value: u8,
}

impl SensorFrame {
    pub fn new(sensor: SensorId, value: u8) -> Self {
        Self { sensor, value }
    }

    /// Decode a frame from exactly four bytes, if it is well-formed
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [FRAME_START, id, value, FRAME_END] => Some(Self {
                sensor: SensorId::from(*id),
                value: *value,
            }),
            _ => None,
        }
    }

    /// Encode this frame to its wire format
    pub fn encode(&self) -> [u8; FRAME_LEN] {
        [FRAME_START, self.sensor.into(), self.value, FRAME_END]
    }
}

/// Check whether `data[offset..offset + 4]` is a well-formed frame
fn is_frame_at(data: &[u8], offset: usize) -> bool {
    offset + FRAME_LEN <= data.len()
        && data[offset] == FRAME_START
        && data[offset + FRAME_LEN - 1] == FRAME_END
}

/// Object dimensions reported by the sensor
///
/// Values are raw sensor magnitudes. All zero means "unknown".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Dimensions {
    pub length: u8,
    pub width: u8,
    pub height: u8,
}

impl Dimensions {
    /// Sentinel for "no usable reading"
    pub const UNKNOWN: Dimensions = Dimensions {
        length: 0,
        width: 0,
        height: 0,
    };

    pub fn new(length: u8, width: u8, height: u8) -> Self {
        Self {
            length,
            width,
            height,
        }
    }

    /// Returns true if this is the all-zero sentinel
    pub fn is_unknown(&self) -> bool {
        *self == Self::UNKNOWN
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L={}, W={}, H={}", self.length, self.width, self.height)
    }
}

/// Locate the valid reply window inside an accumulated buffer
///
/// Scans for the first offset holding `0x2D` whose 4-byte-aligned run has at
/// least eight consecutive well-formed frames, and returns the 41-byte window
/// starting there. `None` when no such run exists.
pub fn find_valid_window(data: &[u8]) -> Option<&[u8]> {
    if data.len() < REPLY_WINDOW {
        return None;
    }

    (0..=data.len() - REPLY_WINDOW)
        .filter(|&start| data[start] == FRAME_START)
        .find(|&start| {
            (0..MAX_FRAMES)
                .take_while(|frame| is_frame_at(data, start + frame * FRAME_LEN))
                .count()
                >= MIN_RUN
        })
        .map(|start| &data[start..start + REPLY_WINDOW])
}

/// Extract dimensions from a reply window
///
/// Walks up to ten frames. A value is committed only when the sensor ID and
/// the frame index both match (width at 7, height at 8, length at 9).
pub fn parse_dimensions(window: &[u8]) -> Dimensions {
    let mut dims = Dimensions::UNKNOWN;

    for (index, chunk) in window.chunks_exact(FRAME_LEN).take(MAX_FRAMES).enumerate() {
        let Some(frame) = SensorFrame::decode(chunk) else {
            continue;
        };

        if frame.sensor.committed_index() != Some(index) {
            continue;
        }

        match frame.sensor {
            SensorId::Width => dims.width = frame.value,
            SensorId::Height => dims.height = frame.value,
            SensorId::Length => dims.length = frame.value,
            _ => {}
        }
    }

    dims
}

/// Decode an accumulated GET_DIMENSIONS reply
///
/// Returns [`Dimensions::UNKNOWN`] when fewer than 41 bytes were collected or
/// no run of eight well-formed frames could be located.
pub fn decode_dimensions(data: &[u8]) -> Dimensions {
    find_valid_window(data)
        .map(parse_dimensions)
        .unwrap_or(Dimensions::UNKNOWN)
}

/// Encode a complete reply as the sensor sends it
///
/// Frames 0-6 carry filler readings, frames 7-9 carry width, height and
/// length, followed by one trailing byte.
pub fn encode_reply(dims: Dimensions) -> Vec<u8> {
    let mut out = Vec::with_capacity(REPLY_WINDOW);
    for index in 0..7u8 {
        out.extend_from_slice(&SensorFrame::new(SensorId::Other(0x40 + index), 0).encode());
    }
    out.extend_from_slice(&SensorFrame::new(SensorId::Width, dims.width).encode());
    out.extend_from_slice(&SensorFrame::new(SensorId::Height, dims.height).encode());
    out.extend_from_slice(&SensorFrame::new(SensorId::Length, dims.length).encode());
    out.push(b'\n');
    out
}
