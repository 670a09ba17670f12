//! Scale reply codec
//!
//! The scale answers the weight request (`0x4A`) with a fixed 5-byte frame:
//!
//! ```text
//! [STATUS] [MODE] [LO] [HI] [TRAILER]
//! ```
//!
//! - `STATUS` is 128 when a stable reading is available
//! - `MODE` 0 reports grams, mode 4 reports tens of grams
//! - `LO`/`HI` form a little-endian 16-bit magnitude
//! - `TRAILER` is not validated
//!
//! The liveness command (`0x48`) elicits a reply whose shape is used to
//! recognise the scale during discovery; see [`classify_liveness_reply`].

use crate::error::ParseError;

/// Length of a weight reply frame
pub const REPLY_LEN: usize = 5;

/// Status byte that marks a stable reading
pub const STATUS_STABLE: u8 = 128;

/// Second byte that identifies a liveness reply on its own
pub const LIVENESS_SECOND_BYTE: u8 = 192;

/// First bytes accepted as a liveness reply
pub const VALID_FIRST_BYTES: [u8; 8] = [128, 192, 160, 224, 144, 176, 208, 240];

/// Weight unit selector in byte 1 of the reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightMode {
    /// Magnitude is in grams
    Grams,
    /// Magnitude is in tens of grams
    TenGrams,
    /// Any other selector; reported as zero
    Other(u8),
}

impl From<u8> for WeightMode {
    fn from(value: u8) -> Self {
        match value {
            0 => WeightMode::Grams,
            4 => WeightMode::TenGrams,
            other => WeightMode::Other(other),
        }
    }
}

impl From<WeightMode> for u8 {
    fn from(mode: WeightMode) -> Self {
        match mode {
            WeightMode::Grams => 0,
            WeightMode::TenGrams => 4,
            WeightMode::Other(other) => other,
        }
    }
}

/// A decoded weight reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeightReply {
    pub status: u8,
    pub mode: WeightMode,
    pub raw: u16,
}

impl WeightReply {
    /// Decode a reply frame; fails only when the length is not exactly 5
    pub fn decode(data: &[u8]) -> Result<Self, ParseError> {
        let [status, mode, lo, hi, _trailer] = data else {
            return Err(ParseError::WrongLength {
                expected: REPLY_LEN,
                actual: data.len(),
            });
        };

        Ok(Self {
            status: *status,
            mode: WeightMode::from(*mode),
            raw: u16::from_le_bytes([*lo, *hi]),
        })
    }

    /// Weight in grams
    ///
    /// Zero when the scale has no stable reading or reports an unknown mode.
    pub fn grams(&self) -> u32 {
        if self.status != STATUS_STABLE {
            return 0;
        }

        match self.mode {
            WeightMode::Grams => u32::from(self.raw),
            WeightMode::TenGrams => u32::from(self.raw) * 10,
            WeightMode::Other(_) => 0,
        }
    }

    /// Encode a stable reading as the scale sends it
    pub fn encode_stable(mode: WeightMode, raw: u16) -> [u8; REPLY_LEN] {
        let [lo, hi] = raw.to_le_bytes();
        [STATUS_STABLE, mode.into(), lo, hi, 0]
    }
}

/// Decode a weight reply straight to grams
pub fn decode_weight(data: &[u8]) -> Result<u32, ParseError> {
    WeightReply::decode(data).map(|reply| reply.grams())
}

/// Why a liveness reply was accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessMatch {
    /// First byte is one of [`VALID_FIRST_BYTES`]
    FirstByte(u8),
    /// Second byte is [`LIVENESS_SECOND_BYTE`]
    SecondByte,
}

/// Classify the bytes received after a liveness command
///
/// Nothing shorter than two bytes is accepted. Beyond that the first byte
/// must be one of the eight valid status values, or the second byte 192.
pub fn classify_liveness_reply(data: &[u8]) -> Option<LivenessMatch> {
    let &[first, second, ..] = data else {
        return None;
    };

    if VALID_FIRST_BYTES.contains(&first) {
        Some(LivenessMatch::FirstByte(first))
    } else if second == LIVENESS_SECOND_BYTE {
        Some(LivenessMatch::SecondByte)
    } else {
        None
    }
}
