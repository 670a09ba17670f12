//! Virtual scale
//!
//! Answers the weight request and the liveness command with a 5-byte reply
//! frame, the way the physical scale does on its configured link.

use gauge_protocol::scale::REPLY_LEN;
use gauge_protocol::{scale_op, WeightMode, WeightReply};
use tracing::debug;

/// Status byte sent while the load is settling
pub const STATUS_SETTLING: u8 = 160;

/// Largest magnitude representable in the reply
const MAX_RAW: u32 = u16::MAX as u32;

/// Simulated scale state
#[derive(Debug, Clone)]
pub struct VirtualScale {
    grams: u32,
    stable: bool,
    /// When false the scale swallows every command
    responsive: bool,
    /// Opcodes received (for test verification)
    received: Vec<u8>,
}

impl VirtualScale {
    pub fn new(grams: u32) -> Self {
        Self {
            grams,
            stable: true,
            responsive: true,
            received: Vec::new(),
        }
    }

    pub fn grams(&self) -> u32 {
        self.grams
    }

    /// Put a new load on the scale
    pub fn set_grams(&mut self, grams: u32) {
        self.grams = grams;
    }

    pub fn set_stable(&mut self, stable: bool) {
        self.stable = stable;
    }

    pub fn set_responsive(&mut self, responsive: bool) {
        self.responsive = responsive;
    }

    pub fn received(&self) -> &[u8] {
        &self.received
    }

    /// The reply frame for the current load
    ///
    /// Loads above 65535 g switch to ten-gram resolution.
    pub fn reply_frame(&self) -> [u8; REPLY_LEN] {
        let (mode, raw) = if self.grams <= MAX_RAW {
            (WeightMode::Grams, self.grams)
        } else {
            (WeightMode::TenGrams, (self.grams / 10).min(MAX_RAW))
        };
        let raw = raw as u16;

        let mut frame = WeightReply::encode_stable(mode, raw);
        if !self.stable {
            frame[0] = STATUS_SETTLING;
        }
        frame
    }

    /// Handle bytes written to the scale, returning its reply
    pub fn process(&mut self, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        for &byte in data {
            self.received.push(byte);
            if !self.responsive {
                continue;
            }
            match byte {
                scale_op::WEIGHT_REQUEST | scale_op::LIVENESS => {
                    out.extend_from_slice(&self.reply_frame())
                }
                other => debug!("Virtual scale ignoring byte 0x{:02X}", other),
            }
        }
        out
    }
}

impl Default for VirtualScale {
    fn default() -> Self {
        Self::new(0)
    }
}
