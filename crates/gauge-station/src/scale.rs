//! Scale handle

use std::time::Duration;

use gauge_detect::poll::{read_attempt, ReadAttempt};
use gauge_detect::Link;
use gauge_protocol::display::format_data_for_log;
use gauge_protocol::scale::{decode_weight, REPLY_LEN};
use gauge_protocol::scale_op;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::error::StationError;

/// Timing of a weight read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaleTiming {
    /// Wait between the request and the read
    pub settle: Duration,
    pub read_timeout: Duration,
}

impl Default for ScaleTiming {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(200),
            read_timeout: Duration::from_millis(500),
        }
    }
}

/// Open connection to the scale
pub struct Scale<T> {
    link: Link<T>,
    timing: ScaleTiming,
}

impl<T> Scale<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(link: Link<T>) -> Self {
        Self::with_timing(link, ScaleTiming::default())
    }

    pub fn with_timing(link: Link<T>, timing: ScaleTiming) -> Self {
        Self { link, timing }
    }

    pub fn port_name(&self) -> &str {
        self.link.port_name()
    }

    /// Request one reading, in grams
    ///
    /// The reply must arrive as exactly one 5-byte frame. An unstable
    /// reading or an unknown unit mode reads as zero.
    pub async fn read_weight(&mut self) -> Result<u32, StationError> {
        let io = self.link.io_mut();
        io.write_all(&[scale_op::WEIGHT_REQUEST]).await?;
        io.flush().await?;
        tokio::time::sleep(self.timing.settle).await;

        let mut buf = [0u8; 32];
        let n = match read_attempt(io, &mut buf, self.timing.read_timeout).await {
            ReadAttempt::Data(n) => n,
            ReadAttempt::Idle => {
                return Err(StationError::WeightUnavailable("no reply".to_string()))
            }
            ReadAttempt::Fault(e) => {
                warn!(source = "scale", "Read error on {}: {}", self.link.port_name(), e);
                return Err(StationError::Io(e));
            }
        };

        let data = &buf[..n];
        debug!(source = "scale", "Weight reply: {}", format_data_for_log(data));
        if n != REPLY_LEN {
            return Err(StationError::WeightUnavailable(format!(
                "expected {} bytes, got {}",
                REPLY_LEN, n
            )));
        }

        decode_weight(data).map_err(|e| StationError::WeightUnavailable(e.to_string()))
    }

    pub fn close(self) {
        self.link.close();
    }
}
