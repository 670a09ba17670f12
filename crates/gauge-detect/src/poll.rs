//! Bounded polling primitives over a byte stream
//!
//! Devices on this station answer in bursts with no framing that tells the
//! reader when a reply is complete. Every read is therefore a bounded attempt:
//! it either yields bytes, comes back idle (timeout, would-block, zero bytes)
//! or reports an I/O fault. Higher-level loops are built from these attempts
//! with explicit windows and delays.

use std::io::ErrorKind;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::cancel::CancelSignal;
use crate::error::DetectError;

/// Result of one bounded read
#[derive(Debug)]
pub enum ReadAttempt {
    /// This many bytes were read into the buffer
    Data(usize),
    /// Nothing arrived within the timeout
    Idle,
    /// Non-timeout I/O error
    Fault(std::io::Error),
}

fn is_timeout(err: &std::io::Error) -> bool {
    matches!(err.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock)
}

/// Perform a single read bounded by `timeout`
pub async fn read_attempt<T>(io: &mut T, buf: &mut [u8], timeout: Duration) -> ReadAttempt
where
    T: AsyncRead + Unpin,
{
    match tokio::time::timeout(timeout, io.read(buf)).await {
        Ok(Ok(n)) if n > 0 => ReadAttempt::Data(n),
        Ok(Ok(_)) => ReadAttempt::Idle,
        Ok(Err(e)) if is_timeout(&e) => ReadAttempt::Idle,
        Ok(Err(e)) => ReadAttempt::Fault(e),
        Err(_) => ReadAttempt::Idle,
    }
}

/// Discard stale bytes until a read comes back idle
///
/// Bounded by `limit` so a device that streams continuously cannot hold the
/// caller forever. Returns the number of bytes discarded.
pub async fn drain<T>(
    io: &mut T,
    read_timeout: Duration,
    limit: Duration,
    cancel: &CancelSignal,
) -> Result<usize, DetectError>
where
    T: AsyncRead + Unpin,
{
    let deadline = Instant::now() + limit;
    let mut buf = [0u8; 256];
    let mut discarded = 0;

    while Instant::now() < deadline {
        cancel.check()?;
        match read_attempt(io, &mut buf, read_timeout).await {
            ReadAttempt::Data(n) => discarded += n,
            ReadAttempt::Idle | ReadAttempt::Fault(_) => break,
        }
    }

    if discarded > 0 {
        trace!("Drained {} stale bytes", discarded);
    }
    Ok(discarded)
}

/// Timing of a fixed-length collection window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollWindow {
    /// Total time spent collecting
    pub window: Duration,
    /// Timeout of each individual read
    pub read_timeout: Duration,
    /// Pause between reads
    pub poll_delay: Duration,
}

/// Accumulate everything received during `window`
///
/// An I/O fault ends collection early; whatever was gathered so far is
/// returned.
pub async fn collect_for<T>(io: &mut T, timing: PollWindow) -> Vec<u8>
where
    T: AsyncRead + Unpin,
{
    let start = Instant::now();
    let mut data = Vec::new();
    let mut buf = [0u8; 64];

    while start.elapsed() < timing.window {
        match read_attempt(io, &mut buf, timing.read_timeout).await {
            ReadAttempt::Data(n) => data.extend_from_slice(&buf[..n]),
            ReadAttempt::Idle => {}
            ReadAttempt::Fault(e) => {
                debug!("Read error while collecting: {}", e);
                break;
            }
        }
        tokio::time::sleep(timing.poll_delay).await;
    }

    data
}
