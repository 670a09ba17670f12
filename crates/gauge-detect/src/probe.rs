//! Link probing for the dimension sensor and the scale
//!
//! Neither device identifies itself, so a probe opens a candidate port, sends
//! the device's liveness command and classifies whatever comes back. A
//! successful probe hands over the open [`Link`]; every failed attempt closes
//! its port before moving on.

use std::time::Duration;

use gauge_protocol::display::format_data_for_log;
use gauge_protocol::scale::classify_liveness_reply;
use gauge_protocol::{scale_op, sensor_op};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::cancel::CancelSignal;
use crate::error::DetectError;
use crate::link::{Link, LinkConfig, PortOpener, SCALE_LINKS, SENSOR_LINK};
use crate::poll::{collect_for, drain, read_attempt, PollWindow, ReadAttempt};

/// Timing of the dimension sensor probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorProbeTiming {
    /// Wait after opening; the microcontroller resets on connect
    pub settle: Duration,
    /// Read timeout while draining stale bytes
    pub drain_timeout: Duration,
    /// Upper bound on the whole drain
    pub drain_limit: Duration,
    /// How long to collect the PING reply
    pub reply_window: Duration,
    pub read_timeout: Duration,
    pub poll_delay: Duration,
}

impl Default for SensorProbeTiming {
    fn default() -> Self {
        Self {
            settle: Duration::from_secs(2),
            drain_timeout: Duration::from_millis(100),
            drain_limit: Duration::from_secs(2),
            reply_window: Duration::from_secs(2),
            read_timeout: Duration::from_millis(200),
            poll_delay: Duration::from_millis(10),
        }
    }
}

/// Probes one candidate for the dimension sensor
#[derive(Debug, Clone, Default)]
pub struct SensorProber {
    timing: SensorProbeTiming,
}

impl SensorProber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timing(timing: SensorProbeTiming) -> Self {
        Self { timing }
    }

    /// Open `port` at 115200-8-N-1 and check that PING is answered with "OK"
    pub async fn probe<O: PortOpener>(
        &self,
        opener: &O,
        port: &str,
    ) -> Result<Link<O::Io>, DetectError> {
        debug!(source = "arduino", "Probing {} for the dimension sensor", port);

        let io = opener.open(port, &SENSOR_LINK)?;
        let mut link = Link::new(io, port, SENSOR_LINK);

        tokio::time::sleep(self.timing.settle).await;
        drain(
            link.io_mut(),
            self.timing.drain_timeout,
            self.timing.drain_limit,
            &CancelSignal::never(),
        )
        .await?;

        link.io_mut()
            .write_all(&[sensor_op::PING])
            .await
            .map_err(|e| DetectError::io(port, e))?;

        let reply = collect_for(
            link.io_mut(),
            PollWindow {
                window: self.timing.reply_window,
                read_timeout: self.timing.read_timeout,
                poll_delay: self.timing.poll_delay,
            },
        )
        .await;
        debug!(
            source = "arduino",
            "PING reply on {}: {}",
            port,
            format_data_for_log(&reply)
        );

        if String::from_utf8_lossy(&reply).contains("OK") {
            info!(source = "arduino", "Dimension sensor answered on {}", port);
            Ok(link)
        } else {
            link.close();
            Err(DetectError::NoValidReply {
                port: port.to_string(),
            })
        }
    }
}

/// Timing and retry policy of the scale probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaleProbeTiming {
    pub drain_timeout: Duration,
    pub drain_limit: Duration,
    /// Wait after sending the liveness command
    pub settle: Duration,
    pub read_timeout: Duration,
    /// Reads attempted per configuration
    pub max_reads: u32,
    /// Pause after a read that came back empty
    pub idle_delay: Duration,
    /// Pause between full probe attempts
    pub retry_delay: Duration,
    pub max_retries: u32,
}

impl Default for ScaleProbeTiming {
    fn default() -> Self {
        Self {
            drain_timeout: Duration::from_millis(50),
            drain_limit: Duration::from_secs(2),
            settle: Duration::from_millis(300),
            read_timeout: Duration::from_millis(500),
            max_reads: 10,
            idle_delay: Duration::from_millis(100),
            retry_delay: Duration::from_secs(1),
            max_retries: 2,
        }
    }
}

/// Probes one candidate for the scale across every scale configuration
#[derive(Debug, Clone, Default)]
pub struct ScaleProber {
    timing: ScaleProbeTiming,
}

impl ScaleProber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timing(timing: ScaleProbeTiming) -> Self {
        Self { timing }
    }

    pub fn timing(&self) -> &ScaleProbeTiming {
        &self.timing
    }

    /// Run [`probe`](Self::probe) up to `max_retries` times
    ///
    /// Cancellation, including while waiting between attempts, ends the
    /// whole sequence at once.
    pub async fn probe_with_retries<O: PortOpener>(
        &self,
        opener: &O,
        port: &str,
        cancel: &CancelSignal,
    ) -> Result<Link<O::Io>, DetectError> {
        let attempts = self.timing.max_retries.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.probe(opener, port, cancel).await {
                Ok(link) => return Ok(link),
                Err(DetectError::Cancelled) => return Err(DetectError::Cancelled),
                Err(e) => {
                    debug!(
                        source = "scale",
                        "Attempt {}/{} on {} failed: {}", attempt, attempts, port, e
                    );
                    last_error = Some(e);
                }
            }
            if attempt < attempts {
                cancel.sleep(self.timing.retry_delay).await?;
            }
        }

        Err(last_error.unwrap_or_else(|| DetectError::NoValidReply {
            port: port.to_string(),
        }))
    }

    /// Try every scale configuration on `port` in priority order
    pub async fn probe<O: PortOpener>(
        &self,
        opener: &O,
        port: &str,
        cancel: &CancelSignal,
    ) -> Result<Link<O::Io>, DetectError> {
        let mut last_error = None;

        for config in &SCALE_LINKS {
            match self.try_config(opener, port, config, cancel).await {
                Ok(link) => return Ok(link),
                Err(DetectError::Cancelled) => return Err(DetectError::Cancelled),
                Err(e) => last_error = Some(e),
            }
        }

        Err(last_error.unwrap_or_else(|| DetectError::NoValidReply {
            port: port.to_string(),
        }))
    }

    /// Probe `port` at one configuration
    pub async fn try_config<O: PortOpener>(
        &self,
        opener: &O,
        port: &str,
        config: &LinkConfig,
        cancel: &CancelSignal,
    ) -> Result<Link<O::Io>, DetectError> {
        cancel.check()?;

        let io = opener.open(port, config)?;
        let mut link = Link::new(io, port, *config);
        debug!(source = "scale", "Trying {} at {}", port, config);

        drain(
            link.io_mut(),
            self.timing.drain_timeout,
            self.timing.drain_limit,
            cancel,
        )
        .await?;

        link.io_mut()
            .write_all(&[scale_op::LIVENESS])
            .await
            .map_err(|e| DetectError::io(port, e))?;
        cancel.sleep(self.timing.settle).await?;

        let mut reply = Vec::new();
        let mut buf = [0u8; 32];
        for _ in 0..self.timing.max_reads {
            if reply.len() >= 2 {
                break;
            }
            cancel.check()?;
            match read_attempt(link.io_mut(), &mut buf, self.timing.read_timeout).await {
                ReadAttempt::Data(n) => reply.extend_from_slice(&buf[..n]),
                ReadAttempt::Idle => cancel.sleep(self.timing.idle_delay).await?,
                ReadAttempt::Fault(e) => {
                    warn!(source = "scale", "Read error on {} at {}: {}", port, config, e);
                    return Err(DetectError::io(port, e));
                }
            }
        }

        match classify_liveness_reply(&reply) {
            Some(matched) => {
                info!(
                    source = "scale",
                    "Scale answered on {} at {} ({:?}): {}",
                    port,
                    config,
                    matched,
                    format_data_for_log(&reply)
                );
                Ok(link)
            }
            None => {
                debug!(
                    source = "scale",
                    "No scale reply on {} at {}: {}",
                    port,
                    config,
                    format_data_for_log(&reply)
                );
                link.close();
                Err(DetectError::NoValidReply {
                    port: port.to_string(),
                })
            }
        }
    }
}
