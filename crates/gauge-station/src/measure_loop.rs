//! Automatic measurement loop
//!
//! Polls the scale once per interval. A new object is assumed whenever the
//! weight is positive and differs from the last accepted weight by at least
//! the threshold; the loop then asks the sensor for dimensions, records the
//! result and hands it to the [`ResultSink`].

use std::sync::Arc;
use std::time::Duration;

use gauge_detect::{CancelSignal, DetectError, PortOpener};
use gauge_protocol::Dimensions;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::StationError;
use crate::measurement::{Measurement, ResultSink};
use crate::station::Station;

/// Delays of the measurement loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopTiming {
    /// Wait after sending START to the sensor
    pub start_settle: Duration,
    /// Between weight polls
    pub poll_interval: Duration,
    /// After a delivered result, before the next object is expected
    pub after_result: Duration,
    /// Between measurement cycles
    pub cooldown: Duration,
}

impl Default for LoopTiming {
    fn default() -> Self {
        Self {
            start_settle: Duration::from_secs(2),
            poll_interval: Duration::from_secs(1),
            after_result: Duration::from_secs(3),
            cooldown: Duration::from_secs(2),
        }
    }
}

/// Result of one weight poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// No scale link
    ScaleMissing,
    /// Read failed; retried on the next poll
    ReadFailed,
    /// Nothing on the scale
    Empty,
    /// Weight within the threshold of the last accepted one
    Unchanged(u32),
    Measured(Measurement),
}

/// Drives the station from weight changes to delivered results
pub struct MeasureLoop<O: PortOpener> {
    station: Arc<Mutex<Station<O>>>,
    sink: Arc<dyn ResultSink>,
    timing: LoopTiming,
    /// Minimum change in grams that counts as a new object
    threshold: u32,
    last_weight: Option<u32>,
}

impl<O: PortOpener> MeasureLoop<O> {
    pub fn new(station: Arc<Mutex<Station<O>>>, sink: Arc<dyn ResultSink>) -> Self {
        Self {
            station,
            sink,
            timing: LoopTiming::default(),
            threshold: 1,
            last_weight: None,
        }
    }

    pub fn with_timing(mut self, timing: LoopTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_threshold(mut self, grams: u32) -> Self {
        self.threshold = grams;
        self
    }

    /// Last weight that triggered a measurement
    pub fn last_weight(&self) -> Option<u32> {
        self.last_weight
    }

    /// Run until `shutdown` fires
    pub async fn run(mut self, shutdown: CancelSignal) {
        info!(source = "system", "Measurement loop started");
        while self.cycle(&shutdown).await.is_ok() {}
        info!(source = "system", "Measurement loop stopped");
    }

    /// One cycle: wait for the scale, arm the sensor, poll until a result
    async fn cycle(&mut self, shutdown: &CancelSignal) -> Result<(), DetectError> {
        let (scale_connected, sensor_connected) = {
            let station = self.station.lock().await;
            (station.scale_connected(), station.sensor_connected())
        };

        if !scale_connected {
            return shutdown.sleep(self.timing.poll_interval).await;
        }

        if sensor_connected {
            if let Err(e) = self.station.lock().await.start_sensor().await {
                warn!(source = "arduino", "Could not start sensor: {}", e);
            }
            shutdown.sleep(self.timing.start_settle).await?;
        }

        loop {
            shutdown.check()?;
            match self.poll_once().await {
                PollOutcome::ScaleMissing => return Ok(()),
                PollOutcome::Measured(measurement) => match self.sink.deliver(&measurement) {
                    Ok(()) => {
                        info!(source = "system", "Measurement complete: {}", measurement);
                        shutdown.sleep(self.timing.after_result).await?;
                        break;
                    }
                    Err(e) => warn!(source = "system", "Could not deliver {}: {}", measurement, e),
                },
                _ => shutdown.sleep(self.timing.poll_interval).await?,
            }
        }

        debug!(source = "system", "Waiting for the next object");
        shutdown.sleep(self.timing.cooldown).await
    }

    /// Read the scale once and measure if the weight changed
    pub async fn poll_once(&mut self) -> PollOutcome {
        let mut station = self.station.lock().await;

        let weight = match station.read_weight().await {
            Ok(weight) => weight,
            Err(StationError::NotConnected(_)) => return PollOutcome::ScaleMissing,
            Err(e) => {
                debug!(source = "scale", "Weight read failed: {}", e);
                return PollOutcome::ReadFailed;
            }
        };

        if weight == 0 {
            return PollOutcome::Empty;
        }
        if let Some(last) = self.last_weight {
            if weight.abs_diff(last) < self.threshold {
                return PollOutcome::Unchanged(weight);
            }
        }

        info!(
            source = "scale",
            "Weight change detected: {} g (previous: {} g)",
            weight,
            self.last_weight.unwrap_or(0)
        );
        self.last_weight = Some(weight);
        station.record_weight(weight);

        let measurement = if station.sensor_connected() {
            let dims = station.dimensions().await.unwrap_or_else(|e| {
                warn!(source = "arduino", "Dimension read failed: {}", e);
                Dimensions::UNKNOWN
            });
            Measurement::with_dimensions(weight, dims)
        } else {
            Measurement::weight_only(weight)
        };
        station.record_measurement(&measurement);
        PollOutcome::Measured(measurement)
    }
}
