//! Device discovery across all candidate ports
//!
//! The scale is searched for concurrently: one task per candidate, all tied to
//! a single cancellation signal, racing to report the first working link. The
//! dimension sensor is searched for sequentially since its probe is dominated
//! by the bootloader settle time and only one USB microcontroller is expected.

use std::sync::Arc;
use std::time::Duration;

use gauge_protocol::Device;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cancel::cancel_pair;
use crate::error::DetectError;
use crate::link::{Link, PortOpener};
use crate::probe::{ScaleProbeTiming, ScaleProber, SensorProbeTiming, SensorProber};

/// Discovery settings for both devices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Overall limit on scale discovery
    pub deadline: Duration,
    pub scale: ScaleProbeTiming,
    pub sensor: SensorProbeTiming,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            deadline: Duration::from_secs(30),
            scale: ScaleProbeTiming::default(),
            sensor: SensorProbeTiming::default(),
        }
    }
}

/// What one probe task reports back
#[derive(Debug)]
pub struct ProbeOutcome<T> {
    pub port: String,
    pub result: Result<Link<T>, DetectError>,
}

fn dedupe(candidates: &[String]) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(candidates.len());
    for port in candidates {
        if !unique.contains(port) {
            unique.push(port.clone());
        }
    }
    unique
}

/// Find the scale by probing every candidate concurrently
///
/// The first successful probe wins and every other probe is cancelled. Links
/// established by probes that finish after the winner are closed.
pub async fn discover_scale<O: PortOpener>(
    opener: Arc<O>,
    candidates: &[String],
    config: &DiscoveryConfig,
) -> Result<Link<O::Io>, DetectError> {
    let candidates = dedupe(candidates);
    if candidates.is_empty() {
        warn!(source = "scale", "No candidate ports to probe for the scale");
        return Err(DetectError::NoCandidates(Device::Scale));
    }

    info!(
        source = "scale",
        "Probing {} ports for the scale: {:?}",
        candidates.len(),
        candidates
    );

    let (cancel, signal) = cancel_pair();
    let (tx, mut rx) = mpsc::channel::<ProbeOutcome<O::Io>>(candidates.len());
    let prober = ScaleProber::with_timing(config.scale);

    for port in candidates.iter().cloned() {
        let opener = Arc::clone(&opener);
        let signal = signal.clone();
        let prober = prober.clone();
        let tx = tx.clone();

        tokio::spawn(async move {
            let result = prober.probe_with_retries(&*opener, &port, &signal).await;
            if let Err(mpsc::error::TrySendError::Full(outcome))
            | Err(mpsc::error::TrySendError::Closed(outcome)) =
                tx.try_send(ProbeOutcome { port, result })
            {
                if let Ok(link) = outcome.result {
                    debug!(
                        source = "scale",
                        "Collector gone, closing {}",
                        link.port_name()
                    );
                    link.close();
                }
            }
        });
    }
    drop(tx);

    let collect = async {
        let mut last_error = None;
        while let Some(outcome) = rx.recv().await {
            match outcome.result {
                Ok(link) => return Ok(link),
                Err(DetectError::Cancelled) => {}
                Err(e) => {
                    debug!(source = "scale", "No scale on {}: {}", outcome.port, e);
                    last_error = Some(Box::new(e));
                }
            }
        }
        Err(DetectError::NotFound {
            device: Device::Scale,
            last_error,
        })
    };

    let result = match tokio::time::timeout(config.deadline, collect).await {
        Ok(result) => result,
        Err(_) => Err(DetectError::DiscoveryTimeout {
            device: Device::Scale,
            after: config.deadline,
        }),
    };

    cancel.cancel();
    tokio::spawn(async move {
        while let Some(outcome) = rx.recv().await {
            if let Ok(link) = outcome.result {
                debug!(
                    source = "scale",
                    "Closing surplus link on {}",
                    link.port_name()
                );
                link.close();
            }
        }
    });

    match &result {
        Ok(link) => info!(
            source = "scale",
            "Scale found on {} at {}",
            link.port_name(),
            link.config()
        ),
        Err(e) => warn!(source = "scale", "{}", e),
    }
    result
}

/// Find the dimension sensor by probing candidates one at a time
pub async fn discover_sensor<O: PortOpener>(
    opener: &O,
    candidates: &[String],
    timing: &SensorProbeTiming,
) -> Result<Link<O::Io>, DetectError> {
    let candidates = dedupe(candidates);
    if candidates.is_empty() {
        warn!(source = "arduino", "No candidate ports to probe for the dimension sensor");
        return Err(DetectError::NoCandidates(Device::DimensionSensor));
    }

    let prober = SensorProber::with_timing(*timing);
    let mut last_error = None;

    for port in &candidates {
        match prober.probe(opener, port).await {
            Ok(link) => {
                info!(source = "arduino", "Dimension sensor found on {}", port);
                return Ok(link);
            }
            Err(e) => {
                debug!(source = "arduino", "No dimension sensor on {}: {}", port, e);
                last_error = Some(Box::new(e));
            }
        }
    }

    let err = DetectError::NotFound {
        device: Device::DimensionSensor,
        last_error,
    };
    warn!(source = "arduino", "{}", err);
    Err(err)
}
