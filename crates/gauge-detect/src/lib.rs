//! Serial device discovery for the measuring station
//!
//! This crate finds the scale and the dimension sensor among the serial ports
//! of the host. Neither device reports identifying USB metadata, so every
//! candidate port is opened and actively probed with the device's liveness
//! command.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use gauge_detect::{discover_scale, DiscoveryConfig, PortScanner, SerialOpener};
//!
//! # async fn run() -> Result<(), gauge_detect::DetectError> {
//! let candidates = PortScanner::new().candidate_ports();
//! let link = discover_scale(
//!     Arc::new(SerialOpener::default()),
//!     &candidates,
//!     &DiscoveryConfig::default(),
//! )
//! .await?;
//! println!("Scale on {} at {}", link.port_name(), link.config());
//! # Ok(())
//! # }
//! ```

pub mod cancel;
pub mod discovery;
pub mod error;
pub mod link;
pub mod poll;
pub mod probe;
pub mod scanner;

pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use discovery::{discover_scale, discover_sensor, DiscoveryConfig, ProbeOutcome};
pub use error::DetectError;
pub use link::{Link, LinkConfig, Parity, PortOpener, SerialOpener, SCALE_LINKS, SENSOR_LINK};
pub use poll::{PollWindow, ReadAttempt};
pub use probe::{ScaleProbeTiming, ScaleProber, SensorProbeTiming, SensorProber};
pub use scanner::{OsFamily, PortScanner, ScannerConfig, SerialPortInfo};
