//! Measuring station context
//!
//! This crate ties the discovered devices together:
//!
//! - **DimensionSensor** / **Scale**: handles over established links
//! - **dispatcher**: textual operator commands to sensor traffic
//! - **Station**: owns both links and the [`DeviceStatus`] snapshot
//! - **MeasureLoop**: weight change to dimensions to [`ResultSink`]
//! - **LogBroadcaster**: lossy fan-out of log lines to live subscribers

pub mod dispatcher;
pub mod error;
pub mod logbus;
pub mod measure_loop;
pub mod measurement;
pub mod scale;
pub mod sensor;
pub mod station;
pub mod status;

pub use error::StationError;
pub use logbus::{LogBroadcaster, LogCategory, LogMessage, LogSubscription, SubscriberId};
pub use measure_loop::{LoopTiming, MeasureLoop, PollOutcome};
pub use measurement::{Measurement, ResultSink, SinkError};
pub use scale::{Scale, ScaleTiming};
pub use sensor::{DimensionSensor, PingReply, SensorTiming};
pub use station::{Candidates, Station, StationConfig};
pub use status::DeviceStatus;
