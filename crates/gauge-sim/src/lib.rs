//! Measuring station simulation library
//!
//! This crate provides a simulation layer for running the station without
//! physical hardware. It includes:
//!
//! - **VirtualScale**: answers weight and liveness requests with reply frames
//! - **VirtualSensor**: answers PING and dimension requests, tracks LED and thresholds
//! - **SimBench**: a port opener that serves virtual devices over duplex pipes
//!
//! # Example
//!
//! ```rust
//! use gauge_protocol::{scale_op, scale::decode_weight};
//! use gauge_sim::VirtualScale;
//!
//! let mut scale = VirtualScale::new(1200);
//! let reply = scale.process(&[scale_op::WEIGHT_REQUEST]);
//! assert_eq!(decode_weight(&reply).unwrap(), 1200);
//! ```

pub mod bench;
pub mod device;
pub mod scale;
pub mod sensor;

pub use bench::{BenchPort, SimBench};
pub use device::{run_silent_port, run_virtual_device, SharedDevice, VirtualDevice};
pub use scale::VirtualScale;
pub use sensor::VirtualSensor;
