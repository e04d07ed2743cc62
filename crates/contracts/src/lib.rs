//! # Contracts
//!
//! Frozen interface contracts, defining inter-module data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Simulation time is seconds (f64) read from the step loop's clock
//! - Messages carry it as a ROS stamp (`sec: i32`, `nanosec: u32`)

mod blueprint;
mod error;
mod frame;
mod message;
mod scan_config;
mod sensor_id;
mod sink;
mod wire;

pub use blueprint::*;
pub use error::*;
pub use frame::ScanFrame;
pub use message::*;
pub use scan_config::*;
pub use sensor_id::SensorId;
pub use sink::*;
pub use wire::{
    decode, frame_len, peek_frame_len, EncodeOptions, ScanEncoder, WireError, HEADER_LEN, MAGIC,
    WIRE_VERSION,
};
