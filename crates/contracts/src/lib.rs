//! # Contracts
//!
//! Frozen interface contracts shared by every DriveSafer crate: the data model
//! flowing from sensors to the trip store, the source and store traits, the
//! detection configuration and the unified error type.
//! Business crates depend on this crate only, never the other way around.
//!
//! ## Time Model
//! - All timestamps are wall-clock milliseconds (`u64`)
//! - Sensor samples carry their own timestamp; lifecycle decisions
//!   (cooldowns, trip duration, route throttling) read a [`Clock`]

mod app_config;
mod clock;
mod detection_config;
mod error;
mod sensor;
mod sensor_source;
mod store;
mod trip;
mod violation;

pub use app_config::*;
pub use clock::{Clock, ManualClock, SystemClock};
pub use detection_config::*;
pub use error::*;
pub use sensor::*;
pub use sensor_source::{AudioSource, LocationCallback, LocationSource, MotionCallback, MotionSource};
pub use store::*;
pub use trip::*;
pub use violation::*;
