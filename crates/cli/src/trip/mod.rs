//! Trip orchestration module.

mod runner;
mod stats;

pub use runner::{TripRunConfig, TripRunner};
pub use stats::{StatusObserver, TripStats};
