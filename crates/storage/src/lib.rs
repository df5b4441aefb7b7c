//! # Storage
//!
//! Trip persistence module.
//!
//! Responsibilities:
//! - Accept finalized trips without blocking the trip session
//! - Write the summary, then its route points and violations, on a worker task
//! - Log, file and in-memory store backends
//!
//! ## Usage Example
//!
//! ```ignore
//! use storage::create_recorder;
//!
//! let recorder = create_recorder(&config.storage)?;
//! let ticket = recorder.submit(finalized_trip)?;
//! let outcome = ticket.wait().await?;
//! recorder.annotate(outcome.trip_id, "rainy commute").await?;
//! recorder.shutdown().await;
//! ```

pub mod error;
pub mod factory;
pub mod metrics;
pub mod recorder;
pub mod stores;

pub use contracts::{FinalizedTrip, TripStore};
pub use error::StorageError;
pub use factory::create_recorder;
pub use metrics::{MetricsSnapshot, RecorderMetrics};
pub use recorder::{PersistOutcome, PersistTicket, RecorderHandle, TripRecorder};
pub use stores::{FileStore, FileStoreConfig, LogStore, MemoryStore, PATH_PARAM};
