//! # Ingestion
//!
//! Sensor data ingestion module.
//!
//! Responsibilities:
//! - Scripted mock sources for motion, location and audio
//! - Replay of recorded drives (JSON lines + raw PCM)
//! - A bounded event queue with drop-newest backpressure feeding one
//!   dispatcher thread
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{QueueConfig, ScriptedDrive, SensorEvent, SensorQueue};
//!
//! let drive = ScriptedDrive::new(script, MountPosition::FlatDashboard, clock);
//!
//! let mut queue = SensorQueue::new(QueueConfig::new(256));
//! queue.attach_motion(drive.motion_source());
//! queue.attach_location(drive.location_source());
//! queue.start_all();
//!
//! let dispatcher = queue.spawn_dispatcher(|event| match event {
//!     SensorEvent::Motion(sample) => { /* filter + classify */ }
//!     SensorEvent::Location(fix) => { /* speed + route */ }
//! })?;
//!
//! queue.stop_all();
//! dispatcher.join().ok();
//! ```

mod config;
mod error;
mod mock;
mod queue;
mod replay;

pub use config::{IngestionMetrics, MetricsSnapshot, QueueConfig};
pub use error::{IngestionError, Result};
pub use mock::{
    advance, amplitude_for_db, phone_frame, scripted_noise_db, scripted_speed,
    vehicle_acceleration, MockAudioSource, MockLocationSource, MockMotionSource, ScriptedDrive,
};
pub use queue::{SensorEvent, SensorQueue};
pub use replay::{
    decode_pcm, load_jsonl, PcmFileAudioSource, Recorded, ReplayDir, ReplaySource, AUDIO_FILE,
    LOCATION_FILE, MOTION_FILE,
};
