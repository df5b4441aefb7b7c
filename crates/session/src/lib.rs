//! # Session
//!
//! Trip lifecycle: wires sensor sources into the detection pipeline, keeps
//! the live score and counters, and hands finished trips to the recorder.
//!
//! 线程模型：
//! - One dispatcher thread drains motion and location ticks in arrival order
//! - One sampler thread reads the microphone when noise detection is on
//! - Both mutate the same [`DetectionState`] under a mutex; every observable
//!   change is published as a [`SessionStatus`] on a `watch` channel
//!
//! ## 使用示例
//!
//! ```ignore
//! let mut session = TripSession::new(config, sources, recorder.handle(), clock);
//! session.start(MountPosition::FlatDashboard, 1.0, 50)?;
//!
//! let mut status = session.subscribe();
//! while status.changed().await.is_ok() {
//!     println!("score {}", status.borrow().score);
//! }
//!
//! if let Some(summary) = session.stop() {
//!     let outcome = session.take_persist_ticket().unwrap().wait().await?;
//! }
//! ```

mod audio;
mod error;
mod session;
mod state;
mod status;

pub use audio::NOISE_STOPPED_MESSAGE;
pub use error::{Result, SessionError};
pub use session::{
    validate_trip, SessionSources, TripSession, MICROPHONE_UNAVAILABLE_MESSAGE,
    MOTION_UNAVAILABLE_MESSAGE, NOISE_INIT_FAILED_MESSAGE, TRIP_TOO_LONG_MESSAGE,
    TRIP_TOO_SHORT_MESSAGE,
};
pub use state::{DetectionState, FinishedTrip};
pub use status::{LocationStatus, SessionPhase, SessionStatus, TripSettings};
