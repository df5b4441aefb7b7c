//! Sensor source traits - abstraction over the phone's motion, location and audio inputs
//!
//! Motion and location sources push ticks through callbacks, the same way a
//! platform sensor listener does. Audio is pulled: the consumer owns a
//! dedicated thread that performs blocking buffer reads.

use std::sync::Arc;

use crate::{ContractError, LocationFix, MotionSample};

/// Motion tick callback type
pub type MotionCallback = Arc<dyn Fn(MotionSample) + Send + Sync>;

/// Location fix callback type
pub type LocationCallback = Arc<dyn Fn(LocationFix) + Send + Sync>;

/// Accelerometer source
///
/// # Example
///
/// ```ignore
/// let source: Arc<dyn MotionSource> = get_motion_source();
/// source.listen(Arc::new(|sample| {
///     println!("x={} y={} z={}", sample.x, sample.y, sample.z);
/// }));
/// // ... drive ...
/// source.stop();
/// ```
pub trait MotionSource: Send + Sync {
    /// Source identifier (used for logging/metrics)
    fn source_id(&self) -> &str;

    /// Register the tick callback and start delivering samples
    ///
    /// Repeated calls while listening are idempotent.
    fn listen(&self, callback: MotionCallback);

    /// Stop delivering samples. Must not block.
    fn stop(&self);

    fn is_listening(&self) -> bool;
}

/// Location provider
pub trait LocationSource: Send + Sync {
    fn source_id(&self) -> &str;

    /// Register the fix callback and start delivering fixes
    fn listen(&self, callback: LocationCallback);

    /// Stop delivering fixes. Must not block.
    fn stop(&self);

    fn is_listening(&self) -> bool;
}

/// Microphone delivering signed 16-bit PCM buffers
///
/// Owned by exactly one capture thread while a trip is active.
pub trait AudioSource: Send {
    fn source_id(&self) -> &str;

    /// Acquire the device
    fn open(&mut self) -> Result<(), ContractError>;

    /// Blocking read into `buffer`, returns the number of samples written
    fn read(&mut self, buffer: &mut [i16]) -> Result<usize, ContractError>;

    /// Release the device. Called only after the capture loop has exited.
    fn close(&mut self);
}
