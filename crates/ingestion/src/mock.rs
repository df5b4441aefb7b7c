//! Mock 传感器源
//!
//! Plays a `DriveScript` through the motion, location and audio interfaces,
//! for runs without a phone attached.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use contracts::{
    Clock, ContractError, DriveScript, GeoPoint, LocationCallback, LocationFix, LocationSource,
    ManeuverKind, MotionCallback, MotionSample, MotionSource, MountPosition, AudioSource,
};
use tracing::{debug, trace};

const METERS_PER_DEGREE: f64 = 111_320.0;

/// Vehicle-frame acceleration (m/s²) at an offset into the drive
pub fn vehicle_acceleration(script: &DriveScript, offset_ms: u64) -> [f64; 3] {
    let mut accel = [0.0; 3];
    for maneuver in script.maneuvers.iter().filter(|m| m.is_active(offset_ms)) {
        match maneuver.kind {
            // Forward acceleration reads as negative Y in the vehicle frame
            ManeuverKind::HardAcceleration => accel[1] = -maneuver.intensity,
            ManeuverKind::HardBrake => accel[1] = maneuver.intensity,
            ManeuverKind::SharpTurn => accel[0] = maneuver.intensity,
            ManeuverKind::Speeding | ManeuverKind::LoudCabin => {}
        }
    }
    accel
}

/// Ground speed (m/s) at an offset into the drive
pub fn scripted_speed(script: &DriveScript, offset_ms: u64) -> f64 {
    script
        .maneuvers
        .iter()
        .filter(|m| m.kind == ManeuverKind::Speeding && m.is_active(offset_ms))
        .map(|m| m.intensity)
        .fold(script.cruise_speed_mps, f64::max)
}

/// Cabin level (dB) at an offset into the drive
pub fn scripted_noise_db(script: &DriveScript, offset_ms: u64) -> f64 {
    script
        .maneuvers
        .iter()
        .filter(|m| m.kind == ManeuverKind::LoudCabin && m.is_active(offset_ms))
        .map(|m| m.intensity)
        .fold(script.ambient_db, f64::max)
}

/// Express a vehicle-frame vector in phone axes for a mount position
///
/// Inverse of the axis remap applied by the motion filter.
pub fn phone_frame(mount: MountPosition, vehicle: [f64; 3]) -> [f64; 3] {
    let [x, y, z] = vehicle;
    match mount {
        MountPosition::FlatDashboard => [x, y, z],
        MountPosition::VerticalUpright => [x, z, -y],
        MountPosition::SidewaysMounted => [-y, x, z],
    }
}

/// Move a point along a heading (degrees clockwise from north)
pub fn advance(point: GeoPoint, heading_deg: f64, distance_m: f64) -> GeoPoint {
    let heading = heading_deg.to_radians();
    let dlat = distance_m * heading.cos() / METERS_PER_DEGREE;
    let dlon = distance_m * heading.sin() / (METERS_PER_DEGREE * point.latitude.to_radians().cos());
    GeoPoint {
        latitude: point.latitude + dlat,
        longitude: point.longitude + dlon,
    }
}

/// Square-wave amplitude whose RMS reads as `db`
pub fn amplitude_for_db(db: f64) -> i16 {
    let amplitude = 32_767.0 * 10f64.powf((db - 90.0) / 20.0);
    amplitude.round().clamp(0.0, f64::from(i16::MAX)) as i16
}

fn interval(hz: f64) -> Duration {
    Duration::from_secs_f64(1.0 / hz.max(0.1))
}

/// Shared listen/stop bookkeeping
///
/// Each `listen` bumps the generation so a thread left over from an earlier
/// run exits instead of delivering into the new callback.
#[derive(Default)]
struct RunState {
    listening: AtomicBool,
    generation: AtomicU64,
}

impl RunState {
    /// Returns the new generation, or None if already listening
    fn begin(&self) -> Option<u64> {
        if self.listening.swap(true, Ordering::SeqCst) {
            return None;
        }
        Some(self.generation.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.listening.load(Ordering::Relaxed) && self.generation.load(Ordering::Relaxed) == generation
    }

    fn end(&self) -> bool {
        self.listening.swap(false, Ordering::SeqCst)
    }
}

/// Scripted accelerometer
pub struct MockMotionSource {
    source_id: String,
    script: Arc<DriveScript>,
    mount: MountPosition,
    clock: Arc<dyn Clock>,
    state: Arc<RunState>,
}

impl MockMotionSource {
    pub fn new(script: Arc<DriveScript>, mount: MountPosition, clock: Arc<dyn Clock>) -> Self {
        Self {
            source_id: "mock_motion".to_string(),
            script,
            mount,
            clock,
            state: Arc::new(RunState::default()),
        }
    }

    /// Raw phone-frame sample at an offset into the drive
    pub fn sample_at(&self, offset_ms: u64, timestamp_ms: u64) -> MotionSample {
        let vehicle = vehicle_acceleration(&self.script, offset_ms);
        let [x, y, z] = phone_frame(self.mount, vehicle);
        let [bx, by, bz] = self.script.rest_bias;
        MotionSample::new(x + bx, y + by, z + bz, timestamp_ms)
    }
}

impl MotionSource for MockMotionSource {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn listen(&self, callback: MotionCallback) {
        let Some(generation) = self.state.begin() else {
            return;
        };

        let source = Self {
            source_id: self.source_id.clone(),
            script: self.script.clone(),
            mount: self.mount,
            clock: self.clock.clone(),
            state: self.state.clone(),
        };
        let period = interval(self.script.motion_hz);

        debug!(
            source_id = %self.source_id,
            motion_hz = self.script.motion_hz,
            mount = %self.mount,
            "mock motion source started"
        );

        std::thread::spawn(move || {
            let started_ms = source.clock.now_ms();
            while source.state.is_current(generation) {
                let now_ms = source.clock.now_ms();
                let sample = source.sample_at(now_ms.saturating_sub(started_ms), now_ms);
                trace!(source_id = %source.source_id, timestamp_ms = now_ms, "mock motion tick");
                callback(sample);
                std::thread::sleep(period);
            }
            debug!(source_id = %source.source_id, "mock motion source stopped");
        });
    }

    fn stop(&self) {
        self.state.end();
    }

    fn is_listening(&self) -> bool {
        self.state.listening.load(Ordering::Relaxed)
    }
}

/// Scripted positioning provider
pub struct MockLocationSource {
    source_id: String,
    script: Arc<DriveScript>,
    clock: Arc<dyn Clock>,
    state: Arc<RunState>,
}

impl MockLocationSource {
    pub fn new(script: Arc<DriveScript>, clock: Arc<dyn Clock>) -> Self {
        Self {
            source_id: "mock_location".to_string(),
            script,
            clock,
            state: Arc::new(RunState::default()),
        }
    }
}

impl LocationSource for MockLocationSource {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn listen(&self, callback: LocationCallback) {
        let Some(generation) = self.state.begin() else {
            return;
        };

        let script = self.script.clone();
        let clock = self.clock.clone();
        let state = self.state.clone();
        let source_id = self.source_id.clone();
        let period = interval(script.location_hz);

        debug!(source_id = %source_id, location_hz = script.location_hz, "mock location source started");

        std::thread::spawn(move || {
            let started_ms = clock.now_ms();
            let mut position = script.origin;
            let mut last_ms = started_ms;

            while state.is_current(generation) {
                let now_ms = clock.now_ms();
                let offset_ms = now_ms.saturating_sub(started_ms);
                let speed = scripted_speed(&script, offset_ms);
                let elapsed_s = now_ms.saturating_sub(last_ms) as f64 / 1000.0;
                position = advance(position, script.heading_deg, speed * elapsed_s);
                last_ms = now_ms;

                let mut fix = LocationFix::new(
                    position.latitude,
                    position.longitude,
                    now_ms,
                    script.fix_accuracy_m,
                );
                fix.speed_mps = Some(speed);
                trace!(source_id = %source_id, timestamp_ms = now_ms, speed, "mock location fix");
                callback(fix);

                std::thread::sleep(period);
            }
            debug!(source_id = %source_id, "mock location source stopped");
        });
    }

    fn stop(&self) {
        self.state.end();
    }

    fn is_listening(&self) -> bool {
        self.state.listening.load(Ordering::Relaxed)
    }
}

/// Scripted microphone
///
/// Fills buffers with a square wave at the scripted cabin level.
pub struct MockAudioSource {
    source_id: String,
    script: Arc<DriveScript>,
    clock: Arc<dyn Clock>,
    opened_at_ms: Option<u64>,
    unavailable: bool,
    failing_reads: bool,
}

impl MockAudioSource {
    pub fn new(script: Arc<DriveScript>, clock: Arc<dyn Clock>) -> Self {
        Self {
            source_id: "mock_audio".to_string(),
            script,
            clock,
            opened_at_ms: None,
            unavailable: false,
            failing_reads: false,
        }
    }

    /// `open` fails, as with a denied microphone permission
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    /// Every `read` fails
    pub fn failing_reads(mut self) -> Self {
        self.failing_reads = true;
        self
    }
}

impl AudioSource for MockAudioSource {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn open(&mut self) -> Result<(), ContractError> {
        if self.unavailable {
            return Err(ContractError::sensor_unavailable(
                &self.source_id,
                "microphone permission denied",
            ));
        }
        self.opened_at_ms = Some(self.clock.now_ms());
        Ok(())
    }

    fn read(&mut self, buffer: &mut [i16]) -> Result<usize, ContractError> {
        let Some(opened_at) = self.opened_at_ms else {
            return Err(ContractError::sensor_read(&self.source_id, "device not open"));
        };
        if self.failing_reads {
            return Err(ContractError::sensor_read(&self.source_id, "buffer overrun"));
        }

        let offset_ms = self.clock.now_ms().saturating_sub(opened_at);
        let amplitude = amplitude_for_db(scripted_noise_db(&self.script, offset_ms));
        for (i, slot) in buffer.iter_mut().enumerate() {
            *slot = if i % 2 == 0 { amplitude } else { -amplitude };
        }
        Ok(buffer.len())
    }

    fn close(&mut self) {
        if self.opened_at_ms.take().is_some() {
            debug!(source_id = %self.source_id, "mock audio source closed");
        }
    }
}

/// The three scripted sources for one drive
pub struct ScriptedDrive {
    pub script: Arc<DriveScript>,
    pub mount: MountPosition,
    pub clock: Arc<dyn Clock>,
}

impl ScriptedDrive {
    pub fn new(script: DriveScript, mount: MountPosition, clock: Arc<dyn Clock>) -> Self {
        Self {
            script: Arc::new(script),
            mount,
            clock,
        }
    }

    pub fn motion_source(&self) -> Arc<MockMotionSource> {
        Arc::new(MockMotionSource::new(
            self.script.clone(),
            self.mount,
            self.clock.clone(),
        ))
    }

    pub fn location_source(&self) -> Arc<MockLocationSource> {
        Arc::new(MockLocationSource::new(self.script.clone(), self.clock.clone()))
    }

    pub fn audio_source(&self) -> MockAudioSource {
        MockAudioSource::new(self.script.clone(), self.clock.clone())
    }
}
