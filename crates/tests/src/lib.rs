//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 配置 → 传感器源 → 会话 → 存储 的完整链路
//! - 模拟 e2e 测试（无需真机）

#[cfg(test)]
mod contract_tests {
    use contracts::ConfigVersion;

    #[test]
    fn test_config_version_wire_name() {
        // 配置文件中写作 "V1"
        let json = serde_json::to_string(&ConfigVersion::V1).unwrap();
        assert_eq!(json, "\"V1\"");
        let parsed: ConfigVersion = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, ConfigVersion::V1);
        assert!(serde_json::from_str::<ConfigVersion>("\"V2\"").is_err());
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::path::Path;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{
        AudioSource, Clock, DetectionConfig, DriveScript, GeoPoint, LocationFix, LocationSource,
        Maneuver, ManeuverKind, ManualClock, MotionConfig, MotionSample, MotionSource,
        MountPosition, NoiseConfig, ViolationKind,
    };
    use ingestion::{ReplayDir, ScriptedDrive, LOCATION_FILE, MOTION_FILE};
    use session::{SessionSources, SessionStatus, TripSession};
    use storage::{FileStore, MemoryStore, TripRecorder};

    /// Responsive filter: no smoothing, short calibration, two-tick windows
    fn responsive_config() -> DetectionConfig {
        DetectionConfig {
            motion: MotionConfig {
                smoothing_alpha: 1.0,
                calibration_samples: 5,
                average_window: 2,
                ..MotionConfig::default()
            },
            noise: NoiseConfig {
                poll_interval_ms: 5,
                buffer_samples: 256,
                ..NoiseConfig::default()
            },
            ..DetectionConfig::default()
        }
    }

    fn maneuver(kind: ManeuverKind, start_ms: u64, intensity: f64) -> Maneuver {
        Maneuver {
            kind,
            start_ms,
            duration_ms: 2_000,
            intensity,
        }
    }

    fn wait_for(session: &TripSession, mut done: impl FnMut(&SessionStatus) -> bool) {
        let start = Instant::now();
        while start.elapsed() < Duration::from_secs(10) {
            if done(&session.status()) {
                return;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("condition not reached, status: {:?}", session.status());
    }

    /// End-to-end: ScriptedDrive -> TripSession -> TripRecorder -> MemoryStore
    ///
    /// The manual clock moves 100 ms of drive time every 10 ms of real time,
    /// so the mock sources see a 35 s drive in a few seconds.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_e2e_scripted_drive() {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let script = DriveScript {
            motion_hz: 400.0,
            location_hz: 10.0,
            maneuvers: vec![
                maneuver(ManeuverKind::HardAcceleration, 8_000, 5.0),
                maneuver(ManeuverKind::HardBrake, 16_000, 6.0),
                maneuver(ManeuverKind::LoudCabin, 24_000, 86.0),
            ],
            ..DriveScript::default()
        };
        let drive = ScriptedDrive::new(script, MountPosition::VerticalUpright, clock.clone());

        let store = MemoryStore::new("e2e");
        let recorder = TripRecorder::spawn(store.clone(), 4);
        let mut session = TripSession::new(
            responsive_config(),
            SessionSources {
                motion: Some(drive.motion_source() as Arc<dyn MotionSource>),
                location: Some(drive.location_source() as Arc<dyn LocationSource>),
                audio: Some(Box::new(drive.audio_source()) as Box<dyn AudioSource>),
            },
            recorder.handle(),
            clock.clone(),
        );

        session
            .start(MountPosition::VerticalUpright, 1.0, 50)
            .unwrap();
        assert!(session.status().noise_active);

        for _ in 0..350 {
            clock.advance(100);
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let summary = tokio::task::block_in_place(|| session.stop()).unwrap();
        assert_eq!(summary.counts.acceleration, 1);
        assert_eq!(summary.counts.brake, 1);
        assert_eq!(summary.counts.noise, 1);
        assert_eq!(summary.counts.turn, 0);
        assert_eq!(summary.final_score, 100 - 5 - 5 - 4);
        assert_eq!(summary.duration_ms, 35_000);

        let outcome = session
            .take_persist_ticket()
            .unwrap()
            .wait()
            .await
            .unwrap();
        assert!(outcome.is_complete());
        assert_eq!(outcome.violations_saved, 3);
        // One point every 2 s of drive time at most
        assert!(outcome.route_points_saved >= 10, "{outcome:?}");
        assert!(outcome.route_points_saved <= 18, "{outcome:?}");

        let stored = store.get_trip(outcome.trip_id).unwrap();
        assert_eq!(stored.final_score, 86);

        let violations = store.violations(outcome.trip_id);
        let kinds: Vec<_> = violations.iter().map(|v| v.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ViolationKind::Acceleration,
                ViolationKind::Brake,
                ViolationKind::Noise
            ]
        );
        assert!(violations.iter().all(|v| v.location.is_some()));
        assert!(violations[0].speed_mps > 10.0);

        drop(session);
        recorder.shutdown().await;
    }

    fn write_jsonl<T: serde::Serialize>(path: &Path, records: &[T]) {
        let lines: Vec<String> = records
            .iter()
            .map(|r| serde_json::to_string(r).unwrap())
            .collect();
        std::fs::write(path, lines.join("\n")).unwrap();
    }

    /// Recorded drive: rest, a hard brake at 800 ms, rest again
    fn write_recording(dir: &Path) {
        let motion: Vec<MotionSample> = (0..120u64)
            .map(|i| {
                let t = i * 10;
                let y = if (800..1_000).contains(&t) { 6.0 } else { 0.0 };
                MotionSample::new(0.0, y, 9.81, t)
            })
            .collect();
        write_jsonl(&dir.join(MOTION_FILE), &motion);

        // ~5 m north in 500 ms
        let origin = GeoPoint {
            latitude: 48.1371,
            longitude: 11.5754,
        };
        let fixes = vec![
            LocationFix::new(origin.latitude, origin.longitude, 0, 4.0),
            LocationFix::new(origin.latitude + 4.4966e-5, origin.longitude, 500, 4.0),
        ];
        write_jsonl(&dir.join(LOCATION_FILE), &fixes);
    }

    const FILE_STORE_TOML: &str = r#"
[trip]
mount = "flat_dashboard"
speed_limit_kmh = 60

[detection.motion]
min_sample_interval_ms = 10
smoothing_alpha = 1.0
calibration_samples = 5
average_window = 2

[storage]
name = "replayed"
store_type = "file"
queue_capacity = 2

[storage.params]
"#;

    /// End-to-end: TOML config -> ReplayDir -> TripSession -> FileStore, then notes
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_e2e_replay_into_file_store() {
        let recording = tempfile::tempdir().unwrap();
        let trips = tempfile::tempdir().unwrap();
        write_recording(recording.path());

        let toml = format!(
            "{FILE_STORE_TOML}{} = \"{}\"\n",
            storage::PATH_PARAM,
            trips.path().display()
        );
        let app = ConfigLoader::load_from_str(&toml, ConfigFormat::Toml).unwrap();
        assert_eq!(app.trip.speed_limit_kmh, 60);

        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let replay = ReplayDir::open(recording.path(), clock.clone(), None).unwrap();
        let motion = replay.motion.clone();

        let recorder = storage::create_recorder(&app.storage).unwrap();
        let mut session = TripSession::new(
            app.detection.clone(),
            SessionSources {
                motion: Some(replay.motion as Arc<dyn MotionSource>),
                location: replay.location.map(|l| l as Arc<dyn LocationSource>),
                audio: None,
            },
            recorder.handle(),
            clock.clone(),
        );

        session
            .start(app.trip.mount, app.trip.sensitivity, app.trip.speed_limit_kmh)
            .unwrap();
        assert!(!session.status().noise_active);

        wait_for(&session, |s| s.counts.brake == 1);
        let start = Instant::now();
        while motion.is_listening() && start.elapsed() < Duration::from_secs(10) {
            std::thread::sleep(Duration::from_millis(10));
        }

        clock.advance(31_000);
        let summary = tokio::task::block_in_place(|| session.stop()).unwrap();
        // The clock never moved during the brake, so the cooldown held
        assert_eq!(summary.counts.brake, 1);
        assert_eq!(summary.final_score, 95);

        let outcome = session
            .take_persist_ticket()
            .unwrap()
            .wait()
            .await
            .unwrap();
        assert_eq!(outcome.route_points_saved, 1);
        recorder
            .annotate(outcome.trip_id, "  replayed commute  ")
            .await
            .unwrap();

        drop(session);
        recorder.shutdown().await;

        // Read back through a fresh store over the same directory
        let reopened = FileStore::from_params("replayed", &app.storage.params).unwrap();
        let listed = reopened.list_trips().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].notes, "replayed commute");
        assert_eq!(listed[0].counts.brake, 1);

        let violations = reopened.violations(outcome.trip_id).unwrap();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::Brake);
        assert!((violations[0].severity - 6.0).abs() < 1e-9);
    }

    /// Second trip on the same session starts from a clean slate
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_e2e_back_to_back_trips() {
        let clock = Arc::new(ManualClock::new(0));
        let recording = tempfile::tempdir().unwrap();
        write_recording(recording.path());
        let replay = ReplayDir::open(recording.path(), clock.clone(), None).unwrap();
        let motion = replay.motion.clone();

        let config = DetectionConfig {
            motion: MotionConfig {
                min_sample_interval_ms: 10,
                smoothing_alpha: 1.0,
                calibration_samples: 5,
                average_window: 2,
                ..MotionConfig::default()
            },
            ..DetectionConfig::default()
        };

        let store = MemoryStore::new("mem");
        let recorder = TripRecorder::spawn(store.clone(), 4);
        let mut session = TripSession::new(
            config,
            SessionSources {
                motion: Some(replay.motion as Arc<dyn MotionSource>),
                location: replay.location.map(|l| l as Arc<dyn LocationSource>),
                audio: None,
            },
            recorder.handle(),
            clock.clone() as Arc<dyn Clock>,
        );

        for trip in 1..=2u64 {
            session
                .start(MountPosition::FlatDashboard, 1.0, 50)
                .unwrap();
            let status = session.status();
            assert_eq!(status.score, 100);
            assert_eq!(status.counts.total(), 0);

            wait_for(&session, |s| s.counts.brake == 1);
            let start = Instant::now();
            while motion.is_listening() && start.elapsed() < Duration::from_secs(10) {
                std::thread::sleep(Duration::from_millis(10));
            }

            clock.advance(40_000);
            let summary = tokio::task::block_in_place(|| session.stop()).unwrap();
            assert_eq!(summary.final_score, 95);

            let outcome = session
                .take_persist_ticket()
                .unwrap()
                .wait()
                .await
                .unwrap();
            assert_eq!(outcome.trip_id, trip);
        }

        assert_eq!(store.trip_count(), 2);
        let listed = store.list_trips();
        assert_eq!(listed[0].id, Some(2));

        drop(session);
        recorder.shutdown().await;
    }
}
