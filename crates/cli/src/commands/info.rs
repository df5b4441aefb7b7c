//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{AppConfig, ViolationKind};
use detection::ViolationClassifier;
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    trip: TripInfo,
    thresholds: ThresholdInfo,
    noise: NoiseInfo,
    penalties: Vec<PenaltyInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    storage: Option<StorageInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    simulation: Option<SimulationInfo>,
}

#[derive(Serialize)]
struct TripInfo {
    mount: String,
    sensitivity: f64,
    speed_limit_kmh: u32,
    speed_limit_mps: f64,
}

/// Thresholds after sensitivity scaling (m/s²)
#[derive(Serialize)]
struct ThresholdInfo {
    acceleration: f64,
    brake: f64,
    turn: f64,
    cooldown_ms: u64,
    min_detection_speed_mps: f64,
}

#[derive(Serialize)]
struct NoiseInfo {
    violation_db: f64,
    warning_db: f64,
    sustained_ms: u64,
    cooldown_ms: u64,
}

#[derive(Serialize)]
struct PenaltyInfo {
    kind: String,
    points: u32,
}

#[derive(Serialize)]
struct StorageInfo {
    name: String,
    store_type: String,
    queue_capacity: usize,
    #[serde(skip_serializing_if = "std::collections::HashMap::is_empty")]
    params: std::collections::HashMap<String, String>,
}

#[derive(Serialize)]
struct SimulationInfo {
    motion_hz: f64,
    location_hz: f64,
    cruise_speed_mps: f64,
    maneuvers: Vec<String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let app = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let info = build_config_info(&app, args);
    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn build_config_info(app: &AppConfig, args: &InfoArgs) -> ConfigInfo {
    let detection = &app.detection;
    let classifier = ViolationClassifier::new(
        detection.classifier.clone(),
        detection.speed.min_detection_speed_mps,
    );
    let scaled = classifier.thresholds(app.trip.sensitivity);

    let storage = args.storage.then(|| StorageInfo {
        name: app.storage.name.clone(),
        store_type: format!("{:?}", app.storage.store_type),
        queue_capacity: app.storage.queue_capacity,
        params: app.storage.params.clone(),
    });

    let simulation = if args.simulation {
        let script = app.simulation.clone().unwrap_or_default();
        Some(SimulationInfo {
            motion_hz: script.motion_hz,
            location_hz: script.location_hz,
            cruise_speed_mps: script.cruise_speed_mps,
            maneuvers: script
                .maneuvers
                .iter()
                .map(|m| {
                    format!(
                        "{:?} at {}ms for {}ms (intensity {})",
                        m.kind, m.start_ms, m.duration_ms, m.intensity
                    )
                })
                .collect(),
        })
    } else {
        None
    };

    ConfigInfo {
        version: format!("{:?}", app.version),
        trip: TripInfo {
            mount: app.trip.mount.to_string(),
            sensitivity: app.trip.sensitivity,
            speed_limit_kmh: app.trip.speed_limit_kmh,
            speed_limit_mps: f64::from(app.trip.speed_limit_kmh) / 3.6,
        },
        thresholds: ThresholdInfo {
            acceleration: scaled.acceleration,
            brake: scaled.brake,
            turn: scaled.turn,
            cooldown_ms: detection.classifier.cooldown_ms,
            min_detection_speed_mps: detection.speed.min_detection_speed_mps,
        },
        noise: NoiseInfo {
            violation_db: detection.noise.violation_db,
            warning_db: detection.noise.warning_db,
            sustained_ms: detection.noise.sustained_ms,
            cooldown_ms: detection.noise.cooldown_ms,
        },
        penalties: ViolationKind::ALL
            .iter()
            .map(|kind| PenaltyInfo {
                kind: kind.label().to_string(),
                points: kind.penalty(),
            })
            .collect(),
        storage,
        simulation,
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                 DriveSafer Configuration                     ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("🚗 Trip");
    println!("   ├─ Version: {}", info.version);
    println!("   ├─ Mount: {}", info.trip.mount);
    println!("   ├─ Sensitivity: {:.2}", info.trip.sensitivity);
    println!(
        "   └─ Speed limit: {} km/h ({:.2} m/s)",
        info.trip.speed_limit_kmh, info.trip.speed_limit_mps
    );

    let t = &info.thresholds;
    println!("\n📐 Motion thresholds (after sensitivity)");
    println!("   ├─ Hard acceleration: < {:.2} m/s²", t.acceleration);
    println!("   ├─ Hard brake: > {:.2} m/s²", t.brake);
    println!("   ├─ Sharp turn: |x| > {:.2} m/s²", t.turn);
    println!("   ├─ Cooldown: {} ms", t.cooldown_ms);
    println!("   └─ Minimum speed: {:.1} m/s", t.min_detection_speed_mps);

    let n = &info.noise;
    println!("\n🔊 Noise");
    println!("   ├─ Violation: ≥ {:.1} dB (immediate)", n.violation_db);
    println!(
        "   ├─ Warning: ≥ {:.1} dB sustained {} ms",
        n.warning_db, n.sustained_ms
    );
    println!("   └─ Cooldown: {} ms", n.cooldown_ms);

    println!("\n➖ Penalties");
    for (i, penalty) in info.penalties.iter().enumerate() {
        let prefix = if i == info.penalties.len() - 1 { "└─" } else { "├─" };
        println!("   {} {}: -{}", prefix, penalty.kind, penalty.points);
    }

    if let Some(storage) = &info.storage {
        println!("\n💾 Storage");
        println!("   ├─ Name: {}", storage.name);
        println!("   ├─ Type: {}", storage.store_type);
        println!("   └─ Queue capacity: {}", storage.queue_capacity);
        for (key, value) in &storage.params {
            println!("      {} = {}", key, value);
        }
    }

    if let Some(simulation) = &info.simulation {
        println!("\n🎬 Simulation");
        println!(
            "   ├─ Rates: motion {} Hz, location {} Hz",
            simulation.motion_hz, simulation.location_hz
        );
        println!("   ├─ Cruise speed: {:.1} m/s", simulation.cruise_speed_mps);
        println!("   └─ Maneuvers ({}):", simulation.maneuvers.len());
        for maneuver in &simulation.maneuvers {
            println!("      - {}", maneuver);
        }
    }

    println!();
}
