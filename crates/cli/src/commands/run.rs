//! `run` command implementation.

use anyhow::{Context, Result};
use contracts::AppConfig;
use std::time::Duration;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::trip::{TripRunConfig, TripRunner};

/// Execute the `run` command
pub async fn run_trip(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let mut app = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    apply_overrides(&mut app, args)?;

    info!(
        mount = %app.trip.mount,
        sensitivity = app.trip.sensitivity,
        speed_limit_kmh = app.trip.speed_limit_kmh,
        store = %app.storage.name,
        store_type = ?app.storage.store_type,
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&app, args);
        return Ok(());
    }

    let runner = TripRunner::new(TripRunConfig {
        app,
        duration: (args.duration > 0).then(|| Duration::from_secs(args.duration)),
        replay_path: args.replay.clone(),
        audio: !args.no_audio,
        notes: args.notes.clone(),
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
    });

    info!("Starting trip...");

    let stats = runner
        .run(shutdown_signal())
        .await
        .context("Trip execution failed")?;

    info!(
        saved = stats.saved(),
        score = stats.final_status.score,
        violations = stats.final_status.counts.total(),
        wall_secs = stats.wall_time.as_secs_f64(),
        "Trip finished"
    );
    stats.print_summary();

    info!("DriveSafer finished");
    Ok(())
}

/// CLI flags win over the file; the result is validated again
fn apply_overrides(app: &mut AppConfig, args: &RunArgs) -> Result<(), CliError> {
    if let Some(mount) = args.mount {
        info!(%mount, "Overriding mount position from CLI");
        app.trip.mount = mount;
    }
    if let Some(sensitivity) = args.sensitivity {
        info!(sensitivity, "Overriding sensitivity from CLI");
        app.trip.sensitivity = sensitivity;
    }
    if let Some(speed_limit) = args.speed_limit {
        info!(speed_limit, "Overriding speed limit from CLI");
        app.trip.speed_limit_kmh = speed_limit;
    }

    config_loader::ConfigLoader::validate(app)
        .map_err(|e| CliError::config_validation(e.to_string()))
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(app: &AppConfig, args: &RunArgs) {
    println!("\n=== Trip Configuration ===\n");
    println!("Trip:");
    println!("  Mount: {}", app.trip.mount);
    println!("  Sensitivity: {:.2}", app.trip.sensitivity);
    println!("  Speed limit: {} km/h", app.trip.speed_limit_kmh);
    match args.duration {
        0 => println!("  Duration: until Ctrl+C"),
        secs => println!("  Duration: {}s", secs),
    }

    println!("\nSources:");
    match &args.replay {
        Some(dir) => println!("  Replay: {}", dir.display()),
        None => {
            let maneuvers = app
                .simulation
                .as_ref()
                .map_or(0, |script| script.maneuvers.len());
            println!("  Scripted drive ({} maneuvers)", maneuvers);
        }
    }
    println!("  Microphone: {}", if args.no_audio { "off" } else { "on" });

    println!("\nStorage:");
    println!("  {} ({:?})", app.storage.name, app.storage.store_type);
    for (key, value) in &app.storage.params {
        println!("  {} = {}", key, value);
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use contracts::MountPosition;

    fn run_args(extra: &[&str]) -> RunArgs {
        let mut argv = vec!["drivesafer", "run"];
        argv.extend_from_slice(extra);
        match crate::cli::Cli::try_parse_from(argv).unwrap().command {
            crate::cli::Commands::Run(args) => args,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_overrides_are_applied() {
        let mut app = AppConfig::default();
        let args = run_args(&["--mount", "sideways_mounted", "--sensitivity", "1.3"]);

        apply_overrides(&mut app, &args).unwrap();
        assert_eq!(app.trip.mount, MountPosition::SidewaysMounted);
        assert_eq!(app.trip.sensitivity, 1.3);
        assert_eq!(app.trip.speed_limit_kmh, 50);
    }

    #[test]
    fn test_out_of_range_override_is_rejected() {
        let mut app = AppConfig::default();
        let args = run_args(&["--speed-limit", "200"]);

        let err = apply_overrides(&mut app, &args).unwrap_err();
        assert!(matches!(err, CliError::ConfigValidation { .. }));
    }

    #[tokio::test]
    async fn test_missing_config_file() {
        let args = run_args(&["--config", "/nonexistent/drivesafer.toml"]);
        let err = run_trip(&args).await.unwrap_err();
        assert!(err.to_string().contains("not found"), "got: {err}");
    }

    #[tokio::test]
    async fn test_dry_run_does_not_start_a_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drivesafer.toml");
        std::fs::write(&path, "[trip]\nspeed_limit_kmh = 70\n").unwrap();

        let args = run_args(&["--config", path.to_str().unwrap(), "--dry-run"]);
        run_trip(&args).await.unwrap();
    }
}
