//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use contracts::MountPosition;
use std::path::PathBuf;

/// DriveSafer - real-time driving behaviour monitor
#[derive(Parser, Debug)]
#[command(
    name = "drivesafer",
    author,
    version,
    about = "Driving violation detection and trip scoring",
    long_about = "Runs a monitored trip against scripted or recorded sensor data.\n\n\
                  Detects hard acceleration, hard braking, sharp turns, speeding and \n\
                  loud cabin noise, keeps a safety score, and persists the trip."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "DRIVESAFER_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "DRIVESAFER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one monitored trip
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display effective detection settings
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "drivesafer.toml",
        env = "DRIVESAFER_CONFIG"
    )]
    pub config: PathBuf,

    /// Trip length in seconds (0 = until Ctrl+C)
    #[arg(long, default_value = "60", env = "DRIVESAFER_DURATION")]
    pub duration: u64,

    /// Override phone mount position (flat_dashboard, vertical_upright, sideways_mounted)
    #[arg(long)]
    pub mount: Option<MountPosition>,

    /// Override detection sensitivity (0.5 - 1.5)
    #[arg(long)]
    pub sensitivity: Option<f64>,

    /// Override speed limit in km/h (30 - 120)
    #[arg(long, env = "DRIVESAFER_SPEED_LIMIT")]
    pub speed_limit: Option<u32>,

    /// Replay a recorded drive directory instead of the scripted one
    #[arg(long)]
    pub replay: Option<PathBuf>,

    /// Run without the microphone
    #[arg(long)]
    pub no_audio: bool,

    /// Notes attached to the trip once it is saved
    #[arg(long)]
    pub notes: Option<String>,

    /// Validate configuration and exit without running a trip
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "DRIVESAFER_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "drivesafer.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "drivesafer.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show the scripted drive
    #[arg(long)]
    pub simulation: bool,

    /// Show trip store configuration
    #[arg(long)]
    pub storage: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => observability::LogFormat::Json,
            LogFormat::Pretty => observability::LogFormat::Pretty,
            LogFormat::Compact => observability::LogFormat::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_args_parse_overrides() {
        let cli = Cli::try_parse_from([
            "drivesafer",
            "run",
            "--config",
            "trip.toml",
            "--duration",
            "45",
            "--mount",
            "vertical-upright",
            "--speed-limit",
            "80",
            "--notes",
            "school run",
        ])
        .unwrap();

        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.config, PathBuf::from("trip.toml"));
        assert_eq!(args.duration, 45);
        assert_eq!(args.mount, Some(MountPosition::VerticalUpright));
        assert_eq!(args.speed_limit, Some(80));
        assert_eq!(args.notes.as_deref(), Some("school run"));
        assert!(!args.dry_run);
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["drivesafer", "-q", "-v", "info"]).is_err());
    }
}
