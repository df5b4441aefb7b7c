//! # DriveSafer CLI
//!
//! 命令行接口入口点。
//!
//! 提供：
//! - 配置加载与验证
//! - 行程运行与生命周期管理
//! - 优雅关闭处理

mod cli;
mod commands;
mod error;
mod trip;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use cli::{Cli, Commands};
use observability::ObservabilityConfig;
use commands::{run_info, run_trip, run_validate};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    init_logging(&cli)?;

    info!(version = env!("CARGO_PKG_VERSION"), "DriveSafer CLI starting");

    let result = match &cli.command {
        Commands::Run(args) => run_trip(args).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Info(args) => run_info(args),
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}

/// Initialize logging based on CLI options
///
/// RUST_LOG wins over `-v` and `--quiet`.
fn init_logging(cli: &Cli) -> Result<()> {
    let default_log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        _ => "trace",
    };

    observability::init_with_config(ObservabilityConfig {
        log_format: cli.log_format.into(),
        // The run command installs the exporter when asked to
        metrics_port: None,
        default_log_level: default_log_level.to_string(),
    })
}
