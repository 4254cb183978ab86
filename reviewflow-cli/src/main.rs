//! ReviewFlow CLI
//!
//! Runs the restaurant review pipeline locally.

mod commands;

use clap::Parser;
use colored::*;
use commands::{Commands, EXIT_CONFIG, handle_command};
use reviewflow_runner::PipelineConfig;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "reviewflow")]
#[command(about = "ReviewFlow data pipeline", long_about = None)]
struct Cli {
    /// Pipeline configuration file (TOML)
    #[arg(short, long, global = true, env = "REVIEWFLOW_CONFIG")]
    config: Option<PathBuf>,

    /// Directory of the CLI log file
    #[arg(long, global = true, env = "REVIEWFLOW_LOG_DIR", default_value = "logs")]
    log_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Keep the guard alive so the file writer flushes on exit
    let _guard = init_tracing(&cli.log_dir);

    let config = match PipelineConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {:#}", "Configuration error:".red().bold(), e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    match handle_command(cli.command, config).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

/// Human-readable stderr logs plus a plain log file in `log_dir`
fn init_tracing(
    log_dir: &std::path::Path,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let default_filter = "reviewflow_cli=info,reviewflow_runner=info,reviewflow_notify=info";

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        );

    let (file_layer, guard) = match std::fs::create_dir_all(log_dir) {
        Ok(()) => {
            let appender = tracing_appender::rolling::never(log_dir, "reviewflow.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(EnvFilter::new(default_filter));
            (Some(layer), Some(guard))
        }
        Err(_) => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();

    guard
}
