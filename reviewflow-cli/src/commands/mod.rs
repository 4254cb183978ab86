//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod config;
mod run;

pub use run::RunArgs;

use anyhow::Result;
use clap::Subcommand;
use reviewflow_runner::PipelineConfig;
use std::process::ExitCode;

/// Exit code for configuration errors, including invalid flag overrides
pub const EXIT_CONFIG: u8 = 2;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run the pipeline once
    Run(RunArgs),
    /// Print the effective configuration as TOML
    Config,
}

/// Routes the command to its handler
///
/// The returned exit code reflects the pipeline outcome: success only when
/// the run succeeded, [`EXIT_CONFIG`] when the run could not be set up.
pub async fn handle_command(command: Commands, config: PipelineConfig) -> Result<ExitCode> {
    match command {
        Commands::Run(args) => run::handle_run(args, config).await,
        Commands::Config => config::print_config(&config).map(|_| ExitCode::SUCCESS),
    }
}
