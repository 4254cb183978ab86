//! `reviewflow run`

use anyhow::{Context, Result};
use clap::Args;
use colored::*;
use reviewflow_core::domain::run::PipelineRun;
use reviewflow_core::domain::step::StepOutcome;
use reviewflow_core::dto::run::TriggerRun;
use reviewflow_runner::{
    OrchestratorError, PipelineConfig, TracingRunLog, apply_trigger, build_orchestrator,
};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;

use super::EXIT_CONFIG;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Print the final run record as JSON instead of the summary
    #[arg(long)]
    pub json: bool,

    /// Maximum number of records to collect
    #[arg(long)]
    pub max_records: Option<u32>,

    /// Location to collect reviews for (e.g. "Paris")
    #[arg(long)]
    pub target_location: Option<String>,

    /// Skip the data quality stage
    #[arg(long)]
    pub skip_quality: bool,
}

/// Applies command-line overrides on top of the loaded configuration
fn apply_args(config: &mut PipelineConfig, args: &RunArgs) -> Result<()> {
    apply_trigger(
        config,
        &TriggerRun {
            max_records: args.max_records,
            target_location: args.target_location.clone(),
            source: Some("cli".to_string()),
        },
    );
    if args.skip_quality {
        config.quality.enabled = false;
    }
    if args.json {
        // stdout carries the JSON record only
        config.notify.console = false;
    }
    config.validate().context("invalid command-line overrides")
}

pub async fn handle_run(args: RunArgs, config: PipelineConfig) -> Result<ExitCode> {
    run_pipeline(args, config).await.map(ExitCode::from)
}

async fn run_pipeline(args: RunArgs, mut config: PipelineConfig) -> Result<u8> {
    let orchestrator = match apply_args(&mut config, &args)
        .and_then(|()| build_orchestrator(&config, Arc::new(TracingRunLog)))
    {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            eprintln!("{} {:#}", "Configuration error:".red().bold(), e);
            return Ok(EXIT_CONFIG);
        }
    };

    info!(
        "Running pipeline for {} (max {} records)",
        config.ingestion.target_location, config.ingestion.max_records
    );

    let (run, aborted) = match orchestrator.run().await {
        Ok(run) => (run, None),
        Err(OrchestratorError::StageAborted { stage, run, source }) => {
            (*run, Some(format!("{} aborted: {:#}", stage, source)))
        }
        Err(e) => return Err(e.into()),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&run)?);
    } else {
        print_run(&run);
        if let Some(reason) = aborted {
            eprintln!("{} {}", "Internal error:".red().bold(), reason);
        }
    }

    Ok(exit_status(&run))
}

fn exit_status(run: &PipelineRun) -> u8 {
    if run.succeeded() { 0 } else { 1 }
}

fn print_run(run: &PipelineRun) {
    println!();
    if run.succeeded() {
        println!("{}", "✓ Pipeline succeeded".green().bold());
    } else {
        println!("{}", "✗ Pipeline failed".red().bold());
    }
    println!("  ID:       {}", run.id().cyan());
    println!(
        "  Started:  {}",
        run.start_time().format("%Y-%m-%d %H:%M:%S").to_string().dimmed()
    );
    if let Some(end) = run.end_time() {
        let elapsed = (end - run.start_time()).num_milliseconds() as f64 / 1000.0;
        println!("  Duration: {}", format!("{:.1}s", elapsed).dimmed());
    }

    println!("  Steps:");
    for step in run.steps() {
        let outcome = match step.outcome() {
            StepOutcome::Success => step.outcome().to_string().green(),
            StepOutcome::Warning => step.outcome().to_string().yellow(),
            StepOutcome::Failed => step.outcome().to_string().red(),
        };
        println!(
            "    - {}: {} {} {}",
            step.name().to_string().bold(),
            outcome,
            format!("({:.1}s)", step.duration().as_secs_f64()).dimmed(),
            step.message()
        );
    }

    if let Some(error) = run.error() {
        println!("  {} {}", "Error:".red().bold(), error);
    }
}
