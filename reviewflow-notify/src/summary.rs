//! Text summary of a run
//!
//! The summary is the single textual form shared by every channel. It only
//! reads the run, so rendering the same run twice gives the same text.

use chrono::{DateTime, SecondsFormat, Utc};
use reviewflow_core::domain::run::{PipelineRun, RunStatus};

/// Subject line for a run, e.g. `Data Pipeline - SUCCESS`
pub fn subject(run: &PipelineRun) -> String {
    format!("Data Pipeline - {}", run.overall_status().label())
}

/// Renders the run summary
///
/// Contains the pipeline id, start and end timestamps, one line per step
/// (`name: outcome (duration)`) and, for failed runs, the error.
pub fn render_summary(run: &PipelineRun) -> String {
    let mut message = format!(
        "Data Pipeline - Status: {}\n\nPipeline ID: {}\nStart time: {}\nEnd time: {}\n\nSteps:\n",
        run.overall_status().label(),
        run.id(),
        format_time(run.start_time()),
        run.end_time()
            .map(format_time)
            .unwrap_or_else(|| "In progress".to_string()),
    );

    for step in run.steps() {
        message.push_str(&format!(
            "- {}: {} ({:.1}s)\n",
            step.name(),
            step.outcome(),
            step.duration().as_secs_f64()
        ));
    }

    if run.overall_status() == RunStatus::Failed {
        message.push_str(&format!(
            "\nError: {}",
            run.error().unwrap_or("Unknown error")
        ));
    }

    message
}

fn format_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}
