//! Run DTOs for the entry points

use serde::{Deserialize, Serialize};

use crate::domain::log::LogEntry;
use crate::domain::run::PipelineRun;

/// Request to trigger a run, overriding the configured ingestion parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriggerRun {
    #[serde(default)]
    pub max_records: Option<u32>,
    #[serde(default)]
    pub target_location: Option<String>,
    /// Free-form origin of the trigger (scheduler, manual, ...)
    #[serde(default)]
    pub source: Option<String>,
}

/// Response of a triggered run
///
/// Mirrors the cloud-function contract: a status code plus the run record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResponse {
    pub status_code: u16,
    pub run: PipelineRun,
    /// Log entries recorded while the run executed
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub logs: Vec<LogEntry>,
}

impl RunResponse {
    pub fn with_logs(mut self, logs: Vec<LogEntry>) -> Self {
        self.logs = logs;
        self
    }
}

impl From<PipelineRun> for RunResponse {
    fn from(run: PipelineRun) -> Self {
        let status_code = if run.succeeded() { 200 } else { 500 };
        Self {
            status_code,
            run,
            logs: Vec::new(),
        }
    }
}
