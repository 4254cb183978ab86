//! Pipeline run record
//!
//! A [`PipelineRun`] is created when a run starts, receives one step per
//! executed stage, and is finalized exactly once. After finalization every
//! mutator returns [`RunError::AlreadyFinalized`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::step::{StageName, StepResult};

/// Overall status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Running,
    Succeeded,
    Failed,
}

impl RunStatus {
    /// Upper-case label used in notification subjects
    pub fn label(&self) -> &'static str {
        match self {
            RunStatus::Running => "RUNNING",
            RunStatus::Succeeded => "SUCCESS",
            RunStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Running => write!(f, "Running"),
            RunStatus::Succeeded => write!(f, "Succeeded"),
            RunStatus::Failed => write!(f, "Failed"),
        }
    }
}

/// Invalid mutation of a run record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunError {
    #[error("run {0} is already finalized")]
    AlreadyFinalized(String),

    #[error("stage '{stage}' already recorded in run {run_id}")]
    DuplicateStep { run_id: String, stage: StageName },
}

/// Aggregate record of one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    id: String,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    steps: Vec<StepResult>,
    overall_status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl PipelineRun {
    /// Starts a new run with a time-based id such as
    /// `pipeline_20250101_120000_1a2b3c4d`
    pub fn start(prefix: &str) -> Self {
        let start_time = Utc::now();
        let suffix = Uuid::new_v4().simple().to_string();
        let id = format!(
            "{}_{}_{}",
            prefix,
            start_time.format("%Y%m%d_%H%M%S"),
            &suffix[..8]
        );
        Self::with_id(id, start_time)
    }

    pub fn with_id(id: impl Into<String>, start_time: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            start_time,
            end_time: None,
            steps: Vec::new(),
            overall_status: RunStatus::Running,
            error: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    pub fn steps(&self) -> &[StepResult] {
        &self.steps
    }

    pub fn step(&self, name: StageName) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.name() == name)
    }

    pub fn overall_status(&self) -> RunStatus {
        self.overall_status
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_finalized(&self) -> bool {
        self.overall_status.is_terminal()
    }

    pub fn succeeded(&self) -> bool {
        self.overall_status == RunStatus::Succeeded
    }

    /// Appends a step in execution order
    pub fn record_step(&mut self, step: StepResult) -> Result<(), RunError> {
        self.ensure_running()?;
        if self.steps.iter().any(|s| s.name() == step.name()) {
            return Err(RunError::DuplicateStep {
                run_id: self.id.clone(),
                stage: step.name(),
            });
        }
        self.steps.push(step);
        Ok(())
    }

    /// Finalizes the run as succeeded
    pub fn succeed(&mut self) -> Result<(), RunError> {
        self.finalize(RunStatus::Succeeded, None)
    }

    /// Finalizes the run as failed with the given error
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), RunError> {
        self.finalize(RunStatus::Failed, Some(error.into()))
    }

    fn finalize(&mut self, status: RunStatus, error: Option<String>) -> Result<(), RunError> {
        self.ensure_running()?;
        self.overall_status = status;
        self.error = error;
        self.end_time = Some(Utc::now().max(self.start_time));
        Ok(())
    }

    fn ensure_running(&self) -> Result<(), RunError> {
        if self.is_finalized() {
            return Err(RunError::AlreadyFinalized(self.id.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_generates_prefixed_id() {
        let run = PipelineRun::start("local_pipeline");
        assert!(run.id().starts_with("local_pipeline_"));
        assert_eq!(run.overall_status(), RunStatus::Running);
        assert!(run.end_time().is_none());
        assert!(run.steps().is_empty());
    }

    #[test]
    fn test_ids_are_distinct_within_the_same_second() {
        let a = PipelineRun::start("pipeline");
        let b = PipelineRun::start("pipeline");
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_record_step_rejects_duplicates() {
        let mut run = PipelineRun::start("pipeline");
        run.record_step(StepResult::success(StageName::Ingestion, "ok"))
            .unwrap();

        let err = run
            .record_step(StepResult::failed(StageName::Ingestion, "again"))
            .unwrap_err();
        assert!(matches!(err, RunError::DuplicateStep { .. }));
        assert_eq!(run.steps().len(), 1);
    }

    #[test]
    fn test_fail_sets_error_and_end_time() {
        let mut run = PipelineRun::start("pipeline");
        run.fail("API quota exceeded").unwrap();

        assert_eq!(run.overall_status(), RunStatus::Failed);
        assert_eq!(run.error(), Some("API quota exceeded"));
        assert!(run.end_time().unwrap() >= run.start_time());
    }

    #[test]
    fn test_finalized_run_is_immutable() {
        let mut run = PipelineRun::start("pipeline");
        run.succeed().unwrap();

        assert!(run.fail("late").is_err());
        assert!(run.succeed().is_err());
        assert!(
            run.record_step(StepResult::success(StageName::Transform, "late"))
                .is_err()
        );
        assert_eq!(run.overall_status(), RunStatus::Succeeded);
        assert!(run.error().is_none());
    }

    #[test]
    fn test_serialized_run_omits_error_on_success() {
        let mut run = PipelineRun::start("pipeline");
        run.record_step(StepResult::success(StageName::Ingestion, "ok"))
            .unwrap();
        run.succeed().unwrap();

        let json = serde_json::to_value(&run).unwrap();
        assert_eq!(json["overall_status"], "Succeeded");
        assert!(json.get("error").is_none());
        assert_eq!(json["steps"].as_array().unwrap().len(), 1);
    }
}
