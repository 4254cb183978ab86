//! Step executors
//!
//! Each executor wraps one external collaborator behind the same contract:
//! run it, then report a [`StepResult`]. Expected failures of the
//! collaborator (non-zero exit, rejected request, expired time bound) are
//! reported as a `Failed` step. `Err` is reserved for bugs.
//!
//! All executors are trait-based to enable testing and dependency injection.

mod commands;
mod ingestion;
mod quality;
mod warehouse;

pub use commands::{CommandRecord, CommandStatus, CommandSequence, SequenceCommand};
pub use ingestion::{CommandIngestion, HttpIngestion, IngestionParams};
pub use quality::{CheckReport, QualityCheck, QualityChecks};
pub use warehouse::{DuckDbCli, Warehouse};

use anyhow::Result;
use async_trait::async_trait;
use reviewflow_core::domain::step::{StageName, StepResult};
use std::sync::Arc;

use crate::context::StepContext;

/// Uniform "run and report" contract for one pipeline stage
#[async_trait]
pub trait StepExecutor: Send + Sync {
    /// Stage this executor implements
    fn stage(&self) -> StageName;

    /// Runs the collaborator and reports its outcome
    async fn execute(&self, ctx: &StepContext) -> Result<StepResult>;
}

#[async_trait]
impl<E: StepExecutor + ?Sized> StepExecutor for Arc<E> {
    fn stage(&self) -> StageName {
        (**self).stage()
    }

    async fn execute(&self, ctx: &StepContext) -> Result<StepResult> {
        (**self).execute(ctx).await
    }
}
