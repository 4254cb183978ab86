//! ReviewFlow pipeline runner
//!
//! Executes one pipeline run: ingestion, transformation and quality checks,
//! followed by a notification. Stage implementations sit behind the
//! [`StepExecutor`] trait, notification channels behind
//! [`reviewflow_notify::Notifier`], so the [`Orchestrator`] itself only
//! sequences calls and applies the abort policy.

pub mod assembly;
pub mod config;
pub mod context;
pub mod executor;
pub mod orchestrator;
pub mod process;

pub use assembly::{apply_trigger, build_orchestrator};
pub use config::PipelineConfig;
pub use context::{MemoryRunLog, RunLog, StepContext, TeeRunLog, TracingRunLog};
pub use executor::StepExecutor;
pub use orchestrator::{Orchestrator, OrchestratorBuilder, OrchestratorError};
