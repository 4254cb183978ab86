//! Pipeline orchestration
//!
//! The [`Orchestrator`] runs the configured stages in order, applies each
//! stage's abort policy and notifies once per run.

mod engine;

pub use engine::{Orchestrator, OrchestratorBuilder, OrchestratorError, Stage};
