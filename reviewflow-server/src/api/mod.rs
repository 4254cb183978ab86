//! API Module
//!
//! HTTP entry point of the pipeline: one endpoint triggers a run and answers
//! with the final run record.

pub mod error;
pub mod health;
pub mod run;

use axum::{
    Router,
    routing::{get, post},
};
use reviewflow_runner::PipelineConfig;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared state of the API
///
/// Only the base configuration is shared; every request assembles its own
/// orchestrator from it.
pub struct AppState {
    pub config: PipelineConfig,
}

impl AppState {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }
}

/// Create the main API router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/pipeline/run", post(run::run_pipeline))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
