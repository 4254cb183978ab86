//! Pipeline Run API Handler

use axum::{Json, body::Bytes, extract::State, http::StatusCode};
use reviewflow_core::dto::run::{RunResponse, TriggerRun};
use reviewflow_runner::{
    MemoryRunLog, OrchestratorError, TeeRunLog, TracingRunLog, apply_trigger, build_orchestrator,
};
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::AppState;
use crate::api::error::{ApiError, ApiResult};

/// POST /api/pipeline/run
///
/// Runs the pipeline once. The optional JSON body overrides `max_records`
/// and `target_location`. Answers 200 when the run succeeded and 500 when it
/// failed, with the run record in both cases.
pub async fn run_pipeline(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<RunResponse>)> {
    let trigger: TriggerRun = if body.iter().all(u8::is_ascii_whitespace) {
        TriggerRun::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {}", e)))?
    };

    let mut config = state.config.clone();
    apply_trigger(&mut config, &trigger);
    config
        .validate()
        .map_err(|e| ApiError::BadRequest(format!("{:#}", e)))?;

    info!(
        "Pipeline triggered (max_records={}, target_location={})",
        config.ingestion.max_records, config.ingestion.target_location
    );

    let memory = MemoryRunLog::new();
    let log = Arc::new(TeeRunLog::new(Arc::new(TracingRunLog), Arc::new(memory.clone())));
    let orchestrator = build_orchestrator(&config, log)?;

    let run = match orchestrator.run().await {
        Ok(run) => run,
        Err(OrchestratorError::StageAborted { stage, run, source }) => {
            warn!("Stage {} aborted: {:#}", stage, source);
            *run
        }
        Err(e) => return Err(ApiError::InternalError(e.into())),
    };

    let logs = memory.entries_for(run.id());
    let response = RunResponse::from(run).with_logs(logs);
    let status =
        StatusCode::from_u16(response.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    Ok((status, Json(response)))
}

#[cfg(test)]
mod tests {
    use crate::api::{AppState, create_router};
    use reviewflow_runner::PipelineConfig;
    use reviewflow_runner::config::IngestionSource;
    use serde_json::{Value as JsonValue, json};
    use std::sync::Arc;

    /// Config whose stages are plain shell commands
    fn config(collector_script: &str) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.run_prefix = "pipeline".to_string();
        config.ingestion.source = IngestionSource::Command {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), collector_script.to_string()],
        };
        config.transform.workdir = ".".into();
        for command in &mut config.transform.commands {
            command.program = "true".to_string();
            command.args.clear();
        }
        config.quality.enabled = false;
        config.notify.console = false;
        config.notify.file_dir = None;
        config
    }

    async fn serve(config: PipelineConfig) -> String {
        let app = create_router(Arc::new(AppState::new(config)));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_health() {
        let base = serve(config("true")).await;
        let response = reqwest::get(format!("{}/health", base)).await.unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.text().await.unwrap(), "OK");
    }

    #[tokio::test]
    async fn test_successful_run_returns_200() {
        let base = serve(config("echo \"$MAX_RESTAURANTS $TARGET_CITY\"")).await;

        let response = reqwest::Client::new()
            .post(format!("{}/api/pipeline/run", base))
            .json(&json!({"max_records": 3, "target_location": "Lyon"}))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        let body: JsonValue = response.json().await.unwrap();
        assert_eq!(body["status_code"], 200);
        assert_eq!(body["run"]["overall_status"], "Succeeded");
        assert_eq!(body["run"]["steps"][0]["detail"]["output"], "3 Lyon\n");
        assert!(body["run"]["id"].as_str().unwrap().starts_with("pipeline_"));
        assert!(!body["logs"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_run_returns_500_with_run() {
        let base = serve(config("echo 'API quota exceeded' >&2; exit 1")).await;

        let response = reqwest::Client::new()
            .post(format!("{}/api/pipeline/run", base))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 500);
        let body: JsonValue = response.json().await.unwrap();
        assert_eq!(body["status_code"], 500);
        assert_eq!(body["run"]["overall_status"], "Failed");
        assert_eq!(body["run"]["steps"].as_array().unwrap().len(), 1);
        assert_eq!(
            body["run"]["error"],
            "Ingestion error: Collector error: API quota exceeded"
        );
    }

    #[tokio::test]
    async fn test_invalid_body_is_bad_request() {
        let base = serve(config("true")).await;

        let response = reqwest::Client::new()
            .post(format!("{}/api/pipeline/run", base))
            .body("{not json")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);

        let response = reqwest::Client::new()
            .post(format!("{}/api/pipeline/run", base))
            .json(&json!({"max_records": 0}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
    }
}
