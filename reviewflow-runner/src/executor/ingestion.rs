//! Ingestion executors
//!
//! Two ways to reach the data collector: run it as a local command, or call
//! a deployed collector over HTTP. Both receive the same parameters and
//! translate every collector failure into a failed step.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use reviewflow_core::domain::step::{StageName, StepResult};
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::context::StepContext;
use crate::executor::StepExecutor;
use crate::process::{CommandSpec, ProcessError, format_bound, run_command, tail};

/// Stdout/stderr kept in the step detail
const OUTPUT_TAIL_CHARS: usize = 500;

/// Parameters passed to the collector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionParams {
    pub max_records: u32,
    pub target_location: String,
}

/// Runs the collector as a local command
///
/// Parameters are passed as `MAX_RESTAURANTS` and `TARGET_CITY`
/// environment variables.
pub struct CommandIngestion {
    program: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    params: IngestionParams,
    timeout: Duration,
}

impl CommandIngestion {
    pub fn new(
        program: impl Into<String>,
        args: Vec<String>,
        params: IngestionParams,
        timeout: Duration,
    ) -> Self {
        Self {
            program: program.into(),
            args,
            cwd: None,
            params,
            timeout,
        }
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    fn spec(&self) -> CommandSpec {
        let mut spec = CommandSpec::new(&self.program, self.args.clone(), self.timeout)
            .env("MAX_RESTAURANTS", self.params.max_records.to_string())
            .env("TARGET_CITY", &self.params.target_location);
        if let Some(cwd) = &self.cwd {
            spec = spec.cwd(cwd);
        }
        spec
    }
}

#[async_trait]
impl StepExecutor for CommandIngestion {
    fn stage(&self) -> StageName {
        StageName::Ingestion
    }

    async fn execute(&self, ctx: &StepContext) -> Result<StepResult> {
        let started = Instant::now();
        let spec = self.spec();
        ctx.log_info(format!(
            "Running data collector: {} (max {} records, {})",
            spec.display(),
            self.params.max_records,
            self.params.target_location
        ));

        let step = match run_command(&spec).await {
            Ok(output) if output.success() => {
                ctx.log_info("Data collection succeeded");
                StepResult::success(StageName::Ingestion, "Ingestion succeeded").with_detail(json!({
                    "max_records": self.params.max_records,
                    "target_location": self.params.target_location,
                    "output": tail(&output.stdout, OUTPUT_TAIL_CHARS),
                }))
            }
            Ok(output) => StepResult::failed(
                StageName::Ingestion,
                format!(
                    "Ingestion error: Collector error: {}",
                    tail(output.stderr.trim(), OUTPUT_TAIL_CHARS)
                ),
            )
            .with_detail(json!({ "exit_code": output.exit_code })),
            Err(ProcessError::TimedOut { timeout, .. }) => StepResult::failed(
                StageName::Ingestion,
                format!("Collection timeout ({} exceeded)", format_bound(timeout)),
            ),
            Err(e) => StepResult::failed(StageName::Ingestion, format!("Ingestion error: {}", e)),
        };

        Ok(step.with_duration(started.elapsed()))
    }
}

/// Calls a deployed collector over HTTP
///
/// POSTs `{source, max_records, target_location}` and expects a 2xx answer.
/// A JSON body with `"success": false` is treated as a rejection too.
pub struct HttpIngestion {
    url: String,
    params: IngestionParams,
    timeout: Duration,
    client: Client,
}

impl HttpIngestion {
    pub fn new(url: impl Into<String>, params: IngestionParams, timeout: Duration) -> Self {
        Self::with_client(url, params, timeout, Client::new())
    }

    pub fn with_client(
        url: impl Into<String>,
        params: IngestionParams,
        timeout: Duration,
        client: Client,
    ) -> Self {
        Self {
            url: url.into(),
            params,
            timeout,
            client,
        }
    }

    async fn call(&self) -> std::result::Result<JsonValue, String> {
        let body = json!({
            "source": "orchestrator",
            "max_records": self.params.max_records,
            "target_location": self.params.target_location,
        });

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("Collection request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(format!(
                "Collection endpoint error (status {}): {}",
                status.as_u16(),
                tail(text.trim(), OUTPUT_TAIL_CHARS)
            ));
        }

        let text = response
            .text()
            .await
            .map_err(|e| format!("Collection response unreadable: {}", e))?;

        let payload: JsonValue = serde_json::from_str(&text).unwrap_or(JsonValue::String(text));
        if payload.get("success").and_then(JsonValue::as_bool) == Some(false) {
            let message = payload
                .get("message")
                .and_then(JsonValue::as_str)
                .unwrap_or("collector reported failure");
            return Err(format!("Collection failed: {}", message));
        }

        Ok(payload)
    }
}

#[async_trait]
impl StepExecutor for HttpIngestion {
    fn stage(&self) -> StageName {
        StageName::Ingestion
    }

    async fn execute(&self, ctx: &StepContext) -> Result<StepResult> {
        let started = Instant::now();
        ctx.log_info(format!("Triggering data collection at {}", self.url));

        let step = match tokio::time::timeout(self.timeout, self.call()).await {
            Ok(Ok(payload)) => {
                ctx.log_info("Data collection succeeded");
                StepResult::success(StageName::Ingestion, "Ingestion succeeded")
                    .with_detail(payload)
            }
            Ok(Err(message)) => {
                StepResult::failed(StageName::Ingestion, format!("Ingestion error: {}", message))
            }
            Err(_) => StepResult::failed(
                StageName::Ingestion,
                format!("Collection timeout ({} exceeded)", format_bound(self.timeout)),
            ),
        };

        Ok(step.with_duration(started.elapsed()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MemoryRunLog;
    use axum::{Json, Router, body::Body, body::Bytes, http::StatusCode, routing::post};
    use reviewflow_core::domain::step::StepOutcome;
    use std::sync::Arc;

    fn params() -> IngestionParams {
        IngestionParams {
            max_records: 20,
            target_location: "Paris".to_string(),
        }
    }

    fn ctx() -> StepContext {
        StepContext::new("test-run", Arc::new(MemoryRunLog::new()))
    }

    fn sh(script: &str, timeout: Duration) -> CommandIngestion {
        CommandIngestion::new(
            "sh",
            vec!["-c".to_string(), script.to_string()],
            params(),
            timeout,
        )
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/collect", addr)
    }

    #[tokio::test]
    async fn test_command_success_passes_parameters() {
        let step = sh("echo \"$MAX_RESTAURANTS in $TARGET_CITY\"", Duration::from_secs(5))
            .execute(&ctx())
            .await
            .unwrap();

        assert_eq!(step.outcome(), StepOutcome::Success);
        assert_eq!(step.name(), StageName::Ingestion);
        assert_eq!(step.detail()["output"], "20 in Paris\n");
    }

    #[tokio::test]
    async fn test_command_failure_reports_stderr() {
        let step = sh("echo 'API quota exceeded' >&2; exit 1", Duration::from_secs(5))
            .execute(&ctx())
            .await
            .unwrap();

        assert_eq!(step.outcome(), StepOutcome::Failed);
        assert_eq!(
            step.message(),
            "Ingestion error: Collector error: API quota exceeded"
        );
    }

    #[tokio::test]
    async fn test_command_timeout_is_failed_step() {
        let step = sh("sleep 5", Duration::from_millis(200))
            .execute(&ctx())
            .await
            .unwrap();

        assert_eq!(step.outcome(), StepOutcome::Failed);
        assert_eq!(step.message(), "Collection timeout (200ms exceeded)");
    }

    #[tokio::test]
    async fn test_http_success_keeps_body_as_detail() {
        let url = serve(Router::new().route(
            "/collect",
            post(|Json(body): Json<JsonValue>| async move {
                Json(json!({
                    "success": true,
                    "max_restaurants": body["max_records"],
                    "target_city": body["target_location"],
                }))
            }),
        ))
        .await;

        let step = HttpIngestion::new(url, params(), Duration::from_secs(5))
            .execute(&ctx())
            .await
            .unwrap();

        assert_eq!(step.outcome(), StepOutcome::Success);
        assert_eq!(step.detail()["max_restaurants"], 20);
        assert_eq!(step.detail()["target_city"], "Paris");
    }

    #[tokio::test]
    async fn test_http_rejection_is_failed_step() {
        let url = serve(Router::new().route(
            "/collect",
            post(|| async { (StatusCode::TOO_MANY_REQUESTS, "API quota exceeded") }),
        ))
        .await;

        let step = HttpIngestion::new(url, params(), Duration::from_secs(5))
            .execute(&ctx())
            .await
            .unwrap();

        assert_eq!(step.outcome(), StepOutcome::Failed);
        assert_eq!(
            step.message(),
            "Ingestion error: Collection endpoint error (status 429): API quota exceeded"
        );
    }

    #[tokio::test]
    async fn test_http_body_reporting_failure_is_failed_step() {
        let url = serve(Router::new().route(
            "/collect",
            post(|| async { Json(json!({"success": false, "message": "no API key"})) }),
        ))
        .await;

        let step = HttpIngestion::new(url, params(), Duration::from_secs(5))
            .execute(&ctx())
            .await
            .unwrap();

        assert_eq!(step.outcome(), StepOutcome::Failed);
        assert!(step.message().ends_with("Collection failed: no API key"));
    }

    #[tokio::test]
    async fn test_http_timeout_is_failed_step() {
        let url = serve(Router::new().route(
            "/collect",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        ))
        .await;

        let step = HttpIngestion::new(url, params(), Duration::from_millis(200))
            .execute(&ctx())
            .await
            .unwrap();

        assert_eq!(step.outcome(), StepOutcome::Failed);
        assert!(step.message().starts_with("Collection timeout"));
    }

    #[tokio::test]
    async fn test_http_unreadable_body_is_failed_step() {
        let url = serve(Router::new().route(
            "/collect",
            post(|| async {
                let chunks = futures::stream::iter(vec![
                    Ok(Bytes::from_static(b"{\"success\": tr")),
                    Err(std::io::Error::other("connection reset")),
                ]);
                Body::from_stream(chunks)
            }),
        ))
        .await;

        let step = HttpIngestion::new(url, params(), Duration::from_secs(5))
            .execute(&ctx())
            .await
            .unwrap();

        assert_eq!(step.outcome(), StepOutcome::Failed);
        assert!(step.message().starts_with("Ingestion error: Collection response unreadable"));
    }
}
