use reviewflow_runner::PipelineConfig;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod api;

const DEFAULT_LOG_FILTER: &str =
    "reviewflow_server=info,reviewflow_runner=info,reviewflow_notify=info,tower_http=debug";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting ReviewFlow pipeline server...");

    let config_path = std::env::var("REVIEWFLOW_CONFIG").ok();
    let mut config = PipelineConfig::load(config_path.as_deref().map(std::path::Path::new))?;
    if config_path.is_none() {
        // Cloud entry point defaults
        config.run_prefix = "pipeline".to_string();
        config.notify.console = false;
    }

    let app = api::create_router(Arc::new(api::AppState::new(config)));

    let addr =
        std::env::var("REVIEWFLOW_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
