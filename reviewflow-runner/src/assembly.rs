//! Wiring from configuration to a ready [`Orchestrator`]
//!
//! Both entry points build their orchestrator here so the local and the
//! cloud variant share one assembly path.

use reviewflow_core::domain::step::StageName;
use reviewflow_core::dto::run::TriggerRun;
use reviewflow_notify::{
    ConsoleNotifier, FanoutNotifier, FileNotifier, MessageBusNotifier, WebhookNotifier,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::{IngestionSource, NotifyConfig, PipelineConfig};
use crate::context::RunLog;
use crate::executor::{
    CommandIngestion, CommandSequence, DuckDbCli, HttpIngestion, IngestionParams, QualityChecks,
    SequenceCommand, StepExecutor,
};
use crate::orchestrator::Orchestrator;

/// Applies per-run overrides from a trigger request
pub fn apply_trigger(config: &mut PipelineConfig, trigger: &TriggerRun) {
    if let Some(max_records) = trigger.max_records {
        config.ingestion.max_records = max_records;
    }
    if let Some(location) = &trigger.target_location {
        config.ingestion.target_location = location.clone();
    }
    if let Some(source) = &trigger.source {
        debug!("Run triggered by {}", source);
    }
}

/// Builds the executors for every enabled stage, in execution order
pub fn executors_from_config(config: &PipelineConfig) -> Vec<Arc<dyn StepExecutor>> {
    let params = IngestionParams {
        max_records: config.ingestion.max_records,
        target_location: config.ingestion.target_location.clone(),
    };

    let ingestion: Arc<dyn StepExecutor> = match &config.ingestion.source {
        IngestionSource::Command { program, args } => Arc::new(
            CommandIngestion::new(program, args.clone(), params, config.ingestion_timeout())
                .with_cwd(&config.project_root),
        ),
        IngestionSource::Http { url } => {
            Arc::new(HttpIngestion::new(url, params, config.ingestion_timeout()))
        }
    };

    let default_timeout = Duration::from_secs(config.transform.command_timeout_secs);
    let commands = config
        .transform
        .commands
        .iter()
        .map(|c| SequenceCommand {
            name: c.name.clone(),
            program: c.program.clone(),
            args: c.args.clone(),
            required: c.required,
            timeout: c.timeout_secs.map(Duration::from_secs).unwrap_or(default_timeout),
        })
        .collect();
    let transform = CommandSequence::new(StageName::Transform, commands)
        .in_dir(config.resolve(&config.transform.workdir));

    let mut executors = vec![ingestion, Arc::new(transform) as Arc<dyn StepExecutor>];

    if config.quality.enabled {
        let warehouse = DuckDbCli::new(
            &config.quality.duckdb_binary,
            config.resolve(&config.quality.warehouse_path),
            Duration::from_secs(config.quality.query_timeout_secs),
        );
        let quality = QualityChecks::new(config.quality.checks.clone(), Arc::new(warehouse))
            .with_base_dir(&config.project_root)
            .with_default_timeout(default_timeout);
        executors.push(Arc::new(quality));
    }

    executors
}

/// Builds the notification channels enabled in the configuration
pub fn notifier_from_config(
    config: &NotifyConfig,
    project_root: &std::path::Path,
) -> FanoutNotifier {
    let mut fanout = FanoutNotifier::new();

    if config.console {
        fanout.push(Box::new(ConsoleNotifier::new()));
    }
    if let Some(dir) = &config.file_dir {
        let dir = if dir.is_absolute() {
            dir.clone()
        } else {
            project_root.join(dir)
        };
        fanout.push(Box::new(FileNotifier::new(dir)));
    }
    if let Some(url) = &config.webhook_url {
        fanout.push(Box::new(WebhookNotifier::new(url)));
    }
    if let (Some(url), Some(topic)) = (&config.bus_url, &config.bus_topic) {
        fanout.push(Box::new(MessageBusNotifier::new(url, topic)));
    }

    fanout
}

/// Builds a complete orchestrator from configuration
pub fn build_orchestrator(
    config: &PipelineConfig,
    log: Arc<dyn RunLog>,
) -> anyhow::Result<Orchestrator> {
    let notifier = notifier_from_config(&config.notify, &config.project_root);
    info!(
        "Notification channels: {}",
        if notifier.is_empty() {
            "none".to_string()
        } else {
            notifier.channel_names().join(", ")
        }
    );

    let orchestrator = executors_from_config(config)
        .into_iter()
        .fold(Orchestrator::builder(), |builder, executor| {
            let policy = executor.stage().default_policy();
            builder.shared_stage(executor, policy)
        })
        .run_prefix(&config.run_prefix)
        .notifier(Arc::new(notifier))
        .log(log)
        .build()?;

    Ok(orchestrator)
}
