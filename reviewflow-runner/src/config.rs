//! Pipeline configuration
//!
//! Configuration is layered: built-in defaults, then an optional TOML file,
//! then environment variables. The result is validated before any stage is
//! assembled from it.

use anyhow::{Context as _, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::executor::QualityCheck;

const SENTIMENT_CONSISTENCY_SQL: &str = "SELECT COUNT(*) FROM stg_reviews \
     WHERE (rating >= 4 AND sentiment_simple != 'Positive') \
     OR (rating <= 2 AND sentiment_simple != 'Negative')";

/// Complete pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Prefix of generated run ids (e.g. `local_pipeline`)
    pub run_prefix: String,

    /// Directory relative paths are resolved against
    pub project_root: PathBuf,

    pub ingestion: IngestionConfig,
    pub transform: TransformConfig,
    pub quality: QualityConfig,
    pub notify: NotifyConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            run_prefix: "local_pipeline".to_string(),
            project_root: PathBuf::from("."),
            ingestion: IngestionConfig::default(),
            transform: TransformConfig::default(),
            quality: QualityConfig::default(),
            notify: NotifyConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    pub max_records: u32,
    pub target_location: String,
    pub timeout_secs: u64,
    pub source: IngestionSource,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            max_records: 20,
            target_location: "Paris".to_string(),
            timeout_secs: 1800, // 30 minutes
            source: IngestionSource::default(),
        }
    }
}

/// Where the collector lives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IngestionSource {
    /// Local collector script
    Command { program: String, args: Vec<String> },
    /// Deployed collector endpoint
    Http { url: String },
}

impl Default for IngestionSource {
    fn default() -> Self {
        IngestionSource::Command {
            program: "python3".to_string(),
            args: vec!["src/google_places_collector.py".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    /// Working directory of the transformation project
    pub workdir: PathBuf,
    /// Bound applied to commands without their own
    pub command_timeout_secs: u64,
    pub commands: Vec<CommandConfig>,
}

impl Default for TransformConfig {
    fn default() -> Self {
        let dbt = |name: &str, verb: &str, required: bool| CommandConfig {
            name: name.to_string(),
            program: "dbt".to_string(),
            args: vec![verb.to_string(), "--profiles-dir".to_string(), ".".to_string()],
            required,
            timeout_secs: None,
        };

        Self {
            workdir: PathBuf::from("reviewflow_dbt"),
            command_timeout_secs: 600, // 10 minutes
            commands: vec![
                CommandConfig {
                    name: "load data".to_string(),
                    program: "python3".to_string(),
                    args: vec!["load_data.py".to_string()],
                    required: true,
                    timeout_secs: Some(300),
                },
                dbt("install dependencies", "deps", true),
                dbt("run models", "run", true),
                dbt("run tests", "test", false),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandConfig {
    pub name: String,
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

fn default_required() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    pub enabled: bool,
    pub warehouse_path: PathBuf,
    pub duckdb_binary: String,
    pub query_timeout_secs: u64,
    pub checks: Vec<QualityCheck>,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            warehouse_path: PathBuf::from("reviewflow_dbt/reviewflow.duckdb"),
            duckdb_binary: "duckdb".to_string(),
            query_timeout_secs: 60,
            checks: vec![
                QualityCheck::MinRows {
                    name: "restaurant_count".to_string(),
                    sql: "SELECT COUNT(*) FROM mart_top_restaurants".to_string(),
                    min: 1,
                },
                QualityCheck::MaxViolations {
                    name: "sentiment_consistency_issues".to_string(),
                    sql: SENTIMENT_CONSISTENCY_SQL.to_string(),
                    max: 0,
                },
                QualityCheck::RecentFiles {
                    name: "recent_files".to_string(),
                    dir: PathBuf::from("data"),
                    max_age_hours: 24,
                },
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Print the summary to stdout
    pub console: bool,
    /// Directory summary files are written to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_dir: Option<PathBuf>,
    /// Chat webhook (Slack compatible)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    /// Message bus publish endpoint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bus_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bus_topic: Option<String>,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            console: true,
            file_dir: Some(PathBuf::from("logs")),
            webhook_url: None,
            bus_url: None,
            bus_topic: None,
        }
    }
}

impl PipelineConfig {
    /// Loads defaults, then the TOML file at `path` if any, then the process
    /// environment, and validates the result
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_toml_file(path)?,
            None => Self::default(),
        };
        config.apply_env_from(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Overrides settings from environment variables
    ///
    /// Recognized variables:
    /// - REVIEWFLOW_MAX_RECORDS (or MAX_RESTAURANTS)
    /// - REVIEWFLOW_TARGET_LOCATION (or TARGET_CITY)
    /// - REVIEWFLOW_COLLECTOR_URL (switches ingestion to HTTP)
    /// - REVIEWFLOW_PROJECT_ROOT
    /// - REVIEWFLOW_WAREHOUSE
    /// - REVIEWFLOW_NOTIFY_DIR
    /// - SLACK_WEBHOOK_URL
    /// - REVIEWFLOW_BUS_URL
    /// - REVIEWFLOW_BUS_TOPIC (or SNS_TOPIC_ARN)
    pub fn apply_env_from(&mut self, get: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        let first = |keys: &[&str]| {
            keys.iter()
                .find_map(|key| get(*key).filter(|value| !value.trim().is_empty()))
        };

        if let Some(value) = first(&["REVIEWFLOW_MAX_RECORDS", "MAX_RESTAURANTS"]) {
            self.ingestion.max_records = value
                .trim()
                .parse()
                .with_context(|| format!("invalid max records: {}", value))?;
        }
        if let Some(value) = first(&["REVIEWFLOW_TARGET_LOCATION", "TARGET_CITY"]) {
            self.ingestion.target_location = value;
        }
        if let Some(url) = first(&["REVIEWFLOW_COLLECTOR_URL"]) {
            self.ingestion.source = IngestionSource::Http { url };
        }
        if let Some(root) = first(&["REVIEWFLOW_PROJECT_ROOT"]) {
            self.project_root = PathBuf::from(root);
        }
        if let Some(path) = first(&["REVIEWFLOW_WAREHOUSE"]) {
            self.quality.warehouse_path = PathBuf::from(path);
        }
        if let Some(dir) = first(&["REVIEWFLOW_NOTIFY_DIR"]) {
            self.notify.file_dir = Some(PathBuf::from(dir));
        }
        if let Some(url) = first(&["SLACK_WEBHOOK_URL"]) {
            self.notify.webhook_url = Some(url);
        }
        if let Some(url) = first(&["REVIEWFLOW_BUS_URL"]) {
            self.notify.bus_url = Some(url);
        }
        if let Some(topic) = first(&["REVIEWFLOW_BUS_TOPIC", "SNS_TOPIC_ARN"]) {
            self.notify.bus_topic = Some(topic);
        }

        Ok(())
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.run_prefix.trim().is_empty() {
            bail!("run_prefix cannot be empty");
        }

        if self.ingestion.max_records == 0 {
            bail!("ingestion.max_records must be greater than 0");
        }

        if self.ingestion.target_location.trim().is_empty() {
            bail!("ingestion.target_location cannot be empty");
        }

        if self.ingestion.timeout_secs == 0 {
            bail!("ingestion.timeout_secs must be greater than 0");
        }

        match &self.ingestion.source {
            IngestionSource::Command { program, .. } if program.is_empty() => {
                bail!("ingestion.source.program cannot be empty");
            }
            IngestionSource::Http { url } => check_url("ingestion.source.url", url)?,
            _ => {}
        }

        if self.transform.command_timeout_secs == 0 {
            bail!("transform.command_timeout_secs must be greater than 0");
        }

        if self.transform.commands.is_empty() {
            bail!("transform.commands cannot be empty");
        }

        for command in &self.transform.commands {
            if command.name.is_empty() || command.program.is_empty() {
                bail!("transform commands need a name and a program");
            }
            if command.timeout_secs == Some(0) {
                bail!("transform command '{}' has a zero timeout", command.name);
            }
        }

        if self.quality.enabled {
            if self.quality.query_timeout_secs == 0 {
                bail!("quality.query_timeout_secs must be greater than 0");
            }
            for check in &self.quality.checks {
                check.validate()?;
            }
            let mut names: Vec<&str> = self.quality.checks.iter().map(QualityCheck::name).collect();
            names.sort_unstable();
            if let Some(pair) = names.windows(2).find(|pair| pair[0] == pair[1]) {
                bail!("duplicate quality check name '{}'", pair[0]);
            }
        }

        if let Some(url) = &self.notify.webhook_url {
            check_url("notify.webhook_url", url)?;
        }

        match (&self.notify.bus_url, &self.notify.bus_topic) {
            (Some(url), Some(_)) => check_url("notify.bus_url", url)?,
            (Some(_), None) => bail!("notify.bus_topic is required when notify.bus_url is set"),
            _ => {}
        }

        Ok(())
    }

    /// Resolves `path` against the project root
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }

    pub fn ingestion_timeout(&self) -> Duration {
        Duration::from_secs(self.ingestion.timeout_secs)
    }

    /// Effective configuration as TOML
    pub fn to_toml(&self) -> anyhow::Result<String> {
        toml::to_string_pretty(self).context("failed to render configuration")
    }
}

fn check_url(field: &str, url: &str) -> anyhow::Result<()> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        bail!("{} must start with http:// or https://", field);
    }
    Ok(())
}
