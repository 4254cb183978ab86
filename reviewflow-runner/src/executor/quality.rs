//! Data quality checks
//!
//! The quality stage runs a list of independent checks and reports the worst
//! outcome among them. Every check runs even after an earlier one failed, so
//! the detail always shows the full picture. Check values (row counts,
//! violation counts, fresh files) are keyed by check name in the detail.

use anyhow::{Result, bail};
use async_trait::async_trait;
use reviewflow_core::domain::step::{StageName, StepOutcome, StepResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use crate::context::StepContext;
use crate::executor::{StepExecutor, Warehouse};
use crate::process::{CommandSpec, ProcessError, format_bound, run_command, tail};

/// File extensions counted by freshness checks
const DATA_EXTENSIONS: [&str; 2] = ["csv", "json"];

/// Detail key holding the per-check reports
pub const CHECKS_KEY: &str = "checks";

/// Upper bound for `RecentFiles::max_age_hours` (ten years)
pub const MAX_AGE_HOURS_LIMIT: u64 = 24 * 365 * 10;

/// One quality check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QualityCheck {
    /// Fails when the query returns fewer than `min` rows
    MinRows { name: String, sql: String, min: i64 },
    /// Fails when the query counts more than `max` violations
    MaxViolations { name: String, sql: String, max: i64 },
    /// Warns when no data file in `dir` is younger than `max_age_hours`
    RecentFiles {
        name: String,
        dir: PathBuf,
        max_age_hours: u64,
    },
    /// Fails when the command exits non-zero or runs out of time
    Command {
        name: String,
        program: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        timeout_secs: Option<u64>,
    },
}

impl QualityCheck {
    pub fn name(&self) -> &str {
        match self {
            QualityCheck::MinRows { name, .. }
            | QualityCheck::MaxViolations { name, .. }
            | QualityCheck::RecentFiles { name, .. }
            | QualityCheck::Command { name, .. } => name,
        }
    }

    /// Rejects checks that cannot run as configured
    pub fn validate(&self) -> Result<()> {
        let name = self.name();
        if name.is_empty() {
            bail!("quality checks need a name");
        }
        if name == CHECKS_KEY {
            bail!("quality check name '{}' is reserved", CHECKS_KEY);
        }

        match self {
            QualityCheck::RecentFiles { max_age_hours, .. }
                if *max_age_hours == 0 || *max_age_hours > MAX_AGE_HOURS_LIMIT =>
            {
                bail!(
                    "quality check '{}' needs max_age_hours between 1 and {}",
                    name,
                    MAX_AGE_HOURS_LIMIT
                );
            }
            QualityCheck::Command { program, .. } if program.is_empty() => {
                bail!("quality check '{}' needs a program", name);
            }
            QualityCheck::Command {
                timeout_secs: Some(0),
                ..
            } => {
                bail!("quality check '{}' has a zero timeout", name);
            }
            _ => Ok(()),
        }
    }
}

/// Result of one check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckReport {
    pub name: String,
    pub outcome: StepOutcome,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<i64>,
}

impl CheckReport {
    fn new(name: &str, outcome: StepOutcome, message: String, value: Option<i64>) -> Self {
        Self {
            name: name.to_string(),
            outcome,
            message,
            value,
        }
    }
}

/// Quality stage executor
pub struct QualityChecks {
    checks: Vec<QualityCheck>,
    warehouse: Arc<dyn Warehouse>,
    base_dir: PathBuf,
    default_timeout: Duration,
}

impl QualityChecks {
    pub fn new(checks: Vec<QualityCheck>, warehouse: Arc<dyn Warehouse>) -> Self {
        Self {
            checks,
            warehouse,
            base_dir: PathBuf::from("."),
            default_timeout: Duration::from_secs(600),
        }
    }

    /// Directory relative paths and commands are resolved against
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    /// Bound applied to command checks without their own
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn checks(&self) -> &[QualityCheck] {
        &self.checks
    }

    async fn run_check(&self, check: &QualityCheck) -> CheckReport {
        match check {
            QualityCheck::MinRows { name, sql, min } => match self.warehouse.count(sql).await {
                Ok(count) if count >= *min => CheckReport::new(
                    name,
                    StepOutcome::Success,
                    format!("{}: {} rows", name, count),
                    Some(count),
                ),
                Ok(count) => CheckReport::new(
                    name,
                    StepOutcome::Failed,
                    format!("{}: {} rows (minimum {})", name, count, min),
                    Some(count),
                ),
                Err(e) => query_error(name, &e),
            },
            QualityCheck::MaxViolations { name, sql, max } => {
                match self.warehouse.count(sql).await {
                    Ok(count) if count <= *max => CheckReport::new(
                        name,
                        StepOutcome::Success,
                        format!("{}: {} issues", name, count),
                        Some(count),
                    ),
                    Ok(count) => CheckReport::new(
                        name,
                        StepOutcome::Failed,
                        format!("{}: {} issues (maximum {})", name, count, max),
                        Some(count),
                    ),
                    Err(e) => query_error(name, &e),
                }
            }
            QualityCheck::RecentFiles {
                name,
                dir,
                max_age_hours,
            } => {
                let dir = self.base_dir.join(dir);
                let max_age = Duration::from_secs(max_age_hours.saturating_mul(3600));
                match count_recent_files(&dir, max_age).await {
                    Ok(0) => CheckReport::new(
                        name,
                        StepOutcome::Warning,
                        format!("{}: no data files newer than {}h", name, max_age_hours),
                        Some(0),
                    ),
                    Ok(n) => CheckReport::new(
                        name,
                        StepOutcome::Success,
                        format!("{}: {} recent data files", name, n),
                        Some(n),
                    ),
                    Err(e) => CheckReport::new(
                        name,
                        StepOutcome::Failed,
                        format!("{}: data directory {} not readable: {}", name, dir.display(), e),
                        None,
                    ),
                }
            }
            QualityCheck::Command {
                name,
                program,
                args,
                timeout_secs,
            } => {
                let timeout = timeout_secs
                    .map(Duration::from_secs)
                    .unwrap_or(self.default_timeout);
                let spec = CommandSpec::new(program, args.clone(), timeout).cwd(&self.base_dir);
                match run_command(&spec).await {
                    Ok(output) if output.success() => CheckReport::new(
                        name,
                        StepOutcome::Success,
                        format!("{}: passed", name),
                        None,
                    ),
                    Ok(output) => CheckReport::new(
                        name,
                        StepOutcome::Failed,
                        format!("{}: {}", name, tail(output.stderr.trim(), 200)),
                        None,
                    ),
                    Err(ProcessError::TimedOut { timeout, .. }) => CheckReport::new(
                        name,
                        StepOutcome::Failed,
                        format!("{} timed out after {}", name, format_bound(timeout)),
                        None,
                    ),
                    Err(e) => CheckReport::new(
                        name,
                        StepOutcome::Failed,
                        format!("{}: {}", name, e),
                        None,
                    ),
                }
            }
        }
    }
}

fn query_error(name: &str, error: &anyhow::Error) -> CheckReport {
    CheckReport::new(
        name,
        StepOutcome::Failed,
        format!("{}: query error: {:#}", name, error),
        None,
    )
}

async fn count_recent_files(dir: &Path, max_age: Duration) -> std::io::Result<i64> {
    let cutoff = SystemTime::now()
        .checked_sub(max_age)
        .unwrap_or(SystemTime::UNIX_EPOCH);

    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut count = 0;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_data = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| DATA_EXTENSIONS.contains(&ext));
        if !is_data {
            continue;
        }
        let metadata = entry.metadata().await?;
        if metadata.is_file() && metadata.modified()? > cutoff {
            count += 1;
        }
    }
    Ok(count)
}

#[async_trait]
impl StepExecutor for QualityChecks {
    fn stage(&self) -> StageName {
        StageName::QualityTest
    }

    async fn execute(&self, ctx: &StepContext) -> Result<StepResult> {
        let started = Instant::now();
        ctx.log_info(format!("Running {} quality checks", self.checks.len()));

        let mut reports = Vec::with_capacity(self.checks.len());
        for check in &self.checks {
            let report = self.run_check(check).await;
            match report.outcome {
                StepOutcome::Success => ctx.log_info(&report.message),
                StepOutcome::Warning => ctx.log_warning(&report.message),
                StepOutcome::Failed => ctx.log_error(&report.message),
            }
            reports.push(report);
        }

        let outcome = reports
            .iter()
            .fold(StepOutcome::Success, |acc, r| acc.worst(r.outcome));

        let message = match outcome {
            StepOutcome::Success => {
                let values: Vec<String> = reports
                    .iter()
                    .filter_map(|r| r.value.map(|v| format!("{}={}", r.name, v)))
                    .collect();
                if values.is_empty() {
                    format!("Quality tests passed - {} checks", reports.len())
                } else {
                    format!("Quality tests passed - {}", values.join(", "))
                }
            }
            StepOutcome::Warning => {
                format!("Quality tests passed with warnings: {}", problems(&reports))
            }
            StepOutcome::Failed => format!("Quality tests failed: {}", problems(&reports)),
        };

        let mut detail = Map::new();
        for report in &reports {
            if let Some(value) = report.value {
                detail.insert(report.name.clone(), JsonValue::from(value));
            }
        }
        detail.insert(CHECKS_KEY.to_string(), serde_json::to_value(&reports)?);

        Ok(StepResult::new(StageName::QualityTest, outcome, message)
            .with_duration(started.elapsed())
            .with_detail(JsonValue::Object(detail)))
    }
}

fn problems(reports: &[CheckReport]) -> String {
    reports
        .iter()
        .filter(|r| r.outcome != StepOutcome::Success)
        .map(|r| r.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MemoryRunLog;
    use anyhow::anyhow;
    use std::collections::HashMap;

    struct FakeWarehouse {
        answers: HashMap<String, i64>,
    }

    impl FakeWarehouse {
        fn new(answers: &[(&str, i64)]) -> Arc<Self> {
            Arc::new(Self {
                answers: answers.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            })
        }
    }

    #[async_trait]
    impl Warehouse for FakeWarehouse {
        async fn count(&self, sql: &str) -> Result<i64> {
            self.answers
                .get(sql)
                .copied()
                .ok_or_else(|| anyhow!("Catalog Error: no table for {}", sql))
        }
    }

    fn ctx() -> StepContext {
        StepContext::new("run", Arc::new(MemoryRunLog::new()))
    }

    fn warehouse_checks() -> Vec<QualityCheck> {
        vec![
            QualityCheck::MinRows {
                name: "restaurant_count".to_string(),
                sql: "restaurants".to_string(),
                min: 1,
            },
            QualityCheck::MaxViolations {
                name: "sentiment_consistency_issues".to_string(),
                sql: "sentiment".to_string(),
                max: 0,
            },
        ]
    }

    #[tokio::test]
    async fn test_passing_checks_report_counts() {
        let warehouse = FakeWarehouse::new(&[("restaurants", 12), ("sentiment", 0)]);
        let step = QualityChecks::new(warehouse_checks(), warehouse)
            .execute(&ctx())
            .await
            .unwrap();

        assert_eq!(step.outcome(), StepOutcome::Success);
        assert_eq!(step.name(), StageName::QualityTest);
        assert_eq!(step.detail()["restaurant_count"], 12);
        assert_eq!(step.detail()["sentiment_consistency_issues"], 0);
        assert_eq!(
            step.message(),
            "Quality tests passed - restaurant_count=12, sentiment_consistency_issues=0"
        );
    }

    #[tokio::test]
    async fn test_violations_fail_but_all_checks_run() {
        let warehouse = FakeWarehouse::new(&[("restaurants", 0), ("sentiment", 3)]);
        let step = QualityChecks::new(warehouse_checks(), warehouse)
            .execute(&ctx())
            .await
            .unwrap();

        assert_eq!(step.outcome(), StepOutcome::Failed);
        assert_eq!(
            step.message(),
            "Quality tests failed: restaurant_count: 0 rows (minimum 1); \
             sentiment_consistency_issues: 3 issues (maximum 0)"
        );
        assert_eq!(step.detail()["checks"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_query_error_fails_check() {
        let warehouse = FakeWarehouse::new(&[("sentiment", 0)]);
        let step = QualityChecks::new(warehouse_checks(), warehouse)
            .execute(&ctx())
            .await
            .unwrap();

        assert_eq!(step.outcome(), StepOutcome::Failed);
        assert!(step.message().contains("restaurant_count: query error: Catalog Error"));
        assert!(step.detail().get("restaurant_count").is_none());
    }

    #[tokio::test]
    async fn test_recent_files() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        std::fs::create_dir(&data).unwrap();
        std::fs::write(data.join("restaurants.csv"), "id\n1\n").unwrap();
        std::fs::write(data.join("notes.txt"), "ignored").unwrap();

        let old = std::fs::File::options()
            .create(true)
            .truncate(true)
            .write(true)
            .open(data.join("old.json"))
            .unwrap();
        old.set_modified(SystemTime::now() - Duration::from_secs(48 * 3600))
            .unwrap();

        let checks = vec![QualityCheck::RecentFiles {
            name: "recent_files".to_string(),
            dir: PathBuf::from("data"),
            max_age_hours: 24,
        }];
        let step = QualityChecks::new(checks, FakeWarehouse::new(&[]))
            .with_base_dir(dir.path())
            .execute(&ctx())
            .await
            .unwrap();

        assert_eq!(step.outcome(), StepOutcome::Success);
        assert_eq!(step.detail()["recent_files"], 1);
    }

    #[tokio::test]
    async fn test_no_recent_files_is_warning_and_missing_dir_is_failed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("data")).unwrap();

        let checks = vec![
            QualityCheck::RecentFiles {
                name: "recent_files".to_string(),
                dir: PathBuf::from("data"),
                max_age_hours: 24,
            },
        ];
        let step = QualityChecks::new(checks.clone(), FakeWarehouse::new(&[]))
            .with_base_dir(dir.path())
            .execute(&ctx())
            .await
            .unwrap();
        assert_eq!(step.outcome(), StepOutcome::Warning);
        assert!(step.message().starts_with("Quality tests passed with warnings"));

        let step = QualityChecks::new(checks, FakeWarehouse::new(&[]))
            .with_base_dir(dir.path().join("missing"))
            .execute(&ctx())
            .await
            .unwrap();
        assert_eq!(step.outcome(), StepOutcome::Failed);
    }

    #[tokio::test]
    async fn test_command_check_timeout_is_failed() {
        let checks = vec![QualityCheck::Command {
            name: "run tests".to_string(),
            program: "sh".to_string(),
            args: vec!["-c".to_string(), "sleep 5".to_string()],
            timeout_secs: None,
        }];
        let step = QualityChecks::new(checks, FakeWarehouse::new(&[]))
            .with_default_timeout(Duration::from_millis(200))
            .execute(&ctx())
            .await
            .unwrap();

        assert_eq!(step.outcome(), StepOutcome::Failed);
        assert_eq!(step.message(), "Quality tests failed: run tests timed out after 200ms");
    }

    #[test]
    fn test_check_deserializes_from_tagged_toml() {
        let check: QualityCheck = toml::from_str(
            r#"
kind = "min_rows"
name = "restaurant_count"
sql = "SELECT COUNT(*) FROM mart_top_restaurants"
min = 1
"#,
        )
        .unwrap();

        assert_eq!(check.name(), "restaurant_count");
        assert!(matches!(check, QualityCheck::MinRows { min: 1, .. }));
    }

    #[tokio::test]
    async fn test_huge_max_age_counts_every_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("restaurants.csv"), "id\n1\n").unwrap();

        let checks = vec![QualityCheck::RecentFiles {
            name: "recent_files".to_string(),
            dir: PathBuf::from("."),
            max_age_hours: u64::MAX / 1000,
        }];
        let step = QualityChecks::new(checks, FakeWarehouse::new(&[]))
            .with_base_dir(dir.path())
            .execute(&ctx())
            .await
            .unwrap();

        assert_eq!(step.outcome(), StepOutcome::Success);
        assert_eq!(step.detail()["recent_files"], 1);
    }

    #[test]
    fn test_check_validation() {
        let recent = |hours| QualityCheck::RecentFiles {
            name: "recent_files".to_string(),
            dir: PathBuf::from("data"),
            max_age_hours: hours,
        };
        assert!(recent(24).validate().is_ok());
        assert!(recent(0).validate().is_err());
        assert!(recent(MAX_AGE_HOURS_LIMIT + 1).validate().is_err());
        assert!(recent(u64::MAX / 1000).validate().is_err());

        let command = |timeout_secs| QualityCheck::Command {
            name: "run tests".to_string(),
            program: "dbt".to_string(),
            args: vec!["test".to_string()],
            timeout_secs,
        };
        assert!(command(None).validate().is_ok());
        assert!(command(Some(600)).validate().is_ok());
        assert!(command(Some(0)).validate().is_err());

        let reserved = QualityCheck::MinRows {
            name: CHECKS_KEY.to_string(),
            sql: "SELECT 1".to_string(),
            min: 1,
        };
        let err = reserved.validate().unwrap_err();
        assert!(err.to_string().contains("reserved"));
    }
}
