//! Read-only access to the analytical warehouse
//!
//! Quality checks only ever need a single integer per query, so the
//! warehouse contract is one method. [`DuckDbCli`] answers it by running the
//! `duckdb` command line client against the database file in read-only mode.

use anyhow::{Context as _, Result, anyhow, bail};
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

use crate::process::{CommandSpec, run_command, tail};

#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Runs a query returning a single integer (e.g. `SELECT COUNT(*) ...`)
    async fn count(&self, sql: &str) -> Result<i64>;
}

/// `duckdb` CLI over a database file
#[derive(Debug, Clone)]
pub struct DuckDbCli {
    binary: String,
    database: PathBuf,
    timeout: Duration,
}

impl DuckDbCli {
    pub fn new(
        binary: impl Into<String>,
        database: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            binary: binary.into(),
            database: database.into(),
            timeout,
        }
    }

    fn spec(&self, sql: &str) -> CommandSpec {
        CommandSpec::new(
            &self.binary,
            vec![
                "-readonly".to_string(),
                "-csv".to_string(),
                "-noheader".to_string(),
                self.database.display().to_string(),
                "-c".to_string(),
                sql.to_string(),
            ],
            self.timeout,
        )
    }
}

#[async_trait]
impl Warehouse for DuckDbCli {
    async fn count(&self, sql: &str) -> Result<i64> {
        if !self.database.exists() {
            bail!("warehouse not found at {}", self.database.display());
        }

        let output = run_command(&self.spec(sql)).await?;
        if !output.success() {
            bail!("query failed: {}", tail(output.stderr.trim(), 200));
        }

        parse_count(&output.stdout).with_context(|| format!("unexpected result for: {}", sql))
    }
}

/// Reads the single integer printed by `duckdb -csv -noheader`
pub(crate) fn parse_count(stdout: &str) -> Result<i64> {
    let value = stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .ok_or_else(|| anyhow!("query returned no rows"))?;

    let first = value.split(',').next().unwrap_or(value).trim_matches('"');
    first
        .parse::<i64>()
        .map_err(|_| anyhow!("not an integer: {}", first))
}
