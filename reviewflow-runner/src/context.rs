//! Execution context for pipeline steps
//!
//! Logging is injected rather than global: the orchestrator receives a
//! [`RunLog`] and hands every executor a [`StepContext`] that writes to it.
//! Production wires [`TracingRunLog`]; tests use [`MemoryRunLog`] and
//! inspect what was logged for a given run.

use reviewflow_core::domain::log::{LogEntry, LogLevel};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

/// Sink for log entries produced during a run
pub trait RunLog: Send + Sync {
    /// Records an entry for the given run
    fn record(&self, run_id: &str, entry: LogEntry);
}

/// Forwards entries to `tracing` with the run id as a field
#[derive(Debug, Clone, Default)]
pub struct TracingRunLog;

impl RunLog for TracingRunLog {
    fn record(&self, run_id: &str, entry: LogEntry) {
        match entry.level {
            LogLevel::Debug => debug!(run_id, "{}", entry.message),
            LogLevel::Info => info!(run_id, "{}", entry.message),
            LogLevel::Warning => warn!(run_id, "{}", entry.message),
            LogLevel::Error => error!(run_id, "{}", entry.message),
        }
    }
}

/// In-memory log buffer
///
/// Uses `Arc<Mutex<..>>` so clones share the same buffer across tasks.
#[derive(Debug, Clone, Default)]
pub struct MemoryRunLog {
    buffer: Arc<Mutex<Vec<(String, LogEntry)>>>,
}

impl MemoryRunLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the entries recorded for one run
    pub fn entries_for(&self, run_id: &str) -> Vec<LogEntry> {
        self.lock()
            .iter()
            .filter(|(id, _)| id == run_id)
            .map(|(_, entry)| entry.clone())
            .collect()
    }

    /// Returns all entries and clears the buffer
    pub fn drain(&self) -> Vec<(String, LogEntry)> {
        self.lock().drain(..).collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(String, LogEntry)>> {
        self.buffer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl RunLog for MemoryRunLog {
    fn record(&self, run_id: &str, entry: LogEntry) {
        self.lock().push((run_id.to_string(), entry));
    }
}

/// Sends every entry to two logs
pub struct TeeRunLog {
    first: Arc<dyn RunLog>,
    second: Arc<dyn RunLog>,
}

impl TeeRunLog {
    pub fn new(first: Arc<dyn RunLog>, second: Arc<dyn RunLog>) -> Self {
        Self { first, second }
    }
}

impl RunLog for TeeRunLog {
    fn record(&self, run_id: &str, entry: LogEntry) {
        self.first.record(run_id, entry.clone());
        self.second.record(run_id, entry);
    }
}

/// Context handed to each step executor
#[derive(Clone)]
pub struct StepContext {
    run_id: String,
    log: Arc<dyn RunLog>,
}

impl StepContext {
    pub fn new(run_id: impl Into<String>, log: Arc<dyn RunLog>) -> Self {
        Self {
            run_id: run_id.into(),
            log,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    fn add_log(&self, level: LogLevel, message: String) {
        self.log.record(&self.run_id, LogEntry::now(level, message));
    }

    pub fn log_debug(&self, message: impl Into<String>) {
        self.add_log(LogLevel::Debug, message.into());
    }

    pub fn log_info(&self, message: impl Into<String>) {
        self.add_log(LogLevel::Info, message.into());
    }

    pub fn log_warning(&self, message: impl Into<String>) {
        self.add_log(LogLevel::Warning, message.into());
    }

    pub fn log_error(&self, message: impl Into<String>) {
        self.add_log(LogLevel::Error, message.into());
    }
}
