//! Local file channel

use async_trait::async_trait;
use reviewflow_core::domain::run::PipelineRun;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::Notifier;
use crate::error::Result;
use crate::summary::render_summary;

/// Writes the summary to `<dir>/notification_<run id>.txt`
#[derive(Debug, Clone)]
pub struct FileNotifier {
    dir: PathBuf,
}

impl FileNotifier {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path the summary of `run_id` is written to
    pub fn path_for(&self, run_id: &str) -> PathBuf {
        let safe: String = run_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("notification_{}.txt", safe))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl Notifier for FileNotifier {
    fn channel(&self) -> &str {
        "file"
    }

    async fn notify(&self, run: &PipelineRun) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(run.id());
        tokio::fs::write(&path, render_summary(run)).await?;
        info!("Notification saved to {}", path.display());
        Ok(())
    }
}
