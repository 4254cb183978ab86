//! Console channel

use async_trait::async_trait;
use reviewflow_core::domain::run::PipelineRun;
use std::io::Write;
use std::sync::Mutex;

use crate::Notifier;
use crate::error::Result;
use crate::summary::render_summary;

const BANNER_WIDTH: usize = 60;

/// Prints the summary inside a banner
pub struct ConsoleNotifier {
    out: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleNotifier {
    /// Prints to standard output
    pub fn new() -> Self {
        Self::with_writer(Box::new(std::io::stdout()))
    }

    pub fn with_writer(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }
}

impl Default for ConsoleNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for ConsoleNotifier {
    fn channel(&self) -> &str {
        "console"
    }

    async fn notify(&self, run: &PipelineRun) -> Result<()> {
        let rule = "=".repeat(BANNER_WIDTH);
        let text = format!(
            "\n{rule}\nPIPELINE NOTIFICATION\n{rule}\n{}\n{rule}\n",
            render_summary(run)
        );

        let mut out = self
            .out
            .lock()
            .map_err(|_| std::io::Error::other("console writer poisoned"))?;
        out.write_all(text.as_bytes())?;
        out.flush()?;
        Ok(())
    }
}
