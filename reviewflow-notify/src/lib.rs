//! ReviewFlow notification channels
//!
//! Delivers the summary of a finished pipeline run to external channels.
//! Delivery is best-effort: channels report failures as [`NotifyError`] and
//! the caller decides how to log them. A failure never changes the run.
//!
//! # Example
//!
//! ```no_run
//! use reviewflow_core::domain::run::PipelineRun;
//! use reviewflow_notify::{FanoutNotifier, FileNotifier, Notifier, WebhookNotifier};
//!
//! # async fn example(run: PipelineRun) {
//! let notifier = FanoutNotifier::new()
//!     .with(FileNotifier::new("logs"))
//!     .with(WebhookNotifier::new("https://hooks.example.com/T000/B000"));
//!
//! if let Err(e) = notifier.notify(&run).await {
//!     tracing::warn!("Notification incomplete: {}", e);
//! }
//! # }
//! ```

mod bus;
mod console;
pub mod error;
mod fanout;
mod file;
pub mod summary;
mod webhook;

#[cfg(test)]
pub(crate) mod test_support;

pub use bus::MessageBusNotifier;
pub use console::ConsoleNotifier;
pub use error::{NotifyError, Result};
pub use fanout::FanoutNotifier;
pub use file::FileNotifier;
pub use summary::render_summary;
pub use webhook::WebhookNotifier;

use async_trait::async_trait;
use reqwest::Client;
use reviewflow_core::domain::run::PipelineRun;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Default bound for one HTTP delivery
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// A channel that receives the final run record
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Short channel name used in logs
    fn channel(&self) -> &str;

    /// Delivers the run summary
    async fn notify(&self, run: &PipelineRun) -> Result<()>;
}

#[async_trait]
impl<N: Notifier + ?Sized> Notifier for Arc<N> {
    fn channel(&self) -> &str {
        (**self).channel()
    }

    async fn notify(&self, run: &PipelineRun) -> Result<()> {
        (**self).notify(run).await
    }
}

#[async_trait]
impl<N: Notifier + ?Sized> Notifier for Box<N> {
    fn channel(&self) -> &str {
        (**self).channel()
    }

    async fn notify(&self, run: &PipelineRun) -> Result<()> {
        (**self).notify(run).await
    }
}

/// Shared JSON poster for the HTTP channels
#[derive(Debug, Clone)]
pub(crate) struct HttpPoster {
    client: Client,
}

impl HttpPoster {
    pub(crate) fn new() -> Self {
        let client = Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client }
    }

    pub(crate) fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// POSTs a JSON body and checks the response status
    pub(crate) async fn post_json<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> Result<()> {
        let response = self.client.post(url).json(body).send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(NotifyError::status(status.as_u16(), error_text));
        }

        Ok(())
    }
}
