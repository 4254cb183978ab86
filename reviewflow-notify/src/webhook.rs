//! Chat webhook channel

use async_trait::async_trait;
use reqwest::Client;
use reviewflow_core::domain::run::{PipelineRun, RunStatus};
use reviewflow_core::dto::notification::{WebhookAttachment, WebhookField, WebhookPayload};
use tracing::info;

use crate::error::Result;
use crate::summary::subject;
use crate::{HttpPoster, Notifier};

/// Posts a colored attachment to a chat webhook
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    url: String,
    http: HttpPoster,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            http: HttpPoster::new(),
        }
    }

    /// Uses a preconfigured HTTP client (timeouts, proxies, TLS)
    pub fn with_client(url: impl Into<String>, client: Client) -> Self {
        Self {
            url: url.into(),
            http: HttpPoster::with_client(client),
        }
    }

    /// Builds the webhook body for a run
    pub fn payload(run: &PipelineRun) -> WebhookPayload {
        let status = run.overall_status();
        let color = if status == RunStatus::Succeeded {
            "good"
        } else {
            "danger"
        };

        let mut fields = vec![
            WebhookField::new("Status", status.label(), true),
            WebhookField::new("Steps", run.steps().len().to_string(), true),
        ];
        if let Some(error) = run.error() {
            fields.push(WebhookField::new("Error", error, false));
        }

        WebhookPayload {
            attachments: vec![WebhookAttachment {
                color: color.to_string(),
                title: subject(run),
                text: format!("Pipeline {} completed", run.id()),
                fields,
            }],
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn channel(&self) -> &str {
        "webhook"
    }

    async fn notify(&self, run: &PipelineRun) -> Result<()> {
        self.http.post_json(&self.url, &Self::payload(run)).await?;
        info!("Webhook notification sent for {}", run.id());
        Ok(())
    }
}
