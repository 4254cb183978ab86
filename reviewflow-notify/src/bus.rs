//! Message bus channel
//!
//! Publishes `{topic, subject, body}` to an HTTP publish endpoint (a topic
//! gateway in front of the bus).

use async_trait::async_trait;
use reqwest::Client;
use reviewflow_core::domain::run::PipelineRun;
use reviewflow_core::dto::notification::BusMessage;
use tracing::info;

use crate::error::Result;
use crate::summary::{render_summary, subject};
use crate::{HttpPoster, Notifier};

/// Publishes the run summary to a message bus topic
#[derive(Debug, Clone)]
pub struct MessageBusNotifier {
    endpoint: String,
    topic: String,
    http: HttpPoster,
}

impl MessageBusNotifier {
    pub fn new(endpoint: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            topic: topic.into(),
            http: HttpPoster::new(),
        }
    }

    pub fn with_client(
        endpoint: impl Into<String>,
        topic: impl Into<String>,
        client: Client,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            topic: topic.into(),
            http: HttpPoster::with_client(client),
        }
    }

    /// Builds the message published for a run
    pub fn message(&self, run: &PipelineRun) -> BusMessage {
        BusMessage {
            topic: self.topic.clone(),
            subject: subject(run),
            body: render_summary(run),
        }
    }
}

#[async_trait]
impl Notifier for MessageBusNotifier {
    fn channel(&self) -> &str {
        "message_bus"
    }

    async fn notify(&self, run: &PipelineRun) -> Result<()> {
        self.http.post_json(&self.endpoint, &self.message(run)).await?;
        info!("Published {} to topic {}", run.id(), self.topic);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NotifyError;
    use crate::test_support::capture_server;

    #[test]
    fn test_message_uses_summary() {
        let mut run = PipelineRun::start("pipeline");
        run.succeed().unwrap();

        let notifier = MessageBusNotifier::new("http://localhost:9000/publish", "pipeline-status");
        let message = notifier.message(&run);

        assert_eq!(message.topic, "pipeline-status");
        assert_eq!(message.subject, "Data Pipeline - SUCCESS");
        assert_eq!(message.body, render_summary(&run));
    }

    #[tokio::test]
    async fn test_notify_publishes_message() {
        let (url, server) = capture_server(202).await;
        let mut run = PipelineRun::start("pipeline");
        run.fail("dbt error").unwrap();

        MessageBusNotifier::new(url, "alerts")
            .notify(&run)
            .await
            .unwrap();

        let sent: BusMessage = serde_json::from_str(&server.await.unwrap()).unwrap();
        assert_eq!(sent.topic, "alerts");
        assert!(sent.body.ends_with("Error: dbt error"));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_an_error() {
        // Port 9 (discard) is not listening on loopback in test environments
        let notifier = MessageBusNotifier::new("http://127.0.0.1:9/publish", "alerts");
        let mut run = PipelineRun::start("pipeline");
        run.succeed().unwrap();

        let err = notifier.notify(&run).await.unwrap_err();
        assert!(matches!(err, NotifyError::Http(_)));
    }
}
