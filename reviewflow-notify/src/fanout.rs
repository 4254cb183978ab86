//! Fan-out over several channels

use async_trait::async_trait;
use reviewflow_core::domain::run::PipelineRun;
use tracing::{debug, warn};

use crate::Notifier;
use crate::error::{NotifyError, Result};

/// Invokes every channel in registration order
///
/// A failing channel is logged and skipped; the remaining channels are
/// still invoked. The aggregate result lists the channels that failed.
#[derive(Default)]
pub struct FanoutNotifier {
    channels: Vec<Box<dyn Notifier>>,
}

impl FanoutNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<N: Notifier + 'static>(mut self, notifier: N) -> Self {
        self.push(Box::new(notifier));
        self
    }

    pub fn push(&mut self, notifier: Box<dyn Notifier>) {
        self.channels.push(notifier);
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn channel_names(&self) -> Vec<String> {
        self.channels.iter().map(|c| c.channel().to_string()).collect()
    }
}

#[async_trait]
impl Notifier for FanoutNotifier {
    fn channel(&self) -> &str {
        "fanout"
    }

    async fn notify(&self, run: &PipelineRun) -> Result<()> {
        let mut failed = Vec::new();

        for channel in &self.channels {
            match channel.notify(run).await {
                Ok(()) => debug!("Channel '{}' notified for {}", channel.channel(), run.id()),
                Err(e) => {
                    warn!("Channel '{}' failed for {}: {}", channel.channel(), run.id(), e);
                    failed.push(channel.channel().to_string());
                }
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(NotifyError::Partial {
                failed,
                total: self.channels.len(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingNotifier {
        name: &'static str,
        fail: bool,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Notifier for CountingNotifier {
        fn channel(&self) -> &str {
            self.name
        }

        async fn notify(&self, _run: &PipelineRun) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(NotifyError::status(502, "bad gateway"))
            } else {
                Ok(())
            }
        }
    }

    fn counting(name: &'static str, fail: bool) -> (CountingNotifier, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            CountingNotifier {
                name,
                fail,
                calls: calls.clone(),
            },
            calls,
        )
    }

    #[tokio::test]
    async fn test_failure_does_not_block_other_channels() {
        let (first, first_calls) = counting("webhook", true);
        let (second, second_calls) = counting("file", false);
        let (third, third_calls) = counting("bus", true);

        let fanout = FanoutNotifier::new().with(first).with(second).with(third);
        let mut run = PipelineRun::start("pipeline");
        run.succeed().unwrap();

        let err = fanout.notify(&run).await.unwrap_err();

        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 1);
        assert_eq!(third_calls.load(Ordering::SeqCst), 1);
        match err {
            NotifyError::Partial { failed, total } => {
                assert_eq!(failed, vec!["webhook".to_string(), "bus".to_string()]);
                assert_eq!(total, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_empty_fanout_succeeds() {
        let fanout = FanoutNotifier::new();
        let mut run = PipelineRun::start("pipeline");
        run.succeed().unwrap();

        assert!(fanout.is_empty());
        assert!(fanout.notify(&run).await.is_ok());
    }
}
