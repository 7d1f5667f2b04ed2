use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde_json::json;
use tokio::sync::OnceCell;

use crate::metrics::DispatchMetrics;
use crate::notification::{BroadcastPayload, ChannelOutcome};

use super::{BroadcastPublisher, ChannelConfig, ChannelResult};

const CHANNEL: &str = "broadcast";

/// Publishes one message per event to the configured topic
pub struct BroadcastDispatcher {
    publisher: Arc<dyn BroadcastPublisher>,
}

impl BroadcastDispatcher {
    pub fn new(publisher: Arc<dyn BroadcastPublisher>) -> Self {
        Self { publisher }
    }

    #[tracing::instrument(name = "broadcast.dispatch", skip(self, config, payload))]
    pub async fn dispatch(
        &self,
        config: &ChannelConfig,
        payload: &BroadcastPayload,
    ) -> ChannelOutcome {
        if !config.broadcast_configured() {
            return ChannelOutcome::Disabled;
        }

        let started = Instant::now();
        let result = self
            .publisher
            .publish(&config.broadcast_topic, &payload.subject, &payload.body)
            .await;
        DispatchMetrics::observe_latency(CHANNEL, started.elapsed().as_secs_f64());

        let outcome = match result {
            Ok(()) => {
                tracing::info!(topic = %config.broadcast_topic, "Broadcast notification published");
                ChannelOutcome::Sent
            }
            Err(e) => {
                tracing::error!(
                    channel = CHANNEL,
                    topic = %config.broadcast_topic,
                    error = %e,
                    "Failed to publish broadcast notification"
                );
                ChannelOutcome::Failed(e.to_string())
            }
        };

        DispatchMetrics::record_channel(CHANNEL, &outcome);
        outcome
    }
}

/// Publishes to a Redis pub/sub channel named by the topic.
///
/// The message is `{"subject": ..., "message": ...}`, where `message` is
/// the JSON event record. The connection is opened on first publish.
pub struct RedisBroadcastPublisher {
    client: redis::Client,
    connection: OnceCell<ConnectionManager>,
}

impl RedisBroadcastPublisher {
    pub fn new(url: &str) -> ChannelResult<Self> {
        Ok(Self {
            client: redis::Client::open(url)?,
            connection: OnceCell::new(),
        })
    }

    async fn connection(&self) -> ChannelResult<ConnectionManager> {
        let connection = self
            .connection
            .get_or_try_init(|| ConnectionManager::new(self.client.clone()))
            .await?;
        Ok(connection.clone())
    }
}

#[async_trait]
impl BroadcastPublisher for RedisBroadcastPublisher {
    async fn publish(&self, topic: &str, subject: &str, body: &str) -> ChannelResult<()> {
        let message = serde_json::to_string(&json!({
            "subject": subject,
            "message": body,
        }))?;

        let mut connection = self.connection().await?;
        let receivers: i64 = connection.publish(topic, message).await?;
        tracing::debug!(topic = %topic, receivers = receivers, "Published to Redis topic");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::ChannelError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        published: Mutex<Vec<(String, String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl BroadcastPublisher for Recorder {
        async fn publish(&self, topic: &str, subject: &str, body: &str) -> ChannelResult<()> {
            if self.fail {
                return Err(ChannelError::InvalidRequest("topic does not exist".to_string()));
            }
            self.published.lock().unwrap().push((
                topic.to_string(),
                subject.to_string(),
                body.to_string(),
            ));
            Ok(())
        }
    }

    fn payload() -> BroadcastPayload {
        BroadcastPayload {
            subject: "AWS access request rejected".to_string(),
            body: r#"{"status":"rejected"}"#.to_string(),
        }
    }

    fn config() -> ChannelConfig {
        ChannelConfig {
            broadcast_enabled: true,
            broadcast_topic: "team-notifications".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_publishes_to_topic() {
        let publisher = Arc::new(Recorder::default());
        let dispatcher = BroadcastDispatcher::new(publisher.clone());
        assert_eq!(dispatcher.dispatch(&config(), &payload()).await, ChannelOutcome::Sent);

        let published = publisher.published.lock().unwrap();
        assert_eq!(published[0].0, "team-notifications");
        assert_eq!(published[0].2, r#"{"status":"rejected"}"#);
    }

    #[tokio::test]
    async fn test_disabled_is_noop() {
        let publisher = Arc::new(Recorder::default());
        let dispatcher = BroadcastDispatcher::new(publisher.clone());
        let outcome = dispatcher.dispatch(&ChannelConfig::default(), &payload()).await;
        assert_eq!(outcome, ChannelOutcome::Disabled);
        assert!(publisher.published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failure_is_reported() {
        let dispatcher = BroadcastDispatcher::new(Arc::new(Recorder {
            fail: true,
            ..Default::default()
        }));
        let outcome = dispatcher.dispatch(&config(), &payload()).await;
        assert!(matches!(outcome, ChannelOutcome::Failed(_)));
    }
}
