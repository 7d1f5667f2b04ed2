use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::broadcast;

use crate::channels::ChannelConfig;
use crate::config::{RedisConfig, DEFAULT_EVENT_CHANNEL};
use crate::notification::NotificationDispatcher;
use crate::request::AccessRequestEvent;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Redis Pub/Sub subscriber feeding access-request events to the dispatcher.
///
/// Each message is one JSON event record.
pub struct RedisSubscriber {
    config: RedisConfig,
    channel_config: Arc<ChannelConfig>,
    dispatcher: Arc<NotificationDispatcher>,
    shutdown: broadcast::Sender<()>,
}

impl RedisSubscriber {
    pub fn new(
        config: RedisConfig,
        channel_config: Arc<ChannelConfig>,
        dispatcher: Arc<NotificationDispatcher>,
    ) -> Self {
        let (shutdown, _) = broadcast::channel(1);
        Self {
            config,
            channel_config,
            dispatcher,
            shutdown,
        }
    }

    /// Get a shutdown signal sender
    pub fn shutdown_signal(&self) -> broadcast::Sender<()> {
        self.shutdown.clone()
    }

    /// Start the Redis subscriber loop
    pub async fn start(&self) -> anyhow::Result<()> {
        let channels = self.get_channels();
        tracing::info!(channels = ?channels, "Starting Redis subscriber");

        let mut shutdown_rx = self.shutdown.subscribe();
        loop {
            match self.run_subscription_loop(&channels).await {
                Ok(()) => {
                    tracing::info!("Redis subscriber stopped gracefully");
                    break;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Redis subscription error, reconnecting in 5 seconds...");
                    tokio::select! {
                        _ = shutdown_rx.recv() => break,
                        _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                    }
                }
            }
        }

        Ok(())
    }

    fn get_channels(&self) -> Vec<String> {
        if self.config.channels.is_empty() {
            vec![DEFAULT_EVENT_CHANNEL.to_string()]
        } else {
            self.config.channels.clone()
        }
    }

    async fn run_subscription_loop(&self, channels: &[String]) -> anyhow::Result<()> {
        let client = redis::Client::open(self.config.url.as_str())?;
        let mut pubsub = client.get_async_pubsub().await?;

        for channel in channels {
            if channel.contains('*') || channel.contains('?') || channel.contains('[') {
                pubsub.psubscribe(channel).await?;
                tracing::debug!(pattern = %channel, "Subscribed to pattern");
            } else {
                pubsub.subscribe(channel).await?;
                tracing::debug!(channel = %channel, "Subscribed to channel");
            }
        }

        tracing::info!("Redis subscription established");

        let mut message_stream = pubsub.on_message();
        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Received shutdown signal");
                    return Ok(());
                }
                msg = message_stream.next() => {
                    let Some(msg) = msg else {
                        anyhow::bail!("Redis message stream ended");
                    };
                    let channel = msg.get_channel_name().to_string();
                    let payload: String = match msg.get_payload() {
                        Ok(p) => p,
                        Err(e) => {
                            tracing::warn!(error = %e, "Failed to get message payload");
                            continue;
                        }
                    };

                    self.handle_message(&channel, &payload).await;
                }
            }
        }
    }

    async fn handle_message(&self, channel: &str, payload: &str) {
        tracing::debug!(channel = %channel, "Received Redis message");

        let Some(event) = parse_event(channel, payload) else {
            return;
        };

        let report = self.dispatcher.dispatch(&event, &self.channel_config).await;

        tracing::debug!(
            channel = %channel,
            dispatch_id = %report.dispatch_id,
            status = %report.status,
            "Dispatched access request event from Redis"
        );
    }
}

/// Parse one pub/sub payload; bad records are logged and dropped
fn parse_event(channel: &str, payload: &str) -> Option<AccessRequestEvent> {
    match AccessRequestEvent::from_json(payload) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::warn!(
                error = %e,
                channel = %channel,
                "Failed to parse access request event"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::CanonicalStatus;

    #[test]
    fn test_parse_pending_event() {
        let json = r#"{
            "id": "8f6c3c1e",
            "email": "alice@x.com",
            "approvers": ["bob@x.com"],
            "accountName": "Testing",
            "accountId": "123456789012",
            "role": "Admin",
            "startTime": "2023-04-21T12:43:39.879Z",
            "time": "2",
            "sso_login_url": "https://team.example",
            "status": "pending"
        }"#;

        let event = parse_event("access-requests:events", json).unwrap();
        assert_eq!(event.requester_email, "alice@x.com");
        assert_eq!(event.duration_hours, 2.0);
        assert_eq!(event.canonical_status(), CanonicalStatus::Pending);
    }

    #[test]
    fn test_parse_grant_in_progress() {
        let json = r#"{
            "email": "alice@x.com",
            "approvers": ["bob@x.com"],
            "accountName": "Testing",
            "accountId": "123456789012",
            "role": "Admin",
            "startTime": "2024-01-01T00:00:00Z",
            "time": 1,
            "sso_login_url": "https://team.example",
            "status": "approved",
            "grant": {"AccountAssignmentCreationStatus": {"Status": "IN_PROGRESS"}}
        }"#;

        let event = parse_event("access-requests:events", json).unwrap();
        assert_eq!(event.canonical_status(), CanonicalStatus::Granted);
    }

    #[test]
    fn test_malformed_payload_is_dropped() {
        assert!(parse_event("access-requests:events", "not json").is_none());
        assert!(parse_event("access-requests:events", r#"{"status": "pending"}"#).is_none());
    }
}
