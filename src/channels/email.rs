use std::sync::Arc;
use std::time::Instant;

use crate::metrics::DispatchMetrics;
use crate::notification::{ChannelOutcome, EmailPayload};

use super::{ChannelConfig, EmailSender};

const CHANNEL: &str = "email";

/// Sends one email per event through the configured sender
pub struct EmailDispatcher {
    sender: Arc<dyn EmailSender>,
}

impl EmailDispatcher {
    pub fn new(sender: Arc<dyn EmailSender>) -> Self {
        Self { sender }
    }

    #[tracing::instrument(
        name = "email.dispatch",
        skip(self, config, payload),
        fields(to_count = payload.to_addresses.len(), cc_count = payload.cc_addresses.len())
    )]
    pub async fn dispatch(&self, config: &ChannelConfig, payload: &EmailPayload) -> ChannelOutcome {
        if !config.email_configured() {
            return ChannelOutcome::Disabled;
        }

        let started = Instant::now();
        let result = self
            .sender
            .send_email(
                &config.email_source_address,
                config.email_source_arn(),
                payload,
            )
            .await;
        DispatchMetrics::observe_latency(CHANNEL, started.elapsed().as_secs_f64());

        let outcome = match result {
            Ok(()) => {
                tracing::info!(
                    to = ?payload.to_addresses,
                    cc = ?payload.cc_addresses,
                    "Email notification sent"
                );
                ChannelOutcome::Sent
            }
            Err(e) => {
                tracing::error!(
                    channel = CHANNEL,
                    source = %config.email_source_address,
                    to = ?payload.to_addresses,
                    error = %e,
                    "Failed to send email notification"
                );
                ChannelOutcome::Failed(e.to_string())
            }
        };

        DispatchMetrics::record_channel(CHANNEL, &outcome);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::{ChannelError, ChannelResult};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<(String, Option<String>)>>,
        fail: bool,
    }

    #[async_trait]
    impl EmailSender for Recorder {
        async fn send_email(
            &self,
            source: &str,
            source_arn: Option<&str>,
            _payload: &EmailPayload,
        ) -> ChannelResult<()> {
            self.calls
                .lock()
                .unwrap()
                .push((source.to_string(), source_arn.map(str::to_string)));
            if self.fail {
                return Err(ChannelError::Rejected {
                    channel: CHANNEL,
                    reason: "MessageRejected".to_string(),
                });
            }
            Ok(())
        }
    }

    fn payload() -> EmailPayload {
        EmailPayload {
            subject: "subject".to_string(),
            html_body: "<html></html>".to_string(),
            to_addresses: vec!["bob@x.com".to_string()],
            cc_addresses: vec![],
        }
    }

    fn config() -> ChannelConfig {
        ChannelConfig {
            email_enabled: true,
            email_source_address: "team@x.com".to_string(),
            email_source_arn: Some("arn:aws:ses:us-east-1:111122223333:identity/x.com".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_disabled_is_noop() {
        let sender = Arc::new(Recorder::default());
        let dispatcher = EmailDispatcher::new(sender.clone());
        let outcome = dispatcher.dispatch(&ChannelConfig::default(), &payload()).await;
        assert_eq!(outcome, ChannelOutcome::Disabled);
        assert!(sender.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sends_with_authority() {
        let sender = Arc::new(Recorder::default());
        let dispatcher = EmailDispatcher::new(sender.clone());
        let outcome = dispatcher.dispatch(&config(), &payload()).await;
        assert_eq!(outcome, ChannelOutcome::Sent);

        let calls = sender.calls.lock().unwrap();
        assert_eq!(calls[0].0, "team@x.com");
        assert!(calls[0].1.as_deref().unwrap().starts_with("arn:"));
    }

    #[tokio::test]
    async fn test_failure_is_reported_not_raised() {
        let sender = Arc::new(Recorder {
            fail: true,
            ..Default::default()
        });
        let dispatcher = EmailDispatcher::new(sender);
        let outcome = dispatcher.dispatch(&config(), &payload()).await;
        assert!(matches!(outcome, ChannelOutcome::Failed(reason) if reason.contains("MessageRejected")));
    }
}
