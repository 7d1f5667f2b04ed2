use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};

use crate::metrics::DispatchMetrics;
use crate::notification::{ChatPayload, RecipientOutcome, RecipientReport};

use super::{ChannelConfig, ChatCredential, ChatPoster};

const CHANNEL: &str = "chat";

/// Concurrent chat sends per dispatch, kept small for the chat API's rate limits
pub const DEFAULT_MAX_CONCURRENT_SENDS: usize = 4;

/// One direct message to deliver
#[derive(Debug, Clone)]
pub struct ChatSend {
    pub email_address: String,
    pub payload: ChatPayload,
}

/// Posts one direct message per resolved recipient.
///
/// Sends run on a bounded pool; completion order is not preserved. A
/// failed send is recorded against its recipient and the rest continue.
pub struct ChatDispatcher {
    poster: Arc<dyn ChatPoster>,
    max_concurrent_sends: usize,
}

impl ChatDispatcher {
    pub fn new(poster: Arc<dyn ChatPoster>, max_concurrent_sends: usize) -> Self {
        Self {
            poster,
            max_concurrent_sends: max_concurrent_sends.max(1),
        }
    }

    #[tracing::instrument(
        name = "chat.dispatch",
        skip(self, config, sends),
        fields(recipient_count = sends.len())
    )]
    pub async fn dispatch(
        &self,
        config: &ChannelConfig,
        sends: Vec<ChatSend>,
    ) -> Vec<RecipientReport> {
        let Some(credential) = config
            .chat_credential
            .as_ref()
            .filter(|_| config.chat_configured())
        else {
            return Vec::new();
        };

        stream::iter(sends)
            .map(|send| self.send_one(credential, send))
            .buffer_unordered(self.max_concurrent_sends)
            .collect()
            .await
    }

    async fn send_one(&self, credential: &ChatCredential, send: ChatSend) -> RecipientReport {
        let ChatSend {
            email_address,
            payload,
        } = send;

        let started = Instant::now();
        let result = self
            .poster
            .post_chat_message(
                credential,
                &payload.recipient_user_id,
                &payload.blocks,
                &payload.fallback_text,
            )
            .await;
        DispatchMetrics::observe_latency(CHANNEL, started.elapsed().as_secs_f64());

        let outcome = match result {
            Ok(()) => {
                DispatchMetrics::record_send(CHANNEL, "sent");
                tracing::debug!(
                    recipient = %email_address,
                    user_id = %payload.recipient_user_id,
                    "Chat notification sent"
                );
                RecipientOutcome::Sent
            }
            Err(e) => {
                DispatchMetrics::record_send(CHANNEL, "failed");
                tracing::error!(
                    channel = CHANNEL,
                    recipient = %email_address,
                    user_id = %payload.recipient_user_id,
                    error = %e,
                    "Failed to post chat message"
                );
                RecipientOutcome::SendFailed(e.to_string())
            }
        };

        RecipientReport {
            email_address,
            chat_user_id: Some(payload.recipient_user_id),
            outcome,
        }
    }
}
