//! Delivery channels.
//!
//! Each transport is reached through a narrow capability trait so the
//! dispatch engine never depends on a concrete SDK:
//!
//! - [`EmailSender`]: transactional email with To/Cc and an HTML body
//! - [`BroadcastPublisher`]: pub/sub topic publish
//! - [`ChatDirectory`] / [`ChatPoster`]: chat identity lookup and direct messages
//! - [`WebhookPoster`]: raw JSON forward to an operator URL
//!
//! The per-channel dispatchers wrap these traits with the engine's
//! best-effort policy: a disabled channel is a no-op, a failed send is
//! logged and reported, never raised.

mod broadcast;
mod chat;
mod config;
mod email;
mod relay;
mod slack;
mod webhook;

use async_trait::async_trait;
use thiserror::Error;

use crate::notification::EmailPayload;

pub use broadcast::{BroadcastDispatcher, RedisBroadcastPublisher};
pub use chat::{ChatDispatcher, ChatSend, DEFAULT_MAX_CONCURRENT_SENDS};
pub use config::{ChannelConfig, ChatCredential};
pub use email::EmailDispatcher;
pub use relay::HttpEmailRelay;
pub use slack::SlackClient;
pub use webhook::{forward_record, HttpWebhookPoster, WebhookResponse, WEBHOOK_URL_FIELD};

/// Errors reported by channel transports
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{channel} rejected the request: {reason}")]
    Rejected {
        channel: &'static str,
        reason: String,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

pub type ChannelResult<T> = Result<T, ChannelError>;

/// Chat identity of one person, as returned by the chat directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatIdentity {
    pub user_id: String,
    /// IANA timezone name, when the directory knows it
    pub timezone: Option<String>,
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Send one message to the payload's To/Cc lists.
    ///
    /// `source_arn` authorizes sending from an identity owned by another account.
    async fn send_email(
        &self,
        source: &str,
        source_arn: Option<&str>,
        payload: &EmailPayload,
    ) -> ChannelResult<()>;
}

#[async_trait]
pub trait BroadcastPublisher: Send + Sync {
    async fn publish(&self, topic: &str, subject: &str, body: &str) -> ChannelResult<()>;
}

#[async_trait]
pub trait ChatDirectory: Send + Sync {
    async fn resolve_chat_identity(
        &self,
        credential: &ChatCredential,
        email: &str,
    ) -> ChannelResult<ChatIdentity>;
}

#[async_trait]
pub trait ChatPoster: Send + Sync {
    async fn post_chat_message(
        &self,
        credential: &ChatCredential,
        user_id: &str,
        blocks: &serde_json::Value,
        fallback_text: &str,
    ) -> ChannelResult<()>;
}

#[async_trait]
pub trait WebhookPoster: Send + Sync {
    async fn post_webhook(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> ChannelResult<WebhookResponse>;
}
