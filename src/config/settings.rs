use config::{Config, ConfigError, Environment, File};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::env;
use thiserror::Error;

use crate::channels::{ChannelConfig, ChatCredential, DEFAULT_MAX_CONCURRENT_SENDS};

/// Default Redis channel carrying access-request events
pub const DEFAULT_EVENT_CHANNEL: &str = "access-requests:events";

lazy_static! {
    static ref EMAIL_ADDRESS: Regex = Regex::new(r"^\S+@\S+\.\S+$").unwrap();
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub otel: OtelConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiConfig {
    /// Required as `X-API-Key` on `/api/v1/*` when set
    pub key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,
    /// Channels carrying access-request events
    #[serde(default = "default_event_channels")]
    pub channels: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default)]
    pub email: EmailSettings,
    #[serde(default)]
    pub broadcast: BroadcastSettings,
    #[serde(default)]
    pub chat: ChatSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub source_address: String,
    /// Sending-authorization ARN for a cross-account identity
    pub source_arn: Option<String>,
    /// HTTP mail relay that performs the actual send
    pub relay_url: Option<String>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BroadcastSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub topic: String,
}

#[derive(Clone, Deserialize)]
pub struct ChatSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_chat_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_max_concurrent_sends")]
    pub max_concurrent_sends: usize,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl std::fmt::Debug for ChatSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSettings")
            .field("enabled", &self.enabled)
            .field("token", &"[redacted]")
            .field("api_base_url", &self.api_base_url)
            .field("max_concurrent_sends", &self.max_concurrent_sends)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

/// OpenTelemetry exporter settings
#[derive(Debug, Clone, Deserialize)]
pub struct OtelConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_otel_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_sampling_ratio")]
    pub sampling_ratio: f64,
}

/// Operator settings that would make a channel unusable
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigValidationError {
    #[error("Invalid email source address: '{0}'")]
    InvalidSourceAddress(String),

    #[error("Invalid email source ARN: '{0}' (must start with 'arn:')")]
    InvalidSourceArn(String),

    #[error("Invalid chat token (must start with 'xoxb' and be at least 10 characters)")]
    InvalidChatToken,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_event_channels() -> Vec<String> {
    vec![DEFAULT_EVENT_CHANNEL.to_string()]
}

fn default_chat_api_base_url() -> String {
    "https://slack.com/api".to_string()
}

fn default_max_concurrent_sends() -> usize {
    DEFAULT_MAX_CONCURRENT_SENDS
}

fn default_timeout_seconds() -> u64 {
    10
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_service_name() -> String {
    "access-notify".to_string()
}

fn default_sampling_ratio() -> f64 {
    1.0
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("redis.url", "redis://localhost:6379")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // SERVER__PORT, REDIS__CHANNELS, NOTIFICATIONS__CHAT__TOKEN, etc.
            .add_source(
                Environment::default()
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("redis.channels"),
            );

        builder.build()?.try_deserialize()
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Check enabled channels against the operator-console rules
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let email = &self.notifications.email;
        if email.enabled && !EMAIL_ADDRESS.is_match(email.source_address.trim()) {
            return Err(ConfigValidationError::InvalidSourceAddress(
                email.source_address.clone(),
            ));
        }
        if let Some(arn) = email.source_arn.as_deref().filter(|a| !a.trim().is_empty()) {
            if !arn.starts_with("arn:") {
                return Err(ConfigValidationError::InvalidSourceArn(arn.to_string()));
            }
        }

        let chat = &self.notifications.chat;
        if chat.enabled && (!chat.token.starts_with("xoxb") || chat.token.len() < 10) {
            return Err(ConfigValidationError::InvalidChatToken);
        }

        Ok(())
    }

    /// Read-only channel configuration handed to each dispatch.
    ///
    /// Email counts as enabled only when a relay is configured to carry it.
    pub fn channel_config(&self) -> ChannelConfig {
        let email = &self.notifications.email;
        let broadcast = &self.notifications.broadcast;
        let chat = &self.notifications.chat;

        ChannelConfig {
            email_enabled: email.enabled && email.relay_url.is_some(),
            email_source_address: email.source_address.trim().to_string(),
            email_source_arn: email.source_arn.clone(),
            broadcast_enabled: broadcast.enabled,
            broadcast_topic: broadcast.topic.trim().to_string(),
            chat_enabled: chat.enabled,
            chat_credential: Some(chat.token.trim())
                .filter(|token| !token.is_empty())
                .map(ChatCredential::new),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            channels: default_event_channels(),
        }
    }
}

impl Default for EmailSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            source_address: String::new(),
            source_arn: None,
            relay_url: None,
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            token: String::new(),
            api_base_url: default_chat_api_base_url(),
            max_concurrent_sends: default_max_concurrent_sends(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_otel_endpoint(),
            service_name: default_service_name(),
            sampling_ratio: default_sampling_ratio(),
        }
    }
}
