mod settings;

pub use settings::{
    ApiConfig, BroadcastSettings, ChatSettings, ConfigValidationError, EmailSettings,
    NotificationsConfig, OtelConfig, RedisConfig, ServerConfig, Settings, WebhookConfig,
    DEFAULT_EVENT_CHANNEL,
};
