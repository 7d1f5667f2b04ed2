use std::sync::Arc;
use std::time::Instant;

use crate::channels::{ChannelConfig, WebhookPoster};
use crate::config::Settings;
use crate::notification::NotificationDispatcher;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    /// Resolved once at startup and shared by every dispatch
    pub channel_config: Arc<ChannelConfig>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub webhook: Arc<dyn WebhookPoster>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        settings: Settings,
        dispatcher: Arc<NotificationDispatcher>,
        webhook: Arc<dyn WebhookPoster>,
    ) -> Self {
        let channel_config = Arc::new(settings.channel_config());

        Self {
            settings: Arc::new(settings),
            channel_config,
            dispatcher,
            webhook,
            start_time: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
