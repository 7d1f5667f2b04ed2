use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::metrics::WebhookMetrics;

use super::{ChannelError, ChannelResult, WebhookPoster};

/// Record field holding the forward destination
pub const WEBHOOK_URL_FIELD: &str = "webhook_url";

/// What the destination answered
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookResponse {
    pub status_code: u16,
    pub response: String,
}

/// Posts raw JSON records to arbitrary URLs
#[derive(Debug, Clone)]
pub struct HttpWebhookPoster {
    client: Client,
}

impl HttpWebhookPoster {
    pub fn new(timeout: Duration) -> ChannelResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl WebhookPoster for HttpWebhookPoster {
    async fn post_webhook(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> ChannelResult<WebhookResponse> {
        let response = self.client.post(url).json(body).send().await?;
        let status_code = response.status().as_u16();
        let response = response.text().await?;

        Ok(WebhookResponse {
            status_code,
            response,
        })
    }
}

/// Forward an event record, unchanged, to the URL named in its
/// `webhook_url` field.
///
/// The destination's status is passed back as-is; only transport
/// failures and a missing URL are errors.
#[tracing::instrument(name = "webhook.forward", skip_all)]
pub async fn forward_record(
    poster: &dyn WebhookPoster,
    record: &serde_json::Value,
) -> ChannelResult<WebhookResponse> {
    let url = record
        .get(WEBHOOK_URL_FIELD)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .ok_or_else(|| {
            ChannelError::InvalidRequest(format!("record has no '{}'", WEBHOOK_URL_FIELD))
        })?;

    match poster.post_webhook(url, record).await {
        Ok(response) => {
            WebhookMetrics::record_forwarded();
            tracing::info!(
                url = %url,
                status_code = response.status_code,
                "Event forwarded to webhook"
            );
            Ok(response)
        }
        Err(e) => {
            WebhookMetrics::record_failed();
            tracing::error!(url = %url, error = %e, "Webhook forward failed");
            Err(e)
        }
    }
}
