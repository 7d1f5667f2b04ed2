use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::notification::EmailPayload;

use super::{ChannelError, ChannelResult, EmailSender};

/// Request body accepted by the mail relay
#[derive(Debug, Serialize)]
struct RelayMessage<'a> {
    source: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_arn: Option<&'a str>,
    to: &'a [String],
    cc: &'a [String],
    subject: &'a str,
    html: &'a str,
}

/// Sends email by POSTing JSON to an HTTP mail relay.
///
/// Any 2xx response counts as accepted.
#[derive(Debug, Clone)]
pub struct HttpEmailRelay {
    client: Client,
    url: String,
}

impl HttpEmailRelay {
    pub fn new(url: impl Into<String>, timeout: Duration) -> ChannelResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

fn relay_message<'a>(
    source: &'a str,
    source_arn: Option<&'a str>,
    payload: &'a EmailPayload,
) -> RelayMessage<'a> {
    RelayMessage {
        source,
        source_arn,
        to: &payload.to_addresses,
        cc: &payload.cc_addresses,
        subject: &payload.subject,
        html: &payload.html_body,
    }
}

#[async_trait]
impl EmailSender for HttpEmailRelay {
    async fn send_email(
        &self,
        source: &str,
        source_arn: Option<&str>,
        payload: &EmailPayload,
    ) -> ChannelResult<()> {
        let response = self
            .client
            .post(&self.url)
            .json(&relay_message(source, source_arn, payload))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(ChannelError::Rejected {
            channel: "email",
            reason: format!("relay returned {}: {}", status, body.trim()),
        })
    }
}
