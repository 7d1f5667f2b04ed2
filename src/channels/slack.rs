use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{ChannelError, ChannelResult, ChatCredential, ChatDirectory, ChatIdentity, ChatPoster};

const CHANNEL: &str = "chat";

/// Slack Web API response envelope
#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    user: Option<SlackUser>,
}

#[derive(Debug, Deserialize)]
struct SlackUser {
    id: String,
    #[serde(default)]
    tz: Option<String>,
}

#[derive(Debug, Serialize)]
struct PostMessage<'a> {
    channel: &'a str,
    blocks: &'a serde_json::Value,
    text: &'a str,
}

impl ApiResponse {
    fn into_result(self) -> ChannelResult<Self> {
        if self.ok {
            Ok(self)
        } else {
            Err(ChannelError::Rejected {
                channel: CHANNEL,
                reason: self.error.unwrap_or_else(|| "unknown_error".to_string()),
            })
        }
    }

    fn into_identity(self) -> ChannelResult<ChatIdentity> {
        let user = self.into_result()?.user.ok_or_else(|| ChannelError::Rejected {
            channel: CHANNEL,
            reason: "response missing user".to_string(),
        })?;

        Ok(ChatIdentity {
            user_id: user.id,
            timezone: user.tz.filter(|tz| !tz.is_empty()),
        })
    }
}

/// Slack Web API client for identity lookup and direct messages.
///
/// The bot token is supplied per call, so one client serves every
/// configuration.
#[derive(Debug, Clone)]
pub struct SlackClient {
    client: Client,
    api_base_url: String,
}

impl SlackClient {
    pub fn new(api_base_url: impl Into<String>, timeout: Duration) -> ChannelResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/{}", self.api_base_url, method)
    }
}

#[async_trait]
impl ChatDirectory for SlackClient {
    async fn resolve_chat_identity(
        &self,
        credential: &ChatCredential,
        email: &str,
    ) -> ChannelResult<ChatIdentity> {
        let response: ApiResponse = self
            .client
            .get(self.endpoint("users.lookupByEmail"))
            .bearer_auth(credential.expose())
            .query(&[("email", email)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        response.into_identity()
    }
}

#[async_trait]
impl ChatPoster for SlackClient {
    async fn post_chat_message(
        &self,
        credential: &ChatCredential,
        user_id: &str,
        blocks: &serde_json::Value,
        fallback_text: &str,
    ) -> ChannelResult<()> {
        let body = PostMessage {
            channel: user_id,
            blocks,
            text: fallback_text,
        };

        let response: ApiResponse = self
            .client
            .post(self.endpoint("chat.postMessage"))
            .bearer_auth(credential.expose())
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        response.into_result().map(|_| ())
    }
}
