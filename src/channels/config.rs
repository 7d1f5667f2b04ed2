use std::fmt;

/// Bot token for the chat platform. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ChatCredential(String);

impl ChatCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for ChatCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ChatCredential(***)")
    }
}

/// Operator channel settings, resolved before an invocation and read-only during it
#[derive(Debug, Clone, Default)]
pub struct ChannelConfig {
    pub email_enabled: bool,
    pub email_source_address: String,
    pub email_source_arn: Option<String>,
    pub broadcast_enabled: bool,
    pub broadcast_topic: String,
    pub chat_enabled: bool,
    pub chat_credential: Option<ChatCredential>,
}

impl ChannelConfig {
    pub fn email_configured(&self) -> bool {
        self.email_enabled && !self.email_source_address.trim().is_empty()
    }

    pub fn broadcast_configured(&self) -> bool {
        self.broadcast_enabled && !self.broadcast_topic.trim().is_empty()
    }

    pub fn chat_configured(&self) -> bool {
        self.chat_enabled
            && self
                .chat_credential
                .as_ref()
                .is_some_and(|credential| !credential.is_empty())
    }

    /// Whether at least one channel can be attempted
    pub fn any_configured(&self) -> bool {
        self.email_configured() || self.broadcast_configured() || self.chat_configured()
    }

    /// Source ARN, ignoring an empty string
    pub fn email_source_arn(&self) -> Option<&str> {
        self.email_source_arn
            .as_deref()
            .filter(|arn| !arn.trim().is_empty())
    }
}
