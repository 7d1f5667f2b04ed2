use serde::Serialize;
use uuid::Uuid;

use crate::request::CanonicalStatus;

/// Outcome of one channel for one invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum ChannelOutcome {
    /// Channel switched off or not configured
    Disabled,
    /// Channel configured but had nothing to send
    Skipped(String),
    Sent,
    Failed(String),
}

impl ChannelOutcome {
    /// Metric label
    pub fn as_label(&self) -> &'static str {
        match self {
            ChannelOutcome::Disabled => "disabled",
            ChannelOutcome::Skipped(_) => "skipped",
            ChannelOutcome::Sent => "sent",
            ChannelOutcome::Failed(_) => "failed",
        }
    }

    pub fn is_sent(&self) -> bool {
        matches!(self, ChannelOutcome::Sent)
    }
}

/// Per-recipient chat result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum RecipientOutcome {
    Sent,
    LookupFailed(String),
    SendFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipientReport {
    pub email_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_user_id: Option<String>,
    #[serde(flatten)]
    pub outcome: RecipientOutcome,
}

/// Chat fan-out result: one entry per audience member
#[derive(Debug, Clone, Serialize)]
pub struct ChatReport {
    pub outcome: ChannelOutcome,
    pub recipients: Vec<RecipientReport>,
}

impl ChatReport {
    pub fn disabled() -> Self {
        Self {
            outcome: ChannelOutcome::Disabled,
            recipients: Vec::new(),
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            outcome: ChannelOutcome::Skipped(reason.into()),
            recipients: Vec::new(),
        }
    }

    /// Summarize per-recipient results into a channel outcome
    pub fn from_recipients(recipients: Vec<RecipientReport>) -> Self {
        let failed = recipients
            .iter()
            .filter(|r| r.outcome != RecipientOutcome::Sent)
            .count();

        let outcome = if recipients.is_empty() {
            ChannelOutcome::Skipped("no recipients".to_string())
        } else if failed == 0 {
            ChannelOutcome::Sent
        } else {
            ChannelOutcome::Failed(format!(
                "{} of {} recipients failed",
                failed,
                recipients.len()
            ))
        };

        Self {
            outcome,
            recipients,
        }
    }

    pub fn sent_count(&self) -> usize {
        self.recipients
            .iter()
            .filter(|r| r.outcome == RecipientOutcome::Sent)
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.recipients.len() - self.sent_count()
    }
}

/// Why a dispatch ended before any channel was attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortCircuit {
    NoChannelConfigured,
    UnknownStatus,
}

/// Everything that happened during one dispatch.
///
/// Returned instead of an error: delivery is best-effort and the report is
/// the only record of which channels and recipients were reached.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    pub dispatch_id: Uuid,
    pub status: CanonicalStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_circuit: Option<ShortCircuit>,
    pub email: ChannelOutcome,
    pub broadcast: ChannelOutcome,
    pub chat: ChatReport,
}

impl DispatchReport {
    pub(crate) fn short_circuited(
        dispatch_id: Uuid,
        status: CanonicalStatus,
        reason: ShortCircuit,
    ) -> Self {
        Self {
            dispatch_id,
            status,
            short_circuit: Some(reason),
            email: ChannelOutcome::Disabled,
            broadcast: ChannelOutcome::Disabled,
            chat: ChatReport::disabled(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipient(email: &str, outcome: RecipientOutcome) -> RecipientReport {
        RecipientReport {
            email_address: email.to_string(),
            chat_user_id: None,
            outcome,
        }
    }

    #[test]
    fn test_chat_report_all_sent() {
        let report = ChatReport::from_recipients(vec![
            recipient("a@x.com", RecipientOutcome::Sent),
            recipient("b@x.com", RecipientOutcome::Sent),
        ]);
        assert_eq!(report.outcome, ChannelOutcome::Sent);
        assert_eq!(report.sent_count(), 2);
        assert_eq!(report.failed_count(), 0);
    }

    #[test]
    fn test_chat_report_partial_failure() {
        let report = ChatReport::from_recipients(vec![
            recipient("a@x.com", RecipientOutcome::Sent),
            recipient("b@x.com", RecipientOutcome::LookupFailed("users_not_found".into())),
        ]);
        assert_eq!(
            report.outcome,
            ChannelOutcome::Failed("1 of 2 recipients failed".to_string())
        );
        assert_eq!(report.failed_count(), 1);
    }

    #[test]
    fn test_chat_report_empty() {
        let report = ChatReport::from_recipients(Vec::new());
        assert!(matches!(report.outcome, ChannelOutcome::Skipped(_)));
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_value(ChannelOutcome::Failed("boom".into())).unwrap();
        assert_eq!(json, serde_json::json!({"outcome": "failed", "detail": "boom"}));

        let json = serde_json::to_value(recipient("a@x.com", RecipientOutcome::Sent)).unwrap();
        assert_eq!(json, serde_json::json!({"email_address": "a@x.com", "outcome": "sent"}));
    }
}
