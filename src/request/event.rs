use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use super::CanonicalStatus;

pub const DEFAULT_JUSTIFICATION: &str = "No justification provided";
pub const DEFAULT_TICKET: &str = "No ticket provided";

/// Sub-workflow status value that marks a grant or revoke as running.
pub const IN_PROGRESS: &str = "IN_PROGRESS";

/// Errors raised when an inbound record cannot be turned into an event
#[derive(Debug, Error)]
pub enum EventError {
    #[error("Malformed access request event: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Duration must be a positive number of hours, got {0}")]
    InvalidDuration(f64),

    #[error("Access request event is missing the requester email")]
    MissingRequester,

    #[error("Access request event has a blank '{0}'")]
    BlankField(&'static str),
}

/// Status of one account-assignment operation reported by the grant or
/// revoke sub-workflow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationStatus {
    #[serde(rename = "Status", default)]
    pub status: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl OperationStatus {
    pub fn in_progress() -> Self {
        Self {
            status: IN_PROGRESS.to_string(),
            extra: serde_json::Map::new(),
        }
    }

    pub fn is_in_progress(&self) -> bool {
        self.status == IN_PROGRESS
    }
}

/// Grant sub-workflow snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GrantOperation {
    #[serde(
        rename = "AccountAssignmentCreationStatus",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub creation: Option<OperationStatus>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Revoke sub-workflow snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RevokeOperation {
    #[serde(
        rename = "AccountAssignmentDeletionStatus",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub deletion: Option<OperationStatus>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// An access-request lifecycle event as published by the approval workflow.
///
/// Field names on the wire follow the workflow's record. Keys the engine
/// does not use are kept in `extra`, and the record as received is kept
/// alongside so the broadcast channel forwards it unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessRequestEvent {
    #[serde(rename = "email")]
    pub requester_email: String,

    #[serde(rename = "approvers", default, deserialize_with = "approver_list")]
    pub approver_emails: Vec<String>,

    #[serde(rename = "accountName")]
    pub account_name: String,

    #[serde(rename = "accountId")]
    pub account_id: String,

    pub role: String,

    #[serde(rename = "startTime")]
    pub start_time: DateTime<Utc>,

    #[serde(rename = "time", deserialize_with = "duration_hours")]
    pub duration_hours: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,

    #[serde(rename = "ticketNo", default, skip_serializing_if = "Option::is_none")]
    pub ticket_number: Option<String>,

    #[serde(rename = "sso_login_url")]
    pub login_url: String,

    #[serde(rename = "status")]
    pub raw_status: String,

    #[serde(rename = "approver", default, skip_serializing_if = "Option::is_none")]
    pub approver_who_acted: Option<String>,

    #[serde(rename = "statusError", default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant: Option<GrantOperation>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoke: Option<RevokeOperation>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,

    #[serde(skip)]
    record: Option<Value>,
}

impl AccessRequestEvent {
    /// Parse and validate an inbound JSON record
    pub fn from_value(value: Value) -> Result<Self, EventError> {
        let mut event: AccessRequestEvent = serde_json::from_value(value.clone())?;
        event.validate()?;
        event.record = Some(value);
        Ok(event)
    }

    /// Parse and validate an inbound JSON string
    pub fn from_json(payload: &str) -> Result<Self, EventError> {
        Self::from_value(serde_json::from_str(payload)?)
    }

    pub fn validate(&self) -> Result<(), EventError> {
        if self.requester_email.trim().is_empty() {
            return Err(EventError::MissingRequester);
        }
        for (field, value) in [
            ("accountName", &self.account_name),
            ("accountId", &self.account_id),
            ("role", &self.role),
        ] {
            if value.trim().is_empty() {
                return Err(EventError::BlankField(field));
            }
        }
        if !self.duration_hours.is_finite() || self.duration_hours <= 0.0 {
            return Err(EventError::InvalidDuration(self.duration_hours));
        }
        Ok(())
    }

    pub fn grant_in_progress(&self) -> bool {
        self.grant
            .as_ref()
            .and_then(|grant| grant.creation.as_ref())
            .is_some_and(OperationStatus::is_in_progress)
    }

    pub fn revoke_in_progress(&self) -> bool {
        self.revoke
            .as_ref()
            .and_then(|revoke| revoke.deletion.as_ref())
            .is_some_and(OperationStatus::is_in_progress)
    }

    /// Mark the grant sub-workflow as running
    pub fn with_grant_in_progress(mut self) -> Self {
        self.grant = Some(GrantOperation {
            creation: Some(OperationStatus::in_progress()),
            extra: serde_json::Map::new(),
        });
        self.mark_in_progress("grant", "AccountAssignmentCreationStatus");
        self
    }

    /// Mark the revoke sub-workflow as running
    pub fn with_revoke_in_progress(mut self) -> Self {
        self.revoke = Some(RevokeOperation {
            deletion: Some(OperationStatus::in_progress()),
            extra: serde_json::Map::new(),
        });
        self.mark_in_progress("revoke", "AccountAssignmentDeletionStatus");
        self
    }

    fn mark_in_progress(&mut self, operation: &str, status_key: &str) {
        let Some(fields) = self.record.as_mut().and_then(Value::as_object_mut) else {
            return;
        };
        let entry = fields.entry(operation).or_insert_with(|| json!({}));
        if !entry.is_object() {
            *entry = json!({});
        }
        if let Some(snapshot) = entry.as_object_mut() {
            snapshot.insert(status_key.to_string(), json!({ "Status": IN_PROGRESS }));
        }
    }

    /// Justification text, defaulted when missing or blank
    pub fn justification(&self) -> &str {
        non_blank(self.justification.as_deref()).unwrap_or(DEFAULT_JUSTIFICATION)
    }

    /// Ticket number, defaulted when missing or blank
    pub fn ticket_number(&self) -> &str {
        non_blank(self.ticket_number.as_deref()).unwrap_or(DEFAULT_TICKET)
    }

    /// "Name (id)" form used in every message
    pub fn account_display(&self) -> String {
        format!("{} ({})", self.account_name, self.account_id)
    }

    pub fn duration_display(&self) -> String {
        format!("{} hours", self.duration_hours)
    }

    /// Start time as it appears in the workflow record (RFC 3339, UTC)
    pub fn start_time_display(&self) -> String {
        self.start_time.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }

    /// The record as received with only `status` replaced by the
    /// classified status. Events built without a source record are
    /// serialized instead.
    pub fn broadcast_record(&self, status: CanonicalStatus) -> Result<Value, serde_json::Error> {
        let mut record = match &self.record {
            Some(record) => record.clone(),
            None => serde_json::to_value(self)?,
        };
        if let Some(fields) = record.as_object_mut() {
            fields.insert(
                "status".to_string(),
                Value::String(status.as_str().to_string()),
            );
        }
        Ok(record)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Approvers arrive as a list, but older records carry a bare string
/// (empty when nobody is assigned).
fn approver_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Approvers {
        List(Vec<String>),
        Single(String),
    }

    Ok(match Option::<Approvers>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(Approvers::List(list)) => list,
        Some(Approvers::Single(single)) if single.trim().is_empty() => Vec::new(),
        Some(Approvers::Single(single)) => vec![single],
    })
}

fn duration_hours<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Hours {
        Number(f64),
        Text(String),
    }

    match Hours::deserialize(deserializer)? {
        Hours::Number(hours) => Ok(hours),
        Hours::Text(text) => text
            .trim()
            .parse::<f64>()
            .map_err(|_| serde::de::Error::custom(format!("invalid duration: {}", text))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> Value {
        json!({
            "id": "req-1",
            "email": "alice@x.com",
            "approvers": ["bob@x.com", "carol@x.com"],
            "accountName": "Testing",
            "accountId": "123456789012",
            "role": "Admin",
            "startTime": "2023-04-21T12:43:39.879Z",
            "time": "2",
            "sso_login_url": "https://team.example",
            "status": "pending"
        })
    }

    #[test]
    fn test_parse_workflow_record() {
        let event = AccessRequestEvent::from_value(record()).unwrap();
        assert_eq!(event.requester_email, "alice@x.com");
        assert_eq!(event.approver_emails, vec!["bob@x.com", "carol@x.com"]);
        assert_eq!(event.duration_hours, 2.0);
        assert_eq!(event.account_display(), "Testing (123456789012)");
        assert_eq!(event.duration_display(), "2 hours");
        assert_eq!(event.start_time_display(), "2023-04-21T12:43:39.879Z");
        assert_eq!(event.extra.get("id"), Some(&json!("req-1")));
    }

    #[test]
    fn test_defaults_substituted() {
        let mut value = record();
        value["ticketNo"] = json!("   ");
        let event = AccessRequestEvent::from_value(value).unwrap();
        assert_eq!(event.justification(), DEFAULT_JUSTIFICATION);
        assert_eq!(event.ticket_number(), DEFAULT_TICKET);
    }

    #[test]
    fn test_bare_string_approvers() {
        let mut value = record();
        value["approvers"] = json!("");
        let event = AccessRequestEvent::from_value(value).unwrap();
        assert!(event.approver_emails.is_empty());

        let mut value = record();
        value["approvers"] = json!("bob@x.com");
        let event = AccessRequestEvent::from_value(value).unwrap();
        assert_eq!(event.approver_emails, vec!["bob@x.com"]);

        let mut value = record();
        value.as_object_mut().unwrap().remove("approvers");
        let event = AccessRequestEvent::from_value(value).unwrap();
        assert!(event.approver_emails.is_empty());
    }

    #[test]
    fn test_rejects_non_positive_duration() {
        let mut value = record();
        value["time"] = json!(0);
        assert!(matches!(
            AccessRequestEvent::from_value(value),
            Err(EventError::InvalidDuration(_))
        ));

        let mut value = record();
        value["time"] = json!("soon");
        assert!(matches!(
            AccessRequestEvent::from_value(value),
            Err(EventError::Malformed(_))
        ));
    }

    #[test]
    fn test_rejects_missing_requester() {
        let mut value = record();
        value["email"] = json!("");
        assert!(matches!(
            AccessRequestEvent::from_value(value),
            Err(EventError::MissingRequester)
        ));
    }

    #[test]
    fn test_sub_status_signals() {
        let mut value = record();
        value["status"] = json!("approved");
        value["grant"] = json!({"AccountAssignmentCreationStatus": {"Status": "IN_PROGRESS", "RequestId": "r-1"}});
        value["revoke"] = json!({"AccountAssignmentDeletionStatus": {"Status": "SUCCEEDED"}});
        let event = AccessRequestEvent::from_value(value).unwrap();
        assert!(event.grant_in_progress());
        assert!(!event.revoke_in_progress());
        assert_eq!(event.canonical_status(), CanonicalStatus::Granted);

        let event = event.with_revoke_in_progress();
        assert_eq!(event.canonical_status(), CanonicalStatus::Ended);
    }

    #[test]
    fn test_broadcast_record_keeps_unknown_fields() {
        let mut value = record();
        value["status"] = json!("approved");
        let event = AccessRequestEvent::from_value(value)
            .unwrap()
            .with_grant_in_progress();

        let broadcast = event.broadcast_record(event.canonical_status()).unwrap();
        assert_eq!(broadcast["status"], "granted");
        assert_eq!(broadcast["id"], "req-1");
        assert_eq!(broadcast["email"], "alice@x.com");
        assert_eq!(
            broadcast["grant"]["AccountAssignmentCreationStatus"]["Status"],
            IN_PROGRESS
        );
    }

    #[test]
    fn test_rejects_blank_account_and_role() {
        for field in ["accountName", "accountId", "role"] {
            let mut value = record();
            value[field] = json!("  ");
            match AccessRequestEvent::from_value(value) {
                Err(EventError::BlankField(name)) => assert_eq!(name, field),
                other => panic!("expected blank {} to be rejected, got {:?}", field, other),
            }
        }
    }

    #[test]
    fn test_broadcast_record_forwards_fields_verbatim() {
        let mut value = record();
        value["time"] = json!("2");
        value["approvers"] = json!("");
        value["startTime"] = json!("2024-01-01T02:00:00+02:00");
        let event = AccessRequestEvent::from_value(value).unwrap();
        assert_eq!(event.start_time_display(), "2024-01-01T00:00:00Z");

        let broadcast = event.broadcast_record(event.canonical_status()).unwrap();
        assert_eq!(broadcast["time"], json!("2"));
        assert_eq!(broadcast["approvers"], json!(""));
        assert_eq!(broadcast["startTime"], json!("2024-01-01T02:00:00+02:00"));
        assert_eq!(broadcast["status"], "pending");
    }

    #[test]
    fn test_from_json_keeps_source_record() {
        let payload = r#"{"email":"alice@x.com","accountName":"Testing","accountId":"123456789012","role":"Admin","startTime":"2024-01-01T00:00:00Z","time":1.5,"sso_login_url":"https://team.example","status":"expired","requestedBy":{"name":"Alice"}}"#;
        let event = AccessRequestEvent::from_json(payload).unwrap();
        let broadcast = event.broadcast_record(event.canonical_status()).unwrap();
        assert_eq!(broadcast["requestedBy"]["name"], "Alice");
        assert_eq!(broadcast["time"], json!(1.5));
        assert!(broadcast.get("approvers").is_none());
    }
}
