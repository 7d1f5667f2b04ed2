//! Channel payload rendering.
//!
//! Every interpolated value is operator- or requester-entered text, so it is
//! encoded for the destination: email bodies go through the HTML-escaping
//! handlebars renderer, chat values are mrkdwn-escaped before substitution.
//! Subjects and broadcast text are plain.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use handlebars::RenderError;
use serde::Serialize;
use serde_json::json;

use crate::request::AccessRequestEvent;
use crate::template::{escape_html, escape_mrkdwn, render_html, substitute, TemplateVars};

use super::{Audience, NotificationCase, RecipientIdentity};

pub const CHAT_FALLBACK_TEXT: &str = "AWS Access Request Notification";
pub const CHAT_BUTTON_TEXT: &str = "Open TEAM";
pub const LOGIN_LINK_TEXT: &str = "TEAM";

/// Long, locale-agnostic start time, e.g. `January 01, 2024 at 12:00 AM UTC`
pub const START_TIME_FORMAT: &str = "%B %d, %Y at %I:%M %p %Z";

const DEFAULT_APPROVER: &str = "an approver";
const DEFAULT_ERROR_DETAIL: &str = "No error details provided";

const EMAIL_LAYOUT: &str = concat!(
    "<html><body><p>{{{intro}}}</p>",
    "{{#if error_detail}}<p><b>Error Details:</b> {{error_detail}}<br /></p>{{/if}}",
    "<p><b>Account:</b> {{account}}<br />",
    "<b>Role:</b> {{role}}<br />",
    "<b>Start Time:</b> {{start_time}}<br />",
    "<b>Duration:</b> {{duration}}<br />",
    "<b>Justification:</b> {{justification}}<br />",
    "<b>Ticket Number:</b> {{ticket}}<br /></p>",
    "</body></html>",
);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailPayload {
    pub subject: String,
    pub html_body: String,
    pub to_addresses: Vec<String>,
    pub cc_addresses: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BroadcastPayload {
    pub subject: String,
    /// The complete event record as JSON
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatPayload {
    pub recipient_user_id: String,
    pub blocks: serde_json::Value,
    pub fallback_text: String,
}

/// Format `start` in the given IANA timezone.
///
/// Returns `None` when no timezone is known or the name does not parse.
pub fn localize_start_time(start: DateTime<Utc>, timezone: Option<&str>) -> Option<String> {
    let tz: Tz = timezone?.trim().parse().ok()?;
    Some(start.with_timezone(&tz).format(START_TIME_FORMAT).to_string())
}

/// Renders one case for one event into channel payloads
pub struct MessageRenderer<'a> {
    case: &'a NotificationCase,
    event: &'a AccessRequestEvent,
}

impl<'a> MessageRenderer<'a> {
    pub fn new(case: &'a NotificationCase, event: &'a AccessRequestEvent) -> Self {
        Self { case, event }
    }

    fn vars(&self) -> TemplateVars {
        TemplateVars::new()
            .with("requester", self.event.requester_email.as_str())
            .with("account", self.event.account_display())
            .with("approver", self.approver())
            .with("error", self.error_detail())
    }

    fn approver(&self) -> &str {
        self.event
            .approver_who_acted
            .as_deref()
            .filter(|a| !a.trim().is_empty())
            .unwrap_or(DEFAULT_APPROVER)
    }

    fn error_detail(&self) -> &str {
        self.event
            .error_detail
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .unwrap_or(DEFAULT_ERROR_DETAIL)
    }

    /// Plain-text subject shared by email and broadcast
    pub fn subject(&self) -> String {
        substitute(self.case.subject_template, &self.vars())
    }

    /// Plain-text summary sentence
    pub fn summary(&self) -> String {
        substitute(self.case.summary_template, &self.vars())
    }

    pub fn email(&self, audience: &Audience) -> Result<EmailPayload, RenderError> {
        let event = self.event;
        let mut data = json!({
            "requester": event.requester_email,
            "account": event.account_display(),
            "approver": self.approver(),
            "login_link": format!(
                "<a href=\"{}\">{}</a>",
                escape_html(&event.login_url),
                LOGIN_LINK_TEXT
            ),
            "error_detail": self.case.includes_error_detail.then(|| self.error_detail()),
            "role": event.role,
            "start_time": event.start_time_display(),
            "duration": event.duration_display(),
            "justification": event.justification(),
            "ticket": event.ticket_number(),
        });
        data["intro"] = json!(render_html(self.case.body_template, &data)?);

        Ok(EmailPayload {
            subject: self.subject(),
            html_body: render_html(EMAIL_LAYOUT, &data)?,
            to_addresses: audience.email_to.clone(),
            cc_addresses: audience.email_cc.clone(),
        })
    }

    /// Subject plus the full classified record
    pub fn broadcast(&self) -> Result<BroadcastPayload, serde_json::Error> {
        let record = self.event.broadcast_record(self.case.status)?;
        Ok(BroadcastPayload {
            subject: self.subject(),
            body: serde_json::to_string(&record)?,
        })
    }

    /// Direct message for one recipient; `None` without a chat user id
    pub fn chat(&self, recipient: &RecipientIdentity) -> Option<ChatPayload> {
        let user_id = recipient.chat_user_id.as_deref()?;
        let event = self.event;

        let requester = escape_mrkdwn(&event.requester_email);
        let vars = self
            .vars()
            .encoded(escape_mrkdwn)
            .with("requester", format!("<mailto:{}|{}>", requester, requester));
        let summary = substitute(self.case.summary_template, &vars);

        let start_time = localize_start_time(event.start_time, recipient.timezone.as_deref())
            .unwrap_or_else(|| event.start_time_display());

        let field = |label: &str, value: &str| {
            json!({
                "type": "mrkdwn",
                "text": format!("*{}:*\n{}", label, escape_mrkdwn(value)),
            })
        };

        let blocks = json!([
            {
                "type": "section",
                "text": {
                    "type": "mrkdwn",
                    "text": format!("*{}*", summary),
                },
                "accessory": {
                    "type": "button",
                    "text": {
                        "type": "plain_text",
                        "text": CHAT_BUTTON_TEXT,
                    },
                    "url": event.login_url,
                    "action_id": "button-action",
                },
            },
            {
                "type": "section",
                "fields": [
                    field("Account", &event.account_display()),
                    field("Start time", &start_time),
                    field("Role", &event.role),
                    field("Duration", &event.duration_display()),
                    field("Justification", event.justification()),
                    field("Ticket Number", event.ticket_number()),
                ],
            },
        ]);

        Some(ChatPayload {
            recipient_user_id: user_id.to_string(),
            blocks,
            fallback_text: CHAT_FALLBACK_TEXT.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::resolve_case;
    use crate::request::{CanonicalStatus, DEFAULT_JUSTIFICATION, DEFAULT_TICKET};
    use chrono::TimeZone;

    fn event(status: &str) -> AccessRequestEvent {
        AccessRequestEvent::from_value(json!({
            "email": "alice@x.com",
            "approvers": ["bob@x.com"],
            "accountName": "Testing",
            "accountId": "123456789012",
            "role": "Admin",
            "startTime": "2024-01-01T00:00:00Z",
            "time": 2,
            "sso_login_url": "https://team.example",
            "status": status,
            "approver": "bob@x.com",
            "statusError": "AccessDenied"
        }))
        .unwrap()
    }

    fn recipient(tz: Option<&str>) -> RecipientIdentity {
        RecipientIdentity {
            email_address: "bob@x.com".to_string(),
            chat_user_id: Some("U123".to_string()),
            timezone: tz.map(str::to_string),
        }
    }

    fn chat_text(payload: &ChatPayload) -> String {
        serde_json::to_string(&payload.blocks).unwrap()
    }

    #[test]
    fn test_localize_start_time() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(
            localize_start_time(start, Some("UTC")).as_deref(),
            Some("January 01, 2024 at 12:00 AM UTC")
        );
        assert_eq!(
            localize_start_time(start, Some("America/New_York")).as_deref(),
            Some("December 31, 2023 at 07:00 PM EST")
        );
        assert_eq!(localize_start_time(start, Some("Mars/Olympus")), None);
        assert_eq!(localize_start_time(start, None), None);
    }

    #[test]
    fn test_pending_email() {
        let event = event("pending");
        let case = resolve_case(CanonicalStatus::Pending).unwrap();
        let audience = Audience::resolve(case.audience, &event, "team@x.com");
        let email = MessageRenderer::new(case, &event).email(&audience).unwrap();

        assert_eq!(
            email.subject,
            "alice@x.com requests access to AWS account Testing (123456789012) - TEAM"
        );
        assert_eq!(email.to_addresses, vec!["bob@x.com"]);
        assert_eq!(email.cc_addresses, vec!["alice@x.com"]);
        assert!(email.html_body.starts_with("<html><body><p><b>alice@x.com</b> requests access"));
        assert!(email.html_body.contains("<a href=\"https://team.example\">TEAM</a>"));
        assert!(email.html_body.contains("<b>Start Time:</b> 2024-01-01T00:00:00Z"));
        assert!(email.html_body.contains("<b>Duration:</b> 2 hours"));
        assert!(email.html_body.contains(DEFAULT_JUSTIFICATION));
        assert!(email.html_body.contains(DEFAULT_TICKET));
        assert!(!email.html_body.contains("Error Details"));
    }

    #[test]
    fn test_email_escapes_untrusted_fields() {
        let mut event = event("rejected");
        event.justification = Some("<img src=x onerror=alert(1)>".to_string());
        let case = resolve_case(CanonicalStatus::Rejected).unwrap();
        let audience = Audience::resolve(case.audience, &event, "team@x.com");
        let email = MessageRenderer::new(case, &event).email(&audience).unwrap();

        assert!(!email.html_body.contains("<img"));
        assert!(email
            .html_body
            .contains("<b>Justification:</b> &lt;img src&#x3D;x onerror&#x3D;alert(1)&gt;"));
    }

    #[test]
    fn test_email_intro_escapes_requester() {
        let mut event = event("cancelled");
        event.requester_email = "<alice@x.com>".to_string();
        let case = resolve_case(CanonicalStatus::Cancelled).unwrap();
        let audience = Audience::resolve(case.audience, &event, "team@x.com");
        let email = MessageRenderer::new(case, &event).email(&audience).unwrap();

        assert!(email
            .html_body
            .starts_with("<html><body><p>&lt;alice@x.com&gt; cancelled an AWS access request."));
        assert!(email.html_body.contains("<a href=\"https://team.example\">TEAM</a>"));
    }

    #[test]
    fn test_error_email_has_details() {
        let event = event("error");
        let case = resolve_case(CanonicalStatus::Error).unwrap();
        let audience = Audience::resolve(case.audience, &event, "team@x.com");
        let renderer = MessageRenderer::new(case, &event);
        let email = renderer.email(&audience).unwrap();

        assert_eq!(email.to_addresses, vec!["team@x.com"]);
        assert_eq!(email.cc_addresses, vec!["bob@x.com", "alice@x.com"]);
        assert!(email.html_body.contains("<b>Error Details:</b> AccessDenied<br />"));
        assert_eq!(
            renderer.summary(),
            "Error handling AWS access for alice@x.com. Error details: AccessDenied"
        );
    }

    #[test]
    fn test_approved_summary_names_approver() {
        let event = event("approved");
        let case = resolve_case(CanonicalStatus::Approved).unwrap();
        let renderer = MessageRenderer::new(case, &event);
        assert_eq!(
            renderer.summary(),
            "Your AWS access request was approved by bob@x.com."
        );

        let mut anonymous = event.clone();
        anonymous.approver_who_acted = None;
        let renderer = MessageRenderer::new(case, &anonymous);
        assert_eq!(
            renderer.summary(),
            "Your AWS access request was approved by an approver."
        );
    }

    #[test]
    fn test_broadcast_carries_record() {
        let event = event("approved").with_grant_in_progress();
        let case = resolve_case(event.canonical_status()).unwrap();
        let payload = MessageRenderer::new(case, &event).broadcast().unwrap();

        let body: serde_json::Value = serde_json::from_str(&payload.body).unwrap();
        assert_eq!(body["status"], "granted");
        assert_eq!(body["accountId"], "123456789012");
        assert_eq!(
            payload.subject,
            "AWS access session started for alice@x.com to AWS account Testing (123456789012) - TEAM"
        );
    }

    #[test]
    fn test_chat_payload_localized() {
        let event = event("pending");
        let case = resolve_case(CanonicalStatus::Pending).unwrap();
        let payload = MessageRenderer::new(case, &event)
            .chat(&recipient(Some("America/New_York")))
            .unwrap();

        assert_eq!(payload.recipient_user_id, "U123");
        assert_eq!(payload.fallback_text, CHAT_FALLBACK_TEXT);
        assert_eq!(
            payload.blocks[0]["text"]["text"],
            "*<mailto:alice@x.com|alice@x.com> requests access to AWS, please approve or reject this request in TEAM.*"
        );
        assert_eq!(payload.blocks[0]["accessory"]["url"], "https://team.example");
        assert_eq!(
            payload.blocks[1]["fields"][1]["text"],
            "*Start time:*\nDecember 31, 2023 at 07:00 PM EST"
        );
        assert!(chat_text(&payload).contains(DEFAULT_JUSTIFICATION));
    }

    #[test]
    fn test_chat_falls_back_to_record_time() {
        let event = event("granted");
        let case = resolve_case(CanonicalStatus::Granted).unwrap();
        let payload = MessageRenderer::new(case, &event)
            .chat(&recipient(Some("Not/AZone")))
            .unwrap();
        assert_eq!(
            payload.blocks[1]["fields"][1]["text"],
            "*Start time:*\n2024-01-01T00:00:00Z"
        );
    }

    #[test]
    fn test_chat_escapes_mrkdwn() {
        let mut event = event("granted");
        event.ticket_number = Some("<!channel>".to_string());
        let case = resolve_case(CanonicalStatus::Granted).unwrap();
        let payload = MessageRenderer::new(case, &event)
            .chat(&recipient(None))
            .unwrap();
        assert_eq!(
            payload.blocks[1]["fields"][5]["text"],
            "*Ticket Number:*\n&lt;!channel&gt;"
        );
    }

    #[test]
    fn test_chat_requires_user_id() {
        let event = event("granted");
        let case = resolve_case(CanonicalStatus::Granted).unwrap();
        let renderer = MessageRenderer::new(case, &event);
        assert!(renderer.chat(&RecipientIdentity::email_only("bob@x.com")).is_none());
    }
}
