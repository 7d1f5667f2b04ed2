//! Notification cases: one entry per canonical status.

use serde::Serialize;

use crate::request::CanonicalStatus;

/// Who receives a notification, and in which email slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AudienceRule {
    /// To=approvers
    ApproversOnly,
    /// To=[requester]
    RequesterOnly,
    /// To=approvers, Cc=[requester]; chat goes to approvers
    ApproversPlusRequesterCc,
    /// To=[requester], Cc=approvers; chat goes to the requester
    RequesterPlusApproversCc,
    /// To=[error source], Cc=approvers+[requester]; chat goes to everyone
    AllParties,
}

impl AudienceRule {
    /// Whether the primary recipients are the approvers
    pub fn requires_approvers(&self) -> bool {
        matches!(
            self,
            AudienceRule::ApproversOnly | AudienceRule::ApproversPlusRequesterCc
        )
    }
}

/// Audience and message templates bound to one status.
///
/// Templates use `{{requester}}`, `{{account}}`, `{{approver}}` and
/// `{{error}}`. The email intro is rendered as escaped HTML and inserts the
/// prebuilt link with `{{{login_link}}}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationCase {
    pub status: CanonicalStatus,
    pub audience: AudienceRule,
    /// Plain sentence used for chat
    pub summary_template: &'static str,
    /// Plain-text email subject, also used as the broadcast subject
    pub subject_template: &'static str,
    /// HTML intro paragraph of the email body, in handlebars syntax
    pub body_template: &'static str,
    /// Whether the email body carries an error-details paragraph
    pub includes_error_detail: bool,
}

const CASES: [NotificationCase; 8] = [
    NotificationCase {
        status: CanonicalStatus::Pending,
        audience: AudienceRule::ApproversPlusRequesterCc,
        summary_template: "{{requester}} requests access to AWS, please approve or reject this request in TEAM.",
        subject_template: "{{requester}} requests access to AWS account {{account}} - TEAM",
        body_template: "<b>{{requester}}</b> requests access to AWS, please <b>approve or reject this request</b> in {{{login_link}}}.",
        includes_error_detail: false,
    },
    NotificationCase {
        status: CanonicalStatus::Expired,
        audience: AudienceRule::RequesterPlusApproversCc,
        summary_template: "Your AWS access request has expired.",
        subject_template: "Expired access request for {{requester}} to AWS account {{account}} - TEAM",
        body_template: "Your AWS access request has expired, please open {{{login_link}}} to submit a new request.",
        includes_error_detail: false,
    },
    NotificationCase {
        status: CanonicalStatus::Ended,
        audience: AudienceRule::RequesterPlusApproversCc,
        summary_template: "Your AWS access session has ended.",
        subject_template: "AWS access session ended for {{requester}} to AWS account {{account}} - TEAM",
        body_template: "Your AWS access session has ended, please open {{{login_link}}} to view session activity logs.",
        includes_error_detail: false,
    },
    NotificationCase {
        status: CanonicalStatus::Granted,
        audience: AudienceRule::RequesterPlusApproversCc,
        summary_template: "Your AWS access session has started.",
        subject_template: "AWS access session started for {{requester}} to AWS account {{account}} - TEAM",
        body_template: "Your AWS access session has started. Open {{{login_link}}} to manage AWS access requests.",
        includes_error_detail: false,
    },
    NotificationCase {
        status: CanonicalStatus::Approved,
        audience: AudienceRule::RequesterPlusApproversCc,
        summary_template: "Your AWS access request was approved by {{approver}}.",
        subject_template: "AWS access request approved for {{requester}} to AWS account {{account}} - TEAM",
        body_template: "Your AWS access request has been approved by {{approver}}. You will receive a notification when the session has started. Open {{{login_link}}} to manage AWS access requests.",
        includes_error_detail: false,
    },
    NotificationCase {
        status: CanonicalStatus::Rejected,
        audience: AudienceRule::RequesterPlusApproversCc,
        summary_template: "Your AWS access request was rejected.",
        subject_template: "AWS access request rejected for {{requester}} to AWS account {{account}} - TEAM",
        body_template: "Your AWS access request has been rejected. Open {{{login_link}}} to manage AWS access requests.",
        includes_error_detail: false,
    },
    NotificationCase {
        status: CanonicalStatus::Cancelled,
        audience: AudienceRule::ApproversPlusRequesterCc,
        summary_template: "{{requester}} cancelled this AWS access request.",
        subject_template: "AWS access request cancelled for {{requester}} to AWS account {{account}} - TEAM",
        body_template: "{{requester}} cancelled an AWS access request. Open {{{login_link}}} to manage AWS access requests.",
        includes_error_detail: false,
    },
    NotificationCase {
        status: CanonicalStatus::Error,
        audience: AudienceRule::AllParties,
        summary_template: "Error handling AWS access for {{requester}}. Error details: {{error}}",
        subject_template: "Error handling AWS access for {{requester}} to AWS account {{account}} - TEAM",
        body_template: "TEAM encountered an error handling AWS access for {{requester}}. Please review the Step Function logs to troubleshoot the error and ensure access is properly granted or revoked. Open {{{login_link}}} to view additional details.",
        includes_error_detail: true,
    },
];

/// Look up the case for a status; `Unknown` has none
pub fn resolve_case(status: CanonicalStatus) -> Option<&'static NotificationCase> {
    CASES.iter().find(|case| case.status == status)
}
