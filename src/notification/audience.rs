use std::collections::HashSet;

use crate::request::AccessRequestEvent;

use super::AudienceRule;

/// Concrete addresses for one notification
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Audience {
    /// People who get a direct chat message
    pub chat_recipients: Vec<String>,
    pub email_to: Vec<String>,
    /// Never repeats an address already in `email_to`
    pub email_cc: Vec<String>,
}

impl Audience {
    /// Expand an audience rule against an event.
    ///
    /// `error_source` is the operator's sending address, which is the
    /// primary recipient of error notifications.
    pub fn resolve(rule: AudienceRule, event: &AccessRequestEvent, error_source: &str) -> Self {
        let requester = || vec![event.requester_email.clone()];
        let approvers = || event.approver_emails.clone();

        let (chat, to, cc) = match rule {
            AudienceRule::ApproversOnly => (approvers(), approvers(), Vec::new()),
            AudienceRule::RequesterOnly => (requester(), requester(), Vec::new()),
            AudienceRule::ApproversPlusRequesterCc => (approvers(), approvers(), requester()),
            AudienceRule::RequesterPlusApproversCc => (requester(), requester(), approvers()),
            AudienceRule::AllParties => {
                let everyone: Vec<String> = approvers().into_iter().chain(requester()).collect();
                (everyone.clone(), vec![error_source.to_string()], everyone)
            }
        };

        let email_to = dedupe(to);
        let email_cc = dedupe(cc)
            .into_iter()
            .filter(|address| !contains_address(&email_to, address))
            .collect();

        Self {
            chat_recipients: dedupe(chat),
            email_to,
            email_cc,
        }
    }
}

/// Drop blanks and case-insensitive duplicates, keeping first-seen order
pub fn dedupe(addresses: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    addresses
        .into_iter()
        .map(|address| address.trim().to_string())
        .filter(|address| !address.is_empty())
        .filter(|address| seen.insert(address.to_ascii_lowercase()))
        .collect()
}

fn contains_address(list: &[String], address: &str) -> bool {
    list.iter().any(|a| a.eq_ignore_ascii_case(address))
}
