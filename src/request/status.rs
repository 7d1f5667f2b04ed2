use std::fmt;

use serde::{Deserialize, Serialize};

use super::AccessRequestEvent;

/// Normalized lifecycle state of an access request.
///
/// Derived from the raw status plus the grant/revoke sub-status signals
/// carried on the event; never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CanonicalStatus {
    Pending,
    Approved,
    Granted,
    Ended,
    Expired,
    Rejected,
    Cancelled,
    Error,
    Unknown,
}

impl CanonicalStatus {
    /// Every status that has a notification case.
    pub const DEFINED: [CanonicalStatus; 8] = [
        CanonicalStatus::Pending,
        CanonicalStatus::Approved,
        CanonicalStatus::Granted,
        CanonicalStatus::Ended,
        CanonicalStatus::Expired,
        CanonicalStatus::Rejected,
        CanonicalStatus::Cancelled,
        CanonicalStatus::Error,
    ];

    /// Map a raw status string onto the closed set, case-insensitively.
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => CanonicalStatus::Pending,
            "approved" => CanonicalStatus::Approved,
            "granted" => CanonicalStatus::Granted,
            "ended" => CanonicalStatus::Ended,
            "expired" => CanonicalStatus::Expired,
            "rejected" => CanonicalStatus::Rejected,
            "cancelled" => CanonicalStatus::Cancelled,
            "error" => CanonicalStatus::Error,
            _ => CanonicalStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalStatus::Pending => "pending",
            CanonicalStatus::Approved => "approved",
            CanonicalStatus::Granted => "granted",
            CanonicalStatus::Ended => "ended",
            CanonicalStatus::Expired => "expired",
            CanonicalStatus::Rejected => "rejected",
            CanonicalStatus::Cancelled => "cancelled",
            CanonicalStatus::Error => "error",
            CanonicalStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for CanonicalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolve the canonical status from the raw status and sub-status signals.
///
/// The upstream workflow publishes "approved" as a placeholder that the
/// grant and revoke sub-workflows refine later. A revoke in progress wins
/// over a grant in progress, so a session that is being torn down is
/// reported as ended rather than announced as started again.
pub fn classify(raw_status: &str, grant_in_progress: bool, revoke_in_progress: bool) -> CanonicalStatus {
    let status = CanonicalStatus::from_raw(raw_status);
    if status != CanonicalStatus::Approved {
        return status;
    }

    if revoke_in_progress {
        CanonicalStatus::Ended
    } else if grant_in_progress {
        CanonicalStatus::Granted
    } else {
        CanonicalStatus::Approved
    }
}

impl AccessRequestEvent {
    /// Classify this event snapshot.
    pub fn canonical_status(&self) -> CanonicalStatus {
        classify(
            &self.raw_status,
            self.grant_in_progress(),
            self.revoke_in_progress(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_statuses_pass_through() {
        for status in CanonicalStatus::DEFINED {
            assert_eq!(classify(status.as_str(), false, false), status);
        }
    }

    #[test]
    fn test_unrecognized_status_is_unknown() {
        assert_eq!(classify("archived", false, false), CanonicalStatus::Unknown);
        assert_eq!(classify("", true, true), CanonicalStatus::Unknown);
    }

    #[test]
    fn test_status_normalization() {
        assert_eq!(classify("  Pending ", false, false), CanonicalStatus::Pending);
        assert_eq!(classify("CANCELLED", false, false), CanonicalStatus::Cancelled);
    }

    #[test]
    fn test_grant_refines_approved() {
        assert_eq!(classify("approved", true, false), CanonicalStatus::Granted);
        assert_eq!(classify("approved", false, false), CanonicalStatus::Approved);
    }

    #[test]
    fn test_revoke_wins_over_grant() {
        assert_eq!(classify("approved", true, true), CanonicalStatus::Ended);
        assert_eq!(classify("approved", false, true), CanonicalStatus::Ended);
    }

    #[test]
    fn test_sub_status_ignored_outside_approved() {
        assert_eq!(classify("rejected", true, true), CanonicalStatus::Rejected);
        assert_eq!(classify("pending", true, false), CanonicalStatus::Pending);
    }

    #[test]
    fn test_classification_is_idempotent() {
        let first = classify("approved", true, false);
        let second = classify("approved", true, false);
        assert_eq!(first, second);
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&CanonicalStatus::Granted).unwrap();
        assert_eq!(json, "\"granted\"");
        assert_eq!(CanonicalStatus::Cancelled.to_string(), "cancelled");
    }
}
