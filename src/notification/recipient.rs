use std::sync::Arc;

use futures::stream::{self, StreamExt};

use crate::channels::{ChatCredential, ChatDirectory};
use crate::metrics::DispatchMetrics;

/// Per-recipient presentation details
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientIdentity {
    pub email_address: String,
    pub chat_user_id: Option<String>,
    /// IANA timezone name used to localize timestamps
    pub timezone: Option<String>,
}

impl RecipientIdentity {
    /// Identity known only by email, with nothing resolved
    pub fn email_only(email_address: impl Into<String>) -> Self {
        Self {
            email_address: email_address.into(),
            chat_user_id: None,
            timezone: None,
        }
    }
}

/// A recipient whose chat identity could not be resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientFailure {
    pub email_address: String,
    pub reason: String,
}

pub type RecipientLookup = Result<RecipientIdentity, RecipientFailure>;

/// Resolves chat identities for an audience.
///
/// Lookups run concurrently up to `max_concurrent_lookups`; results come
/// back in audience order, one per address. A failed lookup only removes
/// that person from the chat fan-out.
pub struct RecipientResolver {
    directory: Arc<dyn ChatDirectory>,
    max_concurrent_lookups: usize,
}

impl RecipientResolver {
    pub fn new(directory: Arc<dyn ChatDirectory>, max_concurrent_lookups: usize) -> Self {
        Self {
            directory,
            max_concurrent_lookups: max_concurrent_lookups.max(1),
        }
    }

    pub async fn resolve(
        &self,
        credential: &ChatCredential,
        emails: &[String],
    ) -> Vec<RecipientLookup> {
        stream::iter(emails.iter().cloned())
            .map(|email| async move { self.lookup(credential, &email).await })
            .buffered(self.max_concurrent_lookups)
            .collect()
            .await
    }

    async fn lookup(&self, credential: &ChatCredential, email: &str) -> RecipientLookup {
        match self.directory.resolve_chat_identity(credential, email).await {
            Ok(identity) => Ok(RecipientIdentity {
                email_address: email.to_string(),
                chat_user_id: Some(identity.user_id),
                timezone: identity.timezone,
            }),
            Err(e) => {
                DispatchMetrics::record_lookup_failure();
                tracing::warn!(
                    recipient = %email,
                    error = %e,
                    "Chat identity lookup failed, recipient skipped for chat"
                );
                Err(RecipientFailure {
                    email_address: email.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }
}
