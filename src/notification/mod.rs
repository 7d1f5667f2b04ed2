//! Notification dispatch engine.
//!
//! An [`AccessRequestEvent`](crate::request::AccessRequestEvent) flows one way
//! through this module:
//!
//! 1. the event is classified into a [`CanonicalStatus`](crate::request::CanonicalStatus)
//! 2. [`resolve_case`] picks the audience rule and templates for that status
//! 3. [`Audience::resolve`] expands the rule into To/Cc and chat recipients
//! 4. [`RecipientResolver`] looks up chat identities, one failure at a time
//! 5. [`MessageRenderer`] builds the email, broadcast and chat payloads
//! 6. [`NotificationDispatcher`] sends them and collects a [`DispatchReport`]

mod audience;
mod case;
mod dispatcher;
mod recipient;
mod render;
mod report;

pub use audience::{dedupe, Audience};
pub use case::{resolve_case, AudienceRule, NotificationCase};
pub use dispatcher::{
    DispatcherStats, DispatcherStatsSnapshot, NotificationDispatcher, Transports,
};
pub use recipient::{RecipientFailure, RecipientIdentity, RecipientLookup, RecipientResolver};
pub use render::{
    localize_start_time, BroadcastPayload, ChatPayload, EmailPayload, MessageRenderer,
    CHAT_BUTTON_TEXT, CHAT_FALLBACK_TEXT, LOGIN_LINK_TEXT, START_TIME_FORMAT,
};
pub use report::{
    ChannelOutcome, ChatReport, DispatchReport, RecipientOutcome, RecipientReport, ShortCircuit,
};
