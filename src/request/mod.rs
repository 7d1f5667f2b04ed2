//! Access-request lifecycle events and status classification.
//!
//! The approval workflow emits one record per status change. This module
//! owns the wire model of that record and the rules that collapse its raw
//! status and sub-workflow signals into a single [`CanonicalStatus`].

mod event;
mod status;

pub use event::{
    AccessRequestEvent, EventError, GrantOperation, OperationStatus, RevokeOperation,
    DEFAULT_JUSTIFICATION, DEFAULT_TICKET, IN_PROGRESS,
};
pub use status::{classify, CanonicalStatus};
