//! Access-request notification service.
//!
//! Lifecycle events from the access-request workflow are classified and
//! fanned out to email, a pub/sub topic and chat direct messages. See
//! [`notification::NotificationDispatcher`] for the dispatch engine.

// Ambient stack
pub mod config;
pub mod error;
pub mod metrics;
pub mod telemetry;

// Dispatch engine
pub mod channels;
pub mod notification;
pub mod request;
pub mod template;

// Application layer
pub mod api;
pub mod server;
pub mod triggers;
