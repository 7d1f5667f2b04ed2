//! Inbound event sources: HTTP endpoints and Redis pub/sub.

mod http;
mod redis;

pub use http::{forward_webhook, receive_event};
pub use redis::RedisSubscriber;
