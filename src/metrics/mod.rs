//! Prometheus metrics for the notification service.
//!
//! - Inbound events by canonical status
//! - Channel sends by channel and outcome
//! - Chat identity lookup failures
//! - Webhook forwards by outcome

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, Encoder,
    HistogramVec, IntCounter, IntCounterVec, TextEncoder,
};

use crate::notification::ChannelOutcome;
use crate::request::CanonicalStatus;

/// Prefix for all metrics
const METRIC_PREFIX: &str = "access_notify";

lazy_static! {
    /// Events received, labelled by canonical status
    pub static ref EVENTS_RECEIVED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_events_received_total", METRIC_PREFIX),
        "Total access-request events received",
        &["status"]
    ).unwrap();

    /// Dispatches that ended before any channel ran
    pub static ref DISPATCH_SHORT_CIRCUIT_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_dispatch_short_circuit_total", METRIC_PREFIX),
        "Dispatches skipped before any channel was attempted",
        &["reason"]
    ).unwrap();

    /// Channel sends by channel and outcome
    pub static ref CHANNEL_SENDS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_channel_sends_total", METRIC_PREFIX),
        "Channel send attempts by outcome",
        &["channel", "outcome"]
    ).unwrap();

    /// Transport latency per channel
    pub static ref CHANNEL_SEND_LATENCY: HistogramVec = register_histogram_vec!(
        format!("{}_channel_send_latency_seconds", METRIC_PREFIX),
        "Latency of a single transport call",
        &["channel"],
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    ).unwrap();

    /// Failed chat identity lookups
    pub static ref RECIPIENT_LOOKUP_FAILURES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_recipient_lookup_failures_total", METRIC_PREFIX),
        "Chat identity lookups that failed"
    ).unwrap();

    /// Webhook forwards by outcome
    pub static ref WEBHOOK_FORWARDS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_webhook_forwards_total", METRIC_PREFIX),
        "Raw event webhook forwards",
        &["outcome"]
    ).unwrap();
}

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording dispatch metrics
pub struct DispatchMetrics;

impl DispatchMetrics {
    pub fn record_event(status: CanonicalStatus) {
        EVENTS_RECEIVED_TOTAL
            .with_label_values(&[status.as_str()])
            .inc();
    }

    pub fn record_short_circuit(reason: &str) {
        DISPATCH_SHORT_CIRCUIT_TOTAL.with_label_values(&[reason]).inc();
    }

    pub fn record_channel(channel: &str, outcome: &ChannelOutcome) {
        Self::record_send(channel, outcome.as_label());
    }

    pub fn record_send(channel: &str, outcome: &str) {
        CHANNEL_SENDS_TOTAL
            .with_label_values(&[channel, outcome])
            .inc();
    }

    pub fn observe_latency(channel: &str, seconds: f64) {
        CHANNEL_SEND_LATENCY
            .with_label_values(&[channel])
            .observe(seconds);
    }

    pub fn record_lookup_failure() {
        RECIPIENT_LOOKUP_FAILURES_TOTAL.inc();
    }
}

/// Helper struct for recording webhook metrics
pub struct WebhookMetrics;

impl WebhookMetrics {
    pub fn record_forwarded() {
        WEBHOOK_FORWARDS_TOTAL.with_label_values(&["forwarded"]).inc();
    }

    pub fn record_failed() {
        WEBHOOK_FORWARDS_TOTAL.with_label_values(&["failed"]).inc();
    }
}
