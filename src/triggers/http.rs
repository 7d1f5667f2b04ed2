use axum::{extract::State, Json};

use crate::channels::{forward_record, WebhookResponse};
use crate::error::Result;
use crate::notification::DispatchReport;
use crate::request::AccessRequestEvent;
use crate::server::AppState;

/// POST /api/v1/events - dispatch one access-request event.
///
/// Channel failures are reported in the body, not as an HTTP error.
pub async fn receive_event(
    State(state): State<AppState>,
    Json(record): Json<serde_json::Value>,
) -> Result<Json<DispatchReport>> {
    let event = AccessRequestEvent::from_value(record)?;

    let report = state
        .dispatcher
        .dispatch(&event, &state.channel_config)
        .await;

    Ok(Json(report))
}

/// POST /api/v1/webhook - forward the raw record to its `webhook_url`
pub async fn forward_webhook(
    State(state): State<AppState>,
    Json(record): Json<serde_json::Value>,
) -> Result<Json<WebhookResponse>> {
    let response = forward_record(state.webhook.as_ref(), &record).await?;
    Ok(Json(response))
}
