//! Health check and statistics endpoints.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::notification::DispatcherStatsSnapshot;
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub channels: ChannelHealthResponse,
}

/// Which channels would be attempted for the next event
#[derive(Debug, Serialize)]
pub struct ChannelHealthResponse {
    pub email: bool,
    pub broadcast: bool,
    pub chat: bool,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub uptime_seconds: u64,
    pub notifications: DispatcherStatsSnapshot,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let config = &state.channel_config;
    let status = if config.any_configured() {
        "healthy"
    } else {
        "unconfigured"
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
        channels: ChannelHealthResponse {
            email: config.email_configured(),
            broadcast: config.broadcast_configured(),
            chat: config.chat_configured(),
        },
    })
}

pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        uptime_seconds: state.uptime_seconds(),
        notifications: state.dispatcher.stats(),
    })
}
