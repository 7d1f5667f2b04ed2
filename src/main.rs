use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::signal;

use access_notify::channels::{HttpEmailRelay, HttpWebhookPoster, RedisBroadcastPublisher, SlackClient};
use access_notify::config::Settings;
use access_notify::notification::{NotificationDispatcher, Transports};
use access_notify::server::{create_app, AppState};
use access_notify::telemetry::init_telemetry;
use access_notify::triggers::RedisSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::new()?;

    // Initialize tracing
    let _telemetry = init_telemetry(&settings.otel)?;

    settings.validate()?;
    tracing::info!("Configuration loaded");

    let email = &settings.notifications.email;
    if email.enabled && email.relay_url.is_none() {
        tracing::warn!("Email notifications enabled without a relay_url, email stays disabled");
    }

    // Build transports
    let chat = &settings.notifications.chat;
    let slack = Arc::new(SlackClient::new(
        chat.api_base_url.clone(),
        Duration::from_secs(chat.timeout_seconds),
    )?);
    let transports = Transports {
        email: Arc::new(HttpEmailRelay::new(
            email.relay_url.clone().unwrap_or_default(),
            Duration::from_secs(email.timeout_seconds),
        )?),
        broadcast: Arc::new(RedisBroadcastPublisher::new(&settings.redis.url)?),
        chat_directory: slack.clone(),
        chat_poster: slack,
    };
    let dispatcher = Arc::new(NotificationDispatcher::with_chat_concurrency(
        transports,
        chat.max_concurrent_sends,
    ));
    let webhook = Arc::new(HttpWebhookPoster::new(Duration::from_secs(
        settings.webhook.timeout_seconds,
    ))?);

    // Create application state
    let state = AppState::new(settings.clone(), dispatcher.clone(), webhook);
    tracing::info!(
        email = state.channel_config.email_configured(),
        broadcast = state.channel_config.broadcast_configured(),
        chat = state.channel_config.chat_configured(),
        "Application state initialized"
    );

    // Create Redis subscriber
    let redis_subscriber = Arc::new(RedisSubscriber::new(
        settings.redis.clone(),
        state.channel_config.clone(),
        dispatcher,
    ));
    let shutdown_signal = redis_subscriber.shutdown_signal();

    // Start Redis subscriber in background
    let redis_subscriber_clone = redis_subscriber.clone();
    let redis_handle = tokio::spawn(async move {
        if let Err(e) = redis_subscriber_clone.start().await {
            tracing::error!(error = %e, "Redis subscriber failed");
        }
    });

    // Create Axum app
    let app = create_app(state);

    // Start server
    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_handler(shutdown_signal))
        .await?;

    // Wait for background tasks to finish
    tracing::info!("Waiting for background tasks to finish...");
    let _ = redis_handle.await;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal_handler(shutdown_tx: tokio::sync::broadcast::Sender<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }

    // Send shutdown signal to Redis subscriber
    let _ = shutdown_tx.send(());
}
