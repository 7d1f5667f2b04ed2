use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::channels::{
    BroadcastDispatcher, BroadcastPublisher, ChannelConfig, ChatDirectory, ChatDispatcher,
    ChatPoster, ChatSend, EmailDispatcher, EmailSender, DEFAULT_MAX_CONCURRENT_SENDS,
};
use crate::metrics::DispatchMetrics;
use crate::request::{AccessRequestEvent, CanonicalStatus};

use super::{
    resolve_case, Audience, ChannelOutcome, ChatReport, DispatchReport, MessageRenderer,
    RecipientOutcome, RecipientReport, RecipientResolver, ShortCircuit,
};

/// External capabilities the dispatcher sends through
#[derive(Clone)]
pub struct Transports {
    pub email: Arc<dyn EmailSender>,
    pub broadcast: Arc<dyn BroadcastPublisher>,
    pub chat_directory: Arc<dyn ChatDirectory>,
    pub chat_poster: Arc<dyn ChatPoster>,
}

/// Statistics for the notification dispatcher
#[derive(Debug, Default)]
pub struct DispatcherStats {
    /// Events handed to `dispatch`
    pub total_received: AtomicU64,
    /// Dispatches that ended before any channel ran
    pub total_short_circuited: AtomicU64,
    /// Channel or recipient sends that were accepted
    pub total_sent: AtomicU64,
    /// Channel or recipient sends that failed, lookups included
    pub total_failed: AtomicU64,
}

impl DispatcherStats {
    pub fn snapshot(&self) -> DispatcherStatsSnapshot {
        DispatcherStatsSnapshot {
            total_received: self.total_received.load(Ordering::Relaxed),
            total_short_circuited: self.total_short_circuited.load(Ordering::Relaxed),
            total_sent: self.total_sent.load(Ordering::Relaxed),
            total_failed: self.total_failed.load(Ordering::Relaxed),
        }
    }

    fn record_report(&self, report: &DispatchReport) {
        let mut sent = report.chat.sent_count() as u64;
        let mut failed = report.chat.failed_count() as u64;
        for outcome in [&report.email, &report.broadcast] {
            match outcome {
                ChannelOutcome::Sent => sent += 1,
                ChannelOutcome::Failed(_) => failed += 1,
                _ => {}
            }
        }
        self.total_sent.fetch_add(sent, Ordering::Relaxed);
        self.total_failed.fetch_add(failed, Ordering::Relaxed);
    }
}

/// Snapshot of dispatcher statistics
#[derive(Debug, Clone, Serialize)]
pub struct DispatcherStatsSnapshot {
    pub total_received: u64,
    pub total_short_circuited: u64,
    pub total_sent: u64,
    pub total_failed: u64,
}

/// Classifies an event and fans it out to every configured channel.
///
/// Email, broadcast and chat run concurrently and never gate each other.
/// Nothing here returns an error: every failure ends up in the
/// [`DispatchReport`].
pub struct NotificationDispatcher {
    email: EmailDispatcher,
    broadcast: BroadcastDispatcher,
    resolver: RecipientResolver,
    chat: ChatDispatcher,
    stats: DispatcherStats,
}

impl NotificationDispatcher {
    pub fn new(transports: Transports) -> Self {
        Self::with_chat_concurrency(transports, DEFAULT_MAX_CONCURRENT_SENDS)
    }

    /// Create a dispatcher whose chat lookups and sends run at most
    /// `max_concurrent_sends` at a time
    pub fn with_chat_concurrency(transports: Transports, max_concurrent_sends: usize) -> Self {
        Self {
            email: EmailDispatcher::new(transports.email),
            broadcast: BroadcastDispatcher::new(transports.broadcast),
            resolver: RecipientResolver::new(transports.chat_directory, max_concurrent_sends),
            chat: ChatDispatcher::new(transports.chat_poster, max_concurrent_sends),
            stats: DispatcherStats::default(),
        }
    }

    /// Get dispatcher statistics
    pub fn stats(&self) -> DispatcherStatsSnapshot {
        self.stats.snapshot()
    }

    #[tracing::instrument(
        name = "dispatcher.dispatch",
        skip(self, event, config),
        fields(
            dispatch_id = tracing::field::Empty,
            raw_status = %event.raw_status,
            account_id = %event.account_id
        )
    )]
    pub async fn dispatch(
        &self,
        event: &AccessRequestEvent,
        config: &ChannelConfig,
    ) -> DispatchReport {
        let dispatch_id = Uuid::new_v4();
        tracing::Span::current().record("dispatch_id", tracing::field::display(dispatch_id));

        let status = event.canonical_status();
        DispatchMetrics::record_event(status);
        self.stats.total_received.fetch_add(1, Ordering::Relaxed);

        if !config.any_configured() {
            tracing::debug!(%status, "No notification channel configured, nothing to send");
            return self.short_circuit(dispatch_id, status, ShortCircuit::NoChannelConfigured);
        }

        let Some(case) = resolve_case(status) else {
            tracing::warn!(
                raw_status = %event.raw_status,
                "Unrecognized request status, notification skipped"
            );
            return self.short_circuit(dispatch_id, status, ShortCircuit::UnknownStatus);
        };

        let audience = Audience::resolve(case.audience, event, &config.email_source_address);
        let renderer = MessageRenderer::new(case, event);

        let (email, broadcast, chat) = tokio::join!(
            self.send_email(config, &renderer, &audience),
            self.send_broadcast(config, &renderer),
            self.send_chat(config, &renderer, &audience),
        );

        let report = DispatchReport {
            dispatch_id,
            status,
            short_circuit: None,
            email,
            broadcast,
            chat,
        };
        self.stats.record_report(&report);

        tracing::info!(
            %status,
            email = report.email.as_label(),
            broadcast = report.broadcast.as_label(),
            chat = report.chat.outcome.as_label(),
            chat_sent = report.chat.sent_count(),
            chat_failed = report.chat.failed_count(),
            "Notification dispatched"
        );

        report
    }

    fn short_circuit(
        &self,
        dispatch_id: Uuid,
        status: CanonicalStatus,
        reason: ShortCircuit,
    ) -> DispatchReport {
        let label = match reason {
            ShortCircuit::NoChannelConfigured => "no_channel_configured",
            ShortCircuit::UnknownStatus => "unknown_status",
        };
        DispatchMetrics::record_short_circuit(label);
        self.stats
            .total_short_circuited
            .fetch_add(1, Ordering::Relaxed);
        DispatchReport::short_circuited(dispatch_id, status, reason)
    }

    async fn send_email(
        &self,
        config: &ChannelConfig,
        renderer: &MessageRenderer<'_>,
        audience: &Audience,
    ) -> ChannelOutcome {
        if !config.email_configured() {
            return ChannelOutcome::Disabled;
        }
        if audience.email_to.is_empty() {
            tracing::warn!(channel = "email", "No primary recipients, email skipped");
            let outcome = ChannelOutcome::Skipped("no recipients".to_string());
            DispatchMetrics::record_channel("email", &outcome);
            return outcome;
        }

        match renderer.email(audience) {
            Ok(payload) => self.email.dispatch(config, &payload).await,
            Err(e) => {
                tracing::error!(channel = "email", error = %e, "Failed to render email body");
                let outcome = ChannelOutcome::Failed(e.to_string());
                DispatchMetrics::record_channel("email", &outcome);
                outcome
            }
        }
    }

    async fn send_broadcast(
        &self,
        config: &ChannelConfig,
        renderer: &MessageRenderer<'_>,
    ) -> ChannelOutcome {
        if !config.broadcast_configured() {
            return ChannelOutcome::Disabled;
        }

        match renderer.broadcast() {
            Ok(payload) => self.broadcast.dispatch(config, &payload).await,
            Err(e) => {
                tracing::error!(channel = "broadcast", error = %e, "Failed to serialize event record");
                let outcome = ChannelOutcome::Failed(e.to_string());
                DispatchMetrics::record_channel("broadcast", &outcome);
                outcome
            }
        }
    }

    async fn send_chat(
        &self,
        config: &ChannelConfig,
        renderer: &MessageRenderer<'_>,
        audience: &Audience,
    ) -> ChatReport {
        let Some(credential) = config
            .chat_credential
            .as_ref()
            .filter(|_| config.chat_configured())
        else {
            return ChatReport::disabled();
        };
        if audience.chat_recipients.is_empty() {
            tracing::warn!(channel = "chat", "No chat recipients, chat skipped");
            DispatchMetrics::record_send("chat", "skipped");
            return ChatReport::skipped("no recipients");
        }

        let lookups = self
            .resolver
            .resolve(credential, &audience.chat_recipients)
            .await;

        let mut reports = Vec::new();
        let mut sends = Vec::new();
        for lookup in lookups {
            match lookup {
                Ok(identity) => match renderer.chat(&identity) {
                    Some(payload) => sends.push(ChatSend {
                        email_address: identity.email_address,
                        payload,
                    }),
                    None => reports.push(RecipientReport {
                        email_address: identity.email_address,
                        chat_user_id: None,
                        outcome: RecipientOutcome::LookupFailed("no chat user id".to_string()),
                    }),
                },
                Err(failure) => reports.push(RecipientReport {
                    email_address: failure.email_address,
                    chat_user_id: None,
                    outcome: RecipientOutcome::LookupFailed(failure.reason),
                }),
            }
        }

        reports.extend(self.chat.dispatch(config, sends).await);
        reports.sort_by_key(|report| {
            audience
                .chat_recipients
                .iter()
                .position(|address| *address == report.email_address)
        });

        ChatReport::from_recipients(reports)
    }
}
