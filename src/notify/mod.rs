//! Best-effort webhook delivery of liveness events.
//!
//! The state machine publishes an envelope per committed Event; this task
//! drains the channel and POSTs each one. Delivery is fully decoupled from
//! the transition: a slow or failing sink only ever costs a log line.

use crate::db::ProbeSnapshot;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;

/// Payload delivered to the notification sink, one per Event.
#[derive(Debug, Clone, Serialize)]
pub struct EventEnvelope {
    pub event_id: i64,
    pub probe_id: i64,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub probe: ProbeSnapshot,
}

/// Webhook notifier task.
pub struct Notifier;

impl Notifier {
    /// Spawn the consumer. With no webhook URL configured the channel is
    /// still drained so senders never accumulate backlog.
    pub fn start(mut rx: mpsc::UnboundedReceiver<EventEnvelope>, webhook_url: Option<String>) {
        tokio::spawn(async move {
            let client = reqwest::Client::new();

            while let Some(envelope) = rx.recv().await {
                let Some(url) = webhook_url.as_deref() else {
                    tracing::debug!(event_id = envelope.event_id, "no webhook configured, dropping event");
                    continue;
                };

                match client.post(url).json(&envelope).send().await {
                    Ok(resp) if resp.status().is_success() => {
                        tracing::debug!(
                            event_id = envelope.event_id,
                            event_type = %envelope.event_type,
                            "webhook delivered"
                        );
                    }
                    Ok(resp) => {
                        tracing::warn!(
                            event_id = envelope.event_id,
                            status = %resp.status(),
                            "webhook rejected"
                        );
                    }
                    Err(e) => {
                        tracing::warn!(event_id = envelope.event_id, "webhook delivery failed: {}", e);
                    }
                }
            }
        });
    }
}
