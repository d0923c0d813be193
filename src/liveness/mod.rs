//! Probe liveness state machine.
//!
//! Owns every write to `probes.state`/`probes.current_state_id` and all
//! State/Event creation. Concurrency safety comes from per-probe optimistic
//! updates: the store's transition commit is keyed on the probe's
//! `current_state_id` and losing callers retry against fresh state.

pub mod sweeper;

use crate::db::{DbError, Device, EventRecord, Probe, ProbeState, Store};
use crate::notify::EventEnvelope;

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

const MAX_TRANSITION_ATTEMPTS: u32 = 5;
const RETRY_BASE_MS: u64 = 10;

/// Liveness error types.
#[derive(Error, Debug)]
pub enum LivenessError {
    #[error("probe {0} not found")]
    NotFound(i64),
    #[error("invalid target state: {0}")]
    InvalidState(ProbeState),
    #[error("transition still conflicted after {attempts} attempts")]
    Conflict { attempts: u32 },
    #[error("storage error: {0}")]
    Storage(#[from] DbError),
}

/// Outcome of a transition request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// A new State/Event pair was committed.
    Changed { state_id: i64, event_id: i64 },
    /// The probe was already in the target state; nothing was written.
    Unchanged,
}

/// The probe state machine.
pub struct LivenessMachine {
    store: Arc<Store>,
    events: mpsc::UnboundedSender<EventEnvelope>,
}

impl LivenessMachine {
    /// Create a machine over the given store. Committed events are published
    /// to `events` for best-effort notification delivery.
    pub fn new(store: Arc<Store>, events: mpsc::UnboundedSender<EventEnvelope>) -> Self {
        Self { store, events }
    }

    /// Drive a probe to `target` (Up or Down).
    ///
    /// Idempotent: a probe already in `target` yields `Unchanged` with no
    /// rows written. Otherwise exactly one Event and one State row are
    /// committed together with the probe pointer update. Races with
    /// concurrent transitions on the same probe are retried with bounded
    /// backoff; whichever caller commits first wins and idempotency absorbs
    /// the other.
    pub async fn transition(
        &self,
        probe_id: i64,
        target: ProbeState,
    ) -> Result<Transition, LivenessError> {
        let event_type = match target {
            ProbeState::Up => "probe.up",
            ProbeState::Down => "probe.down",
            ProbeState::New => return Err(LivenessError::InvalidState(target)),
        };

        for attempt in 0..MAX_TRANSITION_ATTEMPTS {
            let probe = self
                .store
                .get_probe(probe_id)
                .map_err(|e| probe_err(probe_id, e))?;

            if probe.state == target {
                return Ok(Transition::Unchanged);
            }

            let now = Utc::now();
            match self
                .store
                .commit_transition(probe_id, probe.current_state_id, target, event_type, now)
                .map_err(|e| probe_err(probe_id, e))?
            {
                Some((state_id, event_id)) => {
                    tracing::info!(probe_id, from = %probe.state, to = %target, "probe transitioned");
                    self.publish(&EventRecord {
                        id: event_id,
                        probe_id,
                        event_type: event_type.to_string(),
                        timestamp: now,
                    });
                    return Ok(Transition::Changed { state_id, event_id });
                }
                None => {
                    tracing::debug!(probe_id, attempt, "transition lost optimistic race, retrying");
                    let jitter = rand::random::<u64>() % RETRY_BASE_MS;
                    let backoff = RETRY_BASE_MS * (1u64 << attempt) + jitter;
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                }
            }
        }

        Err(LivenessError::Conflict {
            attempts: MAX_TRANSITION_ATTEMPTS,
        })
    }

    /// Ingest one heartbeat report.
    ///
    /// Refreshes the probe's bookkeeping timestamps, then drives it Up. The
    /// timestamp update persists even if the transition then fails; the next
    /// heartbeat or sweep reconciles it.
    pub async fn record_heartbeat(
        &self,
        probe_id: i64,
        next_deadline: DateTime<Utc>,
        observed_at: DateTime<Utc>,
    ) -> Result<Transition, LivenessError> {
        self.store
            .update_heartbeat_fields(probe_id, observed_at, next_deadline)
            .map_err(|e| probe_err(probe_id, e))?;
        self.transition(probe_id, ProbeState::Up).await
    }

    /// Look up the device for `mac`, creating the device, its probe (state
    /// New, with the initial open State row) and the `probe.created`/
    /// `probe.linked` milestone events on first contact.
    pub async fn ensure_registered(
        &self,
        mac: &str,
        wan_ip: &str,
        lan_ip: &str,
    ) -> Result<(Device, Probe), LivenessError> {
        if let Some(device) = self.store.find_device_by_mac(mac)? {
            let probe = self.store.find_probe_by_device(device.id)?;
            return Ok((device, probe));
        }

        let (device, probe) = match self.store.register_probe(mac, wan_ip, lan_ip, Utc::now()) {
            Ok(pair) => pair,
            // Lost a first-contact race: another report inserted this MAC
            // between our lookup and the insert. Use the winner's rows.
            Err(e) if is_unique_violation(&e) => {
                let device = self
                    .store
                    .find_device_by_mac(mac)?
                    .ok_or(LivenessError::Storage(e))?;
                let probe = self.store.find_probe_by_device(device.id)?;
                return Ok((device, probe));
            }
            Err(e) => return Err(e.into()),
        };
        tracing::info!(probe_id = probe.id, mac, "registered new probe");

        for event_type in ["probe.created", "probe.linked"] {
            let event = self.store.insert_event(probe.id, event_type, Utc::now())?;
            self.publish(&event);
        }

        Ok((device, probe))
    }

    /// Hand a committed event to the notifier. Fire-and-forget: failure here
    /// never affects the transition outcome.
    fn publish(&self, event: &EventRecord) {
        let probe = match self.store.probe_snapshot(event.probe_id) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(event_id = event.id, "skipping notification, snapshot failed: {}", e);
                return;
            }
        };

        let envelope = EventEnvelope {
            event_id: event.id,
            probe_id: event.probe_id,
            event_type: event.event_type.clone(),
            timestamp: event.timestamp,
            probe,
        };

        if self.events.send(envelope).is_err() {
            tracing::debug!(event_id = event.id, "no notification consumer, event dropped");
        }
    }
}

fn is_unique_violation(e: &DbError) -> bool {
    matches!(
        e,
        DbError::Sqlite(rusqlite::Error::SqliteFailure(err, _))
            if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn probe_err(probe_id: i64, e: DbError) -> LivenessError {
    match e {
        DbError::NotFound => LivenessError::NotFound(probe_id),
        other => LivenessError::Storage(other),
    }
}
