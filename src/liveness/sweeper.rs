//! Periodic detection of probes that stopped reporting.

use super::{LivenessMachine, Transition};
use crate::db::{ProbeState, Store};

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Background task that marks silent probes Down.
///
/// A single periodic scan compares each Up probe's declared deadline against
/// the wall clock instead of arming one timer per probe; a missed deadline is
/// caught at worst one period late, including across restarts.
pub struct TimeoutSweeper {
    store: Arc<Store>,
    machine: Arc<LivenessMachine>,
    period: Duration,
    stop: Arc<Mutex<Option<tokio::sync::broadcast::Sender<()>>>>,
}

impl TimeoutSweeper {
    pub fn new(store: Arc<Store>, machine: Arc<LivenessMachine>, period: Duration) -> Self {
        Self {
            store,
            machine,
            period,
            stop: Arc::new(Mutex::new(None)),
        }
    }

    /// Start the sweep loop in a background task.
    pub fn start(&self) {
        let store = self.store.clone();
        let machine = self.machine.clone();
        let period = self.period;
        let stop = self.stop.clone();

        tokio::spawn(async move {
            let (tx, _) = tokio::sync::broadcast::channel(1);
            {
                let mut stop_guard = stop.lock().await;
                *stop_guard = Some(tx.clone());
            }

            let mut rx = tx.subscribe();
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = rx.recv() => break,
                    _ = interval.tick() => {
                        sweep_once(&store, &machine, Utc::now()).await;
                    }
                }
            }
        });
    }

    /// Stop scheduling future ticks. An in-flight sweep finishes its batch.
    pub async fn stop(&self) {
        let stop = self.stop.lock().await;
        if let Some(tx) = stop.as_ref() {
            let _ = tx.send(());
        }
    }
}

/// Run one sweep tick: transition every overdue Up probe to Down.
///
/// One probe failing never aborts the batch; it is logged and stays eligible
/// for the next tick. Returns the number of probes marked Down.
pub async fn sweep_once(store: &Store, machine: &LivenessMachine, now: DateTime<Utc>) -> usize {
    let overdue = match store.overdue_probes(now) {
        Ok(probes) => probes,
        Err(e) => {
            tracing::error!("TimeoutSweeper: overdue query failed: {}", e);
            return 0;
        }
    };

    let mut marked = 0;
    for probe in overdue {
        match machine.transition(probe.id, ProbeState::Down).await {
            Ok(Transition::Changed { .. }) => {
                tracing::info!(
                    probe_id = probe.id,
                    deadline = ?probe.next_heartbeat_deadline,
                    "probe missed its heartbeat deadline, marked Down"
                );
                marked += 1;
            }
            // A heartbeat or another sweep got there first.
            Ok(Transition::Unchanged) => {}
            Err(e) => {
                tracing::error!(probe_id = probe.id, "TimeoutSweeper: failed to mark probe down: {}", e);
            }
        }
    }

    marked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::EventEnvelope;
    use chrono::Duration as ChronoDuration;
    use tempfile::NamedTempFile;
    use tokio::sync::mpsc;

    fn fixture() -> (NamedTempFile, Arc<Store>, Arc<LivenessMachine>) {
        let tmp = NamedTempFile::new().unwrap();
        let store = Arc::new(Store::new(tmp.path()).unwrap());
        let (tx, _rx) = mpsc::unbounded_channel::<EventEnvelope>();
        let machine = Arc::new(LivenessMachine::new(store.clone(), tx));
        (tmp, store, machine)
    }

    async fn up_probe_with_deadline(
        store: &Store,
        machine: &LivenessMachine,
        mac: &str,
        deadline: DateTime<Utc>,
    ) -> i64 {
        let (_, probe) = store.register_probe(mac, "", "", Utc::now()).unwrap();
        machine
            .record_heartbeat(probe.id, deadline, Utc::now())
            .await
            .unwrap();
        probe.id
    }

    #[tokio::test]
    async fn test_sweep_marks_overdue_probe_down() {
        let (_tmp, store, machine) = fixture();
        let now = Utc::now();
        let probe_id = up_probe_with_deadline(
            &store,
            &machine,
            "aa:aa:aa:aa:aa:01",
            now + ChronoDuration::seconds(60),
        )
        .await;

        // Before the deadline: untouched.
        assert_eq!(sweep_once(&store, &machine, now).await, 0);
        assert_eq!(store.get_probe(probe_id).unwrap().state, ProbeState::Up);

        // Past the deadline: exactly one Down transition.
        let later = now + ChronoDuration::seconds(61);
        assert_eq!(sweep_once(&store, &machine, later).await, 1);
        let probe = store.get_probe(probe_id).unwrap();
        assert_eq!(probe.state, ProbeState::Down);

        let events = store.get_events(Some(probe_id)).unwrap();
        assert_eq!(
            events.iter().filter(|e| e.event_type == "probe.down").count(),
            1
        );

        // A second sweep finds nothing to do.
        assert_eq!(sweep_once(&store, &machine, later).await, 0);
        assert_eq!(
            store
                .get_events(Some(probe_id))
                .unwrap()
                .iter()
                .filter(|e| e.event_type == "probe.down")
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_sweep_handles_mixed_batch() {
        let (_tmp, store, machine) = fixture();
        let now = Utc::now();

        let late_a = up_probe_with_deadline(
            &store,
            &machine,
            "aa:aa:aa:aa:aa:01",
            now - ChronoDuration::seconds(30),
        )
        .await;
        let late_b = up_probe_with_deadline(
            &store,
            &machine,
            "aa:aa:aa:aa:aa:02",
            now - ChronoDuration::seconds(90),
        )
        .await;
        let fresh = up_probe_with_deadline(
            &store,
            &machine,
            "aa:aa:aa:aa:aa:03",
            now + ChronoDuration::seconds(300),
        )
        .await;

        // Registered but never reported: no deadline, never swept.
        let (_, silent) = store
            .register_probe("aa:aa:aa:aa:aa:04", "", "", now)
            .unwrap();

        assert_eq!(sweep_once(&store, &machine, now).await, 2);
        assert_eq!(store.get_probe(late_a).unwrap().state, ProbeState::Down);
        assert_eq!(store.get_probe(late_b).unwrap().state, ProbeState::Down);
        assert_eq!(store.get_probe(fresh).unwrap().state, ProbeState::Up);
        assert_eq!(store.get_probe(silent.id).unwrap().state, ProbeState::New);
    }

    #[tokio::test]
    async fn test_sweep_continues_past_failing_probe() {
        let (tmp, store, machine) = fixture();
        let now = Utc::now();

        let broken = up_probe_with_deadline(
            &store,
            &machine,
            "aa:aa:aa:aa:aa:01",
            now - ChronoDuration::seconds(60),
        )
        .await;
        let healthy = up_probe_with_deadline(
            &store,
            &machine,
            "aa:aa:aa:aa:aa:02",
            now - ChronoDuration::seconds(60),
        )
        .await;

        // Make every transition of one probe fail at the store layer.
        let raw = rusqlite::Connection::open(tmp.path()).unwrap();
        raw.execute_batch(&format!(
            "CREATE TRIGGER fail_one BEFORE INSERT ON events
             WHEN NEW.probe_id = {broken}
             BEGIN SELECT RAISE(ABORT, 'storage unavailable'); END;"
        ))
        .unwrap();

        // The failing probe is logged and skipped; the rest of the batch
        // still goes Down.
        assert_eq!(sweep_once(&store, &machine, now).await, 1);
        assert_eq!(store.get_probe(healthy).unwrap().state, ProbeState::Down);
        assert_eq!(store.get_probe(broken).unwrap().state, ProbeState::Up);

        // Once the store recovers, the next tick catches it.
        raw.execute_batch("DROP TRIGGER fail_one;").unwrap();
        assert_eq!(sweep_once(&store, &machine, now).await, 1);
        assert_eq!(store.get_probe(broken).unwrap().state, ProbeState::Down);
    }

    #[tokio::test]
    async fn test_sweeper_start_stop() {
        let (_tmp, store, machine) = fixture();
        let sweeper = TimeoutSweeper::new(store, machine, Duration::from_millis(10));
        sweeper.start();
        tokio::time::sleep(Duration::from_millis(30)).await;
        sweeper.stop().await;
    }
}
