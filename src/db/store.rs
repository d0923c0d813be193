//! SQLite liveness store implementation.

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection, Result as SqlResult, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use super::models::*;

/// Database error types.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Migration error: {0}")]
    Migration(String),
    #[error("Not found")]
    NotFound,
}

/// Thread-safe liveness store.
///
/// Probe rows are the only mutable data; `states` and `events` are
/// append-only (states additionally get their `end_time` closed exactly
/// once). All multi-row writes go through a transaction.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Create a new store with the given database path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init()?;
        Ok(store)
    }

    /// Initialize the database with migrations.
    fn init(&self) -> Result<(), DbError> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(include_str!("../../migrations/000001_init.up.sql"))
            .map_err(|e| DbError::Migration(format!("Migration 1 failed: {}", e)))?;
        Ok(())
    }

    // --- Devices ---

    /// Find a device by MAC address.
    pub fn find_device_by_mac(&self, mac: &str) -> Result<Option<Device>, DbError> {
        let conn = self.conn.lock().unwrap();
        let device = conn
            .query_row(
                "SELECT id, mac FROM devices WHERE mac = ?1",
                params![mac],
                |row| {
                    Ok(Device {
                        id: row.get(0)?,
                        mac: row.get(1)?,
                    })
                },
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;
        Ok(device)
    }

    /// Get all devices.
    pub fn get_devices(&self) -> Result<Vec<Device>, DbError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT id, mac FROM devices ORDER BY id")?;
        let devices = stmt
            .query_map([], |row| {
                Ok(Device {
                    id: row.get(0)?,
                    mac: row.get(1)?,
                })
            })?
            .collect::<SqlResult<Vec<_>>>()?;
        Ok(devices)
    }

    // --- Probes ---

    /// Get a probe by ID.
    pub fn get_probe(&self, id: i64) -> Result<Probe, DbError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            &format!("{} WHERE id = ?1", SELECT_PROBE),
            params![id],
            probe_from_row,
        )
        .map_err(not_found)
    }

    /// Get the probe linked to a device.
    pub fn find_probe_by_device(&self, device_id: i64) -> Result<Probe, DbError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            &format!("{} WHERE active_device_id = ?1", SELECT_PROBE),
            params![device_id],
            probe_from_row,
        )
        .map_err(not_found)
    }

    /// Get all probes.
    pub fn get_probes(&self) -> Result<Vec<Probe>, DbError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!("{} ORDER BY id", SELECT_PROBE))?;
        let probes = stmt
            .query_map([], probe_from_row)?
            .collect::<SqlResult<Vec<_>>>()?;
        Ok(probes)
    }

    /// Probes marked Up whose declared deadline has passed.
    ///
    /// Probes that never reported (NULL deadline) are excluded.
    pub fn overdue_probes(&self, now: DateTime<Utc>) -> Result<Vec<Probe>, DbError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "{} WHERE state = 'Up'
                AND next_heartbeat_deadline IS NOT NULL
                AND next_heartbeat_deadline < ?1",
            SELECT_PROBE
        ))?;
        let probes = stmt
            .query_map(params![fmt_db_time(now)], probe_from_row)?
            .collect::<SqlResult<Vec<_>>>()?;
        Ok(probes)
    }

    /// Record when a probe last reported and when it promises to report next.
    pub fn update_heartbeat_fields(
        &self,
        probe_id: i64,
        observed_at: DateTime<Utc>,
        deadline: DateTime<Utc>,
    ) -> Result<(), DbError> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE probes SET latest_heartbeat_at = ?1, next_heartbeat_deadline = ?2 WHERE id = ?3",
            params![fmt_db_time(observed_at), fmt_db_time(deadline), probe_id],
        )?;
        if changed == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    /// Refresh a probe's reported addresses.
    pub fn update_probe_addresses(
        &self,
        probe_id: i64,
        wan_ip: &str,
        lan_ip: &str,
    ) -> Result<(), DbError> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE probes SET wan_ip = ?1, lan_ip = ?2 WHERE id = ?3",
            params![wan_ip, lan_ip, probe_id],
        )?;
        if changed == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    /// First-contact bootstrap: create the device, its probe in state New, and
    /// the initial open State row, all in one transaction.
    pub fn register_probe(
        &self,
        mac: &str,
        wan_ip: &str,
        lan_ip: &str,
        at: DateTime<Utc>,
    ) -> Result<(Device, Probe), DbError> {
        let conn = self.conn.lock().unwrap();
        let tx = conn.unchecked_transaction()?;

        tx.execute("INSERT INTO devices (mac) VALUES (?1)", params![mac])?;
        let device_id = tx.last_insert_rowid();

        tx.execute(
            "INSERT INTO probes (active_device_id, state, wan_ip, lan_ip) VALUES (?1, ?2, ?3, ?4)",
            params![device_id, ProbeState::New.as_str(), wan_ip, lan_ip],
        )?;
        let probe_id = tx.last_insert_rowid();

        tx.execute(
            "INSERT INTO states (probe_id, state, start) VALUES (?1, ?2, ?3)",
            params![probe_id, ProbeState::New.as_str(), fmt_db_time(at)],
        )?;
        let state_id = tx.last_insert_rowid();

        tx.execute(
            "UPDATE probes SET current_state_id = ?1 WHERE id = ?2",
            params![state_id, probe_id],
        )?;

        tx.commit()?;

        Ok((
            Device {
                id: device_id,
                mac: mac.to_string(),
            },
            Probe {
                id: probe_id,
                active_device_id: device_id,
                state: ProbeState::New,
                current_state_id: Some(state_id),
                latest_heartbeat_at: None,
                next_heartbeat_deadline: None,
                wan_ip: wan_ip.to_string(),
                lan_ip: lan_ip.to_string(),
            },
        ))
    }

    /// Atomically commit one state transition.
    ///
    /// In a single transaction: appends the Event, closes the open State row
    /// identified by `expected_state_id`, opens the new State row, and flips
    /// `probes.state`/`probes.current_state_id` only if the pointer still
    /// equals `expected_state_id`. When the conditional update matches no row
    /// (a concurrent transition won), everything is rolled back and `None` is
    /// returned so the caller can re-read and retry.
    pub fn commit_transition(
        &self,
        probe_id: i64,
        expected_state_id: Option<i64>,
        target: ProbeState,
        event_type: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<(i64, i64)>, DbError> {
        let conn = self.conn.lock().unwrap();
        let tx = conn.unchecked_transaction()?;
        let at_str = fmt_db_time(at);

        tx.execute(
            "INSERT INTO events (probe_id, event_type, timestamp) VALUES (?1, ?2, ?3)",
            params![probe_id, event_type, at_str],
        )?;
        let event_id = tx.last_insert_rowid();

        if let Some(expected) = expected_state_id {
            tx.execute(
                "UPDATE states SET end_time = ?1 WHERE id = ?2 AND end_time IS NULL",
                params![at_str, expected],
            )?;
        }

        tx.execute(
            "INSERT INTO states (probe_id, state, start) VALUES (?1, ?2, ?3)",
            params![probe_id, target.as_str(), at_str],
        )?;
        let state_id = tx.last_insert_rowid();

        let changed = match expected_state_id {
            Some(expected) => tx.execute(
                "UPDATE probes SET state = ?1, current_state_id = ?2
                 WHERE id = ?3 AND current_state_id = ?4",
                params![target.as_str(), state_id, probe_id, expected],
            )?,
            None => tx.execute(
                "UPDATE probes SET state = ?1, current_state_id = ?2
                 WHERE id = ?3 AND current_state_id IS NULL",
                params![target.as_str(), state_id, probe_id],
            )?,
        };

        if changed == 0 {
            tx.rollback()?;
            return Ok(None);
        }

        tx.commit()?;
        Ok(Some((state_id, event_id)))
    }

    /// Probe joined with its device MAC, for notification payloads.
    pub fn probe_snapshot(&self, probe_id: i64) -> Result<ProbeSnapshot, DbError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT p.id, d.mac, p.state, p.current_state_id, p.wan_ip, p.lan_ip,
                    p.latest_heartbeat_at, p.next_heartbeat_deadline
             FROM probes p JOIN devices d ON p.active_device_id = d.id
             WHERE p.id = ?1",
            params![probe_id],
            |row| {
                Ok(ProbeSnapshot {
                    probe_id: row.get(0)?,
                    mac: row.get(1)?,
                    state: state_from_sql(2, row.get(2)?)?,
                    current_state_id: row.get(3)?,
                    wan_ip: row.get(4)?,
                    lan_ip: row.get(5)?,
                    latest_heartbeat_at: opt_time(row, 6)?,
                    next_heartbeat_deadline: opt_time(row, 7)?,
                })
            },
        )
        .map_err(not_found)
    }

    // --- History ---

    /// Append an Event row outside a transition (registration milestones).
    pub fn insert_event(
        &self,
        probe_id: i64,
        event_type: &str,
        at: DateTime<Utc>,
    ) -> Result<EventRecord, DbError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO events (probe_id, event_type, timestamp) VALUES (?1, ?2, ?3)",
            params![probe_id, event_type, fmt_db_time(at)],
        )?;
        Ok(EventRecord {
            id: conn.last_insert_rowid(),
            probe_id,
            event_type: event_type.to_string(),
            timestamp: at,
        })
    }

    /// State history, optionally filtered to a probe, ordered by start.
    pub fn get_states(&self, probe_id: Option<i64>) -> Result<Vec<StateRecord>, DbError> {
        let conn = self.conn.lock().unwrap();
        let sql = "SELECT id, probe_id, state, start, end_time FROM states";
        let map = |row: &Row| -> SqlResult<StateRecord> {
            Ok(StateRecord {
                id: row.get(0)?,
                probe_id: row.get(1)?,
                state: state_from_sql(2, row.get(2)?)?,
                start: req_time(row, 3)?,
                end: opt_time(row, 4)?,
            })
        };
        let states = match probe_id {
            Some(id) => {
                let mut stmt =
                    conn.prepare(&format!("{} WHERE probe_id = ?1 ORDER BY start, id", sql))?;
                let rows = stmt.query_map(params![id], map)?.collect::<SqlResult<Vec<_>>>()?;
                rows
            }
            None => {
                let mut stmt = conn.prepare(&format!("{} ORDER BY start, id", sql))?;
                let rows = stmt.query_map([], map)?.collect::<SqlResult<Vec<_>>>()?;
                rows
            }
        };
        Ok(states)
    }

    /// Event log, optionally filtered to a probe, in append order.
    pub fn get_events(&self, probe_id: Option<i64>) -> Result<Vec<EventRecord>, DbError> {
        let conn = self.conn.lock().unwrap();
        let sql = "SELECT id, probe_id, event_type, timestamp FROM events";
        let map = |row: &Row| -> SqlResult<EventRecord> {
            Ok(EventRecord {
                id: row.get(0)?,
                probe_id: row.get(1)?,
                event_type: row.get(2)?,
                timestamp: req_time(row, 3)?,
            })
        };
        let events = match probe_id {
            Some(id) => {
                let mut stmt = conn.prepare(&format!("{} WHERE probe_id = ?1 ORDER BY id", sql))?;
                let rows = stmt.query_map(params![id], map)?.collect::<SqlResult<Vec<_>>>()?;
                rows
            }
            None => {
                let mut stmt = conn.prepare(&format!("{} ORDER BY id", sql))?;
                let rows = stmt.query_map([], map)?.collect::<SqlResult<Vec<_>>>()?;
                rows
            }
        };
        Ok(events)
    }

    // --- Observations ---

    /// Append a heartbeat report and set its ID.
    pub fn insert_heartbeat(&self, hb: &mut Heartbeat) -> Result<i64, DbError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO heartbeats (probe_id, timestamp, wan_ip, lan_ip, server, success, error, latency)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                hb.probe_id,
                fmt_db_time(hb.timestamp),
                hb.wan_ip,
                hb.lan_ip,
                hb.server,
                hb.success,
                hb.error,
                hb.latency,
            ],
        )?;
        hb.id = conn.last_insert_rowid();
        Ok(hb.id)
    }

    /// Append a speed-test report and set its ID.
    pub fn insert_speed_test(&self, st: &mut SpeedTest) -> Result<i64, DbError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO speedtests (probe_id, timestamp, wan_ip, lan_ip, server, success, error, latency, down, up)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                st.probe_id,
                fmt_db_time(st.timestamp),
                st.wan_ip,
                st.lan_ip,
                st.server,
                st.success,
                st.error,
                st.latency,
                st.down,
                st.up,
            ],
        )?;
        st.id = conn.last_insert_rowid();
        Ok(st.id)
    }

    /// Get all heartbeat reports.
    pub fn get_heartbeats(&self) -> Result<Vec<Heartbeat>, DbError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, probe_id, timestamp, wan_ip, lan_ip, server, success, error, latency
             FROM heartbeats ORDER BY id",
        )?;
        let heartbeats = stmt
            .query_map([], |row| {
                Ok(Heartbeat {
                    id: row.get(0)?,
                    probe_id: row.get(1)?,
                    timestamp: req_time(row, 2)?,
                    wan_ip: row.get(3)?,
                    lan_ip: row.get(4)?,
                    server: row.get(5)?,
                    success: row.get(6)?,
                    error: row.get(7)?,
                    latency: row.get(8)?,
                })
            })?
            .collect::<SqlResult<Vec<_>>>()?;
        Ok(heartbeats)
    }

    /// Get all speed-test reports.
    pub fn get_speed_tests(&self) -> Result<Vec<SpeedTest>, DbError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, probe_id, timestamp, wan_ip, lan_ip, server, success, error, latency, down, up
             FROM speedtests ORDER BY id",
        )?;
        let tests = stmt
            .query_map([], |row| {
                Ok(SpeedTest {
                    id: row.get(0)?,
                    probe_id: row.get(1)?,
                    timestamp: req_time(row, 2)?,
                    wan_ip: row.get(3)?,
                    lan_ip: row.get(4)?,
                    server: row.get(5)?,
                    success: row.get(6)?,
                    error: row.get(7)?,
                    latency: row.get(8)?,
                    down: row.get(9)?,
                    up: row.get(10)?,
                })
            })?
            .collect::<SqlResult<Vec<_>>>()?;
        Ok(tests)
    }
}

const SELECT_PROBE: &str = "SELECT id, active_device_id, state, current_state_id,
    latest_heartbeat_at, next_heartbeat_deadline, wan_ip, lan_ip FROM probes";

fn probe_from_row(row: &Row) -> SqlResult<Probe> {
    Ok(Probe {
        id: row.get(0)?,
        active_device_id: row.get(1)?,
        state: state_from_sql(2, row.get(2)?)?,
        current_state_id: row.get(3)?,
        latest_heartbeat_at: opt_time(row, 4)?,
        next_heartbeat_deadline: opt_time(row, 5)?,
        wan_ip: row.get(6)?,
        lan_ip: row.get(7)?,
    })
}

fn state_from_sql(idx: usize, s: String) -> SqlResult<ProbeState> {
    ProbeState::parse(&s).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("unknown probe state '{}'", s).into(),
        )
    })
}

fn req_time(row: &Row, idx: usize) -> SqlResult<DateTime<Utc>> {
    let s: String = row.get(idx)?;
    Ok(parse_db_time(&s).unwrap_or_else(Utc::now))
}

fn opt_time(row: &Row, idx: usize) -> SqlResult<Option<DateTime<Utc>>> {
    let s: Option<String> = row.get(idx)?;
    Ok(s.and_then(|s| parse_db_time(&s)))
}

fn not_found(e: rusqlite::Error) -> DbError {
    match e {
        rusqlite::Error::QueryReturnedNoRows => DbError::NotFound,
        other => DbError::Sqlite(other),
    }
}

/// Format a timestamp for storage. Fixed-width, so lexicographic comparison
/// in SQL matches chronological order.
pub fn fmt_db_time(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%d %H:%M:%S%.9f").to_string()
}

/// Parse a datetime string from the database.
pub fn parse_db_time(s: &str) -> Option<DateTime<Utc>> {
    let formats = [
        "%Y-%m-%d %H:%M:%S%.9f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
    ];

    for fmt in &formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(DateTime::from_naive_utc_and_offset(dt, Utc));
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use tempfile::NamedTempFile;

    fn test_store() -> (NamedTempFile, Store) {
        let tmp = NamedTempFile::new().unwrap();
        let store = Store::new(tmp.path()).unwrap();
        (tmp, store)
    }

    #[test]
    fn test_register_probe() {
        let (_tmp, store) = test_store();

        let (device, probe) = store
            .register_probe("aa:bb:cc:dd:ee:ff", "1.2.3.4", "192.168.1.2", Utc::now())
            .unwrap();
        assert!(device.id > 0);
        assert_eq!(probe.active_device_id, device.id);
        assert_eq!(probe.state, ProbeState::New);

        // The initial State row is open and the probe points at it.
        let states = store.get_states(Some(probe.id)).unwrap();
        assert_eq!(states.len(), 1);
        assert_eq!(states[0].end, None);
        assert_eq!(probe.current_state_id, Some(states[0].id));

        let found = store.find_device_by_mac("aa:bb:cc:dd:ee:ff").unwrap().unwrap();
        assert_eq!(found.id, device.id);
        assert!(store.find_device_by_mac("00:00:00:00:00:00").unwrap().is_none());

        let by_device = store.find_probe_by_device(device.id).unwrap();
        assert_eq!(by_device.id, probe.id);
    }

    #[test]
    fn test_get_probe_not_found() {
        let (_tmp, store) = test_store();
        assert!(matches!(store.get_probe(42), Err(DbError::NotFound)));
    }

    #[test]
    fn test_commit_transition_and_stale_pointer() {
        let (_tmp, store) = test_store();
        let (_, probe) = store
            .register_probe("aa:bb:cc:dd:ee:ff", "", "", Utc::now())
            .unwrap();

        let committed = store
            .commit_transition(
                probe.id,
                probe.current_state_id,
                ProbeState::Up,
                "probe.up",
                Utc::now(),
            )
            .unwrap();
        let (new_state_id, event_id) = committed.unwrap();
        assert!(event_id > 0);

        let reread = store.get_probe(probe.id).unwrap();
        assert_eq!(reread.state, ProbeState::Up);
        assert_eq!(reread.current_state_id, Some(new_state_id));

        // Retrying with the stale pointer loses the race and writes nothing.
        let states_before = store.get_states(Some(probe.id)).unwrap().len();
        let events_before = store.get_events(Some(probe.id)).unwrap().len();
        let lost = store
            .commit_transition(
                probe.id,
                probe.current_state_id,
                ProbeState::Down,
                "probe.down",
                Utc::now(),
            )
            .unwrap();
        assert!(lost.is_none());
        assert_eq!(store.get_states(Some(probe.id)).unwrap().len(), states_before);
        assert_eq!(store.get_events(Some(probe.id)).unwrap().len(), events_before);
        assert_eq!(store.get_probe(probe.id).unwrap().state, ProbeState::Up);
    }

    #[test]
    fn test_overdue_query_filters() {
        let (_tmp, store) = test_store();
        let now = Utc::now();

        // Up and past deadline: overdue.
        let (_, late) = store.register_probe("aa:aa:aa:aa:aa:01", "", "", now).unwrap();
        store
            .commit_transition(late.id, late.current_state_id, ProbeState::Up, "probe.up", now)
            .unwrap();
        store
            .update_heartbeat_fields(late.id, now, now - ChronoDuration::seconds(30))
            .unwrap();

        // Up with a future deadline: not overdue.
        let (_, fresh) = store.register_probe("aa:aa:aa:aa:aa:02", "", "", now).unwrap();
        store
            .commit_transition(fresh.id, fresh.current_state_id, ProbeState::Up, "probe.up", now)
            .unwrap();
        store
            .update_heartbeat_fields(fresh.id, now, now + ChronoDuration::seconds(300))
            .unwrap();

        // Never reported: no deadline, excluded.
        let (_, silent) = store.register_probe("aa:aa:aa:aa:aa:03", "", "", now).unwrap();
        store
            .commit_transition(silent.id, silent.current_state_id, ProbeState::Up, "probe.up", now)
            .unwrap();

        // Down with a past deadline: excluded.
        let (_, down) = store.register_probe("aa:aa:aa:aa:aa:04", "", "", now).unwrap();
        let (up_state, _) = store
            .commit_transition(down.id, down.current_state_id, ProbeState::Up, "probe.up", now)
            .unwrap()
            .unwrap();
        store
            .commit_transition(down.id, Some(up_state), ProbeState::Down, "probe.down", now)
            .unwrap()
            .unwrap();
        store
            .update_heartbeat_fields(down.id, now, now - ChronoDuration::seconds(30))
            .unwrap();

        let overdue = store.overdue_probes(now).unwrap();
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].id, late.id);
    }

    #[test]
    fn test_heartbeat_and_speedtest_append() {
        let (_tmp, store) = test_store();
        let (_, probe) = store
            .register_probe("aa:bb:cc:dd:ee:ff", "", "", Utc::now())
            .unwrap();

        let mut hb = Heartbeat {
            id: 0,
            probe_id: probe.id,
            timestamp: Utc::now(),
            wan_ip: "1.2.3.4".to_string(),
            lan_ip: "192.168.1.2".to_string(),
            server: "ping.example.com".to_string(),
            success: true,
            error: String::new(),
            latency: 12.5,
        };
        store.insert_heartbeat(&mut hb).unwrap();
        assert!(hb.id > 0);

        let mut st = SpeedTest {
            id: 0,
            probe_id: probe.id,
            timestamp: Utc::now(),
            wan_ip: "1.2.3.4".to_string(),
            lan_ip: "192.168.1.2".to_string(),
            server: "speed.example.com".to_string(),
            success: true,
            error: String::new(),
            latency: 20.0,
            down: 95.2,
            up: 10.1,
        };
        store.insert_speed_test(&mut st).unwrap();

        assert_eq!(store.get_heartbeats().unwrap().len(), 1);
        assert_eq!(store.get_speed_tests().unwrap().len(), 1);
        let fetched = &store.get_heartbeats().unwrap()[0];
        assert!(fetched.success);
        assert_eq!(fetched.server, "ping.example.com");
    }

    #[test]
    fn test_time_roundtrip() {
        let now = Utc::now();
        let parsed = parse_db_time(&fmt_db_time(now)).unwrap();
        assert_eq!(parsed.timestamp_micros(), now.timestamp_micros());
    }
}
