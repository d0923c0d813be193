//! Database model types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Liveness state of a probe.
///
/// `New` is only ever assigned at registration; after the first heartbeat a
/// probe moves between `Up` and `Down` for the rest of its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeState {
    New,
    Up,
    Down,
}

impl ProbeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeState::New => "New",
            ProbeState::Up => "Up",
            ProbeState::Down => "Down",
        }
    }

    /// Parse a state name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "new" => Some(ProbeState::New),
            "up" => Some(ProbeState::Up),
            "down" => Some(ProbeState::Down),
            _ => None,
        }
    }
}

impl fmt::Display for ProbeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A physical device, identified by MAC address. Created once per unique MAC.
#[derive(Debug, Clone, Serialize)]
pub struct Device {
    pub id: i64,
    pub mac: String,
}

/// A monitored probe. The only mutable entity in the store.
///
/// `state` is denormalized for fast reads; `current_state_id` points at the
/// single open row in `states` and is the source of truth for the open
/// interval.
#[derive(Debug, Clone, Serialize)]
pub struct Probe {
    pub id: i64,
    pub active_device_id: i64,
    pub state: ProbeState,
    pub current_state_id: Option<i64>,
    pub latest_heartbeat_at: Option<DateTime<Utc>>,
    pub next_heartbeat_deadline: Option<DateTime<Utc>>,
    pub wan_ip: String,
    pub lan_ip: String,
}

/// One interval of a probe's state history. Exactly one row per probe has
/// `end: None` at any time.
#[derive(Debug, Clone, Serialize)]
pub struct StateRecord {
    pub id: i64,
    pub probe_id: i64,
    pub state: ProbeState,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

/// Append-only audit log entry (`probe.created`, `probe.linked`, `probe.up`,
/// `probe.down`).
#[derive(Debug, Clone, Serialize)]
pub struct EventRecord {
    pub id: i64,
    pub probe_id: i64,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
}

/// A single heartbeat report, recorded regardless of whether it changed the
/// probe's state.
#[derive(Debug, Clone, Serialize)]
pub struct Heartbeat {
    pub id: i64,
    pub probe_id: i64,
    pub timestamp: DateTime<Utc>,
    pub wan_ip: String,
    pub lan_ip: String,
    pub server: String,
    pub success: bool,
    pub error: String,
    /// Ping latency in milliseconds.
    pub latency: f64,
}

/// A speed-test report. Observation only; never drives a state transition.
#[derive(Debug, Clone, Serialize)]
pub struct SpeedTest {
    pub id: i64,
    pub probe_id: i64,
    pub timestamp: DateTime<Utc>,
    pub wan_ip: String,
    pub lan_ip: String,
    pub server: String,
    pub success: bool,
    pub error: String,
    pub latency: f64,
    /// Downstream throughput in Mbps.
    pub down: f64,
    /// Upstream throughput in Mbps.
    pub up: f64,
}

/// Probe joined with its device, as shipped in webhook payloads.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeSnapshot {
    pub probe_id: i64,
    pub mac: String,
    pub state: ProbeState,
    pub current_state_id: Option<i64>,
    pub wan_ip: String,
    pub lan_ip: String,
    pub latest_heartbeat_at: Option<DateTime<Utc>>,
    pub next_heartbeat_deadline: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_parse_case_insensitive() {
        assert_eq!(ProbeState::parse("up"), Some(ProbeState::Up));
        assert_eq!(ProbeState::parse("Up"), Some(ProbeState::Up));
        assert_eq!(ProbeState::parse("DOWN"), Some(ProbeState::Down));
        assert_eq!(ProbeState::parse("new"), Some(ProbeState::New));
        assert_eq!(ProbeState::parse("sideways"), None);
    }
}
