//! HTTP request handlers.
//!
//! All validation and coercion of probe reports happens here; the liveness
//! core only ever sees well-typed arguments.

use super::AppState;
use crate::db::{Heartbeat, SpeedTest};
use crate::liveness::LivenessError;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{Duration as ChronoDuration, Utc};
use serde::Deserialize;

// ============================================================================
// Report ingestion
// ============================================================================

/// Heartbeat report body. Field names match what the probe firmware sends.
#[derive(Debug, Deserialize)]
pub struct HeartbeatRequest {
    #[serde(rename = "MAC Address")]
    pub mac_address: String,
    /// Accepted for forward compatibility; not verified.
    #[allow(dead_code)]
    #[serde(rename = "API key")]
    pub api_key: String,
    #[serde(rename = "WAN IP")]
    pub wan_ip: String,
    #[serde(rename = "LAN IP")]
    pub lan_ip: String,
    #[serde(rename = "Ping server")]
    pub server: String,
    #[serde(rename = "Success")]
    pub success: bool,
    #[serde(rename = "Error")]
    pub error: String,
    #[serde(rename = "Latency")]
    pub latency: f64,
    /// Minutes until the probe promises to report again.
    #[serde(rename = "Next heartbeat")]
    pub next_heartbeat: i64,
}

pub async fn handle_heartbeat(
    State(state): State<AppState>,
    Json(req): Json<HeartbeatRequest>,
) -> impl IntoResponse {
    if req.next_heartbeat <= 0 {
        return (StatusCode::BAD_REQUEST, "Next heartbeat must be positive").into_response();
    }

    let (_, probe) = match state
        .machine
        .ensure_registered(&req.mac_address, &req.wan_ip, &req.lan_ip)
        .await
    {
        Ok(pair) => pair,
        Err(e) => return liveness_error(e),
    };

    let now = Utc::now();
    let mut heartbeat = Heartbeat {
        id: 0,
        probe_id: probe.id,
        timestamp: now,
        wan_ip: req.wan_ip.clone(),
        lan_ip: req.lan_ip.clone(),
        server: req.server,
        success: req.success,
        error: req.error,
        latency: req.latency,
    };
    if let Err(e) = state.store.insert_heartbeat(&mut heartbeat) {
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }

    if let Err(e) = state
        .store
        .update_probe_addresses(probe.id, &req.wan_ip, &req.lan_ip)
    {
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }

    let deadline = now + ChronoDuration::minutes(req.next_heartbeat);
    match state.machine.record_heartbeat(probe.id, deadline, now).await {
        Ok(_) => "All good!".into_response(),
        Err(e) => liveness_error(e),
    }
}

/// Speed-test report body.
#[derive(Debug, Deserialize)]
pub struct SpeedTestRequest {
    #[serde(rename = "MAC Address")]
    pub mac_address: String,
    #[allow(dead_code)]
    #[serde(rename = "API key")]
    pub api_key: String,
    #[serde(rename = "WAN IP")]
    pub wan_ip: String,
    #[serde(rename = "LAN IP")]
    pub lan_ip: String,
    #[serde(rename = "Speedtest server")]
    pub server: String,
    #[serde(rename = "Success")]
    pub success: bool,
    #[serde(rename = "Error")]
    pub error: String,
    #[serde(rename = "Latency")]
    pub latency: f64,
    #[serde(rename = "Down")]
    pub down: f64,
    #[serde(rename = "Up")]
    pub up: f64,
}

pub async fn handle_speedtest(
    State(state): State<AppState>,
    Json(req): Json<SpeedTestRequest>,
) -> impl IntoResponse {
    let (_, probe) = match state
        .machine
        .ensure_registered(&req.mac_address, &req.wan_ip, &req.lan_ip)
        .await
    {
        Ok(pair) => pair,
        Err(e) => return liveness_error(e),
    };

    // Observation only: speed tests never refresh the heartbeat deadline.
    let mut test = SpeedTest {
        id: 0,
        probe_id: probe.id,
        timestamp: Utc::now(),
        wan_ip: req.wan_ip,
        lan_ip: req.lan_ip,
        server: req.server,
        success: req.success,
        error: req.error,
        latency: req.latency,
        down: req.down,
        up: req.up,
    };
    match state.store.insert_speed_test(&mut test) {
        Ok(_) => "All good!".into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

// ============================================================================
// Read-only listings
// ============================================================================

pub async fn handle_get_devices(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.get_devices() {
        Ok(devices) => Json(devices).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

pub async fn handle_get_probes(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.get_probes() {
        Ok(probes) => Json(probes).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

pub async fn handle_get_states(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.get_states(None) {
        Ok(states) => Json(states).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

pub async fn handle_get_events(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.get_events(None) {
        Ok(events) => Json(events).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

pub async fn handle_get_heartbeats(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.get_heartbeats() {
        Ok(heartbeats) => Json(heartbeats).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

pub async fn handle_get_speedtests(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.get_speed_tests() {
        Ok(tests) => Json(tests).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

fn liveness_error(e: LivenessError) -> axum::response::Response {
    let status = match &e {
        LivenessError::NotFound(_) => StatusCode::NOT_FOUND,
        LivenessError::InvalidState(_) => StatusCode::BAD_REQUEST,
        LivenessError::Conflict { .. } => StatusCode::CONFLICT,
        LivenessError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.to_string()).into_response()
}
