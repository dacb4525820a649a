//! /status handler.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use super::{lock_error, ApiState};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    /// Open device sockets, identified or not.
    pub connections: usize,
    /// Addresses with a bound connection.
    pub bound_devices: usize,
    /// Records in the directory.
    pub devices: usize,
    /// Records the directory believes connected.
    pub connected_devices: usize,
    pub now_ms: u64,
}

pub async fn handle_status(
    State(state): State<ApiState>,
) -> Result<Json<StatusResponse>, (StatusCode, String)> {
    let records = state.directory.list().map_err(lock_error)?;
    let connected_devices = records.iter().filter(|r| r.connected).count();

    Ok(Json(StatusResponse {
        connections: state.registry.len(),
        bound_devices: state.registry.bound_count(),
        devices: records.len(),
        connected_devices,
        now_ms: state.clock.now_ms(),
    }))
}
