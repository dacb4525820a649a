//! /devices handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use lockd_core::{DeviceRecord, LockCommand, LockStatus};

use super::{lock_error, ApiState};

// ── /devices (GET) ────────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DevicesResponse {
    pub devices: Vec<DeviceRecord>,
}

pub async fn handle_devices(
    State(state): State<ApiState>,
) -> Result<Json<DevicesResponse>, (StatusCode, String)> {
    let devices = state.directory.list().map_err(lock_error)?;
    Ok(Json(DevicesResponse { devices }))
}

// ── /devices/{address} (GET) ──────────────────────────────────────────────────

pub async fn handle_device(
    State(state): State<ApiState>,
    Path(address): Path<String>,
) -> Result<Json<DeviceRecord>, (StatusCode, String)> {
    state
        .directory
        .find(&address)
        .map_err(lock_error)?
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, format!("no device record for {address}")))
}

// ── /devices/{address}/command (POST) ─────────────────────────────────────────

#[derive(Deserialize)]
pub struct CommandRequest {
    pub command: LockCommand,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResponse {
    pub mac_address: String,
    pub status: LockStatus,
}

pub async fn handle_device_command(
    State(state): State<ApiState>,
    Path(address): Path<String>,
    body: Result<Json<CommandRequest>, JsonRejection>,
) -> Result<Json<CommandResponse>, (StatusCode, String)> {
    let Json(req) = body.map_err(|e| (StatusCode::BAD_REQUEST, e.body_text()))?;

    state
        .router
        .send_command(&address, req.command)
        .map_err(lock_error)?;

    Ok(Json(CommandResponse {
        mac_address: address,
        status: req.command.resulting_status(),
    }))
}

// ── /devices/{address}/name (POST) ────────────────────────────────────────────

#[derive(Deserialize)]
pub struct RenameRequest {
    pub name: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameResponse {
    pub mac_address: String,
    pub name: String,
}

pub async fn handle_device_rename(
    State(state): State<ApiState>,
    Path(address): Path<String>,
    body: Result<Json<RenameRequest>, JsonRejection>,
) -> Result<Json<RenameResponse>, (StatusCode, String)> {
    let Json(req) = body.map_err(|e| (StatusCode::BAD_REQUEST, e.body_text()))?;
    let name = req.name.trim();
    if name.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "name must not be empty".to_string()));
    }

    state
        .router
        .rename_device(&address, name)
        .map_err(lock_error)?;

    Ok(Json(RenameResponse {
        mac_address: address,
        name: name.to_string(),
    }))
}

// ── /devices/{address} (DELETE) ───────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveResponse {
    pub mac_address: String,
    pub removed: bool,
}

pub async fn handle_device_remove(
    State(state): State<ApiState>,
    Path(address): Path<String>,
) -> Result<Json<RemoveResponse>, (StatusCode, String)> {
    let removed = state.router.remove_device(&address).map_err(lock_error)?;

    Ok(Json(RemoveResponse {
        mac_address: address,
        removed,
    }))
}
