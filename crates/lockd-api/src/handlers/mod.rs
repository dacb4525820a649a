//! HTTP API handlers — exposes the directory and the command router as JSON.

pub mod devices;
pub mod status;

use axum::http::StatusCode;

use lockd_core::{LockError, SharedClock};
use lockd_services::{CommandRouter, ConnectionRegistry, SharedDirectory};

#[derive(Clone)]
pub struct ApiState {
    pub directory: SharedDirectory,
    pub registry: ConnectionRegistry,
    pub router: CommandRouter,
    pub clock: SharedClock,
}

// ── Shared helpers ────────────────────────────────────────────────────────────

/// Map a router/directory failure onto an HTTP status.
fn lock_error(e: LockError) -> (StatusCode, String) {
    let status = match &e {
        LockError::NotFound(_) => StatusCode::NOT_FOUND,
        LockError::DeviceUnreachable(_) | LockError::DuplicateKey(_) => StatusCode::CONFLICT,
        LockError::PersistenceFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.to_string())
}

// Re-export handler functions for use in router setup.
pub use devices::{
    handle_device, handle_device_command, handle_device_remove, handle_device_rename,
    handle_devices,
};
pub use status::handle_status;
