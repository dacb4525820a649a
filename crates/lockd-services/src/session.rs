//! Session driver: runs the handshake state machine for one socket and
//! carries out its effects against the directory and registry.
//!
//! Every failure here is per-device: it is logged and the connection
//! keeps running.

use rand::distributions::Alphanumeric;
use rand::Rng;

use lockd_core::{DevicePatch, DeviceMessage, DeviceRecord, LockError, SharedClock, WireError};

use crate::directory::SharedDirectory;
use crate::handshake::{step, Effect, HandshakeEvent, HandshakeState};
use crate::liveness::record_pong;
use crate::registry::{ConnectionHandle, ConnectionRegistry};

/// What first contact did to the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciled {
    Created { id: String },
    Refreshed,
    /// A concurrent handshake created the record first; ours was dropped.
    LostRace,
}

pub struct DeviceSession {
    conn: ConnectionHandle,
    state: HandshakeState,
    directory: SharedDirectory,
    registry: ConnectionRegistry,
    clock: SharedClock,
}

impl DeviceSession {
    pub fn new(
        conn: ConnectionHandle,
        directory: SharedDirectory,
        registry: ConnectionRegistry,
        clock: SharedClock,
    ) -> Self {
        Self {
            conn,
            state: HandshakeState::ConnectedUnknown,
            directory,
            registry,
            clock,
        }
    }

    pub fn state(&self) -> &HandshakeState {
        &self.state
    }

    pub fn connection(&self) -> &ConnectionHandle {
        &self.conn
    }

    /// Socket accepted: ask the device who it is.
    pub fn open(&mut self) {
        self.dispatch(HandshakeEvent::Opened);
    }

    pub fn on_text(&mut self, text: &str) {
        let event = match DeviceMessage::decode(text) {
            Ok(msg) => HandshakeEvent::Message(msg),
            Err(e) => HandshakeEvent::Malformed(e),
        };
        self.dispatch(event);
    }

    pub fn on_binary(&mut self, len: usize) {
        self.dispatch(HandshakeEvent::Malformed(WireError::Malformed(format!(
            "unexpected binary frame ({len} bytes)"
        ))));
    }

    pub fn close(&mut self) {
        self.dispatch(HandshakeEvent::SocketClosed);
    }

    fn dispatch(&mut self, event: HandshakeEvent) {
        let (next, effects) = step(&self.state, event);
        self.state = next;
        for effect in effects {
            self.apply(effect);
        }
    }

    fn apply(&self, effect: Effect) {
        let connection = self.conn.id();
        match effect {
            Effect::Send(msg) => {
                if let Err(e) = self.conn.send(msg) {
                    tracing::debug!(connection, error = %e, "send dropped");
                }
            }
            Effect::Reconcile { address } => {
                match reconcile(&self.directory, &address, self.clock.now_ms()) {
                    Ok(Reconciled::Created { id }) => {
                        tracing::info!(address = %address, id = %id, "new lock registered");
                    }
                    Ok(Reconciled::Refreshed) => {
                        tracing::info!(address = %address, "lock is active, lastSeen refreshed");
                    }
                    Ok(Reconciled::LostRace) => {
                        tracing::warn!(address = %address, "lock already exists, skipping insertion");
                    }
                    Err(e) => {
                        tracing::warn!(address = %address, error = %e, "failed to reconcile lock");
                    }
                }
            }
            Effect::Bind { address } => {
                self.registry.bind(&self.conn, &address);
                tracing::debug!(connection, address = %address, "connection identified");
            }
            Effect::RecordPong { address } => {
                match record_pong(&self.directory, &address, self.clock.now_ms()) {
                    Ok(()) => tracing::debug!(address = %address, "heartbeat response"),
                    Err(e) => tracing::warn!(address = %address, error = %e, "pong not recorded"),
                }
            }
            Effect::RecordReport { address, status } => {
                match self.directory.update(&address, &DevicePatch::reported(status)) {
                    Ok(()) => tracing::info!(address = %address, status = status.as_str(), "device reported status"),
                    Err(e) => tracing::warn!(address = %address, error = %e, "status report not recorded"),
                }
            }
            Effect::Unbind => {
                // A superseded connection no longer answers for its device.
                match self.registry.bound_address(connection) {
                    Some(address) => {
                        tracing::info!(connection, address = %address, "device disconnected");
                    }
                    None => tracing::debug!(connection, "unbound connection closed"),
                }
                self.registry.deregister(connection);
            }
            Effect::Discard { reason } => {
                tracing::warn!(connection, reason = %reason, "inbound frame discarded");
            }
        }
    }
}

/// Bring the directory in line with a device that just announced itself.
///
/// Not found → create. The conditional create is what collapses concurrent
/// first contacts: the loser sees `DuplicateKey` and reports `LostRace`.
pub fn reconcile(
    directory: &SharedDirectory,
    address: &str,
    now_ms: u64,
) -> Result<Reconciled, LockError> {
    if directory.find(address)?.is_some() {
        return refresh(directory, address, now_ms);
    }

    let id = generate_id();
    match directory.create(DeviceRecord::first_contact(id.clone(), address, now_ms)) {
        Ok(()) => Ok(Reconciled::Created { id }),
        Err(LockError::DuplicateKey(_)) => Ok(Reconciled::LostRace),
        Err(e) => Err(e),
    }
}

fn refresh(directory: &SharedDirectory, address: &str, now_ms: u64) -> Result<Reconciled, LockError> {
    match directory.update(address, &DevicePatch::seen(now_ms)) {
        Ok(()) => Ok(Reconciled::Refreshed),
        // Removed between find and update. Leave it removed.
        Err(LockError::NotFound(_)) => Ok(Reconciled::LostRace),
        Err(e) => Err(e),
    }
}

/// `lock_` followed by five random alphanumerics.
pub fn generate_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(5)
        .map(char::from)
        .collect();
    format!("lock_{suffix}")
}
