//! Persisted shape of one lock controller.

use serde::{Deserialize, Serialize};

/// Last-known bolt position of a lock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LockStatus {
    #[default]
    Locked,
    Unlocked,
}

impl LockStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockStatus::Locked => "LOCKED",
            LockStatus::Unlocked => "UNLOCKED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "LOCKED" => Some(LockStatus::Locked),
            "UNLOCKED" => Some(LockStatus::Unlocked),
            _ => None,
        }
    }
}

/// A lock/unlock instruction a caller may route to a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LockCommand {
    Lock,
    Unlock,
}

impl LockCommand {
    /// Status recorded once the command has been delivered.
    pub fn resulting_status(self) -> LockStatus {
        match self {
            LockCommand::Lock => LockStatus::Locked,
            LockCommand::Unlock => LockStatus::Unlocked,
        }
    }
}

/// One record per physical device, keyed by `mac_address`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    /// Surrogate key assigned at creation.
    pub id: String,
    pub mac_address: String,
    pub name: String,
    pub status: LockStatus,
    /// Unix milliseconds of the last handshake, pong or routed command.
    pub last_seen: u64,
    pub connected: bool,
}

impl DeviceRecord {
    /// Record created on first contact: locked, connected, named after its id.
    pub fn first_contact(id: String, mac_address: &str, now_ms: u64) -> Self {
        Self {
            name: default_name(&id),
            id,
            mac_address: mac_address.to_string(),
            status: LockStatus::Locked,
            last_seen: now_ms,
            connected: true,
        }
    }

    pub fn apply(&mut self, patch: &DevicePatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(last_seen) = patch.last_seen {
            self.last_seen = last_seen;
        }
        if let Some(connected) = patch.connected {
            self.connected = connected;
        }
    }
}

pub fn default_name(id: &str) -> String {
    format!("Lock_{id}")
}

/// Field-level update. Unset fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DevicePatch {
    pub name: Option<String>,
    pub status: Option<LockStatus>,
    pub last_seen: Option<u64>,
    pub connected: Option<bool>,
}

impl DevicePatch {
    /// Device was heard from: refresh `last_seen` and mark it connected.
    pub fn seen(now_ms: u64) -> Self {
        Self {
            last_seen: Some(now_ms),
            connected: Some(true),
            ..Self::default()
        }
    }

    /// Heartbeat window expired without a pong.
    pub fn demoted() -> Self {
        Self {
            connected: Some(false),
            ..Self::default()
        }
    }

    /// A command was routed to the device.
    pub fn commanded(status: LockStatus, now_ms: u64) -> Self {
        Self {
            status: Some(status),
            last_seen: Some(now_ms),
            ..Self::default()
        }
    }

    /// The device reported its own bolt position.
    pub fn reported(status: LockStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn renamed(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }
}
