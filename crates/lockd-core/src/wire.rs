//! lockd wire format — JSON text frames exchanged with lock controllers.
//!
//! Every frame is a flat JSON object with optional `request`, `response`,
//! `macAddress` and `command` fields. The field combination decides what
//! the frame means:
//!
//! | Direction | Fields | Meaning |
//! |---|---|---|
//! | server → device | `request: "SEND_MAC"` | identity request |
//! | device → server | `macAddress` | identity announcement |
//! | server → device | `request: "PING"`, `macAddress` | liveness ping |
//! | device → server | `response: "PONG"`, `macAddress` | liveness reply |
//! | server → device | `macAddress`, `command` | directed instruction |
//! | device → server | `macAddress`, `command` | status report |
//!
//! Inbound frames are classified once at the boundary into [`DeviceMessage`].
//! Anything that does not fit a known shape is a [`WireError`].

use serde::{Deserialize, Serialize};

use crate::device::{LockCommand, LockStatus};

// ── Raw frame ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum RequestKind {
    SendMac,
    Ping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum ResponseKind {
    Pong,
}

/// A frame exactly as it appears on the wire, before classification.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    request: Option<RequestKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    response: Option<ResponseKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mac_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    command: Option<DeviceCommand>,
}

// ── Commands ──────────────────────────────────────────────────────────────────

/// Instruction carried in the `command` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceCommand {
    Lock,
    Unlock,
    /// Tells the device to drop its connection and forget the server.
    Disconnect,
}

impl From<LockCommand> for DeviceCommand {
    fn from(c: LockCommand) -> Self {
        match c {
            LockCommand::Lock => DeviceCommand::Lock,
            LockCommand::Unlock => DeviceCommand::Unlock,
        }
    }
}

// ── Server → device ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "Frame", try_from = "Frame")]
pub enum ServerMessage {
    IdentityRequest,
    Ping { mac_address: String },
    Command { mac_address: String, command: DeviceCommand },
}

impl ServerMessage {
    pub fn encode(&self) -> Result<String, WireError> {
        serde_json::to_string(self).map_err(|e| WireError::Malformed(e.to_string()))
    }

    pub fn decode(text: &str) -> Result<Self, WireError> {
        decode_frame(text)
    }

    /// Address the message is directed at, if any.
    pub fn target(&self) -> Option<&str> {
        match self {
            ServerMessage::IdentityRequest => None,
            ServerMessage::Ping { mac_address } | ServerMessage::Command { mac_address, .. } => {
                Some(mac_address)
            }
        }
    }
}

impl From<ServerMessage> for Frame {
    fn from(m: ServerMessage) -> Self {
        match m {
            ServerMessage::IdentityRequest => Frame {
                request: Some(RequestKind::SendMac),
                ..Frame::default()
            },
            ServerMessage::Ping { mac_address } => Frame {
                request: Some(RequestKind::Ping),
                mac_address: Some(mac_address),
                ..Frame::default()
            },
            ServerMessage::Command {
                mac_address,
                command,
            } => Frame {
                mac_address: Some(mac_address),
                command: Some(command),
                ..Frame::default()
            },
        }
    }
}

impl TryFrom<Frame> for ServerMessage {
    type Error = WireError;

    fn try_from(f: Frame) -> Result<Self, WireError> {
        let mac = f.mac_address.map(non_empty).transpose()?;
        match (f.request, f.response, mac, f.command) {
            (Some(RequestKind::SendMac), None, None, None) => Ok(ServerMessage::IdentityRequest),
            (Some(RequestKind::Ping), None, Some(mac_address), None) => {
                Ok(ServerMessage::Ping { mac_address })
            }
            (None, None, Some(mac_address), Some(command)) => Ok(ServerMessage::Command {
                mac_address,
                command,
            }),
            _ => Err(WireError::UnknownShape),
        }
    }
}

// ── Device → server ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "Frame", try_from = "Frame")]
pub enum DeviceMessage {
    /// The device announces its hardware address.
    Announce { mac_address: String },
    /// Heartbeat reply.
    Pong { mac_address: String },
    /// The device reports a command it executed.
    Report { mac_address: String, command: DeviceCommand },
}

impl DeviceMessage {
    pub fn encode(&self) -> Result<String, WireError> {
        serde_json::to_string(self).map_err(|e| WireError::Malformed(e.to_string()))
    }

    pub fn decode(text: &str) -> Result<Self, WireError> {
        decode_frame(text)
    }

    pub fn mac_address(&self) -> &str {
        match self {
            DeviceMessage::Announce { mac_address }
            | DeviceMessage::Pong { mac_address }
            | DeviceMessage::Report { mac_address, .. } => mac_address,
        }
    }

    /// Status a report implies, if the reported command moves the bolt.
    pub fn reported_status(&self) -> Option<LockStatus> {
        match self {
            DeviceMessage::Report {
                command: DeviceCommand::Lock,
                ..
            } => Some(LockStatus::Locked),
            DeviceMessage::Report {
                command: DeviceCommand::Unlock,
                ..
            } => Some(LockStatus::Unlocked),
            _ => None,
        }
    }
}

impl From<DeviceMessage> for Frame {
    fn from(m: DeviceMessage) -> Self {
        match m {
            DeviceMessage::Announce { mac_address } => Frame {
                mac_address: Some(mac_address),
                ..Frame::default()
            },
            DeviceMessage::Pong { mac_address } => Frame {
                response: Some(ResponseKind::Pong),
                mac_address: Some(mac_address),
                ..Frame::default()
            },
            DeviceMessage::Report {
                mac_address,
                command,
            } => Frame {
                mac_address: Some(mac_address),
                command: Some(command),
                ..Frame::default()
            },
        }
    }
}

impl TryFrom<Frame> for DeviceMessage {
    type Error = WireError;

    fn try_from(f: Frame) -> Result<Self, WireError> {
        let mac = f.mac_address.map(non_empty).transpose()?;
        match (f.request, f.response, mac, f.command) {
            (None, Some(ResponseKind::Pong), Some(mac_address), None) => {
                Ok(DeviceMessage::Pong { mac_address })
            }
            (None, None, Some(mac_address), Some(command)) => Ok(DeviceMessage::Report {
                mac_address,
                command,
            }),
            (None, None, Some(mac_address), None) => Ok(DeviceMessage::Announce { mac_address }),
            _ => Err(WireError::UnknownShape),
        }
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn non_empty(mac: String) -> Result<String, WireError> {
    let trimmed = mac.trim();
    if trimmed.is_empty() {
        return Err(WireError::EmptyAddress);
    }
    Ok(trimmed.to_string())
}

fn decode_frame<T: serde::de::DeserializeOwned>(text: &str) -> Result<T, WireError> {
    serde_json::from_str(text).map_err(|e| WireError::Malformed(e.to_string()))
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors that can arise when interpreting an inbound frame.
///
/// All of them take the same path: logged, frame discarded, connection kept.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("malformed frame: {0}")]
    Malformed(String),

    #[error("frame does not match any known message shape")]
    UnknownShape,

    #[error("empty macAddress")]
    EmptyAddress,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
