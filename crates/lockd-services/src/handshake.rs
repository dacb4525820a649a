//! Identity handshake — per-connection state machine.
//!
//! `CONNECTED_UNKNOWN → IDENTIFIED → CLOSED`. [`step`] is pure: it maps the
//! current state and one event to the next state plus the effects the
//! session driver must carry out against the directory and registry.

use lockd_core::{DeviceMessage, LockStatus, ServerMessage, WireError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeState {
    /// Socket open, address not yet announced.
    ConnectedUnknown,
    Identified { address: String },
    Closed,
}

impl HandshakeState {
    pub fn address(&self) -> Option<&str> {
        match self {
            HandshakeState::Identified { address } => Some(address),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeEvent {
    Opened,
    Message(DeviceMessage),
    Malformed(WireError),
    SocketClosed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Send(ServerMessage),
    /// Create-if-absent or refresh the directory record for `address`.
    Reconcile { address: String },
    Bind { address: String },
    /// Heartbeat reply: refresh `lastSeen` and `connected`.
    RecordPong { address: String },
    RecordReport { address: String, status: LockStatus },
    Unbind,
    /// Log and drop the inbound frame; the connection stays up.
    Discard { reason: String },
}

pub fn step(state: &HandshakeState, event: HandshakeEvent) -> (HandshakeState, Vec<Effect>) {
    use HandshakeEvent as Ev;
    use HandshakeState as St;

    match (state, event) {
        (St::Closed, _) => (St::Closed, Vec::new()),

        (_, Ev::SocketClosed) => (St::Closed, vec![Effect::Unbind]),

        (St::ConnectedUnknown, Ev::Opened) => (
            St::ConnectedUnknown,
            vec![Effect::Send(ServerMessage::IdentityRequest)],
        ),
        (St::Identified { .. }, Ev::Opened) => (state.clone(), Vec::new()),

        (_, Ev::Message(DeviceMessage::Announce { mac_address })) => (
            St::Identified {
                address: mac_address.clone(),
            },
            vec![
                Effect::Reconcile {
                    address: mac_address.clone(),
                },
                Effect::Bind {
                    address: mac_address,
                },
            ],
        ),

        (_, Ev::Message(DeviceMessage::Pong { mac_address })) => (
            state.clone(),
            vec![Effect::RecordPong {
                address: mac_address,
            }],
        ),

        (_, Ev::Message(report @ DeviceMessage::Report { .. })) => {
            let effect = match report.reported_status() {
                Some(status) => Effect::RecordReport {
                    address: report.mac_address().to_string(),
                    status,
                },
                None => Effect::Discard {
                    reason: format!("device-sent command ignored: {report:?}"),
                },
            };
            (state.clone(), vec![effect])
        }

        (_, Ev::Malformed(err)) => (
            state.clone(),
            vec![Effect::Discard {
                reason: err.to_string(),
            }],
        ),
    }
}
