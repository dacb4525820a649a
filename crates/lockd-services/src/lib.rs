//! lockd-services — the device session and command-routing subsystem.
//!
//! Leaves first: the [`Directory`] stores one record per device address,
//! the [`ConnectionRegistry`] maps addresses to live connections, the
//! [`handshake`] state machine resolves anonymous sockets into addresses,
//! the [`LivenessMonitor`] demotes silent devices and the [`CommandRouter`]
//! turns caller intents into directed wire messages.

pub mod directory;
pub mod handshake;
pub mod liveness;
pub mod registry;
pub mod router;
pub mod scheduler;
pub mod session;

pub use directory::{open_directory, Directory, MemoryDirectory, SharedDirectory, SqliteDirectory};
pub use handshake::{Effect, HandshakeEvent, HandshakeState};
pub use liveness::{CheckOutcome, LivenessMonitor};
pub use registry::{ConnectionClosed, ConnectionHandle, ConnectionId, ConnectionRegistry, Outbound};
pub use router::CommandRouter;
pub use scheduler::{TaskKind, TaskScheduler};
pub use session::DeviceSession;
