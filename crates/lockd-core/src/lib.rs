//! lockd-core — shared types for the lock fleet daemon: wire messages,
//! device records, error taxonomy, clock and configuration.
//! All other lockd crates depend on this one.

pub mod clock;
pub mod config;
pub mod device;
pub mod error;
pub mod wire;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use device::{DevicePatch, DeviceRecord, LockCommand, LockStatus};
pub use error::LockError;
pub use wire::{DeviceCommand, DeviceMessage, ServerMessage, WireError};

/// Default heartbeat period in seconds.
/// A device silent for one full period is marked disconnected.
pub const HEARTBEAT_INTERVAL_SECS: u64 = 10;

/// Delay before the post-removal guard re-reads the directory.
pub const REMOVAL_GRACE_SECS: u64 = 5;

/// Default WebSocket port devices connect to.
pub const DEFAULT_DEVICE_PORT: u16 = 8080;

/// Default HTTP API port (loopback only).
pub const DEFAULT_API_PORT: u16 = 9001;
