//! Liveness monitor — heartbeat pings and per-device staleness checks.
//!
//! Every period `T` the monitor pings each device the directory believes
//! connected and schedules an independent check `T` later. A device whose
//! `lastSeen` was not refreshed by a pong in the meantime is demoted to
//! `connected = false`. The monitor never closes a connection.

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use lockd_core::{DevicePatch, LockError, ServerMessage, SharedClock};

use crate::directory::SharedDirectory;
use crate::registry::ConnectionRegistry;
use crate::scheduler::{TaskKind, TaskScheduler};

/// Result of one deferred staleness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    /// The record was deleted before the check fired.
    Missing,
    /// A pong (or handshake) refreshed the record within the window.
    Fresh,
    Demoted,
    /// Stale, but already marked disconnected.
    AlreadyDisconnected,
}

#[derive(Clone)]
pub struct LivenessMonitor {
    directory: SharedDirectory,
    registry: ConnectionRegistry,
    scheduler: TaskScheduler,
    clock: SharedClock,
    window: Duration,
}

impl LivenessMonitor {
    pub fn new(
        directory: SharedDirectory,
        registry: ConnectionRegistry,
        scheduler: TaskScheduler,
        clock: SharedClock,
        window: Duration,
    ) -> Self {
        Self {
            directory,
            registry,
            scheduler,
            clock,
            window,
        }
    }

    /// Heartbeat loop. The first cycle runs one period after start.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = interval_at(Instant::now() + self.window, self.window);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(period_secs = self.window.as_secs(), "liveness monitor starting");

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("liveness monitor shutting down");
                    return;
                }
                _ = ticker.tick() => {
                    self.run_cycle();
                }
            }
        }
    }

    /// One heartbeat cycle. Returns the number of pings sent.
    ///
    /// Unbound devices are not pinged, but still get a check so a device
    /// whose socket vanished is demoted after one window.
    pub fn run_cycle(&self) -> usize {
        let connected = match self.directory.list_connected() {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(error = %e, "heartbeat cycle skipped: directory unavailable");
                return 0;
            }
        };

        let sent_at = self.clock.now_ms();
        let mut pinged = 0;
        for record in connected {
            let address = record.mac_address;
            match self.registry.lookup(&address) {
                Some(conn) => {
                    let ping = ServerMessage::Ping {
                        mac_address: address.clone(),
                    };
                    match conn.send(ping) {
                        Ok(()) => {
                            pinged += 1;
                            tracing::debug!(address = %address, connection = conn.id(), "ping sent");
                        }
                        Err(e) => tracing::debug!(address = %address, error = %e, "ping not sent"),
                    }
                }
                None => tracing::debug!(address = %address, "no bound connection, ping skipped"),
            }
            self.schedule_check(address, sent_at);
        }

        // Connections that never announced get asked again.
        self.registry.broadcast_each(|conn, bound| {
            if bound.is_none() {
                let _ = conn.send(ServerMessage::IdentityRequest);
            }
        });

        pinged
    }

    /// The check fires one window after `sent_at`. Its cutoff is the ping
    /// instant itself, so timer lateness never counts against the device.
    fn schedule_check(&self, address: String, sent_at: u64) {
        let directory = self.directory.clone();
        let key = address.clone();
        self.scheduler.schedule(
            &key,
            TaskKind::LivenessCheck,
            self.window,
            async move {
                match check(&directory, &address, sent_at) {
                    Ok(CheckOutcome::Demoted) => {
                        tracing::info!(address = %address, "marked disconnected (no heartbeat response)");
                    }
                    Ok(CheckOutcome::Missing) => {
                        tracing::debug!(address = %address, "record gone before liveness check");
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!(address = %address, error = %e, "liveness check failed"),
                }
            },
        );
    }
}

/// Demote `address` unless it was seen at or after `sent_at_ms`, the
/// instant the ping for this cycle went out.
///
/// Never promotes: only a pong sets `connected` back to true.
pub fn check(
    directory: &SharedDirectory,
    address: &str,
    sent_at_ms: u64,
) -> Result<CheckOutcome, LockError> {
    let record = match directory.find(address)? {
        Some(r) => r,
        None => return Ok(CheckOutcome::Missing),
    };

    if record.last_seen >= sent_at_ms {
        return Ok(CheckOutcome::Fresh);
    }
    if !record.connected {
        return Ok(CheckOutcome::AlreadyDisconnected);
    }

    match directory.update(address, &DevicePatch::demoted()) {
        Ok(()) => Ok(CheckOutcome::Demoted),
        // deleted between the read and the write
        Err(LockError::NotFound(_)) => Ok(CheckOutcome::Missing),
        Err(e) => Err(e),
    }
}

/// Pong received: the device is alive as of `now_ms`.
pub fn record_pong(directory: &SharedDirectory, address: &str, now_ms: u64) -> Result<(), LockError> {
    directory.update(address, &DevicePatch::seen(now_ms))
}
