//! Command Router: turns a caller's intent into a wire message for one
//! device and keeps the directory in step with what was sent.
//!
//! Routing is strictly targeted: a command goes to the connection bound to
//! the address, or nowhere. An unbound address is `DeviceUnreachable` and
//! the directory is left untouched.

use std::time::Duration;

use lockd_core::{DeviceCommand, DevicePatch, LockCommand, LockError, ServerMessage, SharedClock};

use crate::directory::SharedDirectory;
use crate::registry::ConnectionRegistry;
use crate::scheduler::{TaskKind, TaskScheduler};

#[derive(Clone)]
pub struct CommandRouter {
    directory: SharedDirectory,
    registry: ConnectionRegistry,
    scheduler: TaskScheduler,
    clock: SharedClock,
    removal_grace: Duration,
}

impl CommandRouter {
    pub fn new(
        directory: SharedDirectory,
        registry: ConnectionRegistry,
        scheduler: TaskScheduler,
        clock: SharedClock,
        removal_grace: Duration,
    ) -> Self {
        Self {
            directory,
            registry,
            scheduler,
            clock,
            removal_grace,
        }
    }

    /// Deliver LOCK/UNLOCK to the device at `address`.
    ///
    /// On success the record's status reflects the command and `lastSeen`
    /// is refreshed. Delivery is fire-and-forget: no device ack is awaited.
    pub fn send_command(&self, address: &str, command: LockCommand) -> Result<(), LockError> {
        let conn = self
            .registry
            .lookup(address)
            .ok_or_else(|| LockError::DeviceUnreachable(address.to_string()))?;

        let msg = ServerMessage::Command {
            mac_address: address.to_string(),
            command: command.into(),
        };
        conn.send(msg)
            .map_err(|_| LockError::DeviceUnreachable(address.to_string()))?;

        let status = command.resulting_status();
        self.directory
            .update(address, &DevicePatch::commanded(status, self.clock.now_ms()))?;
        tracing::info!(
            address = %address,
            connection = conn.id(),
            status = status.as_str(),
            "command delivered"
        );
        Ok(())
    }

    /// Disconnect the device if it is online, then delete its record.
    ///
    /// Returns whether a record existed. Deleting an unknown address is not
    /// an error.
    pub fn remove_device(&self, address: &str) -> Result<bool, LockError> {
        if let Some(conn) = self.registry.lookup(address) {
            let disconnect = ServerMessage::Command {
                mac_address: address.to_string(),
                command: DeviceCommand::Disconnect,
            };
            if let Err(e) = conn.send(disconnect) {
                tracing::debug!(address = %address, error = %e, "disconnect not delivered");
            }
            conn.close();
            self.registry.unbind(conn.id());
            tracing::info!(address = %address, connection = conn.id(), "device told to disconnect");
        }

        let cancelled = self.scheduler.cancel(address, TaskKind::LivenessCheck);
        if cancelled > 0 {
            tracing::debug!(address = %address, cancelled, "pending liveness checks cancelled");
        }

        let existed = self.directory.delete(address)?;
        if existed {
            tracing::info!(address = %address, "lock removed");
        }
        self.guard_removal(address);
        Ok(existed)
    }

    /// Set the display name. `NotFound` if the address has no record.
    pub fn rename_device(&self, address: &str, name: &str) -> Result<(), LockError> {
        self.directory.update(address, &DevicePatch::renamed(name))?;
        tracing::info!(address = %address, name = %name, "lock renamed");
        Ok(())
    }

    /// After the grace period, note whether the removed device came back.
    ///
    /// A device that reconnects inside the window is re-created by its own
    /// handshake; nothing here undoes that.
    fn guard_removal(&self, address: &str) {
        let registry = self.registry.clone();
        let directory = self.directory.clone();
        let owned = address.to_string();
        self.scheduler.cancel(address, TaskKind::RemovalGuard);
        self.scheduler.schedule(
            address,
            TaskKind::RemovalGuard,
            self.removal_grace,
            async move {
                let rebound = registry.lookup(&owned).is_some();
                let recreated = matches!(directory.find(&owned), Ok(Some(_)));
                if rebound || recreated {
                    tracing::info!(address = %owned, rebound, recreated, "removed lock reappeared");
                } else {
                    tracing::debug!(address = %owned, "removal settled");
                }
            },
        );
    }
}
