//! Device Directory, a durable, address-keyed record store.
//!
//! Every mutation is a single per-record operation: `create` is a
//! conditional insert that fails with `DuplicateKey` when the address
//! already has a record, and `update` patches fields in place without a
//! prior read.

mod memory;
mod sqlite;

pub use memory::MemoryDirectory;
pub use sqlite::SqliteDirectory;

use std::sync::Arc;

use lockd_core::config::{StorageBackend, StorageConfig};
use lockd_core::{DevicePatch, DeviceRecord, LockError};

pub trait Directory: Send + Sync {
    /// Insert `record` unless its address is already present.
    fn create(&self, record: DeviceRecord) -> Result<(), LockError>;

    fn find(&self, mac_address: &str) -> Result<Option<DeviceRecord>, LockError>;

    /// Patch the record for `mac_address`. `NotFound` if absent.
    fn update(&self, mac_address: &str, patch: &DevicePatch) -> Result<(), LockError>;

    /// Returns whether a record was removed.
    fn delete(&self, mac_address: &str) -> Result<bool, LockError>;

    /// All records, ordered by address.
    fn list(&self) -> Result<Vec<DeviceRecord>, LockError>;

    fn list_connected(&self) -> Result<Vec<DeviceRecord>, LockError> {
        Ok(self.list()?.into_iter().filter(|r| r.connected).collect())
    }
}

pub type SharedDirectory = Arc<dyn Directory>;

/// Open the backend selected in config.
pub fn open_directory(config: &StorageConfig) -> Result<SharedDirectory, LockError> {
    match config.backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryDirectory::new())),
        StorageBackend::Sqlite => Ok(Arc::new(SqliteDirectory::open(&config.database_path)?)),
    }
}
