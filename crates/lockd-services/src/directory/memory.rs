use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use lockd_core::{DevicePatch, DeviceRecord, LockError};

use super::Directory;

/// In-process directory. Same contract as the SQLite store, nothing survives a restart.
#[derive(Clone, Default)]
pub struct MemoryDirectory {
    records: Arc<DashMap<String, DeviceRecord>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Directory for MemoryDirectory {
    fn create(&self, record: DeviceRecord) -> Result<(), LockError> {
        match self.records.entry(record.mac_address.clone()) {
            Entry::Occupied(_) => Err(LockError::DuplicateKey(record.mac_address)),
            Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(())
            }
        }
    }

    fn find(&self, mac_address: &str) -> Result<Option<DeviceRecord>, LockError> {
        Ok(self.records.get(mac_address).map(|r| r.value().clone()))
    }

    fn update(&self, mac_address: &str, patch: &DevicePatch) -> Result<(), LockError> {
        match self.records.get_mut(mac_address) {
            Some(mut rec) => {
                rec.apply(patch);
                Ok(())
            }
            None => Err(LockError::NotFound(mac_address.to_string())),
        }
    }

    fn delete(&self, mac_address: &str) -> Result<bool, LockError> {
        Ok(self.records.remove(mac_address).is_some())
    }

    fn list(&self) -> Result<Vec<DeviceRecord>, LockError> {
        let mut all: Vec<_> = self.records.iter().map(|r| r.value().clone()).collect();
        all.sort_by(|a, b| a.mac_address.cmp(&b.mac_address));
        Ok(all)
    }
}
