//! Discovery cache
//! Devices seen while scanning, keyed by address. Writers insert whole records and
//! readers get copies, so no caller ever observes a half-updated entry.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::core::bluetooth::DeviceRecord;

#[derive(Clone, Default)]
pub struct DiscoveryCache {
    devices: Arc<Mutex<BTreeMap<String, DeviceRecord>>>,
}

impl DiscoveryCache {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic elsewhere cannot leave a partial record behind, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, DeviceRecord>> {
        self.devices.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts or overwrites the entry for the device's address
    pub fn record(&self, device: DeviceRecord) {
        self.lock().insert(device.address.clone(), device);
    }

    /// Inserts a batch under a single lock acquisition
    pub fn record_all(&self, devices: impl IntoIterator<Item = DeviceRecord>) {
        let mut table = self.lock();
        for device in devices {
            table.insert(device.address.clone(), device);
        }
    }

    /// Up to `limit` records, in address order
    pub fn snapshot(&self, limit: usize) -> Vec<DeviceRecord> {
        self.lock().values().take(limit).cloned().collect()
    }

    pub fn get(&self, address: &str) -> Option<DeviceRecord> {
        self.lock().get(address).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
