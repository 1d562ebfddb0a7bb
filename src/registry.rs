//! Concurrent device registry.
//!
//! One mutex guards the whole map.  Lookups return owned snapshots so no
//! reference ever outlives the lock, and `remove_devices` holds the lock for
//! the complete sweep.

use std::collections::BTreeMap;

use log::{debug, info};
use parking_lot::Mutex;

use crate::error::{RegistryError, Result};
use crate::model::{DeviceId, DeviceMeta, RegisterDeviceRequest};

/// Registered devices of one connection (or of the whole service).
pub struct DeviceRegistry {
    connection_name: String,
    devices: Mutex<BTreeMap<DeviceId, DeviceMeta>>,
}

impl DeviceRegistry {
    pub fn new(connection_name: impl Into<String>) -> Self {
        Self {
            connection_name: connection_name.into(),
            devices: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn connection_name(&self) -> &str {
        &self.connection_name
    }

    pub fn has_devices(&self) -> bool {
        !self.devices.lock().is_empty()
    }

    pub fn has_device(&self, id: DeviceId) -> bool {
        self.devices.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.devices.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_devices()
    }

    pub fn get_device_meta(&self, id: DeviceId) -> Option<DeviceMeta> {
        self.devices.lock().get(&id).cloned()
    }

    /// Snapshot of all registered ids in ascending order.
    pub fn device_ids(&self) -> Vec<DeviceId> {
        self.devices.lock().keys().copied().collect()
    }

    /// Snapshot of all registrations in ascending id order.
    pub fn devices(&self) -> Vec<DeviceMeta> {
        self.devices.lock().values().cloned().collect()
    }

    /// Register a device.  An existing registration is never overwritten.
    pub fn add_device(&self, request: &RegisterDeviceRequest) -> Result<()> {
        let mut devices = self.devices.lock();
        if devices.contains_key(&request.id) {
            return Err(RegistryError::DeviceAlreadyExists(request.id).into());
        }
        devices.insert(request.id, DeviceMeta::from(request));
        drop(devices);
        info!(
            "[{}] device {} registered ({} fw {})",
            self.connection_name, request.id, request.order_number, request.firmware_version
        );
        Ok(())
    }

    /// Remove one device.  Removing an unknown id is not an error.
    pub fn remove_device(&self, id: DeviceId) {
        if self.devices.lock().remove(&id).is_some() {
            info!("[{}] device {} removed", self.connection_name, id);
        }
    }

    /// Remove every device whose metadata satisfies `predicate`.
    /// Returns the removed registrations.
    pub fn remove_devices<P>(&self, mut predicate: P) -> Vec<DeviceMeta>
    where
        P: FnMut(&DeviceMeta) -> bool,
    {
        let mut devices = self.devices.lock();
        let doomed: Vec<DeviceId> = devices
            .values()
            .filter(|meta| predicate(meta))
            .map(|meta| meta.id)
            .collect();
        let removed: Vec<DeviceMeta> = doomed
            .iter()
            .filter_map(|id| devices.remove(id))
            .collect();
        drop(devices);
        debug!(
            "[{}] sweep removed {} device(s)",
            self.connection_name,
            removed.len()
        );
        removed
    }
}

// ── Tests ────────────────────────────────────────────────────
