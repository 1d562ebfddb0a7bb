//! Device registry under concurrent registration and sweeps.

use std::sync::Arc;
use std::thread;

use paramcom::error::{Error, RegistryError};
use paramcom::model::{DeviceId, RegisterDeviceRequest};
use paramcom::registry::DeviceRegistry;

fn request(slot: u16, collection: u8) -> RegisterDeviceRequest {
    RegisterDeviceRequest::new(DeviceId::new(slot, collection), "750-1506", "01.00")
}

#[test]
fn racing_duplicates_admit_exactly_one() {
    let registry = Arc::new(DeviceRegistry::new("race"));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || registry.add_device(&request(3, 0)).is_ok())
        })
        .collect();
    let admitted = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();
    assert_eq!(admitted, 1);
    assert_eq!(registry.len(), 1);
}

#[test]
fn duplicate_is_an_error_not_an_overwrite() {
    let registry = DeviceRegistry::new("dup");
    registry.add_device(&request(1, 0)).unwrap();
    let mut other = request(1, 0);
    other.firmware_version = "99.99".into();
    assert_eq!(
        registry.add_device(&other),
        Err(Error::Registry(RegistryError::DeviceAlreadyExists(DeviceId::new(1, 0))))
    );
    let meta = registry.get_device_meta(DeviceId::new(1, 0)).unwrap();
    assert_eq!(meta.firmware_version, "01.00");
}

#[test]
fn sweep_by_collection_runs_alongside_readers() {
    let registry = Arc::new(DeviceRegistry::new("sweep"));
    for slot in 0..50 {
        registry.add_device(&request(slot, (slot % 2) as u8)).unwrap();
    }

    let reader = {
        let registry = Arc::clone(&registry);
        thread::spawn(move || {
            for _ in 0..200 {
                let ids = registry.device_ids();
                // A sweep is atomic: readers see all odd slots or none.
                let odd = ids.iter().filter(|id| id.collection == 1).count();
                assert!(odd == 25 || odd == 0);
            }
        })
    };
    let removed = registry.remove_devices(|meta| meta.id.collection == 1);
    reader.join().unwrap();

    assert_eq!(removed.len(), 25);
    assert_eq!(registry.len(), 25);
    assert!(registry.device_ids().iter().all(|id| id.collection == 0));
}
