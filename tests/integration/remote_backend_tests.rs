//! Device registration from several connections into one core.

use std::sync::Arc;
use std::time::Duration;

use paramcom::model::{DeviceId, RegisterDeviceRequest, StatusCode};
use paramcom::rpc::message::BACKEND_OBJECT_ID;
use paramcom::rpc::transport::loopback_pair;
use paramcom::rpc::{BackendDispatch, BackendProxy, BackendStub, Driver, Manager};
use paramcom::service::ParameterServiceCore;
use paramcom::service::ports::Backend;

const T: Duration = Duration::from_millis(100);

/// A device process connected to the service through its own channel.
struct DeviceProcess {
    proxy: BackendProxy,
    client_driver: Driver,
    server_driver: Driver,
    stub: Arc<BackendStub>,
}

fn attach(core: &Arc<ParameterServiceCore>, name: &str) -> DeviceProcess {
    let (a, b) = loopback_pair();
    let client = Manager::new(name, Arc::new(a.sender), 1 << 16);
    let server = Manager::new(name, Arc::new(b.sender), 1 << 16);
    let stub = BackendStub::register(
        &server,
        BACKEND_OBJECT_ID,
        BackendDispatch::for_connection(core.clone(), name),
    )
    .unwrap();
    DeviceProcess {
        proxy: BackendProxy::new(&client, BACKEND_OBJECT_ID).unwrap(),
        client_driver: Driver::new(client, Box::new(a.receiver)),
        server_driver: Driver::new(server, Box::new(b.receiver)),
        stub,
    }
}

impl DeviceProcess {
    fn register(&mut self, ids: &[DeviceId]) -> Vec<StatusCode> {
        let requests = ids
            .iter()
            .map(|id| RegisterDeviceRequest::new(*id, "750-1506", "01.00"))
            .collect();
        let pending = self.proxy.register_devices(requests);
        assert!(self.server_driver.run_once(T).unwrap());
        self.client_driver.pump_until(&pending, 10, T).unwrap();
        pending.get().unwrap().into_iter().map(|r| r.status).collect()
    }

    /// Close the device side and let the server notice.
    fn disconnect(self) -> Driver {
        let Self {
            proxy,
            client_driver,
            mut server_driver,
            stub,
        } = self;
        drop(proxy);
        drop(client_driver);
        assert!(server_driver.run_once(T).is_err());
        assert!(stub.dispatcher().remote().unwrap().registry().is_empty());
        server_driver
    }
}

#[test]
fn connections_own_their_registrations() {
    let core = Arc::new(ParameterServiceCore::new());
    let mut left = attach(&core, "left");
    let mut right = attach(&core, "right");

    assert_eq!(
        left.register(&[DeviceId::new(1, 0), DeviceId::new(2, 0)]),
        vec![StatusCode::Success, StatusCode::Success]
    );
    assert_eq!(
        right.register(&[DeviceId::new(2, 0), DeviceId::new(3, 0)]),
        vec![StatusCode::DeviceAlreadyExists, StatusCode::Success]
    );
    assert_eq!(core.devices().len(), 3);

    let _closed = left.disconnect();
    assert_eq!(core.devices().device_ids(), vec![DeviceId::new(3, 0)]);

    // The slot freed by the lost connection can be claimed again.
    assert_eq!(
        right.register(&[DeviceId::new(2, 0)]),
        vec![StatusCode::Success]
    );
}

#[test]
fn unregister_all_over_the_wire() {
    let core = Arc::new(ParameterServiceCore::new());
    let mut device = attach(&core, "dev");
    device.register(&[DeviceId::new(7, 1)]);

    let pending = device.proxy.unregister_all_devices();
    assert!(device.server_driver.run_once(T).unwrap());
    device.client_driver.pump_until(&pending, 10, T).unwrap();
    assert!(pending.get().unwrap().is_success());
    assert!(core.devices().is_empty());

    let pending = device.proxy.unregister_devices(vec![DeviceId::new(7, 1)]);
    assert!(device.server_driver.run_once(T).unwrap());
    device.client_driver.pump_until(&pending, 10, T).unwrap();
    assert_eq!(pending.get().unwrap()[0].status, StatusCode::UnknownDevice);
}
