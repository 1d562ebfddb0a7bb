//! Per-user façades over a shared core.

use std::sync::Arc;

use paramcom::error::Error;
use paramcom::model::{
    DeviceId, MethodInvocationRequest, ParameterInstanceId, ParameterValue, RegisterDeviceRequest,
    SetParameterRequest, StatusCode, UserData, UserPermissions,
};
use paramcom::service::ports::{Backend, FileApi, Frontend, FrontendExtended};
use paramcom::service::{ParameterServiceCore, authorize};

const DEV: DeviceId = DeviceId::new(4, 0);

fn core() -> Arc<ParameterServiceCore> {
    let core = ParameterServiceCore::new();
    let _ = core
        .register_devices(vec![RegisterDeviceRequest::new(DEV, "750-8212", "03.10")])
        .get()
        .unwrap();
    core.add_parameter(
        ParameterInstanceId::new(DEV, "network/hostname"),
        "network",
        ParameterValue::Text("plc".into()),
        true,
    );
    core.add_parameter(
        ParameterInstanceId::new(DEV, "io/led"),
        "io",
        ParameterValue::Bool(false),
        true,
    );
    core.add_method(
        ParameterInstanceId::new(DEV, "system/reboot"),
        "system",
        Arc::new(|_: &[ParameterValue]| Ok(Vec::new())),
    );
    core.add_file("network.cfg", "network", 0);
    core.set_user_permissions(UserPermissions::new("viewer").with_read("network"));
    core.set_user_permissions(
        UserPermissions::new("operator")
            .with_write("network")
            .with_write("io"),
    );
    core.set_user_permissions(UserPermissions::new("root"));
    Arc::new(core)
}

fn hostname() -> ParameterInstanceId {
    ParameterInstanceId::new(DEV, "network/hostname")
}

#[test]
fn unknown_user_gets_no_facade() {
    let result = authorize(core(), UserData::new("mallory"));
    assert!(matches!(result, Err(Error::Authorization(_))));
}

#[test]
fn viewer_reads_but_cannot_write() {
    let view = authorize(core(), UserData::new("viewer")).unwrap();
    let r = view.get_parameters(vec![hostname()]).get().unwrap();
    assert_eq!(r[0].value, Some(ParameterValue::Text("plc".into())));

    let r = view
        .set_parameter_values(vec![SetParameterRequest {
            id: hostname(),
            value: ParameterValue::Text("evil".into()),
        }])
        .get()
        .unwrap();
    assert_eq!(r[0].status, StatusCode::Unauthorized);
    assert_eq!(r[0].message, "Permission \"network_readwrite\" is missing.");
}

#[test]
fn mixed_batch_keeps_request_order() {
    let view = authorize(core(), UserData::new("viewer")).unwrap();
    let led = ParameterInstanceId::new(DEV, "io/led");
    let r = view
        .get_parameters(vec![led.clone(), hostname(), led])
        .get()
        .unwrap();
    let statuses: Vec<_> = r.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![StatusCode::Unauthorized, StatusCode::Success, StatusCode::Unauthorized]
    );
    assert_eq!(r[1].id, hostname());
}

#[test]
fn method_invocation_needs_write_on_its_feature() {
    let request = MethodInvocationRequest {
        id: ParameterInstanceId::new(DEV, "system/reboot"),
        in_args: Vec::new(),
    };
    let operator = authorize(core(), UserData::new("operator")).unwrap();
    let r = operator.invoke_method(request.clone()).get().unwrap();
    assert_eq!(r.status, StatusCode::Unauthorized);

    let root = authorize(core(), UserData::new("root")).unwrap();
    assert!(root.invoke_method(request).get().unwrap().status.is_success());
}

#[test]
fn file_access_follows_file_feature() {
    let core = core();
    let viewer = authorize(core.clone(), UserData::new("viewer")).unwrap();
    let operator = authorize(core.clone(), UserData::new("operator")).unwrap();

    let r = viewer.write("network.cfg".into(), 0, b"x".to_vec()).get().unwrap();
    assert_eq!(r.status, StatusCode::Unauthorized);
    assert!(operator
        .write("network.cfg".into(), 0, b"dhcp=1".to_vec())
        .get()
        .unwrap()
        .is_success());
    let r = viewer.read("network.cfg".into(), 0, 64).get().unwrap();
    assert_eq!(r.data, b"dhcp=1".to_vec());

    let r = viewer.read("shadow".into(), 0, 64).get().unwrap();
    assert_eq!(r.status, StatusCode::UnknownFileId);
}

#[test]
fn enumeration_hides_unreadable_parameters() {
    let viewer = authorize(core(), UserData::new("viewer")).unwrap();
    let all = viewer.get_all_parameters(None).get().unwrap();
    let paths: Vec<_> = all.iter().map(|r| r.id.path.as_str()).collect();
    assert_eq!(paths, vec!["network/hostname"]);

    let devices = viewer.get_all_devices().get().unwrap();
    assert_eq!(devices.devices.len(), 1);
}

#[test]
fn facade_keeps_permissions_from_construction() {
    let core = core();
    let viewer = authorize(core.clone(), UserData::new("viewer")).unwrap();
    core.set_user_permissions(UserPermissions::new("viewer").with_write("network"));

    let request = SetParameterRequest {
        id: hostname(),
        value: ParameterValue::Text("new".into()),
    };
    let r = viewer.set_parameter_values(vec![request.clone()]).get().unwrap();
    assert_eq!(r[0].status, StatusCode::Unauthorized);

    let fresh = authorize(core, UserData::new("viewer")).unwrap();
    let r = fresh.set_parameter_values(vec![request]).get().unwrap();
    assert!(r[0].is_success());
}
