//! Chunking decorator against the instrumented mock and across a loopback
//! connection.

use std::sync::Arc;
use std::time::Duration;

use paramcom::model::StatusCode;
use paramcom::rpc::message::FILE_API_OBJECT_ID;
use paramcom::rpc::transport::loopback_pair;
use paramcom::rpc::{
    ChunkingFileApi, Driver, FileApiDispatch, FileApiProxy, FileApiStub, Manager, call_sync,
};
use paramcom::service::ParameterServiceCore;
use paramcom::service::ports::FileApi;

use crate::mock_file_api::MockFileApi;

fn payload(n: usize) -> Vec<u8> {
    (0..n).map(|i| (i * 7 % 256) as u8).collect()
}

#[test]
fn upload_of_1234_bytes_in_parts_of_42() {
    let mock = Arc::new(MockFileApi::new());
    let api = ChunkingFileApi::new(mock.clone(), 42, 42).unwrap();
    let data = payload(1234);

    let r = api.write("blob".into(), 12, data.clone()).get().unwrap();
    assert!(r.is_success());

    let writes = mock.writes();
    assert_eq!(writes.len(), 30);
    let mut expected_offset = 12;
    for (i, &(offset, len)) in writes.iter().enumerate() {
        assert_eq!(offset, expected_offset, "chunk {i} out of place");
        assert_eq!(len, if i < 29 { 42 } else { 16 });
        expected_offset += len;
    }
    assert_eq!(expected_offset, 12 + 1234);

    let back = api.read("blob".into(), 12, 1234).get().unwrap();
    assert_eq!(back.data, data);
    assert_eq!(mock.reads().len(), 30);
    assert_eq!(mock.contents("blob").unwrap()[..12], [0; 12]);
}

#[test]
fn metadata_operations_pass_straight_through() {
    let mock = Arc::new(MockFileApi::with_file("f", payload(10)));
    let api = ChunkingFileApi::new(mock.clone(), 1, 1).unwrap();
    assert_eq!(api.get_file_info("f".into()).get().unwrap().file_size, 10);
    assert!(api.create("g".into(), 4096).get().unwrap().is_success());
    let id = api
        .create_parameter_upload_id(paramcom::model::ParameterInstanceId::new(
            paramcom::model::DeviceId::new(0, 0),
            "p",
        ))
        .get()
        .unwrap();
    assert!(id.status.is_success());
    assert_eq!(mock.other_calls(), 3);
    assert!(mock.reads().is_empty());
    assert!(mock.writes().is_empty());
}

#[test]
fn read_past_end_stops_on_short_chunk() {
    let mock = Arc::new(MockFileApi::with_file("f", payload(100)));
    let api = ChunkingFileApi::new(mock.clone(), 30, 30).unwrap();
    let r = api.read("f".into(), 50, 500).get().unwrap();
    assert_eq!(r.data, payload(100)[50..].to_vec());
    assert_eq!(mock.reads(), vec![(50, 30), (80, 30)]);
}

#[test]
fn unknown_file_fails_on_first_chunk() {
    let mock = Arc::new(MockFileApi::new());
    let api = ChunkingFileApi::new(mock.clone(), 8, 8).unwrap();
    let r = api.read("nope".into(), 0, 64).get().unwrap();
    assert_eq!(r.status, StatusCode::UnknownFileId);
    assert_eq!(mock.reads().len(), 1);
}

#[test]
fn chunked_transfer_over_the_wire() {
    let core = Arc::new(ParameterServiceCore::new());
    core.add_file("image", "firmware", 0);

    let (a, b) = loopback_pair();
    let client = Manager::new("file_api", Arc::new(a.sender), 256);
    let server = Manager::new("file_api", Arc::new(b.sender), 256);
    let _stub = FileApiStub::register(
        &server,
        FILE_API_OBJECT_ID,
        FileApiDispatch::shared(core.clone()),
    )
    .unwrap();
    let poll = Duration::from_millis(5);
    let _client_driver = Driver::new(Arc::clone(&client), Box::new(a.receiver))
        .spawn(poll)
        .unwrap();
    let _server_driver = Driver::new(server, Box::new(b.receiver)).spawn(poll).unwrap();

    // Frames are capped at 256 bytes, so only chunked transfers fit.
    let proxy = Arc::new(FileApiProxy::new(&client, FILE_API_OBJECT_ID).unwrap());
    let api = ChunkingFileApi::new(proxy.clone(), 128, 128).unwrap();
    let data = payload(2000);
    let t = Duration::from_millis(100);

    let r = call_sync(api.write("image".into(), 0, data.clone()), 50, t).unwrap();
    assert!(r.is_success());
    assert_eq!(core.file_contents("image").unwrap(), data);

    let r = call_sync(api.read("image".into(), 0, 2000), 50, t).unwrap();
    assert_eq!(r.data, data);
    assert_eq!(proxy.open_call_count(), 0);
}
