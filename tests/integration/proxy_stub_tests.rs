//! Proxy/stub dispatch across a loopback connection, including calls that
//! stay pending on the server side.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use paramcom::error::{Error, FutureError, TransportError};
use paramcom::future::{Future, Promise, failed};
use paramcom::model::{
    FileId, FileIdResponse, FileInfoResponse, FileReadResponse, ParameterInstanceId, Response,
};
use paramcom::rpc::message::FILE_API_OBJECT_ID;
use paramcom::rpc::transport::loopback_pair;
use paramcom::rpc::{
    Driver, DriverHandle, FileApiDispatch, FileApiProxy, FileApiStub, Manager, call_sync,
};
use paramcom::service::ports::FileApi;

const T: Duration = Duration::from_millis(100);

/// Server-side implementation whose reads complete only when the test says so.
#[derive(Default)]
struct Parked {
    reads: Mutex<Vec<Promise<FileReadResponse>>>,
}

impl FileApi for Parked {
    fn get_file_info(&self, _id: FileId) -> Future<FileInfoResponse> {
        failed(TransportError::Io("not supported".into()))
    }

    fn read(&self, _id: FileId, _offset: u64, length: u64) -> Future<FileReadResponse> {
        let (promise, future) = Promise::pair();
        if length == 0 {
            // Dropped unresolved: the caller sees a broken promise.
            return future;
        }
        self.reads.lock().push(promise);
        future
    }

    fn write(&self, _id: FileId, _offset: u64, _data: Vec<u8>) -> Future<Response> {
        failed(TransportError::Io("not supported".into()))
    }

    fn create(&self, _id: FileId, _capacity: u64) -> Future<Response> {
        failed(TransportError::Io("not supported".into()))
    }

    fn create_parameter_upload_id(&self, _context: ParameterInstanceId) -> Future<FileIdResponse> {
        failed(TransportError::Io("not supported".into()))
    }
}

struct Rig {
    parked: Arc<Parked>,
    stub: Arc<FileApiStub>,
    proxy: FileApiProxy,
    _drivers: [DriverHandle; 2],
}

fn rig() -> Rig {
    let parked = Arc::new(Parked::default());
    let (a, b) = loopback_pair();
    let client = Manager::new("file_api", Arc::new(a.sender), 1 << 16);
    let server = Manager::new("file_api", Arc::new(b.sender), 1 << 16);
    let stub = FileApiStub::register(
        &server,
        FILE_API_OBJECT_ID,
        FileApiDispatch::shared(parked.clone()),
    )
    .unwrap();
    let proxy = FileApiProxy::new(&client, FILE_API_OBJECT_ID).unwrap();
    let poll = Duration::from_millis(5);
    let drivers = [
        Driver::new(client, Box::new(a.receiver)).spawn(poll).unwrap(),
        Driver::new(server, Box::new(b.receiver)).spawn(poll).unwrap(),
    ];
    Rig {
        parked,
        stub,
        proxy,
        _drivers: drivers,
    }
}

fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    panic!("condition not reached");
}

#[test]
fn server_side_completion_reaches_the_caller() {
    let rig = rig();
    let pending = rig.proxy.read("f".into(), 0, 4);
    wait_for(|| rig.stub.open_call_count() == 1);

    let promise = rig.parked.reads.lock().remove(0);
    promise
        .set_value(FileReadResponse::with_data(vec![9, 8, 7, 6]))
        .unwrap();
    let r = call_sync(pending, 50, T).unwrap();
    assert_eq!(r.data, vec![9, 8, 7, 6]);
    wait_for(|| rig.stub.open_call_count() == 0);
}

#[test]
fn remote_exception_is_reported_as_remote_error() {
    let rig = rig();
    let err = call_sync(rig.proxy.get_file_info("f".into()), 50, T).unwrap_err();
    assert!(matches!(err, Error::Remote(ref m) if m.contains("not supported")));
}

#[test]
fn broken_server_promise_fails_the_call() {
    let rig = rig();
    let err = call_sync(rig.proxy.read("f".into(), 0, 0), 50, T).unwrap_err();
    assert!(matches!(err, Error::Remote(_)));
}

#[test]
fn dismiss_travels_to_the_server_future() {
    let rig = rig();
    let pending = rig.proxy.read("f".into(), 0, 4);
    wait_for(|| rig.stub.open_call_count() == 1);

    pending.dismiss();
    assert_eq!(rig.proxy.open_call_count(), 0);
    wait_for(|| rig.parked.reads.lock()[0].is_dismissed());
    assert_eq!(rig.stub.open_call_count(), 0);
    let promise = rig.parked.reads.lock().remove(0);

    // Late resolution on the server is dropped silently.
    promise.set_value(FileReadResponse::with_data(vec![1])).unwrap();
    assert_eq!(pending.get(), Err(FutureError::Dismissed.into()));
}

#[test]
fn concurrent_calls_complete_independently() {
    let rig = rig();
    let first = rig.proxy.read("f".into(), 0, 1);
    let second = rig.proxy.read("f".into(), 1, 1);
    wait_for(|| rig.parked.reads.lock().len() == 2);

    // Complete in reverse order.
    let (p1, p2) = {
        let mut reads = rig.parked.reads.lock();
        let p2 = reads.pop().unwrap();
        let p1 = reads.pop().unwrap();
        (p1, p2)
    };
    p2.set_value(FileReadResponse::with_data(vec![2])).unwrap();
    p1.set_value(FileReadResponse::with_data(vec![1])).unwrap();
    assert_eq!(call_sync(second, 50, T).unwrap().data, vec![2]);
    assert_eq!(call_sync(first, 50, T).unwrap().data, vec![1]);
}

#[test]
fn oversized_result_fails_the_call() {
    let core = Arc::new(paramcom::service::ParameterServiceCore::new());
    core.add_file("f", "fw", 0);
    let _ = core.write("f".into(), 0, vec![5; 1000]).get().unwrap();

    let (a, b) = loopback_pair();
    let client = Manager::new("file_api", Arc::new(a.sender), 256);
    let server = Manager::new("file_api", Arc::new(b.sender), 256);
    let _stub =
        FileApiStub::register(&server, FILE_API_OBJECT_ID, FileApiDispatch::shared(core)).unwrap();
    let proxy = FileApiProxy::new(&client, FILE_API_OBJECT_ID).unwrap();
    let poll = Duration::from_millis(5);
    let _drivers = [
        Driver::new(client, Box::new(a.receiver)).spawn(poll).unwrap(),
        Driver::new(server, Box::new(b.receiver)).spawn(poll).unwrap(),
    ];

    let err = call_sync(proxy.read("f".into(), 0, 1000), 50, T).unwrap_err();
    assert!(matches!(err, Error::Remote(_)));
    assert_eq!(proxy.open_call_count(), 0);

    // The connection keeps working for results that fit.
    let r = call_sync(proxy.read("f".into(), 0, 16), 50, T).unwrap();
    assert_eq!(r.data, vec![5; 16]);
}
