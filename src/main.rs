//! paramcomd: loopback demonstration of the parameter-service IPC stack.
//!
//! ```text
//!  ┌──────────────── device side ────────────────┐   ┌──────────── service side ─────────────┐
//!  │ BackendProxy ───────────────────────────────┼══▶│ BackendStub ─▶ RemoteBackend ─┐        │
//!  │                                             │   │                               ▼        │
//!  │ ChunkingFileApi ─▶ FileApiProxy ────────────┼══▶│ FileApiStub ─▶ Authorized ─▶ core       │
//!  └─────────────────────────────────────────────┘   └───────────────────────────────────────┘
//! ```
//!
//! Usage: `paramcomd [config.json]`.  Log output is controlled by `RUST_LOG`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use log::info;

use paramcom::config::ComConfig;
use paramcom::model::{
    DeviceId, ParameterInstanceId, ParameterValue, RegisterDeviceRequest, UserData, UserPermissions,
};
use paramcom::rpc::message::{BACKEND_OBJECT_ID, FILE_API_OBJECT_ID};
use paramcom::rpc::transport::loopback_pair;
use paramcom::rpc::{
    BackendDispatch, BackendProxy, BackendStub, ChunkingFileApi, Driver, DriverHandle,
    FileApiDispatch, FileApiProxy, FileApiStub, Manager, call_sync,
};
use paramcom::service::ports::{Backend, FileApi};
use paramcom::service::{ParameterServiceCore, authorize};

/// Both ends of one loopback connection with their driver threads.
struct Connection {
    client: Arc<Manager>,
    server: Arc<Manager>,
    _drivers: [DriverHandle; 2],
}

fn connect(name: &str, config: &ComConfig) -> Result<Connection> {
    let (a, b) = loopback_pair();
    let client = Manager::new(name, Arc::new(a.sender), config.max_frame_size);
    let server = Manager::new(name, Arc::new(b.sender), config.max_frame_size);
    let poll = Duration::from_millis(config.driver_poll_interval_ms);
    let client_driver = Driver::new(Arc::clone(&client), Box::new(a.receiver)).spawn(poll)?;
    let server_driver = Driver::new(Arc::clone(&server), Box::new(b.receiver)).spawn(poll)?;
    Ok(Connection {
        client,
        server,
        _drivers: [client_driver, server_driver],
    })
}

fn load_config() -> Result<ComConfig> {
    match std::env::args().nth(1) {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading config {path}"))?;
            Ok(ComConfig::from_json_str(&text)?)
        }
        None => Ok(ComConfig::default()),
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("paramcomd v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;
    config.validate()?;
    let attempts = config.sync_call_attempts;
    let timeout = Duration::from_millis(config.sync_call_timeout_ms);

    // ── 1. Service core ──────────────────────────────────────
    let core = Arc::new(ParameterServiceCore::new());
    let device = DeviceId::new(1, 0);
    let image = ParameterInstanceId::new(device, "firmware/image");
    core.add_parameter(image.clone(), "firmware", ParameterValue::Bytes(Vec::new()), true);
    core.set_user_permissions(UserPermissions::new("admin").with_write("firmware"));

    // ── 2. Device registration over the backend channel ──────
    let backend = connect(&config.backend_connection, &config)?;
    let _backend_stub = BackendStub::register(
        &backend.server,
        BACKEND_OBJECT_ID,
        BackendDispatch::for_connection(core.clone(), config.backend_connection.clone()),
    )?;
    let backend_proxy = BackendProxy::new(&backend.client, BACKEND_OBJECT_ID)?;
    let responses = call_sync(
        backend_proxy.register_devices(vec![RegisterDeviceRequest::new(device, "0750-8212", "04.02")]),
        attempts,
        timeout,
    )?;
    if let Some(failure) = responses.iter().find(|r| !r.is_success()) {
        bail!("device registration failed: {} {}", failure.status, failure.message);
    }
    info!("registered device {device}");

    // ── 3. Authorized file API over its own channel ──────────
    let view = authorize(core.clone(), UserData::new("admin"))?.into_file_api();
    let files = connect(&config.file_api_connection, &config)?;
    let _file_stub =
        FileApiStub::register(&files.server, FILE_API_OBJECT_ID, FileApiDispatch::shared(view))?;
    let proxy: Arc<dyn FileApi> = Arc::new(FileApiProxy::new(&files.client, FILE_API_OBJECT_ID)?);
    let chunked = ChunkingFileApi::from_config(proxy, &config)?;

    // ── 4. Upload and read back a parameter file ─────────────
    let upload = call_sync(chunked.create_parameter_upload_id(image), attempts, timeout)?;
    if !upload.status.is_success() {
        bail!("upload id refused: {} {}", upload.status, upload.message);
    }
    let payload: Vec<u8> = (0..(3 * config.max_write_chunk_size + 17))
        .map(|i| (i % 251) as u8)
        .collect();
    let written = call_sync(
        chunked.write(upload.file_id.clone(), 0, payload.clone()),
        attempts,
        timeout,
    )?;
    if !written.is_success() {
        bail!("upload failed: {} {}", written.status, written.message);
    }
    let read = futures_lite::future::block_on(chunked.read(
        upload.file_id.clone(),
        0,
        payload.len() as u64,
    ))?;
    if read.data != payload {
        bail!("read-back mismatch on {}", upload.file_id);
    }
    info!(
        "uploaded and verified {} byte(s) as {}",
        payload.len(),
        upload.file_id
    );

    // ── 5. Device leaves ─────────────────────────────────────
    let left = call_sync(backend_proxy.unregister_all_devices(), attempts, timeout)?;
    info!(
        "unregister: {}, {} device(s) remain registered",
        left.status,
        core.devices().len()
    );
    Ok(())
}
