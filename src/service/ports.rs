//! Service interfaces: the boundary every proxy, stub and decorator speaks.
//!
//! ```text
//!   caller ──▶ Authorized ──▶ ParameterService (core)
//!      │                         ▲
//!      └──▶ Proxy ══ wire ══▶ Stub
//! ```
//!
//! Every operation returns a [`Future`] so local and remote implementations
//! are interchangeable.  Per-item domain failures come back as a status in
//! the resolved value; the exception channel is reserved for transport and
//! protocol failures.

use crate::error::Result;
use crate::future::Future;
use crate::model::{
    DeviceCollectionResponse, DeviceId, DeviceResponse, FileId, FileIdResponse, FileInfoResponse,
    FileReadResponse, MethodInvocationRequest, MethodInvocationResponse, ParameterInstanceId,
    ParameterResponse, RegisterDeviceRequest, Response, SetParameterRequest, UserPermissions,
};

// ───────────────────────────────────────────────────────────────
// File API (file transfer)
// ───────────────────────────────────────────────────────────────

/// Offset-addressed file transfer.
pub trait FileApi: Send + Sync {
    fn get_file_info(&self, id: FileId) -> Future<FileInfoResponse>;

    /// Read up to `length` bytes starting at `offset`.  A shorter result
    /// means the end of the file was reached.
    fn read(&self, id: FileId, offset: u64, length: u64) -> Future<FileReadResponse>;

    fn write(&self, id: FileId, offset: u64, data: Vec<u8>) -> Future<Response>;

    /// (Re)create the file with room for `capacity` bytes.
    fn create(&self, id: FileId, capacity: u64) -> Future<Response>;

    /// Allocate a file id for uploading the value of a file-typed parameter.
    fn create_parameter_upload_id(&self, context: ParameterInstanceId) -> Future<FileIdResponse>;
}

// ───────────────────────────────────────────────────────────────
// Frontend (parameter access)
// ───────────────────────────────────────────────────────────────

pub trait Frontend: Send + Sync {
    fn get_all_devices(&self) -> Future<DeviceCollectionResponse>;

    fn get_device(&self, id: DeviceId) -> Future<DeviceResponse>;

    /// One response per requested id, in request order.
    fn get_parameters(&self, ids: Vec<ParameterInstanceId>) -> Future<Vec<ParameterResponse>>;

    /// One response per request, in request order.
    fn set_parameter_values(&self, requests: Vec<SetParameterRequest>) -> Future<Vec<Response>>;

    fn invoke_method(&self, request: MethodInvocationRequest) -> Future<MethodInvocationResponse>;
}

/// Frontend plus bulk enumeration.
pub trait FrontendExtended: Frontend {
    /// Every parameter, optionally restricted to one device.
    fn get_all_parameters(&self, device: Option<DeviceId>) -> Future<Vec<ParameterResponse>>;
}

// ───────────────────────────────────────────────────────────────
// Backend (device registration)
// ───────────────────────────────────────────────────────────────

pub trait Backend: Send + Sync {
    /// One response per request, in request order.
    fn register_devices(&self, requests: Vec<RegisterDeviceRequest>) -> Future<Vec<Response>>;

    fn unregister_devices(&self, ids: Vec<DeviceId>) -> Future<Vec<Response>>;

    fn unregister_all_devices(&self) -> Future<Response>;
}

// ───────────────────────────────────────────────────────────────
// Parameter service core
// ───────────────────────────────────────────────────────────────

/// User-agnostic core that authorization façades wrap.
pub trait ParameterService: FrontendExtended + FileApi + Backend {
    /// Full permission set of `user_name`.
    fn get_full_user_permissions(&self, user_name: &str) -> Result<UserPermissions>;

    /// Feature owning a parameter; `None` when the parameter is unknown.
    fn parameter_feature(&self, id: &ParameterInstanceId) -> Option<String>;

    /// Feature owning a file; `None` when the file id is unknown.
    fn file_feature(&self, id: &str) -> Option<String>;
}
