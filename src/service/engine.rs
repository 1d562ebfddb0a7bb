//! In-memory parameter service core.
//!
//! User-agnostic: it answers every request it gets.  Permission checks live
//! in [`Authorized`](super::authorized::Authorized), which wraps this type.
//!
//! Parameters are only visible while their device is registered in the
//! core's [`DeviceRegistry`].

use std::collections::BTreeMap;
use std::mem;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, info};
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::future::{Future, resolved};
use crate::model::{
    DeviceCollectionResponse, DeviceId, DeviceResponse, FileId, FileIdResponse, FileInfoResponse,
    FileReadResponse, MethodInvocationRequest, MethodInvocationResponse, ParameterInstanceId,
    ParameterResponse, ParameterValue, RegisterDeviceRequest, Response, SetParameterRequest,
    StatusCode, UserPermissions,
};
use crate::registry::DeviceRegistry;

use super::ports::{Backend, FileApi, Frontend, FrontendExtended, ParameterService};

/// Handler behind a method parameter.
pub type MethodHandler =
    Arc<dyn Fn(&[ParameterValue]) -> core::result::Result<Vec<ParameterValue>, String> + Send + Sync>;

enum ParameterKind {
    Value {
        value: ParameterValue,
        writeable: bool,
    },
    Method(MethodHandler),
}

struct ParameterEntry {
    feature: String,
    kind: ParameterKind,
}

struct FileEntry {
    feature: String,
    capacity: u64,
    data: Vec<u8>,
}

/// In-memory, user-agnostic parameter service.
pub struct ParameterServiceCore {
    devices: DeviceRegistry,
    parameters: Mutex<BTreeMap<ParameterInstanceId, ParameterEntry>>,
    files: Mutex<BTreeMap<FileId, FileEntry>>,
    permissions: Mutex<BTreeMap<String, UserPermissions>>,
    next_upload_id: AtomicU64,
}

impl ParameterServiceCore {
    pub fn new() -> Self {
        Self {
            devices: DeviceRegistry::new("core"),
            parameters: Mutex::new(BTreeMap::new()),
            files: Mutex::new(BTreeMap::new()),
            permissions: Mutex::new(BTreeMap::new()),
            next_upload_id: AtomicU64::new(1),
        }
    }

    pub fn devices(&self) -> &DeviceRegistry {
        &self.devices
    }

    // ── Provisioning ─────────────────────────────────────────

    pub fn add_parameter(
        &self,
        id: ParameterInstanceId,
        feature: impl Into<String>,
        value: ParameterValue,
        writeable: bool,
    ) {
        self.parameters.lock().insert(
            id,
            ParameterEntry {
                feature: feature.into(),
                kind: ParameterKind::Value { value, writeable },
            },
        );
    }

    pub fn add_method(
        &self,
        id: ParameterInstanceId,
        feature: impl Into<String>,
        handler: MethodHandler,
    ) {
        self.parameters.lock().insert(
            id,
            ParameterEntry {
                feature: feature.into(),
                kind: ParameterKind::Method(handler),
            },
        );
    }

    /// Add a file.  A capacity of zero means unbounded.
    pub fn add_file(&self, id: impl Into<FileId>, feature: impl Into<String>, capacity: u64) {
        self.files.lock().insert(
            id.into(),
            FileEntry {
                feature: feature.into(),
                capacity,
                data: Vec::new(),
            },
        );
    }

    pub fn set_user_permissions(&self, permissions: UserPermissions) {
        self.permissions
            .lock()
            .insert(permissions.user_name.clone(), permissions);
    }

    /// Current file contents, mainly for inspection.
    pub fn file_contents(&self, id: &str) -> Option<Vec<u8>> {
        self.files.lock().get(id).map(|f| f.data.clone())
    }

    // ── Internals ────────────────────────────────────────────

    fn read_parameter(
        &self,
        id: ParameterInstanceId,
        parameters: &BTreeMap<ParameterInstanceId, ParameterEntry>,
    ) -> ParameterResponse {
        if !self.devices.has_device(id.device) {
            return ParameterResponse::error(id, StatusCode::UnknownDevice, "");
        }
        match parameters.get(&id) {
            None => ParameterResponse::error(id, StatusCode::UnknownParameterPath, ""),
            Some(entry) => {
                let value = match &entry.kind {
                    ParameterKind::Value { value, .. } => Some(value.clone()),
                    ParameterKind::Method(_) => None,
                };
                ParameterResponse {
                    status: StatusCode::Success,
                    message: String::new(),
                    id,
                    value,
                }
            }
        }
    }

    fn write_parameter(
        &self,
        request: SetParameterRequest,
        parameters: &mut BTreeMap<ParameterInstanceId, ParameterEntry>,
    ) -> Response {
        if !self.devices.has_device(request.id.device) {
            return Response::error(StatusCode::UnknownDevice, request.id.device.to_string());
        }
        let Some(entry) = parameters.get_mut(&request.id) else {
            return Response::error(StatusCode::UnknownParameterPath, request.id.to_string());
        };
        match &mut entry.kind {
            ParameterKind::Value { value, writeable } => {
                if !*writeable {
                    return Response::error(
                        StatusCode::ParameterNotWriteable,
                        request.id.to_string(),
                    );
                }
                if mem::discriminant(value) != mem::discriminant(&request.value) {
                    return Response::error(StatusCode::InvalidValue, "value type mismatch");
                }
                *value = request.value;
                Response::success()
            }
            ParameterKind::Method(_) => {
                Response::error(StatusCode::ParameterNotWriteable, "methods cannot be written")
            }
        }
    }
}

impl Default for ParameterServiceCore {
    fn default() -> Self {
        Self::new()
    }
}

// ── Frontend ─────────────────────────────────────────────────

impl Frontend for ParameterServiceCore {
    fn get_all_devices(&self) -> Future<DeviceCollectionResponse> {
        resolved(DeviceCollectionResponse {
            status: StatusCode::Success,
            message: String::new(),
            devices: self.devices.devices(),
        })
    }

    fn get_device(&self, id: DeviceId) -> Future<DeviceResponse> {
        let device = self.devices.get_device_meta(id);
        let status = if device.is_some() {
            StatusCode::Success
        } else {
            StatusCode::UnknownDevice
        };
        resolved(DeviceResponse {
            status,
            message: String::new(),
            device,
        })
    }

    fn get_parameters(&self, ids: Vec<ParameterInstanceId>) -> Future<Vec<ParameterResponse>> {
        let parameters = self.parameters.lock();
        let responses = ids
            .into_iter()
            .map(|id| self.read_parameter(id, &parameters))
            .collect();
        resolved(responses)
    }

    fn set_parameter_values(&self, requests: Vec<SetParameterRequest>) -> Future<Vec<Response>> {
        let mut parameters = self.parameters.lock();
        let responses = requests
            .into_iter()
            .map(|request| self.write_parameter(request, &mut parameters))
            .collect();
        resolved(responses)
    }

    fn invoke_method(&self, request: MethodInvocationRequest) -> Future<MethodInvocationResponse> {
        let failure = |status, message: String| MethodInvocationResponse {
            status,
            message,
            out_args: Vec::new(),
        };
        if !self.devices.has_device(request.id.device) {
            return resolved(failure(
                StatusCode::UnknownDevice,
                request.id.device.to_string(),
            ));
        }
        let handler = match self.parameters.lock().get(&request.id).map(|e| &e.kind) {
            None => {
                return resolved(failure(
                    StatusCode::UnknownParameterPath,
                    request.id.to_string(),
                ));
            }
            Some(ParameterKind::Value { .. }) => {
                return resolved(failure(StatusCode::NotAMethod, request.id.to_string()));
            }
            Some(ParameterKind::Method(handler)) => Arc::clone(handler),
        };
        // Handler runs without the parameter lock held.
        let response = match handler(&request.in_args) {
            Ok(out_args) => MethodInvocationResponse {
                status: StatusCode::Success,
                message: String::new(),
                out_args,
            },
            Err(message) => failure(StatusCode::InternalError, message),
        };
        resolved(response)
    }
}

impl FrontendExtended for ParameterServiceCore {
    fn get_all_parameters(&self, device: Option<DeviceId>) -> Future<Vec<ParameterResponse>> {
        let parameters = self.parameters.lock();
        let responses = parameters
            .keys()
            .filter(|id| device.is_none_or(|d| id.device == d))
            .filter(|id| self.devices.has_device(id.device))
            .cloned()
            .collect::<Vec<_>>()
            .into_iter()
            .map(|id| self.read_parameter(id, &parameters))
            .collect();
        resolved(responses)
    }
}

// ── File API ─────────────────────────────────────────────────

impl FileApi for ParameterServiceCore {
    fn get_file_info(&self, id: FileId) -> Future<FileInfoResponse> {
        let files = self.files.lock();
        let response = match files.get(&id) {
            Some(file) => FileInfoResponse {
                status: StatusCode::Success,
                message: String::new(),
                file_size: file.data.len() as u64,
            },
            None => FileInfoResponse::error(StatusCode::UnknownFileId, id),
        };
        resolved(response)
    }

    fn read(&self, id: FileId, offset: u64, length: u64) -> Future<FileReadResponse> {
        let files = self.files.lock();
        let Some(file) = files.get(&id) else {
            return resolved(FileReadResponse::error(StatusCode::UnknownFileId, id));
        };
        let size = file.data.len() as u64;
        if offset > size {
            return resolved(FileReadResponse::error(
                StatusCode::InvalidValue,
                format!("read offset {offset} beyond end of file ({size} bytes)"),
            ));
        }
        let end = offset.saturating_add(length).min(size);
        let data = file.data[offset as usize..end as usize].to_vec();
        resolved(FileReadResponse::with_data(data))
    }

    fn write(&self, id: FileId, offset: u64, data: Vec<u8>) -> Future<Response> {
        let mut files = self.files.lock();
        let Some(file) = files.get_mut(&id) else {
            return resolved(Response::error(StatusCode::UnknownFileId, id));
        };
        let size = file.data.len() as u64;
        let Some(end) = offset.checked_add(data.len() as u64) else {
            return resolved(Response::error(
                StatusCode::InvalidValue,
                format!("write at {offset} overflows the file offset range"),
            ));
        };
        if offset > size {
            return resolved(Response::error(
                StatusCode::InvalidValue,
                format!("write offset {offset} beyond end of file ({size} bytes)"),
            ));
        }
        if file.capacity > 0 && end > file.capacity {
            return resolved(Response::error(
                StatusCode::FileSizeExceeded,
                format!("write up to {end} exceeds capacity {}", file.capacity),
            ));
        }
        if (file.data.len() as u64) < end {
            file.data.resize(end as usize, 0);
        }
        file.data[offset as usize..end as usize].copy_from_slice(&data);
        debug!("core: wrote {} byte(s) to {id} at {offset}", data.len());
        resolved(Response::success())
    }

    fn create(&self, id: FileId, capacity: u64) -> Future<Response> {
        let mut files = self.files.lock();
        let Some(file) = files.get_mut(&id) else {
            return resolved(Response::error(StatusCode::UnknownFileId, id));
        };
        file.capacity = capacity;
        file.data.clear();
        resolved(Response::success())
    }

    fn create_parameter_upload_id(&self, context: ParameterInstanceId) -> Future<FileIdResponse> {
        let Some(feature) = self.parameter_feature(&context) else {
            return resolved(FileIdResponse::error(
                StatusCode::UnknownParameterPath,
                context.to_string(),
            ));
        };
        let n = self.next_upload_id.fetch_add(1, Ordering::Relaxed);
        let file_id = format!("upload-{n}");
        self.add_file(file_id.clone(), feature, 0);
        info!("core: upload id {file_id} created for {context}");
        resolved(FileIdResponse {
            status: StatusCode::Success,
            message: String::new(),
            file_id,
        })
    }
}

// ── Backend ──────────────────────────────────────────────────

impl Backend for ParameterServiceCore {
    fn register_devices(&self, requests: Vec<RegisterDeviceRequest>) -> Future<Vec<Response>> {
        let responses = requests
            .iter()
            .map(|request| match self.devices.add_device(request) {
                Ok(()) => Response::success(),
                Err(e) => Response::error(StatusCode::DeviceAlreadyExists, e.to_string()),
            })
            .collect();
        resolved(responses)
    }

    fn unregister_devices(&self, ids: Vec<DeviceId>) -> Future<Vec<Response>> {
        let responses = ids
            .into_iter()
            .map(|id| {
                if self.devices.has_device(id) {
                    self.devices.remove_device(id);
                    Response::success()
                } else {
                    Response::error(StatusCode::UnknownDevice, id.to_string())
                }
            })
            .collect();
        resolved(responses)
    }

    fn unregister_all_devices(&self) -> Future<Response> {
        self.devices.remove_devices(|_| true);
        resolved(Response::success())
    }
}

impl ParameterService for ParameterServiceCore {
    fn get_full_user_permissions(&self, user_name: &str) -> Result<UserPermissions> {
        self.permissions
            .lock()
            .get(user_name)
            .cloned()
            .ok_or_else(|| Error::Authorization(format!("unknown user \"{user_name}\"")))
    }

    fn parameter_feature(&self, id: &ParameterInstanceId) -> Option<String> {
        self.parameters.lock().get(id).map(|e| e.feature.clone())
    }

    fn file_feature(&self, id: &str) -> Option<String> {
        self.files.lock().get(id).map(|f| f.feature.clone())
    }
}

// ── Tests ────────────────────────────────────────────────────
