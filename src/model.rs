//! Value types exchanged across the service interfaces.
//!
//! Everything here is plain data: serde-derived so the IPC layer can move it
//! through the wire serializer, `Clone` so a façade can hand out snapshots.
//! Domain failures travel as a [`StatusCode`] inside these values; only
//! transport and protocol failures use a future's exception channel.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

// ── Status ───────────────────────────────────────────────────

/// Outcome of one item of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusCode {
    Success,
    UnknownFileId,
    Unauthorized,
    FileNotAccessible,
    FileSizeExceeded,
    InvalidValue,
    ParameterNotWriteable,
    UnknownParameterPath,
    NotAMethod,
    UnknownDevice,
    DeviceAlreadyExists,
    InternalError,
}

impl StatusCode {
    pub fn is_success(self) -> bool {
        self == Self::Success
    }

    pub fn has_error(self) -> bool {
        !self.is_success()
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Success => "success",
            Self::UnknownFileId => "unknown file id",
            Self::Unauthorized => "unauthorized",
            Self::FileNotAccessible => "file not accessible",
            Self::FileSizeExceeded => "file size exceeded",
            Self::InvalidValue => "invalid value",
            Self::ParameterNotWriteable => "parameter not writeable",
            Self::UnknownParameterPath => "unknown parameter path",
            Self::NotAMethod => "parameter is not a method",
            Self::UnknownDevice => "unknown device",
            Self::DeviceAlreadyExists => "device already exists",
            Self::InternalError => "internal error",
        };
        f.write_str(name)
    }
}

/// Status plus an optional human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: StatusCode,
    pub message: String,
}

impl Response {
    pub fn success() -> Self {
        Self {
            status: StatusCode::Success,
            message: String::new(),
        }
    }

    pub fn error(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

// ── Devices ──────────────────────────────────────────────────

/// Composite device key: backplane slot plus device collection.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct DeviceId {
    pub slot: u16,
    pub collection: u8,
}

impl DeviceId {
    pub const fn new(slot: u16, collection: u8) -> Self {
        Self { slot, collection }
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.slot, self.collection)
    }
}

/// What a device announces when it registers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterDeviceRequest {
    pub id: DeviceId,
    pub order_number: String,
    pub firmware_version: String,
}

impl RegisterDeviceRequest {
    pub fn new(
        id: DeviceId,
        order_number: impl Into<String>,
        firmware_version: impl Into<String>,
    ) -> Self {
        Self {
            id,
            order_number: order_number.into(),
            firmware_version: firmware_version.into(),
        }
    }
}

/// Registration metadata kept by a device registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceMeta {
    pub id: DeviceId,
    pub order_number: String,
    pub firmware_version: String,
}

impl From<&RegisterDeviceRequest> for DeviceMeta {
    fn from(request: &RegisterDeviceRequest) -> Self {
        Self {
            id: request.id,
            order_number: request.order_number.clone(),
            firmware_version: request.firmware_version.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceResponse {
    pub status: StatusCode,
    pub message: String,
    pub device: Option<DeviceMeta>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCollectionResponse {
    pub status: StatusCode,
    pub message: String,
    pub devices: Vec<DeviceMeta>,
}

// ── Parameters ───────────────────────────────────────────────

/// Typed parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

/// A parameter addressed on one device.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParameterInstanceId {
    pub device: DeviceId,
    pub path: String,
}

impl ParameterInstanceId {
    pub fn new(device: DeviceId, path: impl Into<String>) -> Self {
        Self {
            device,
            path: path.into(),
        }
    }
}

impl fmt::Display for ParameterInstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.device, self.path)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterResponse {
    pub status: StatusCode,
    pub message: String,
    pub id: ParameterInstanceId,
    pub value: Option<ParameterValue>,
}

impl ParameterResponse {
    pub fn error(id: ParameterInstanceId, status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            id,
            value: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetParameterRequest {
    pub id: ParameterInstanceId,
    pub value: ParameterValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodInvocationRequest {
    pub id: ParameterInstanceId,
    pub in_args: Vec<ParameterValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodInvocationResponse {
    pub status: StatusCode,
    pub message: String,
    pub out_args: Vec<ParameterValue>,
}

// ── Files ────────────────────────────────────────────────────

pub type FileId = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReadResponse {
    pub status: StatusCode,
    pub message: String,
    pub data: Vec<u8>,
}

impl FileReadResponse {
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            status: StatusCode::Success,
            message: String::new(),
            data,
        }
    }

    pub fn error(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            data: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfoResponse {
    pub status: StatusCode,
    pub message: String,
    pub file_size: u64,
}

impl FileInfoResponse {
    pub fn error(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            file_size: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileIdResponse {
    pub status: StatusCode,
    pub message: String,
    pub file_id: FileId,
}

impl FileIdResponse {
    pub fn error(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            file_id: FileId::new(),
        }
    }
}

// ── Users ────────────────────────────────────────────────────

/// Name of the user that bypasses permission checks.
pub const SUPERUSER: &str = "root";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserData {
    pub name: String,
}

impl UserData {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Feature-level permissions of one user.  Write access implies read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPermissions {
    pub user_name: String,
    pub read: BTreeSet<String>,
    pub write: BTreeSet<String>,
}

impl UserPermissions {
    pub fn new(user_name: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_read(mut self, feature: impl Into<String>) -> Self {
        self.read.insert(feature.into());
        self
    }

    #[must_use]
    pub fn with_write(mut self, feature: impl Into<String>) -> Self {
        self.write.insert(feature.into());
        self
    }

    pub fn can_read(&self, feature: &str) -> bool {
        self.read.contains(feature) || self.write.contains(feature)
    }

    pub fn can_write(&self, feature: &str) -> bool {
        self.write.contains(feature)
    }
}

// ── Tests ────────────────────────────────────────────────────
