//! Method-id catalogues.
//!
//! Each interface has a closed set of ids shared by its proxy and stub.  Ids
//! are stable: a retired method's id is never reused.

use crate::error::ProtocolError;

/// Common surface of the catalogues below.
pub trait MethodCatalogue: Copy + TryFrom<u16, Error = ProtocolError> {
    /// Interface name used in logs and protocol errors.
    const INTERFACE: &'static str;

    fn id(self) -> u16;

    fn name(self) -> &'static str;
}

fn unknown(interface: &'static str, id: u16) -> ProtocolError {
    ProtocolError::UnknownMethod { interface, id }
}

// ── File API ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum FileApiMethod {
    Read = 1,
    Write = 2,
    GetFileInfo = 3,
    Create = 4,
    CreateParameterUploadId = 5,
}

impl TryFrom<u16> for FileApiMethod {
    type Error = ProtocolError;

    fn try_from(id: u16) -> Result<Self, ProtocolError> {
        match id {
            1 => Ok(Self::Read),
            2 => Ok(Self::Write),
            3 => Ok(Self::GetFileInfo),
            4 => Ok(Self::Create),
            5 => Ok(Self::CreateParameterUploadId),
            _ => Err(unknown(Self::INTERFACE, id)),
        }
    }
}

impl MethodCatalogue for FileApiMethod {
    const INTERFACE: &'static str = "file_api";

    fn id(self) -> u16 {
        self as u16
    }

    fn name(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::GetFileInfo => "get_file_info",
            Self::Create => "create",
            Self::CreateParameterUploadId => "create_parameter_upload_id",
        }
    }
}

// ── Frontend ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum FrontendMethod {
    GetAllDevices = 1,
    GetDevice = 2,
    GetParameters = 3,
    SetParameterValues = 4,
    InvokeMethod = 5,
    GetAllParameters = 6,
}

impl TryFrom<u16> for FrontendMethod {
    type Error = ProtocolError;

    fn try_from(id: u16) -> Result<Self, ProtocolError> {
        match id {
            1 => Ok(Self::GetAllDevices),
            2 => Ok(Self::GetDevice),
            3 => Ok(Self::GetParameters),
            4 => Ok(Self::SetParameterValues),
            5 => Ok(Self::InvokeMethod),
            6 => Ok(Self::GetAllParameters),
            _ => Err(unknown(Self::INTERFACE, id)),
        }
    }
}

impl MethodCatalogue for FrontendMethod {
    const INTERFACE: &'static str = "frontend";

    fn id(self) -> u16 {
        self as u16
    }

    fn name(self) -> &'static str {
        match self {
            Self::GetAllDevices => "get_all_devices",
            Self::GetDevice => "get_device",
            Self::GetParameters => "get_parameters",
            Self::SetParameterValues => "set_parameter_values",
            Self::InvokeMethod => "invoke_method",
            Self::GetAllParameters => "get_all_parameters",
        }
    }
}

// ── Backend ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum BackendMethod {
    RegisterDevices = 101,
    UnregisterDevices = 102,
    UnregisterAllDevices = 103,
}

impl TryFrom<u16> for BackendMethod {
    type Error = ProtocolError;

    fn try_from(id: u16) -> Result<Self, ProtocolError> {
        match id {
            101 => Ok(Self::RegisterDevices),
            102 => Ok(Self::UnregisterDevices),
            103 => Ok(Self::UnregisterAllDevices),
            _ => Err(unknown(Self::INTERFACE, id)),
        }
    }
}

impl MethodCatalogue for BackendMethod {
    const INTERFACE: &'static str = "backend";

    fn id(self) -> u16 {
        self as u16
    }

    fn name(self) -> &'static str {
        match self {
            Self::RegisterDevices => "register_devices",
            Self::UnregisterDevices => "unregister_devices",
            Self::UnregisterAllDevices => "unregister_all_devices",
        }
    }
}

// ── Tests ────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrips<M: MethodCatalogue + PartialEq + core::fmt::Debug>(all: &[M]) {
        for &m in all {
            assert_eq!(M::try_from(m.id()), Ok(m), "{}", m.name());
        }
    }

    #[test]
    fn ids_roundtrip() {
        roundtrips(&[
            FileApiMethod::Read,
            FileApiMethod::Write,
            FileApiMethod::GetFileInfo,
            FileApiMethod::Create,
            FileApiMethod::CreateParameterUploadId,
        ]);
        roundtrips(&[
            FrontendMethod::GetAllDevices,
            FrontendMethod::GetDevice,
            FrontendMethod::GetParameters,
            FrontendMethod::SetParameterValues,
            FrontendMethod::InvokeMethod,
            FrontendMethod::GetAllParameters,
        ]);
        roundtrips(&[
            BackendMethod::RegisterDevices,
            BackendMethod::UnregisterDevices,
            BackendMethod::UnregisterAllDevices,
        ]);
    }

    #[test]
    fn backend_ids_are_fixed() {
        assert_eq!(BackendMethod::RegisterDevices.id(), 101);
        assert_eq!(BackendMethod::UnregisterAllDevices.id(), 103);
    }

    #[test]
    fn unknown_id_names_interface() {
        assert_eq!(
            FileApiMethod::try_from(0),
            Err(ProtocolError::UnknownMethod {
                interface: "file_api",
                id: 0
            })
        );
        assert!(BackendMethod::try_from(1).is_err());
    }
}
