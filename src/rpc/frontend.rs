//! Frontend (parameter access) over IPC: proxy and stub dispatch.
//!
//! One catalogue covers both `Frontend` and `FrontendExtended`; a proxy
//! implements both traits.

use std::sync::Arc;

use super::manager::Manager;
use super::message::decode_value;
use super::methods::{FrontendMethod, MethodCatalogue};
use super::proxy::Proxy;
use super::stub::{Dispatch, Stub, Target, encoded};
use crate::error::Result;
use crate::future::Future;
use crate::model::{
    DeviceCollectionResponse, DeviceId, DeviceResponse, MethodInvocationRequest,
    MethodInvocationResponse, ParameterInstanceId, ParameterResponse, Response,
    SetParameterRequest,
};
use crate::service::ports::{Frontend, FrontendExtended};

/// Remote frontend reached through a connection.
pub struct FrontendProxy {
    proxy: Proxy,
}

impl FrontendProxy {
    pub fn new(manager: &Arc<Manager>, object_id: u32) -> Result<Self> {
        Ok(Self {
            proxy: Proxy::register(manager, FrontendMethod::INTERFACE, object_id)?,
        })
    }
}

impl Frontend for FrontendProxy {
    fn get_all_devices(&self) -> Future<DeviceCollectionResponse> {
        self.proxy.call(FrontendMethod::GetAllDevices, &())
    }

    fn get_device(&self, id: DeviceId) -> Future<DeviceResponse> {
        self.proxy.call(FrontendMethod::GetDevice, &id)
    }

    fn get_parameters(&self, ids: Vec<ParameterInstanceId>) -> Future<Vec<ParameterResponse>> {
        self.proxy.call(FrontendMethod::GetParameters, &ids)
    }

    fn set_parameter_values(&self, requests: Vec<SetParameterRequest>) -> Future<Vec<Response>> {
        self.proxy.call(FrontendMethod::SetParameterValues, &requests)
    }

    fn invoke_method(&self, request: MethodInvocationRequest) -> Future<MethodInvocationResponse> {
        self.proxy.call(FrontendMethod::InvokeMethod, &request)
    }
}

impl FrontendExtended for FrontendProxy {
    fn get_all_parameters(&self, device: Option<DeviceId>) -> Future<Vec<ParameterResponse>> {
        self.proxy.call(FrontendMethod::GetAllParameters, &device)
    }
}

/// Stub-side adapter for a frontend implementation.
pub struct FrontendDispatch {
    target: Target<dyn FrontendExtended>,
}

impl FrontendDispatch {
    pub fn shared(target: Arc<dyn FrontendExtended>) -> Self {
        Self {
            target: Target::Shared(target),
        }
    }

    pub fn owned(target: Box<dyn FrontendExtended>) -> Self {
        Self {
            target: Target::Owned(target),
        }
    }
}

impl Dispatch for FrontendDispatch {
    fn interface(&self) -> &'static str {
        FrontendMethod::INTERFACE
    }

    fn dispatch(&self, method_id: u16, args: &[u8]) -> Result<Future<Vec<u8>>> {
        Ok(match FrontendMethod::try_from(method_id)? {
            FrontendMethod::GetAllDevices => {
                decode_value::<()>(args)?;
                encoded(self.target.get_all_devices())
            }
            FrontendMethod::GetDevice => encoded(self.target.get_device(decode_value(args)?)),
            FrontendMethod::GetParameters => {
                encoded(self.target.get_parameters(decode_value(args)?))
            }
            FrontendMethod::SetParameterValues => {
                encoded(self.target.set_parameter_values(decode_value(args)?))
            }
            FrontendMethod::InvokeMethod => encoded(self.target.invoke_method(decode_value(args)?)),
            FrontendMethod::GetAllParameters => {
                encoded(self.target.get_all_parameters(decode_value(args)?))
            }
        })
    }
}

pub type FrontendStub = Stub<FrontendDispatch>;

// ── Tests ────────────────────────────────────────────────────
