//! Backend (device registration) over IPC.
//!
//! ```text
//!  device process ─▶ BackendProxy ══ wire ══▶ BackendStub
//!                                                 │
//!                                          RemoteBackend ─▶ core Backend
//!                                                 │
//!                                     per-connection DeviceRegistry
//! ```
//!
//! Each connection gets its own [`RemoteBackend`], which remembers what that
//! connection registered.  When the connection drops, those devices are
//! unregistered from the core.

use std::sync::Arc;

use log::{info, warn};

use super::manager::Manager;
use super::message::decode_value;
use super::methods::{BackendMethod, MethodCatalogue};
use super::proxy::Proxy;
use super::stub::{Dispatch, Stub, Target, encoded};
use crate::error::Result;
use crate::future::Future;
use crate::model::{DeviceId, RegisterDeviceRequest, Response};
use crate::registry::DeviceRegistry;
use crate::service::ports::Backend;

// ── Proxy ────────────────────────────────────────────────────

/// Remote backend reached through a connection.
pub struct BackendProxy {
    proxy: Proxy,
}

impl BackendProxy {
    pub fn new(manager: &Arc<Manager>, object_id: u32) -> Result<Self> {
        Ok(Self {
            proxy: Proxy::register(manager, BackendMethod::INTERFACE, object_id)?,
        })
    }
}

impl Backend for BackendProxy {
    fn register_devices(&self, requests: Vec<RegisterDeviceRequest>) -> Future<Vec<Response>> {
        self.proxy.call(BackendMethod::RegisterDevices, &requests)
    }

    fn unregister_devices(&self, ids: Vec<DeviceId>) -> Future<Vec<Response>> {
        self.proxy.call(BackendMethod::UnregisterDevices, &ids)
    }

    fn unregister_all_devices(&self) -> Future<Response> {
        self.proxy.call(BackendMethod::UnregisterAllDevices, &())
    }
}

// ── Remote backend ───────────────────────────────────────────

/// Backend view of one connection: forwards to the core and tracks which
/// devices this connection owns.
pub struct RemoteBackend {
    core: Arc<dyn Backend>,
    registry: Arc<DeviceRegistry>,
}

impl RemoteBackend {
    pub fn new(core: Arc<dyn Backend>, connection_name: impl Into<String>) -> Self {
        Self {
            core,
            registry: Arc::new(DeviceRegistry::new(connection_name)),
        }
    }

    /// Devices registered through this connection.
    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// Unregister everything this connection registered.
    pub fn connection_lost(&self) {
        let ids = self.registry.device_ids();
        if !ids.is_empty() {
            info!(
                "[{}] connection lost, unregistering {} device(s)",
                self.registry.connection_name(),
                ids.len()
            );
            let name = self.registry.connection_name().to_owned();
            self.core.unregister_devices(ids).on_settled(move |outcome| {
                if let Err(e) = outcome {
                    warn!("[{name}] cleanup after connection loss failed: {e}");
                }
            });
        }
        self.registry.remove_devices(|_| true);
    }
}

impl Backend for RemoteBackend {
    fn register_devices(&self, requests: Vec<RegisterDeviceRequest>) -> Future<Vec<Response>> {
        let registry = Arc::clone(&self.registry);
        self.core
            .register_devices(requests.clone())
            .map(move |responses| {
                for (request, response) in requests.iter().zip(&responses) {
                    if !response.is_success() {
                        warn!(
                            "[{}] device {} not registered: {} {}",
                            registry.connection_name(),
                            request.id,
                            response.status,
                            response.message
                        );
                    } else if let Err(e) = registry.add_device(request) {
                        warn!("[{}] {}", registry.connection_name(), e);
                    }
                }
                responses
            })
    }

    fn unregister_devices(&self, ids: Vec<DeviceId>) -> Future<Vec<Response>> {
        let registry = Arc::clone(&self.registry);
        self.core
            .unregister_devices(ids.clone())
            .map(move |responses| {
                for (id, response) in ids.iter().zip(&responses) {
                    if response.is_success() {
                        registry.remove_device(*id);
                    }
                }
                responses
            })
    }

    /// Only devices registered through this connection are affected.
    fn unregister_all_devices(&self) -> Future<Response> {
        let registry = Arc::clone(&self.registry);
        self.core
            .unregister_devices(self.registry.device_ids())
            .map(move |responses| {
                let mut first_failure = None;
                for response in responses {
                    if response.is_success() {
                        continue;
                    }
                    warn!(
                        "[{}] unregister failed: {} {}",
                        registry.connection_name(),
                        response.status,
                        response.message
                    );
                    first_failure.get_or_insert(response);
                }
                registry.remove_devices(|_| true);
                first_failure.unwrap_or_else(Response::success)
            })
    }
}

// ── Stub ─────────────────────────────────────────────────────

/// Stub-side adapter for a backend implementation.
pub struct BackendDispatch {
    target: Target<dyn Backend>,
    remote: Option<Arc<RemoteBackend>>,
}

impl BackendDispatch {
    pub fn shared(target: Arc<dyn Backend>) -> Self {
        Self {
            target: Target::Shared(target),
            remote: None,
        }
    }

    pub fn owned(target: Box<dyn Backend>) -> Self {
        Self {
            target: Target::Owned(target),
            remote: None,
        }
    }

    /// Serve `core` to one connection, cleaning up its devices when the
    /// connection drops.
    pub fn for_connection(core: Arc<dyn Backend>, connection_name: impl Into<String>) -> Self {
        let remote = Arc::new(RemoteBackend::new(core, connection_name));
        Self {
            target: Target::Shared(Arc::clone(&remote) as Arc<dyn Backend>),
            remote: Some(remote),
        }
    }

    pub fn remote(&self) -> Option<&Arc<RemoteBackend>> {
        self.remote.as_ref()
    }
}

impl Dispatch for BackendDispatch {
    fn interface(&self) -> &'static str {
        BackendMethod::INTERFACE
    }

    fn dispatch(&self, method_id: u16, args: &[u8]) -> Result<Future<Vec<u8>>> {
        Ok(match BackendMethod::try_from(method_id)? {
            BackendMethod::RegisterDevices => {
                encoded(self.target.register_devices(decode_value(args)?))
            }
            BackendMethod::UnregisterDevices => {
                encoded(self.target.unregister_devices(decode_value(args)?))
            }
            BackendMethod::UnregisterAllDevices => {
                decode_value::<()>(args)?;
                encoded(self.target.unregister_all_devices())
            }
        })
    }

    fn connection_lost(&self) {
        if let Some(remote) = &self.remote {
            remote.connection_lost();
        }
    }
}

pub type BackendStub = Stub<BackendDispatch>;

// ── Tests ────────────────────────────────────────────────────
