//! Per-user authorization façade.
//!
//! ```text
//!   authorize(core, user) ──▶ get_full_user_permissions(user) ──▶ Authorized
//!                                                                  │
//!        Frontend / FrontendExtended / FileApi calls ──check──▶ core
//! ```
//!
//! The permission set is fetched once at construction and lives as long as
//! the façade.  A denied item resolves with `StatusCode::Unauthorized` and a
//! message naming the missing permission; permitted items are forwarded to
//! the user-agnostic core.  Re-authorization means building a new façade.

use std::sync::Arc;

use log::{debug, warn};

use crate::error::Result;
use crate::future::{Future, resolved};
use crate::model::{
    DeviceCollectionResponse, DeviceId, DeviceResponse, FileId, FileIdResponse, FileInfoResponse,
    FileReadResponse, MethodInvocationRequest, MethodInvocationResponse, ParameterInstanceId,
    ParameterResponse, Response, SUPERUSER, SetParameterRequest, StatusCode, UserData,
    UserPermissions,
};

use super::ports::{FileApi, Frontend, FrontendExtended, ParameterService};

/// Access level a call needs on a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Read,
    Write,
}

impl Access {
    fn suffix(self) -> &'static str {
        match self {
            Self::Read => "readonly",
            Self::Write => "readwrite",
        }
    }
}

/// Build a per-user view of `service`.
///
/// Fails when the user's permissions cannot be fetched; no partially
/// authorized façade is ever returned.
pub fn authorize<S>(service: Arc<S>, user: UserData) -> Result<Authorized<S>>
where
    S: ParameterService + ?Sized,
{
    let permissions = service.get_full_user_permissions(&user.name)?;
    debug!(
        "auth: user {} authorized ({} read, {} write feature(s))",
        user.name,
        permissions.read.len(),
        permissions.write.len()
    );
    Ok(Authorized {
        service,
        user,
        permissions,
    })
}

/// A user-bound façade over a [`ParameterService`].
pub struct Authorized<S: ParameterService + ?Sized = dyn ParameterService> {
    service: Arc<S>,
    user: UserData,
    permissions: UserPermissions,
}

impl<S: ParameterService + ?Sized> Authorized<S> {
    pub fn user(&self) -> &UserData {
        &self.user
    }

    pub fn permissions(&self) -> &UserPermissions {
        &self.permissions
    }

    /// `Err(message)` names the missing permission.
    fn check(&self, feature: &str, access: Access) -> core::result::Result<(), String> {
        if self.user.name == SUPERUSER {
            return Ok(());
        }
        let granted = match access {
            Access::Read => self.permissions.can_read(feature),
            Access::Write => self.permissions.can_write(feature),
        };
        if granted {
            Ok(())
        } else {
            warn!(
                "auth: {} lacks {}_{}",
                self.user.name,
                feature,
                access.suffix()
            );
            Err(format!(
                "Permission \"{}_{}\" is missing.",
                feature,
                access.suffix()
            ))
        }
    }

    /// Check access to a parameter.  Unknown parameters pass so the core can
    /// report them with its own status.
    fn check_parameter(
        &self,
        id: &ParameterInstanceId,
        access: Access,
    ) -> core::result::Result<(), String> {
        match self.service.parameter_feature(id) {
            Some(feature) => self.check(&feature, access),
            None => Ok(()),
        }
    }

    /// Check access to a file.  `Err((status, message))` for unknown ids too.
    fn check_file(
        &self,
        id: &str,
        access: Access,
    ) -> core::result::Result<(), (StatusCode, String)> {
        let Some(feature) = self.service.file_feature(id) else {
            return Err((StatusCode::UnknownFileId, format!("Unknown file id \"{id}\".")));
        };
        self.check(&feature, access)
            .map_err(|message| (StatusCode::Unauthorized, message))
    }
}

impl<S: ParameterService + ?Sized + 'static> Authorized<S> {
    pub fn into_file_api(self) -> Arc<dyn FileApi> {
        Arc::new(self)
    }

    pub fn into_frontend(self) -> Arc<dyn Frontend> {
        Arc::new(self)
    }

    pub fn into_frontend_extended(self) -> Arc<dyn FrontendExtended> {
        Arc::new(self)
    }
}

/// Forward the permitted subset of a batch and splice denials back in,
/// preserving request order.
fn split_batch<T, R>(
    items: Vec<T>,
    mut deny: impl FnMut(&T) -> Option<R>,
    forward: impl FnOnce(Vec<T>) -> Future<Vec<R>>,
    filler: impl Fn() -> R + Send + 'static,
) -> Future<Vec<R>>
where
    T: Send + 'static,
    R: Send + 'static,
{
    let mut slots: Vec<Option<R>> = Vec::with_capacity(items.len());
    let mut permitted = Vec::new();
    for item in items {
        match deny(&item) {
            Some(denied) => slots.push(Some(denied)),
            None => {
                slots.push(None);
                permitted.push(item);
            }
        }
    }
    if permitted.is_empty() {
        return resolved(slots.into_iter().flatten().collect());
    }
    forward(permitted).map(move |responses| {
        let mut responses = responses.into_iter();
        slots
            .into_iter()
            .map(|slot| slot.or_else(|| responses.next()).unwrap_or_else(&filler))
            .collect()
    })
}

// ── Frontend ─────────────────────────────────────────────────

impl<S: ParameterService + ?Sized> Frontend for Authorized<S> {
    fn get_all_devices(&self) -> Future<DeviceCollectionResponse> {
        self.service.get_all_devices()
    }

    fn get_device(&self, id: DeviceId) -> Future<DeviceResponse> {
        self.service.get_device(id)
    }

    fn get_parameters(&self, ids: Vec<ParameterInstanceId>) -> Future<Vec<ParameterResponse>> {
        split_batch(
            ids,
            |id| {
                self.check_parameter(id, Access::Read).err().map(|message| {
                    ParameterResponse::error(id.clone(), StatusCode::Unauthorized, message)
                })
            },
            |permitted| self.service.get_parameters(permitted),
            || {
                ParameterResponse::error(
                    ParameterInstanceId::new(DeviceId::default(), ""),
                    StatusCode::InternalError,
                    "missing response",
                )
            },
        )
    }

    fn set_parameter_values(&self, requests: Vec<SetParameterRequest>) -> Future<Vec<Response>> {
        split_batch(
            requests,
            |request| {
                self.check_parameter(&request.id, Access::Write)
                    .err()
                    .map(|message| Response::error(StatusCode::Unauthorized, message))
            },
            |permitted| self.service.set_parameter_values(permitted),
            || Response::error(StatusCode::InternalError, "missing response"),
        )
    }

    fn invoke_method(&self, request: MethodInvocationRequest) -> Future<MethodInvocationResponse> {
        if let Err(message) = self.check_parameter(&request.id, Access::Write) {
            return resolved(MethodInvocationResponse {
                status: StatusCode::Unauthorized,
                message,
                out_args: Vec::new(),
            });
        }
        self.service.invoke_method(request)
    }
}

impl<S: ParameterService + ?Sized + 'static> FrontendExtended for Authorized<S> {
    /// Parameters the user may not read are left out.
    fn get_all_parameters(&self, device: Option<DeviceId>) -> Future<Vec<ParameterResponse>> {
        let all = self.service.get_all_parameters(device);
        if self.user.name == SUPERUSER {
            return all;
        }
        let permissions = self.permissions.clone();
        let service = Arc::clone(&self.service);
        all.map(move |responses| {
            responses
                .into_iter()
                .filter(|r| {
                    service
                        .parameter_feature(&r.id)
                        .is_some_and(|feature| permissions.can_read(&feature))
                })
                .collect()
        })
    }
}

// ── File API ─────────────────────────────────────────────────

impl<S: ParameterService + ?Sized> FileApi for Authorized<S> {
    fn get_file_info(&self, id: FileId) -> Future<FileInfoResponse> {
        match self.check_file(&id, Access::Read) {
            Ok(()) => self.service.get_file_info(id),
            Err((status, message)) => resolved(FileInfoResponse::error(status, message)),
        }
    }

    fn read(&self, id: FileId, offset: u64, length: u64) -> Future<FileReadResponse> {
        match self.check_file(&id, Access::Read) {
            Ok(()) => self.service.read(id, offset, length),
            Err((status, message)) => resolved(FileReadResponse::error(status, message)),
        }
    }

    fn write(&self, id: FileId, offset: u64, data: Vec<u8>) -> Future<Response> {
        match self.check_file(&id, Access::Write) {
            Ok(()) => self.service.write(id, offset, data),
            Err((status, message)) => resolved(Response::error(status, message)),
        }
    }

    fn create(&self, id: FileId, capacity: u64) -> Future<Response> {
        match self.check_file(&id, Access::Write) {
            Ok(()) => self.service.create(id, capacity),
            Err((status, message)) => resolved(Response::error(status, message)),
        }
    }

    fn create_parameter_upload_id(&self, context: ParameterInstanceId) -> Future<FileIdResponse> {
        match self.check_parameter(&context, Access::Write) {
            Ok(()) => self.service.create_parameter_upload_id(context),
            Err(message) => resolved(FileIdResponse::error(StatusCode::Unauthorized, message)),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::model::{ParameterValue, RegisterDeviceRequest};
    use crate::service::ParameterServiceCore;
    use crate::service::ports::Backend;

    const DEV: DeviceId = DeviceId::new(2, 0);

    fn io() -> ParameterInstanceId {
        ParameterInstanceId::new(DEV, "io/do0")
    }

    fn fw() -> ParameterInstanceId {
        ParameterInstanceId::new(DEV, "fw/version")
    }

    fn core() -> Arc<ParameterServiceCore> {
        let core = ParameterServiceCore::new();
        let _ = core
            .register_devices(vec![RegisterDeviceRequest::new(DEV, "750-8212", "1.0")])
            .get()
            .unwrap();
        core.add_parameter(io(), "io", ParameterValue::Bool(false), true);
        core.add_parameter(fw(), "fw", ParameterValue::Text("1.0".into()), true);
        core.add_file("log", "diag", 0);
        core.set_user_permissions(UserPermissions::new("viewer").with_read("io"));
        core.set_user_permissions(UserPermissions::new("root"));
        Arc::new(core)
    }

    #[test]
    fn unknown_user_cannot_be_authorized() {
        let err = authorize(core(), UserData::new("mallory")).err();
        assert!(matches!(err, Some(Error::Authorization(_))));
    }

    #[test]
    fn denied_items_are_spliced_in_order() {
        let view = authorize(core(), UserData::new("viewer")).unwrap();
        let r = view.get_parameters(vec![fw(), io(), fw()]).get().unwrap();
        assert_eq!(r.len(), 3);
        assert_eq!(r[0].status, StatusCode::Unauthorized);
        assert_eq!(r[0].message, "Permission \"fw_readonly\" is missing.");
        assert_eq!(r[1].status, StatusCode::Success);
        assert_eq!(r[1].id, io());
        assert_eq!(r[2].status, StatusCode::Unauthorized);
    }

    #[test]
    fn read_permission_does_not_grant_write() {
        let view = authorize(core(), UserData::new("viewer")).unwrap();
        let r = view
            .set_parameter_values(vec![SetParameterRequest {
                id: io(),
                value: ParameterValue::Bool(true),
            }])
            .get()
            .unwrap();
        assert_eq!(r[0].status, StatusCode::Unauthorized);
        assert_eq!(r[0].message, "Permission \"io_readwrite\" is missing.");
    }

    #[test]
    fn superuser_bypasses_checks() {
        let view = authorize(core(), UserData::new(SUPERUSER)).unwrap();
        let r = view
            .set_parameter_values(vec![SetParameterRequest {
                id: fw(),
                value: ParameterValue::Text("2.0".into()),
            }])
            .get()
            .unwrap();
        assert!(r[0].is_success());
        assert_eq!(view.get_all_parameters(None).get().unwrap().len(), 2);
    }

    #[test]
    fn enumeration_hides_unreadable_parameters() {
        let view = authorize(core(), UserData::new("viewer")).unwrap();
        let all = view.get_all_parameters(Some(DEV)).get().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, io());
    }

    #[test]
    fn file_checks_report_unknown_id_before_permission() {
        let view = authorize(core(), UserData::new("viewer")).unwrap();
        let r = view.read("missing".into(), 0, 4).get().unwrap();
        assert_eq!(r.status, StatusCode::UnknownFileId);
        let r = view.write("log".into(), 0, vec![1]).get().unwrap();
        assert_eq!(r.status, StatusCode::Unauthorized);
        assert_eq!(r.message, "Permission \"diag_readwrite\" is missing.");
    }

    #[test]
    fn views_share_one_permission_fetch() {
        let view = authorize(core(), UserData::new("viewer")).unwrap();
        assert_eq!(view.user().name, "viewer");
        let frontend = view.into_frontend();
        let devices = frontend.get_all_devices().get().unwrap();
        assert_eq!(devices.devices.len(), 1);
    }
}
