//! Server-side dispatch machinery shared by every interface stub.
//!
//! ```text
//!  Call frame ─▶ Dispatch::dispatch(method_id, args) ─▶ target future
//!                                                          │
//!        open_calls[call_id] ◀─────────────────────────────┤
//!                                                          ▼
//!  Response frame ◀─ encode ◀─ open_calls.remove ◀─ resolved (any thread)
//!  Dismiss frame  ─▶ open_calls.remove ─▶ target future .dismiss()
//! ```
//!
//! Unknown method ids and undecodable arguments are answered with a failure
//! response; they never take the stub down.

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;

use log::{debug, warn};
use parking_lot::Mutex;
use serde::Serialize;

use super::manager::{Link, ManagedObject, Manager};
use super::message::{Body, IpcStatus, encode_value};
use crate::error::{Error, ProtocolError, Result};
use crate::future::{DismissHandle, Future, failed, resolved};

/// Implementation behind a stub: borrowed from elsewhere or owned outright.
pub enum Target<T: ?Sized> {
    Shared(Arc<T>),
    Owned(Box<T>),
}

impl<T: ?Sized> Deref for Target<T> {
    type Target = T;

    fn deref(&self) -> &T {
        match self {
            Self::Shared(t) => t,
            Self::Owned(t) => t,
        }
    }
}

/// Per-interface adapter from `(method_id, args)` to a target call.
pub trait Dispatch: Send + Sync + 'static {
    /// Interface name used in logs.
    fn interface(&self) -> &'static str;

    /// Decode `args`, invoke the target and return its encoded result.
    fn dispatch(&self, method_id: u16, args: &[u8]) -> Result<Future<Vec<u8>>>;

    /// The connection carrying this stub went away.
    fn connection_lost(&self) {}
}

/// Encode the eventual result of a target call.
pub fn encoded<R: Serialize + Send + 'static>(future: Future<R>) -> Future<Vec<u8>> {
    future.and_then(|value| match encode_value(&value) {
        Ok(bytes) => resolved(bytes),
        Err(e) => failed(e),
    })
}

type OpenCalls = Arc<Mutex<HashMap<u64, DismissHandle>>>;

/// A dispatch table bound to one object id on one connection.
pub struct Stub<D: Dispatch> {
    link: Link,
    dispatch: D,
    open_calls: OpenCalls,
}

impl<D: Dispatch> Stub<D> {
    /// Expose `dispatch` as object `object_id` on `manager`.
    pub fn register(manager: &Arc<Manager>, object_id: u32, dispatch: D) -> Result<Arc<Self>> {
        let stub = Arc::new(Self {
            link: manager.link(object_id),
            dispatch,
            open_calls: Arc::new(Mutex::new(HashMap::new())),
        });
        manager.add_object(object_id, Arc::clone(&stub) as Arc<dyn ManagedObject>)?;
        Ok(stub)
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatch
    }

    pub fn object_id(&self) -> u32 {
        self.link.object_id()
    }

    pub fn open_call_count(&self) -> usize {
        self.open_calls.lock().len()
    }

    /// Detach from the connection and dismiss everything still running.
    pub fn unregister(&self) {
        self.link.unregister();
        self.dismiss_all();
    }

    fn dismiss_all(&self) {
        let open: Vec<DismissHandle> = self.open_calls.lock().drain().map(|(_, h)| h).collect();
        for handle in open {
            handle.dismiss();
        }
    }

    fn handle_call(&self, method_id: u16, call_id: u64, args: &[u8]) {
        let pending = match self.dispatch.dispatch(method_id, args) {
            Ok(pending) => pending,
            Err(e) => {
                let status = match e {
                    Error::Protocol(ProtocolError::UnknownMethod { .. }) => IpcStatus::UnknownMethod,
                    Error::Protocol(ProtocolError::Malformed(_)) => IpcStatus::MalformedArguments,
                    _ => IpcStatus::UnexpectedException,
                };
                warn!(
                    "[{} {}] call {} rejected: {}",
                    self.dispatch.interface(),
                    self.link.object_id(),
                    call_id,
                    e
                );
                self.reply(Body::failure(call_id, status, &e.to_string()));
                return;
            }
        };

        let link = self.link.clone();
        let open_calls = Arc::clone(&self.open_calls);
        let interface = self.dispatch.interface();
        pending.on_settled(move |outcome| {
            open_calls.lock().remove(&call_id);
            let sent = match outcome {
                Ok(payload) => link
                    .send(Body::Response {
                        call_id,
                        status: IpcStatus::Success,
                        payload,
                    })
                    // An unsendable result still settles the caller's call.
                    .or_else(|e| {
                        warn!(
                            "[{} {}] result of call {} not sent: {}",
                            interface,
                            link.object_id(),
                            call_id,
                            e
                        );
                        link.send(Body::failure(
                            call_id,
                            IpcStatus::UnexpectedException,
                            &e.to_string(),
                        ))
                    }),
                Err(e) => link.send(Body::failure(
                    call_id,
                    IpcStatus::UnexpectedException,
                    &e.to_string(),
                )),
            };
            if let Err(e) = sent {
                debug!(
                    "[{} {}] response {} not delivered: {}",
                    interface,
                    link.object_id(),
                    call_id,
                    e
                );
            }
        });

        // The continuation removes the entry under the same lock, so an
        // entry is only kept for calls that had not settled yet.
        let mut open = self.open_calls.lock();
        if !pending.is_ready() {
            open.insert(call_id, pending.dismiss_handle());
        }
    }

    fn reply(&self, body: Body) {
        if let Err(e) = self.link.send(body) {
            debug!(
                "[{} {}] reply not delivered: {}",
                self.dispatch.interface(),
                self.link.object_id(),
                e
            );
        }
    }
}

impl<D: Dispatch> ManagedObject for Stub<D> {
    fn handle_message(&self, body: Body) {
        match body {
            Body::Call {
                method_id,
                call_id,
                args,
            } => self.handle_call(method_id, call_id, &args),
            Body::Dismiss { call_id } => {
                let handle = self.open_calls.lock().remove(&call_id);
                if let Some(handle) = handle {
                    debug!(
                        "[{} {}] call {} dismissed by peer",
                        self.dispatch.interface(),
                        self.link.object_id(),
                        call_id
                    );
                    handle.dismiss();
                }
            }
            Body::Response { .. } => warn!(
                "[{} {}] {}",
                self.dispatch.interface(),
                self.link.object_id(),
                ProtocolError::UnexpectedMessage("response")
            ),
        }
    }

    fn connection_lost(&self) {
        self.dismiss_all();
        self.dispatch.connection_lost();
    }
}
