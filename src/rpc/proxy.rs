//! Client-side call machinery shared by every interface proxy.
//!
//! ```text
//!  call(method, args) ─▶ open_calls[call_id] = completion ─▶ Call frame
//!                                                               │
//!  Future ◀─ completion(payload) ◀─ open_calls.remove ◀─ Response frame
//!     │
//!     └─ dismiss() ─▶ open_calls.remove ─▶ Dismiss frame
//! ```
//!
//! The proxy owns only its link to the connection, never the remote
//! implementation.  Dropping the typed proxy fails all still-open calls.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use log::{debug, warn};
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::manager::{Link, ManagedObject, Manager};
use super::message::{Body, IpcStatus, decode_value, encode_value, remote_failure};
use super::methods::MethodCatalogue;
use crate::error::{Error, ProtocolError, Result, TransportError};
use crate::future::{Future, Promise, failed};

type Completion = Box<dyn FnOnce(Result<Vec<u8>>) + Send>;

/// Open calls of one proxy, keyed by call id.
pub struct ProxyCore {
    interface: &'static str,
    link: Link,
    next_call_id: AtomicU64,
    open_calls: Mutex<HashMap<u64, Completion>>,
}

impl ProxyCore {
    /// Issue one call.  The returned future resolves with the decoded result.
    pub fn call<M, A, R>(self: &Arc<Self>, method: M, args: &A) -> Future<R>
    where
        M: MethodCatalogue,
        A: Serialize + ?Sized,
        R: DeserializeOwned + Send + 'static,
    {
        let args = match encode_value(args) {
            Ok(args) => args,
            Err(e) => return failed(e),
        };
        let call_id = self.next_call_id.fetch_add(1, Ordering::Relaxed);

        let (promise, future) = Promise::<R>::pair();
        let weak: Weak<Self> = Arc::downgrade(self);
        promise.set_dismiss_notifier(move || {
            if let Some(core) = weak.upgrade() {
                core.dismiss_call(call_id);
            }
        });
        self.open_calls.lock().insert(
            call_id,
            Box::new(move |outcome: Result<Vec<u8>>| {
                let _ = promise.set_result(outcome.and_then(|bytes| decode_value::<R>(&bytes)));
            }),
        );

        debug!(
            "[{} {} {}] call {} id {}",
            self.link.connection_name(),
            self.interface,
            self.link.object_id(),
            method.name(),
            call_id
        );
        let sent = self.link.send(Body::Call {
            method_id: method.id(),
            call_id,
            args,
        });
        if let Err(e) = sent {
            warn!("[{} {}] send failed: {}", self.interface, call_id, e);
            self.complete(call_id, Err(e));
        }
        future
    }

    pub fn open_call_count(&self) -> usize {
        self.open_calls.lock().len()
    }

    fn complete(&self, call_id: u64, outcome: Result<Vec<u8>>) {
        let completion = self.open_calls.lock().remove(&call_id);
        match completion {
            Some(completion) => completion(outcome),
            None => debug!(
                "[{} {}] {} (dismissed or unknown)",
                self.interface,
                self.link.object_id(),
                ProtocolError::UnknownCall(call_id)
            ),
        }
    }

    fn dismiss_call(&self, call_id: u64) {
        let removed = self.open_calls.lock().remove(&call_id);
        if removed.is_none() {
            return;
        }
        drop(removed);
        if let Err(e) = self.link.send(Body::Dismiss { call_id }) {
            debug!("[{} {}] dismiss not delivered: {}", self.interface, call_id, e);
        }
    }

    /// Fail every open call with `error`.
    pub fn fail_all(&self, error: &Error) {
        let open: Vec<Completion> = self.open_calls.lock().drain().map(|(_, c)| c).collect();
        if !open.is_empty() {
            warn!(
                "[{} {}] failing {} open call(s): {}",
                self.interface,
                self.link.object_id(),
                open.len(),
                error
            );
        }
        for completion in open {
            completion(Err(error.clone()));
        }
    }
}

impl ManagedObject for ProxyCore {
    fn handle_message(&self, body: Body) {
        match body {
            Body::Response {
                call_id,
                status,
                payload,
            } => {
                let outcome = if status == IpcStatus::Success {
                    Ok(payload)
                } else {
                    Err(remote_failure(status, &payload))
                };
                self.complete(call_id, outcome);
            }
            other => warn!(
                "[{} {}] {}",
                self.interface,
                self.link.object_id(),
                ProtocolError::UnexpectedMessage(other.kind())
            ),
        }
    }

    fn connection_lost(&self) {
        self.fail_all(&TransportError::Closed.into());
    }
}

/// Registration of a [`ProxyCore`] on a connection.  Typed proxies wrap one.
pub struct Proxy {
    core: Arc<ProxyCore>,
}

impl Proxy {
    /// Register a proxy for the remote object `object_id` on `manager`.
    pub fn register(
        manager: &Arc<Manager>,
        interface: &'static str,
        object_id: u32,
    ) -> Result<Self> {
        let core = Arc::new(ProxyCore {
            interface,
            link: manager.link(object_id),
            next_call_id: AtomicU64::new(1),
            open_calls: Mutex::new(HashMap::new()),
        });
        manager.add_object(object_id, Arc::clone(&core) as Arc<dyn ManagedObject>)?;
        Ok(Self { core })
    }

    pub fn call<M, A, R>(&self, method: M, args: &A) -> Future<R>
    where
        M: MethodCatalogue,
        A: Serialize + ?Sized,
        R: DeserializeOwned + Send + 'static,
    {
        self.core.call(method, args)
    }

    pub fn object_id(&self) -> u32 {
        self.core.link.object_id()
    }

    pub fn open_call_count(&self) -> usize {
        self.core.open_call_count()
    }
}

impl Drop for Proxy {
    fn drop(&mut self) {
        self.core.link.unregister();
        self.core.fail_all(&TransportError::ObjectCleanedUp.into());
    }
}
