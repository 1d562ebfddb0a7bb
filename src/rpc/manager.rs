//! Connection manager: managed object store plus frame routing.
//!
//! ```text
//!             ┌──────────────── Manager ─────────────────┐
//!  Receiver ─▶│ Driver ─▶ decode ─▶ objects[object_id] ──┼─▶ Proxy / Stub
//!             │                                          │
//!  Sender   ◀─┼── encode ◀── send(object_id, body) ◀─────┼── Proxy / Stub
//!             └──────────────────────────────────────────┘
//! ```
//!
//! One manager per named connection.  Objects hold only a weak [`Link`] back
//! to their manager, so dropping the manager ends the connection.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::Duration;

use log::{debug, info, warn};
use parking_lot::Mutex;

use super::message::{Body, Envelope, FIRST_GENERATED_OBJECT_ID};
use super::transport::{Receiver, Sender};
use crate::error::{Error, FutureError, ProtocolError, RegistryError, Result, TransportError};
use crate::future::Future;

/// Anything addressable by object id on a connection.
pub trait ManagedObject: Send + Sync {
    /// Handle one inbound message addressed to this object.
    fn handle_message(&self, body: Body);

    /// The connection went away.
    fn connection_lost(&self) {}
}

/// Weak route from an object back to its connection.
#[derive(Clone)]
pub struct Link {
    manager: Weak<Manager>,
    object_id: u32,
}

impl Link {
    pub fn object_id(&self) -> u32 {
        self.object_id
    }

    pub fn connection_name(&self) -> String {
        self.manager
            .upgrade()
            .map(|m| m.connection_name.clone())
            .unwrap_or_default()
    }

    pub fn send(&self, body: Body) -> Result<()> {
        let manager = self.manager.upgrade().ok_or(TransportError::Closed)?;
        manager.send(self.object_id, body)
    }

    /// Detach the object from its connection.
    pub fn unregister(&self) {
        if let Some(manager) = self.manager.upgrade() {
            manager.remove_object(self.object_id);
        }
    }
}

/// Managed objects and the outgoing half of one connection.
pub struct Manager {
    connection_name: String,
    sender: Arc<dyn Sender>,
    max_frame_size: usize,
    objects: Mutex<BTreeMap<u32, Arc<dyn ManagedObject>>>,
    next_object_id: AtomicU32,
}

impl Manager {
    pub fn new(
        connection_name: impl Into<String>,
        sender: Arc<dyn Sender>,
        max_frame_size: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            connection_name: connection_name.into(),
            sender,
            max_frame_size,
            objects: Mutex::new(BTreeMap::new()),
            next_object_id: AtomicU32::new(FIRST_GENERATED_OBJECT_ID),
        })
    }

    pub fn connection_name(&self) -> &str {
        &self.connection_name
    }

    /// Fresh id that no object on this connection uses yet.
    pub fn generate_object_id(&self) -> u32 {
        loop {
            let id = self.next_object_id.fetch_add(1, Ordering::Relaxed);
            if !self.has_object(id) {
                return id;
            }
        }
    }

    /// Route for an object about to be added under `object_id`.
    pub fn link(self: &Arc<Self>, object_id: u32) -> Link {
        Link {
            manager: Arc::downgrade(self),
            object_id,
        }
    }

    pub fn add_object(&self, object_id: u32, object: Arc<dyn ManagedObject>) -> Result<()> {
        let mut objects = self.objects.lock();
        if objects.contains_key(&object_id) {
            return Err(RegistryError::ObjectIdInUse(object_id).into());
        }
        objects.insert(object_id, object);
        drop(objects);
        debug!("[{}] object {} added", self.connection_name, object_id);
        Ok(())
    }

    pub fn has_object(&self, object_id: u32) -> bool {
        self.objects.lock().contains_key(&object_id)
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn remove_object(&self, object_id: u32) -> Option<Arc<dyn ManagedObject>> {
        let removed = self.objects.lock().remove(&object_id);
        if removed.is_some() {
            debug!("[{}] object {} removed", self.connection_name, object_id);
        }
        removed
    }

    /// Remove every object whose id satisfies `predicate`.
    pub fn remove_objects(&self, mut predicate: impl FnMut(u32) -> bool) -> usize {
        let mut objects = self.objects.lock();
        let before = objects.len();
        objects.retain(|id, _| !predicate(*id));
        before - objects.len()
    }

    /// Encode and send one message on behalf of `object_id`.
    pub fn send(&self, object_id: u32, body: Body) -> Result<()> {
        let frame = Envelope { object_id, body }.encode()?;
        if frame.len() > self.max_frame_size {
            return Err(ProtocolError::FrameSize {
                len: frame.len(),
                max: self.max_frame_size,
            }
            .into());
        }
        self.sender.send(frame)
    }

    /// Route one inbound frame.  Undecodable frames and frames for unknown
    /// objects are logged and dropped.
    pub fn receive(&self, frame: &[u8]) {
        let envelope = match Envelope::decode(frame) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("[{}] dropping undecodable frame: {}", self.connection_name, e);
                return;
            }
        };
        let object = self.objects.lock().get(&envelope.object_id).cloned();
        match object {
            Some(object) => object.handle_message(envelope.body),
            None => warn!(
                "[{}] {} for unknown object {}",
                self.connection_name,
                envelope.body.kind(),
                envelope.object_id
            ),
        }
    }

    /// Tell every object the peer is gone.
    pub fn connection_lost(&self) {
        let objects: Vec<_> = self.objects.lock().values().cloned().collect();
        info!(
            "[{}] connection lost, notifying {} object(s)",
            self.connection_name,
            objects.len()
        );
        for object in objects {
            object.connection_lost();
        }
    }
}

// ── Driver ───────────────────────────────────────────────────

/// Receive loop of one connection.
pub struct Driver {
    manager: Arc<Manager>,
    receiver: Box<dyn Receiver>,
    closed: bool,
}

impl Driver {
    pub fn new(manager: Arc<Manager>, receiver: Box<dyn Receiver>) -> Self {
        Self {
            manager,
            receiver,
            closed: false,
        }
    }

    pub fn manager(&self) -> &Arc<Manager> {
        &self.manager
    }

    /// Dispatch at most one frame.  Returns `true` if a frame was routed.
    pub fn run_once(&mut self, timeout: Duration) -> Result<bool> {
        if self.closed {
            return Err(TransportError::Closed.into());
        }
        match self.receiver.recv_timeout(timeout) {
            Ok(Some(frame)) => {
                self.manager.receive(&frame);
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(e) => {
                self.closed = true;
                self.manager.connection_lost();
                Err(e)
            }
        }
    }

    /// Pump frames until `future` settles, giving up after `attempts`
    /// polls of `timeout` each.
    pub fn pump_until<T: Send + 'static>(
        &mut self,
        future: &Future<T>,
        attempts: u32,
        timeout: Duration,
    ) -> Result<()> {
        for _ in 0..attempts {
            if future.is_ready() || future.is_dismissed() {
                return Ok(());
            }
            self.run_once(timeout)?;
        }
        if future.is_ready() {
            Ok(())
        } else {
            Err(FutureError::Timeout.into())
        }
    }

    /// Run on a dedicated thread until stopped or the connection closes.
    pub fn spawn(mut self, poll_interval: Duration) -> Result<DriverHandle> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let name = format!("driver-{}", self.manager.connection_name);
        let thread = std::thread::Builder::new().name(name).spawn(move || {
            while !flag.load(Ordering::Acquire) {
                if let Err(e) = self.run_once(poll_interval) {
                    info!("[{}] driver stopped: {}", self.manager.connection_name, e);
                    break;
                }
            }
        })?;
        Ok(DriverHandle {
            stop,
            thread: Some(thread),
        })
    }
}

/// Owner of a background driver thread.  Dropping it stops the thread.
pub struct DriverHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl DriverHandle {
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("driver thread panicked");
            }
        }
    }
}

impl Drop for DriverHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Block on a future that another thread's driver resolves.
///
/// Waits `attempts * timeout` in total; on timeout the future is dismissed
/// so its open call is released.
pub fn call_sync<T: Send + 'static>(future: Future<T>, attempts: u32, timeout: Duration) -> Result<T> {
    if future.wait_timeout(timeout * attempts) {
        future.get()
    } else {
        future.dismiss();
        Err(Error::Future(FutureError::Timeout))
    }
}

// ── Tests ────────────────────────────────────────────────────
