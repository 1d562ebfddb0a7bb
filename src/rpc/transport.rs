//! Transport abstraction: a duplex channel of whole frames.
//!
//! Concrete implementations:
//! - in-process loopback pair (tests, single-process deployments)
//! - any `Read + Write` byte stream via [`super::stream`]
//!
//! The connection manager only sees `Sender` and `Receiver`, so adding a
//! transport requires no change to the proxy/stub logic.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::{Result, TransportError};

/// Outgoing half.  Shared by every proxy and stub of a connection.
pub trait Sender: Send + Sync {
    /// Queue one encoded frame for the peer.
    fn send(&self, frame: Vec<u8>) -> Result<()>;
}

/// Incoming half.  Owned by the connection's driver.
pub trait Receiver: Send {
    /// Wait up to `timeout` for the next frame.
    ///
    /// `Ok(None)` on timeout; `Err(TransportError::Closed)` once the peer is
    /// gone and nothing is left to read.
    fn recv_timeout(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>>;
}

/// A null transport that discards all frames and never receives.
/// Useful as a default when no peer is connected.
pub struct NullTransport;

impl Sender for NullTransport {
    fn send(&self, _frame: Vec<u8>) -> Result<()> {
        Ok(())
    }
}

impl Receiver for NullTransport {
    fn recv_timeout(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>> {
        std::thread::sleep(timeout);
        Ok(None)
    }
}

// ── Loopback ─────────────────────────────────────────────────

struct Queue {
    frames: Mutex<VecDeque<Vec<u8>>>,
    ready: Condvar,
    closed: AtomicBool,
}

impl Queue {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            frames: Mutex::new(VecDeque::new()),
            ready: Condvar::new(),
            closed: AtomicBool::new(false),
        })
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        // Taking the lock orders the flag against a receiver about to wait.
        let _frames = self.frames.lock();
        self.ready.notify_all();
    }
}

/// Sending end of one loopback direction.  Dropping it closes the direction.
pub struct LoopbackSender {
    queue: Arc<Queue>,
}

impl Sender for LoopbackSender {
    fn send(&self, frame: Vec<u8>) -> Result<()> {
        if self.queue.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed.into());
        }
        self.queue.frames.lock().push_back(frame);
        self.queue.ready.notify_one();
        Ok(())
    }
}

impl Drop for LoopbackSender {
    fn drop(&mut self) {
        self.queue.close();
    }
}

/// Receiving end of one loopback direction.  Dropping it closes the direction.
pub struct LoopbackReceiver {
    queue: Arc<Queue>,
}

impl Receiver for LoopbackReceiver {
    fn recv_timeout(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>> {
        let deadline = Instant::now() + timeout;
        let mut frames = self.queue.frames.lock();
        loop {
            if let Some(frame) = frames.pop_front() {
                return Ok(Some(frame));
            }
            if self.queue.closed.load(Ordering::Acquire) {
                return Err(TransportError::Closed.into());
            }
            if self.queue.ready.wait_until(&mut frames, deadline).timed_out() {
                return Ok(frames.pop_front());
            }
        }
    }
}

impl Drop for LoopbackReceiver {
    fn drop(&mut self) {
        self.queue.close();
    }
}

/// One side of a loopback connection.
pub struct LoopbackEnd {
    pub sender: LoopbackSender,
    pub receiver: LoopbackReceiver,
}

/// Two connected in-process endpoints.
pub fn loopback_pair() -> (LoopbackEnd, LoopbackEnd) {
    let a_to_b = Queue::new();
    let b_to_a = Queue::new();
    (
        LoopbackEnd {
            sender: LoopbackSender {
                queue: Arc::clone(&a_to_b),
            },
            receiver: LoopbackReceiver {
                queue: Arc::clone(&b_to_a),
            },
        },
        LoopbackEnd {
            sender: LoopbackSender { queue: b_to_a },
            receiver: LoopbackReceiver { queue: a_to_b },
        },
    )
}

// ── Tests ────────────────────────────────────────────────────
