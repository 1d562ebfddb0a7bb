//! Single-assignment future/promise pair.
//!
//! ```text
//!   Promise ──set_value / set_exception──▶ Shared ──notifier──▶ continuation
//!      ▲                                     │
//!      └────────── dismiss notifier ◀── Future::dismiss
//! ```
//!
//! The shared state sits behind an `Arc`, so either side may be dropped
//! first without dangling.  Continuations always run outside the state lock
//! on whichever thread resolved (or registered, if already resolved).
//!
//! A `Future` can be consumed three ways: continuation notifiers, a blocking
//! `wait`/`get`, or `.await` through the `core::future::Future` impl.  The
//! outcome is delivered to exactly one of them.

use core::pin::Pin;
use core::task::{Context, Poll, Waker};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{error, warn};
use parking_lot::{Condvar, Mutex};

use crate::error::{Error, FutureError, Result};

type ValueFn<T> = Box<dyn FnOnce(T) + Send>;
type ExceptionFn = Box<dyn FnOnce(Error) + Send>;
type DismissFn = Box<dyn FnOnce() + Send>;

struct State<T> {
    resolved: bool,
    dismissed: bool,
    retrieved: bool,
    slot: Option<Result<T>>,
    on_value: Option<ValueFn<T>>,
    on_exception: Option<ExceptionFn>,
    on_dismiss: Option<DismissFn>,
    waker: Option<Waker>,
}

struct Shared<T> {
    state: Mutex<State<T>>,
    ready: Condvar,
}

impl<T> Shared<T> {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State {
                resolved: false,
                dismissed: false,
                retrieved: false,
                slot: None,
                on_value: None,
                on_exception: None,
                on_dismiss: None,
                waker: None,
            }),
            ready: Condvar::new(),
        })
    }
}

// ── Promise ──────────────────────────────────────────────────

/// Producer half.  Resolves its future exactly once.
///
/// Dropping a promise that was neither resolved nor dismissed delivers
/// [`FutureError::BrokenPromise`] to the future.
pub struct Promise<T: Send + 'static> {
    shared: Arc<Shared<T>>,
}

impl<T: Send + 'static> Promise<T> {
    pub fn new() -> Self {
        Self {
            shared: Shared::new(),
        }
    }

    /// Promise with a dismiss notifier already attached.
    pub fn with_dismiss_notifier(f: impl FnOnce() + Send + 'static) -> Self {
        let promise = Self::new();
        promise.set_dismiss_notifier(f);
        promise
    }

    /// A promise together with its future.
    pub fn pair() -> (Self, Future<T>) {
        let promise = Self::new();
        let future = Future {
            shared: Arc::clone(&promise.shared),
        };
        promise.shared.state.lock().retrieved = true;
        (promise, future)
    }

    /// The one future observing this promise.
    pub fn get_future(&self) -> Result<Future<T>> {
        let mut state = self.shared.state.lock();
        if state.retrieved {
            return Err(FutureError::AlreadyRetrieved.into());
        }
        state.retrieved = true;
        Ok(Future {
            shared: Arc::clone(&self.shared),
        })
    }

    pub fn set_value(&self, value: T) -> Result<()> {
        self.resolve(Ok(value))
    }

    pub fn set_exception(&self, e: impl Into<Error>) -> Result<()> {
        self.resolve(Err(e.into()))
    }

    /// Resolve from the outcome of a fallible computation.
    pub fn set_result(&self, result: Result<T>) -> Result<()> {
        self.resolve(result)
    }

    /// Run `f` unless the future is already dismissed and resolve with its outcome.
    pub fn execute(&self, f: impl FnOnce() -> Result<T>) -> Result<()> {
        if self.is_dismissed() {
            return Ok(());
        }
        self.resolve(f())
    }

    /// Register (or replace) the callback fired when the future is dismissed.
    ///
    /// Fires immediately if the future is already dismissed.  Ignored once
    /// the promise is resolved.
    pub fn set_dismiss_notifier(&self, f: impl FnOnce() + Send + 'static) {
        let mut state = self.shared.state.lock();
        if state.dismissed {
            drop(state);
            f();
        } else if !state.resolved {
            let previous = state.on_dismiss.replace(Box::new(f));
            drop(state);
            drop(previous);
        }
    }

    pub fn is_dismissed(&self) -> bool {
        self.shared.state.lock().dismissed
    }

    pub fn is_resolved(&self) -> bool {
        self.shared.state.lock().resolved
    }

    fn resolve(&self, result: Result<T>) -> Result<()> {
        let mut state = self.shared.state.lock();
        if state.dismissed {
            return Ok(());
        }
        if state.resolved {
            drop(state);
            error!("future: promise resolved twice");
            return Err(FutureError::PromiseAlreadySatisfied.into());
        }
        state.resolved = true;

        // Both continuations leave the state here; the unused one is dropped
        // after the lock is released.
        let on_dismiss = state.on_dismiss.take();
        let waker = state.waker.take();
        let on_value = state.on_value.take();
        let on_exception = state.on_exception.take();

        let mut deliver_value = None;
        let mut deliver_exception = None;
        match result {
            Ok(value) if on_value.is_some() => deliver_value = Some(value),
            Err(e) if on_exception.is_some() => deliver_exception = Some(e),
            other => state.slot = Some(other),
        }
        drop(state);

        self.shared.ready.notify_all();
        if let Some(waker) = waker {
            waker.wake();
        }
        if let (Some(f), Some(value)) = (on_value, deliver_value) {
            f(value);
        } else if let (Some(f), Some(e)) = (on_exception, deliver_exception) {
            f(e);
        }
        drop(on_dismiss);
        Ok(())
    }
}

impl<T: Send + 'static> Default for Promise<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> Drop for Promise<T> {
    fn drop(&mut self) {
        let abandoned = {
            let state = self.shared.state.lock();
            !state.resolved && !state.dismissed
        };
        if abandoned {
            warn!("future: promise dropped while pending");
            let _ = self.resolve(Err(FutureError::BrokenPromise.into()));
        }
    }
}

// ── Future ───────────────────────────────────────────────────

/// Consumer half.  Observes or dismisses the outcome of one promise.
pub struct Future<T: Send + 'static> {
    shared: Arc<Shared<T>>,
}

impl<T: Send + 'static> Future<T> {
    /// Continuation for the value.  Fires immediately if the value is
    /// already stashed.
    pub fn set_notifier(&self, f: impl FnOnce(T) + Send + 'static) {
        let mut state = self.shared.state.lock();
        if matches!(state.slot, Some(Ok(_))) {
            if let Some(Ok(value)) = state.slot.take() {
                drop(state);
                f(value);
            }
        } else if !state.resolved && !state.dismissed {
            let previous = state.on_value.replace(Box::new(f));
            drop(state);
            drop(previous);
        }
    }

    /// Continuation for the exception.  Fires immediately if an exception is
    /// already stashed.
    pub fn set_exception_notifier(&self, f: impl FnOnce(Error) + Send + 'static) {
        let mut state = self.shared.state.lock();
        if matches!(state.slot, Some(Err(_))) {
            if let Some(Err(e)) = state.slot.take() {
                drop(state);
                f(e);
            }
        } else if !state.resolved && !state.dismissed {
            let previous = state.on_exception.replace(Box::new(f));
            drop(state);
            drop(previous);
        }
    }

    /// Withdraw interest.  Later resolution is a silent no-op and the
    /// promise's dismiss notifier fires once.  No effect after resolution.
    pub fn dismiss(&self) {
        let mut state = self.shared.state.lock();
        if state.resolved || state.dismissed {
            return;
        }
        state.dismissed = true;
        let on_dismiss = state.on_dismiss.take();
        let on_value = state.on_value.take();
        let on_exception = state.on_exception.take();
        let waker = state.waker.take();
        drop(state);

        self.shared.ready.notify_all();
        if let Some(waker) = waker {
            waker.wake();
        }
        drop(on_value);
        drop(on_exception);
        if let Some(f) = on_dismiss {
            f();
        }
    }

    pub fn is_ready(&self) -> bool {
        self.shared.state.lock().resolved
    }

    pub fn is_dismissed(&self) -> bool {
        self.shared.state.lock().dismissed
    }

    pub fn has_value(&self) -> bool {
        matches!(self.shared.state.lock().slot, Some(Ok(_)))
    }

    pub fn has_exception(&self) -> bool {
        matches!(self.shared.state.lock().slot, Some(Err(_)))
    }

    /// Block until resolved or dismissed.
    pub fn wait(&self) {
        let mut state = self.shared.state.lock();
        while !state.resolved && !state.dismissed {
            self.shared.ready.wait(&mut state);
        }
    }

    /// Block for at most `timeout`.  Returns `true` when the future settled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.wait_until(Instant::now() + timeout)
    }

    pub fn wait_until(&self, deadline: Instant) -> bool {
        let mut state = self.shared.state.lock();
        while !state.resolved && !state.dismissed {
            if self.shared.ready.wait_until(&mut state, deadline).timed_out() {
                return state.resolved || state.dismissed;
            }
        }
        true
    }

    /// Block and take the outcome.
    pub fn get(self) -> Result<T> {
        self.wait();
        self.take_outcome()
    }

    /// Take the outcome if the future has already settled.
    pub fn try_take(&self) -> Option<Result<T>> {
        let state = self.shared.state.lock();
        if state.resolved || state.dismissed {
            drop(state);
            Some(self.take_outcome())
        } else {
            None
        }
    }

    /// Single continuation for either outcome.
    pub fn on_settled(&self, f: impl FnOnce(Result<T>) + Send + 'static) {
        let slot = Arc::new(Mutex::new(Some(f)));
        let on_err = Arc::clone(&slot);
        self.set_exception_notifier(move |e| {
            let f = on_err.lock().take();
            if let Some(f) = f {
                f(Err(e));
            }
        });
        self.set_notifier(move |value| {
            let f = slot.lock().take();
            if let Some(f) = f {
                f(Ok(value));
            }
        });
    }

    /// Type-erased handle that can only dismiss this future.
    pub fn dismiss_handle(&self) -> DismissHandle {
        let handle = self.handle();
        DismissHandle(Box::new(move || handle.dismiss()))
    }

    /// Chain a computation that itself yields a future.
    ///
    /// Dismissing the returned future dismisses whichever link of the chain
    /// is currently pending.
    pub fn and_then<U, F>(self, f: F) -> Future<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> Future<U> + Send + 'static,
    {
        let (promise, chained) = Promise::<U>::pair();
        let promise = Arc::new(promise);

        let upstream = self.handle();
        promise.set_dismiss_notifier(move || upstream.dismiss());

        let on_err = Arc::clone(&promise);
        self.set_exception_notifier(move |e| {
            let _ = on_err.set_exception(e);
        });
        self.set_notifier(move |value| forward(f(value), promise));
        chained
    }

    /// Chain a plain transformation of the value.
    pub fn map<U, F>(self, f: F) -> Future<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        self.and_then(move |value| resolved(f(value)))
    }

    fn handle(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }

    fn take_outcome(&self) -> Result<T> {
        let mut state = self.shared.state.lock();
        match state.slot.take() {
            Some(outcome) => outcome,
            None if state.dismissed => Err(FutureError::Dismissed.into()),
            None => Err(FutureError::Consumed.into()),
        }
    }
}

impl<T: Send + 'static> core::future::Future for Future<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.shared.state.lock();
        if state.resolved || state.dismissed {
            drop(state);
            return Poll::Ready(self.take_outcome());
        }
        state.waker = Some(cx.waker().clone());
        Poll::Pending
    }
}

/// Dismisses one future regardless of its value type.
pub struct DismissHandle(Box<dyn Fn() + Send + Sync>);

impl DismissHandle {
    pub fn dismiss(&self) {
        (self.0)();
    }
}

/// Route the outcome of `next` into `promise`, and dismissal of the
/// promise's future back into `next`.
fn forward<U: Send + 'static>(next: Future<U>, promise: Arc<Promise<U>>) {
    let upstream = next.handle();
    promise.set_dismiss_notifier(move || upstream.dismiss());

    let on_err = Arc::clone(&promise);
    next.set_exception_notifier(move |e| {
        let _ = on_err.set_exception(e);
    });
    next.set_notifier(move |value| {
        let _ = promise.set_value(value);
    });
}

/// A future that already holds `value`.
pub fn resolved<T: Send + 'static>(value: T) -> Future<T> {
    let (promise, future) = Promise::pair();
    let _ = promise.set_value(value);
    future
}

/// A future that already holds an exception.
pub fn failed<T: Send + 'static>(e: impl Into<Error>) -> Future<T> {
    let (promise, future) = Promise::pair();
    let _ = promise.set_exception(e);
    future
}

// ── Tests ────────────────────────────────────────────────────
