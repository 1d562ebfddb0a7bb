//! Unified error types for the parameter-service IPC substrate.
//!
//! A single `Error` enum that every layer converts into, so a failure raised
//! anywhere (decoding a frame, resolving a promise, registering a device) can
//! travel through a future's exception channel unchanged.  All variants are
//! `Clone` because one failure may be delivered to a continuation while a
//! copy is logged or re-sent on the wire.

use core::fmt;

use crate::model::DeviceId;

/// Crate-wide result alias.
pub type Result<T> = core::result::Result<T, Error>;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the crate funnels into this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Promise/future misuse or an abandoned computation.
    Future(FutureError),
    /// A peer sent something that does not decode.
    Protocol(ProtocolError),
    /// The channel below a proxy or stub failed.
    Transport(TransportError),
    /// Device or object store rejected an operation.
    Registry(RegistryError),
    /// The remote implementation failed; the message is the peer's text.
    Remote(String),
    /// The permission set for a user could not be obtained.
    Authorization(String),
    /// Configuration is invalid or could not be loaded.
    Config(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Future(e) => write!(f, "future: {e}"),
            Self::Protocol(e) => write!(f, "protocol: {e}"),
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::Registry(e) => write!(f, "registry: {e}"),
            Self::Remote(msg) => write!(f, "remote: {msg}"),
            Self::Authorization(msg) => write!(f, "authorization: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Future errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FutureError {
    /// `set_value` / `set_exception` on an already resolved promise.
    PromiseAlreadySatisfied,
    /// `get_future` called a second time.
    AlreadyRetrieved,
    /// The promise was dropped without ever being resolved.
    BrokenPromise,
    /// The outcome was already handed to a notifier.
    Consumed,
    /// The future was dismissed before it resolved.
    Dismissed,
    /// A blocking wait gave up.
    Timeout,
}

impl fmt::Display for FutureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PromiseAlreadySatisfied => write!(f, "promise already satisfied"),
            Self::AlreadyRetrieved => write!(f, "future already retrieved"),
            Self::BrokenPromise => write!(f, "broken promise"),
            Self::Consumed => write!(f, "outcome already consumed by a notifier"),
            Self::Dismissed => write!(f, "future dismissed"),
            Self::Timeout => write!(f, "timed out waiting for future"),
        }
    }
}

impl From<FutureError> for Error {
    fn from(e: FutureError) -> Self {
        Self::Future(e)
    }
}

// ---------------------------------------------------------------------------
// Protocol errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Method id not part of the interface's catalogue.
    UnknownMethod { interface: &'static str, id: u16 },
    /// Bytes that do not deserialize into the expected shape.
    Malformed(String),
    /// A well-formed message of the wrong kind for its recipient.
    UnexpectedMessage(&'static str),
    /// Response for a call id that has no open call.
    UnknownCall(u64),
    /// The peer refused a call it could not dispatch.
    Rejected(String),
    /// Frame length outside the accepted range.
    FrameSize { len: usize, max: usize },
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownMethod { interface, id } => {
                write!(f, "unknown method id {id} for interface {interface}")
            }
            Self::Malformed(msg) => write!(f, "malformed message: {msg}"),
            Self::UnexpectedMessage(kind) => write!(f, "unexpected {kind} message"),
            Self::UnknownCall(id) => write!(f, "no open call with id {id}"),
            Self::Rejected(msg) => write!(f, "call rejected by peer: {msg}"),
            Self::FrameSize { len, max } => write!(f, "frame of {len} bytes exceeds limit {max}"),
        }
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Self::Protocol(e)
    }
}

impl From<postcard::Error> for Error {
    fn from(e: postcard::Error) -> Self {
        Self::Protocol(ProtocolError::Malformed(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The peer is gone.
    Closed,
    /// Proxy destroyed while the call was still open.
    ObjectCleanedUp,
    /// Underlying I/O failure.
    Io(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "connection closed"),
            Self::ObjectCleanedUp => write!(
                f,
                "IPC object has been cleaned up before the response has been received"
            ),
            Self::Io(msg) => write!(f, "I/O error: {msg}"),
        }
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Transport(TransportError::Io(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Registry errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    /// A device with this identity is already registered.
    DeviceAlreadyExists(DeviceId),
    /// No device with this identity is registered.
    UnknownDevice(DeviceId),
    /// A managed object with this id already exists on the connection.
    ObjectIdInUse(u32),
    /// No managed object with this id exists on the connection.
    UnknownObject(u32),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeviceAlreadyExists(id) => write!(f, "device {id} already exists"),
            Self::UnknownDevice(id) => write!(f, "device {id} is not registered"),
            Self::ObjectIdInUse(id) => write!(f, "object id {id} already in use"),
            Self::UnknownObject(id) => write!(f, "no object with id {id}"),
        }
    }
}

impl From<RegistryError> for Error {
    fn from(e: RegistryError) -> Self {
        Self::Registry(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Config(e.to_string())
    }
}

// ── Tests ────────────────────────────────────────────────────
