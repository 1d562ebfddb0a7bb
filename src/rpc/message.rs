//! IPC message envelope.
//!
//! ```text
//! ┌────────────┬──────────────────────────────────────────────┐
//! │ object id  │ body                                         │
//! │ (varint)   │ Call     { method_id, call_id, args }        │
//! │            │ Response { call_id, status, payload }        │
//! │            │ Dismiss  { call_id }                         │
//! └────────────┴──────────────────────────────────────────────┘
//! ```
//!
//! Envelopes, arguments and results are all encoded with `postcard`.  A
//! response with a non-success status carries the failure text as its
//! payload.

use core::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, ProtocolError, Result};

/// Object id reserved for the backend object of every connection.
pub const BACKEND_OBJECT_ID: u32 = 0;

/// Object id reserved for the frontend object of a frontend connection.
pub const FRONTEND_OBJECT_ID: u32 = 1;

/// Object id reserved for the file API object of a file connection.
pub const FILE_API_OBJECT_ID: u32 = 2;

/// First id handed out by `Manager::generate_object_id`.
pub const FIRST_GENERATED_OBJECT_ID: u32 = 1000;

/// Outcome of one call as seen by the IPC layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IpcStatus {
    Success,
    UnknownMethod,
    MalformedArguments,
    UnexpectedException,
}

impl fmt::Display for IpcStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::UnknownMethod => write!(f, "unknown method"),
            Self::MalformedArguments => write!(f, "malformed arguments"),
            Self::UnexpectedException => write!(f, "unexpected exception"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Body {
    Call {
        method_id: u16,
        call_id: u64,
        args: Vec<u8>,
    },
    Response {
        call_id: u64,
        status: IpcStatus,
        payload: Vec<u8>,
    },
    Dismiss {
        call_id: u64,
    },
}

impl Body {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Call { .. } => "call",
            Self::Response { .. } => "response",
            Self::Dismiss { .. } => "dismiss",
        }
    }

    /// Failure response carrying `message`.
    pub fn failure(call_id: u64, status: IpcStatus, message: &str) -> Self {
        Self::Response {
            call_id,
            status,
            payload: encode_value(&message).unwrap_or_default(),
        }
    }
}

/// One frame's worth of message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub object_id: u32,
    pub body: Body,
}

impl Envelope {
    pub fn encode(&self) -> Result<Vec<u8>> {
        encode_value(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        decode_value(bytes)
    }
}

/// Serialize arguments or results.
pub fn encode_value<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    postcard::to_allocvec(value).map_err(Error::from)
}

/// Deserialize arguments or results.  Trailing bytes are rejected.
pub fn decode_value<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let (value, rest) = postcard::take_from_bytes(bytes)?;
    if !rest.is_empty() {
        return Err(ProtocolError::Malformed(format!("{} trailing byte(s)", rest.len())).into());
    }
    Ok(value)
}

/// Error for a non-success response.
pub fn remote_failure(status: IpcStatus, payload: &[u8]) -> Error {
    let message = decode_value::<String>(payload).unwrap_or_else(|_| status.to_string());
    match status {
        IpcStatus::UnknownMethod | IpcStatus::MalformedArguments => {
            ProtocolError::Rejected(message).into()
        }
        IpcStatus::Success | IpcStatus::UnexpectedException => Error::Remote(message),
    }
}

// ── Tests ────────────────────────────────────────────────────
