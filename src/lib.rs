//! paramcom: IPC substrate of the parameter service.
//!
//! Futures with dismiss, proxy/stub method dispatch over framed transports,
//! a chunking file-transfer decorator, per-user authorization and a
//! concurrent device registry.
//!
//! ```text
//!   service::Authorized ─▶ service::ParameterServiceCore ─▶ registry
//!          ▲                          ▲
//!   rpc::{Frontend,FileApi}Stub   rpc::RemoteBackend
//!          ▲                          ▲
//!   ════════════ rpc::Manager / codec / transport ════════════
//! ```

#![deny(unused_must_use)]

pub mod config;
pub mod error;
pub mod future;
pub mod model;
pub mod registry;
pub mod rpc;
pub mod service;

pub use error::{Error, Result};
