//! Transport-agnostic IPC subsystem.
//!
//! Typed interface calls are marshalled into framed messages, routed by
//! object id, and completed through futures.
//!
//! ```text
//!  caller ─▶ ChunkingFileApi ─▶ Proxy          Stub ─▶ implementation
//!                                 │             ▲
//!                                 ▼             │
//!                          Manager (object map, call routing)
//!                                 │             ▲
//!                           Envelope (postcard) │
//!                                 ▼             │
//!                          codec (length-prefixed frames)
//!                                 │             ▲
//!                                 ▼             │
//!                          transport: Sender ══ Receiver ─▶ Driver
//! ```

pub mod backend;
pub mod chunked;
pub mod codec;
pub mod file_api;
pub mod frontend;
pub mod manager;
pub mod message;
pub mod methods;
pub mod proxy;
pub mod stream;
pub mod stub;
pub mod transport;

pub use backend::{BackendDispatch, BackendProxy, BackendStub, RemoteBackend};
pub use chunked::ChunkingFileApi;
pub use file_api::{FileApiDispatch, FileApiProxy, FileApiStub};
pub use frontend::{FrontendDispatch, FrontendProxy, FrontendStub};
pub use manager::{Driver, DriverHandle, Link, ManagedObject, Manager, call_sync};
