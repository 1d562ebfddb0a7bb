//! Service layer: interface traits, the in-memory core and the per-user
//! authorization façade.

pub mod authorized;
pub mod engine;
pub mod ports;

pub use authorized::{Authorized, authorize};
pub use engine::ParameterServiceCore;
pub use ports::{Backend, FileApi, Frontend, FrontendExtended, ParameterService};
