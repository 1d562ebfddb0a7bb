//! Integration test driver for `tests/integration/` submodules.
//!
//! Each `mod` below maps to a file that exercises one subsystem through the
//! public API, using in-memory mocks and loopback transports only.

mod authorization_tests;
mod chunking_tests;
mod mock_file_api;
mod proxy_stub_tests;
mod registry_tests;
mod remote_backend_tests;
