//! IPC configuration parameters
//!
//! All tunable limits of the substrate.  Defaults are usable as-is; a JSON
//! document may override any subset of fields.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Core IPC configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComConfig {
    // --- Chunking ---
    /// Largest read issued to the wrapped file API (bytes)
    pub max_read_chunk_size: u64,
    /// Largest write issued to the wrapped file API (bytes)
    pub max_write_chunk_size: u64,

    // --- Framing ---
    /// Largest frame payload accepted or sent (bytes)
    pub max_frame_size: usize,

    // --- Sync calls ---
    /// Driver polls before a blocking call gives up
    pub sync_call_attempts: u32,
    /// Timeout of a single driver poll (milliseconds)
    pub sync_call_timeout_ms: u64,

    // --- Connections ---
    /// Poll interval of a background driver thread (milliseconds)
    pub driver_poll_interval_ms: u64,
    /// Connection name of the backend channel
    pub backend_connection: String,
    /// Connection name of the frontend channel
    pub frontend_connection: String,
    /// Connection name of the file API channel
    pub file_api_connection: String,
}

impl Default for ComConfig {
    fn default() -> Self {
        Self {
            // Chunking: keep each sub-call well below a frame
            max_read_chunk_size: 64 * 1024,
            max_write_chunk_size: 64 * 1024,

            // Framing
            max_frame_size: 1024 * 1024,

            // Sync calls: 300 x 100 ms = 30 s
            sync_call_attempts: 300,
            sync_call_timeout_ms: 100,

            // Connections
            driver_poll_interval_ms: 50,
            backend_connection: "paramd_backend".into(),
            frontend_connection: "paramd_frontend".into(),
            file_api_connection: "paramd_file_api".into(),
        }
    }
}

impl ComConfig {
    /// Parse a (possibly partial) JSON document and validate it.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_read_chunk_size == 0 || self.max_write_chunk_size == 0 {
            return Err(Error::Config("chunk sizes must be positive".into()));
        }
        if self.max_frame_size == 0 {
            return Err(Error::Config("max_frame_size must be positive".into()));
        }
        if self.max_write_chunk_size as usize >= self.max_frame_size {
            return Err(Error::Config(
                "max_write_chunk_size must fit inside one frame".into(),
            ));
        }
        if self.max_read_chunk_size as usize >= self.max_frame_size {
            return Err(Error::Config(
                "max_read_chunk_size must fit inside one frame".into(),
            ));
        }
        if self.sync_call_attempts == 0 || self.sync_call_timeout_ms == 0 {
            return Err(Error::Config("sync call limits must be positive".into()));
        }
        if self.backend_connection.is_empty()
            || self.frontend_connection.is_empty()
            || self.file_api_connection.is_empty()
        {
            return Err(Error::Config("connection names must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sane() {
        let c = ComConfig::default();
        assert!(c.validate().is_ok());
        assert!(c.max_read_chunk_size > 0);
        assert!((c.max_write_chunk_size as usize) < c.max_frame_size);
        assert_eq!(c.sync_call_attempts, 300);
    }

    #[test]
    fn partial_json_overrides_defaults() {
        let c = ComConfig::from_json_str(r#"{"max_read_chunk_size": 42}"#).unwrap();
        assert_eq!(c.max_read_chunk_size, 42);
        assert_eq!(c.max_write_chunk_size, ComConfig::default().max_write_chunk_size);
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let err = ComConfig::from_json_str(r#"{"max_write_chunk_size": 0}"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn read_chunk_larger_than_frame_is_rejected() {
        let c = ComConfig {
            max_read_chunk_size: 4 << 20,
            ..ComConfig::default()
        };
        assert!(matches!(c.validate(), Err(Error::Config(_))));
        let err = ComConfig::from_json_str(r#"{"max_frame_size": 4096, "max_write_chunk_size": 1024}"#)
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        assert!(matches!(
            ComConfig::from_json_str("{not json"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn config_postcard_roundtrip() {
        let c = ComConfig::default();
        let bytes = postcard::to_allocvec(&c).unwrap();
        let back: ComConfig = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(back, c);
    }
}
