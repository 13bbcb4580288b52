//! Server and client configuration.
//!
//! The bare protocol has no payload limit and no timeouts. Both are
//! available here as opt-in settings; the defaults keep the unbounded,
//! never-timing-out behavior.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use turnwire_protocol::FrameCodec;

use crate::TurnwireError;

/// Address a server binds to when none is configured.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:7400";

/// Port a client connects to when none is configured.
pub const DEFAULT_PORT: u16 = 7400;

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

/// Configuration for a [`Server`](crate::Server).
///
/// Every field is optional in JSON; missing fields take their defaults.
///
/// ```json
/// { "bind_addr": "0.0.0.0:7400", "max_payload": 1048576, "io_timeout_ms": 30000 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind_addr: String,

    /// Largest command payload accepted, in bytes. `None` = unbounded.
    pub max_payload: Option<usize>,

    /// Per-read and per-write limit in milliseconds. Also bounds how long
    /// an idle client may wait between commands. `None` = wait forever.
    pub io_timeout_ms: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            max_payload: None,
            io_timeout_ms: None,
        }
    }
}

impl ServerConfig {
    /// Parses a configuration from JSON text.
    pub fn from_json(text: &str) -> Result<Self, TurnwireError> {
        serde_json::from_str(text).map_err(|e| TurnwireError::Config(e.to_string()))
    }

    /// Reads and parses a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TurnwireError> {
        Self::from_json(&read_config(path.as_ref())?)
    }

    pub fn io_timeout(&self) -> Option<Duration> {
        self.io_timeout_ms.map(Duration::from_millis)
    }

    /// The codec implied by `max_payload`.
    pub fn codec(&self) -> FrameCodec {
        FrameCodec::from_limit(self.max_payload)
    }
}

// ---------------------------------------------------------------------------
// ClientConfig
// ---------------------------------------------------------------------------

/// Configuration for a [`Client`](crate::Client).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Host to connect to. `None` = loopback.
    pub host: Option<String>,

    /// Port of the service.
    pub port: u16,

    /// Largest reply payload accepted, in bytes. `None` = unbounded.
    pub max_payload: Option<usize>,

    /// Per-read and per-write limit in milliseconds. `None` = wait forever.
    pub io_timeout_ms: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: DEFAULT_PORT,
            max_payload: None,
            io_timeout_ms: None,
        }
    }
}

impl ClientConfig {
    /// Parses a configuration from JSON text.
    pub fn from_json(text: &str) -> Result<Self, TurnwireError> {
        serde_json::from_str(text).map_err(|e| TurnwireError::Config(e.to_string()))
    }

    /// Reads and parses a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TurnwireError> {
        Self::from_json(&read_config(path.as_ref())?)
    }

    pub fn io_timeout(&self) -> Option<Duration> {
        self.io_timeout_ms.map(Duration::from_millis)
    }

    pub fn codec(&self) -> FrameCodec {
        FrameCodec::from_limit(self.max_payload)
    }
}

fn read_config(path: &Path) -> Result<String, TurnwireError> {
    std::fs::read_to_string(path)
        .map_err(|e| TurnwireError::Config(format!("{}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_default_is_unbounded() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR);
        assert_eq!(config.max_payload, None);
        assert_eq!(config.io_timeout(), None);
        assert_eq!(config.codec(), FrameCodec::default());
    }

    #[test]
    fn test_server_config_partial_json_keeps_defaults() {
        let config = ServerConfig::from_json(r#"{ "max_payload": 1024 }"#).unwrap();
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR);
        assert_eq!(config.max_payload, Some(1024));
        assert_eq!(config.codec().max_payload(), Some(1024));
    }

    #[test]
    fn test_server_config_timeout_in_millis() {
        let config = ServerConfig::from_json(r#"{ "io_timeout_ms": 2500 }"#).unwrap();
        assert_eq!(config.io_timeout(), Some(Duration::from_millis(2500)));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let err = ServerConfig::from_json(r#"{ "bind": "x" }"#).unwrap_err();
        assert!(matches!(err, TurnwireError::Config(_)));
        assert!(err.to_string().contains("bind"));
    }

    #[test]
    fn test_client_config_defaults_to_loopback() {
        let config = ClientConfig::default();
        assert_eq!(config.host, None);
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn test_client_config_from_json() {
        let config =
            ClientConfig::from_json(r#"{ "host": "example.org", "port": 9000 }"#).unwrap();
        assert_eq!(config.host.as_deref(), Some("example.org"));
        assert_eq!(config.port, 9000);
    }

    #[test]
    fn test_load_missing_file_names_path() {
        let err = ClientConfig::load("/nonexistent/turnwire.json").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/turnwire.json"));
    }
}
