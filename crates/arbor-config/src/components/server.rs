//! HTTP/WebSocket listener configuration

use serde::{Deserialize, Serialize};

/// Listener settings for the combined HTTP and realtime endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind
    pub host: String,
    /// Port to bind
    pub port: u16,
    /// Maximum request body size in megabytes
    pub max_body_mb: usize,
    /// Allowed CORS origins; empty disables the CORS layer
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 1234,
            max_body_mb: 10,
            cors_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// `host:port` string suitable for parsing into a socket address
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Body limit in bytes
    pub fn max_body_bytes(&self) -> usize {
        self.max_body_mb * 1024 * 1024
    }
}
