//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the bridge.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::net::frame::MAX_FRAME_LEN;

/// Root configuration for the bridge.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BridgeConfig {
    /// HTTP control surface listener.
    pub http: HttpConfig,

    /// Device (TCP) listener.
    pub devices: DeviceListenerConfig,

    /// Wire protocol limits.
    pub protocol: ProtocolConfig,

    /// Parameter query behaviour.
    pub query: QueryConfig,

    /// Parameter description source.
    pub parameters: ParameterConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Shutdown settings.
    pub shutdown: ShutdownConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address (e.g., "0.0.0.0:17000").
    pub bind_address: String,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:17000".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Device listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeviceListenerConfig {
    /// Bind address (e.g., "0.0.0.0:5555").
    pub bind_address: String,

    /// Maximum concurrent device connections (backpressure).
    pub max_connections: usize,

    /// Close a device connection after this many silent seconds (0 = never).
    pub idle_timeout_secs: u64,

    /// Time allowed for the registration frame to arrive.
    pub registration_timeout_secs: u64,
}

impl Default for DeviceListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:5555".to_string(),
            max_connections: 1024,
            idle_timeout_secs: 0,
            registration_timeout_secs: 10,
        }
    }
}

impl DeviceListenerConfig {
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }

    pub fn registration_timeout(&self) -> Duration {
        Duration::from_secs(self.registration_timeout_secs)
    }
}

/// Wire protocol limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Largest accepted frame payload in bytes.
    pub max_frame_len: usize,

    /// Number of raw device messages kept per connection for `/madigan-state`.
    pub history_capacity: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            max_frame_len: MAX_FRAME_LEN,
            history_capacity: 50,
        }
    }
}

/// Parameter query configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Upper bound for the `wait_ms` query parameter.
    pub max_wait_ms: u64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self { max_wait_ms: 2000 }
    }
}

/// Where parameter descriptions come from.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ParameterConfig {
    /// JSON catalog mapping plugin URI to its description.
    pub catalog_path: Option<String>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// How long to wait for device sessions to drain.
    pub drain_timeout_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self { drain_timeout_secs: 5 }
    }
}
