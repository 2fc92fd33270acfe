//! Config sections: the Blender socket, the Trellis job service, telemetry.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Socket settings for the Blender addon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlenderConfig {
    /// Host the addon listens on.
    /// Default: localhost
    #[serde(default = "BlenderConfig::default_host")]
    pub host: String,

    /// TCP port the addon listens on.
    /// Default: 9876
    #[serde(default = "BlenderConfig::default_port")]
    pub port: u16,

    /// Deadline for a single recv call, not the whole response.
    /// Default: 15000
    #[serde(default = "BlenderConfig::default_recv_timeout_ms")]
    pub recv_timeout_ms: u64,

    /// Read buffer size per recv call.
    /// Default: 8192
    #[serde(default = "BlenderConfig::default_recv_chunk_size")]
    pub recv_chunk_size: usize,

    /// Command used to check a cached connection before reuse.
    /// Default: get_polyhaven_status
    #[serde(default = "BlenderConfig::default_probe_command")]
    pub probe_command: String,
}

impl BlenderConfig {
    fn default_host() -> String {
        "localhost".to_string()
    }

    fn default_port() -> u16 {
        9876
    }

    fn default_recv_timeout_ms() -> u64 {
        15_000
    }

    fn default_recv_chunk_size() -> usize {
        8192
    }

    fn default_probe_command() -> String {
        "get_polyhaven_status".to_string()
    }

    pub fn recv_timeout(&self) -> Duration {
        Duration::from_millis(self.recv_timeout_ms)
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for BlenderConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            recv_timeout_ms: Self::default_recv_timeout_ms(),
            recv_chunk_size: Self::default_recv_chunk_size(),
            probe_command: Self::default_probe_command(),
        }
    }
}

/// HTTP settings for the Trellis text-to-3D service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrellisConfig {
    /// Base URL; output locators are derived from it too.
    /// Default: http://localhost:8000
    #[serde(default = "TrellisConfig::default_base_url")]
    pub base_url: String,

    /// Timeout for each HTTP request.
    /// Default: 30000
    #[serde(default = "TrellisConfig::default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Delay between status fetches while a task is still running.
    /// Default: 1000
    #[serde(default = "TrellisConfig::default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Status fetches per poll call before handing back a "poll again" answer.
    /// Default: 5
    #[serde(default = "TrellisConfig::default_max_poll_attempts")]
    pub max_poll_attempts: u32,
}

impl TrellisConfig {
    fn default_base_url() -> String {
        "http://localhost:8000".to_string()
    }

    fn default_request_timeout_ms() -> u64 {
        30_000
    }

    fn default_poll_interval_ms() -> u64 {
        1000
    }

    fn default_max_poll_attempts() -> u32 {
        5
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for TrellisConfig {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            request_timeout_ms: Self::default_request_timeout_ms(),
            poll_interval_ms: Self::default_poll_interval_ms(),
            max_poll_attempts: Self::default_max_poll_attempts(),
        }
    }
}

/// Telemetry and observability configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level or full EnvFilter directive.
    /// Default: info
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,

    /// OTLP gRPC endpoint. Empty disables export.
    /// Default: ""
    #[serde(default)]
    pub otlp_endpoint: String,
}

impl TelemetryConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }

    /// The OTLP endpoint, if export is enabled.
    pub fn otlp(&self) -> Option<&str> {
        let endpoint = self.otlp_endpoint.trim();
        (!endpoint.is_empty()).then_some(endpoint)
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
            otlp_endpoint: String::new(),
        }
    }
}
