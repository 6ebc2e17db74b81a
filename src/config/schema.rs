//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::config::loader::VersionedConfig;

/// Root configuration for the server.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Schema version of the stored file.
    pub version: u32,

    /// Listener configuration (bind address, forwarded IP handling, pumps).
    pub listener: ListenerConfig,

    /// Request size limits.
    pub limits: LimitsConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Dispatch behaviour.
    pub server: DispatchConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            version: <Self as VersionedConfig>::CURRENT_VERSION,
            listener: ListenerConfig::default(),
            limits: LimitsConfig::default(),
            timeouts: TimeoutConfig::default(),
            rate_limit: RateLimitConfig::default(),
            server: DispatchConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:10061").
    pub bind_address: String,

    /// Take the remote address from `forwarded_ip_header` instead of the socket peer.
    pub use_forwarded_ip: bool,

    /// Header carrying the client address when behind a trusted proxy.
    pub forwarded_ip_header: String,

    /// Number of tasks concurrently waiting on the listener.
    pub pump_count: usize,

    /// Maximum concurrent socket connections (backpressure on accept).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:10061".to_string(),
            use_forwarded_ip: false,
            forwarded_ip_header: "X-Forwarded-For".to_string(),
            pump_count: 4,
            max_connections: 10_000,
        }
    }
}

/// Request size limits enforced while parsing.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum body size in bytes; larger `Content-Length` values get 413.
    pub max_body_size: usize,

    /// Maximum number of header lines.
    pub max_header_count: usize,

    /// Maximum length of the request line or a header line.
    pub max_line_length: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
            max_header_count: 100,
            max_line_length: 8 * 1024,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Time allowed to read one complete request, in seconds.
    pub read_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { read_secs: 30 }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Register the rate limit service at startup.
    pub enabled: bool,

    /// Maximum requests per identity inside one window.
    pub max_requests: usize,

    /// Length of the sliding window in seconds.
    pub window_secs: u64,

    /// How long an identity stays throttled after exceeding the limit.
    pub penalty_secs: u64,

    /// Minimum time between sweeps of idle identities.
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_requests: 400,
            window_secs: 30,
            penalty_secs: 30,
            sweep_interval_secs: 60,
        }
    }
}

/// Request dispatch behaviour.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Value of the `Server` response header.
    pub server_name: String,

    /// Public URL of this server, for applications that need to build links.
    pub external_url: String,

    /// Endpoints without an explicit setting require authentication.
    pub assume_authentication_required: bool,

    /// Include error details in 500 responses.
    pub expose_error_details: bool,

    /// Pretty-print JSON responses.
    pub pretty_json: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            server_name: "hearth".to_string(),
            external_url: "http://127.0.0.1:10061".to_string(),
            assume_authentication_required: false,
            expose_error_details: cfg!(debug_assertions),
            pretty_json: false,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Record request metrics through the `metrics` facade.
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
        }
    }
}
