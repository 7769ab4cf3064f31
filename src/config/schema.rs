//! Configuration schema definitions.
//!
//! Every section derives Serde traits and carries defaults, so a config file
//! only has to mention what it changes. The same document is also kept as a
//! raw TOML tree for dot-path lookups (see [`Config`](super::Config)).

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for the application.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP listener and request limits.
    pub server: ServerConfig,

    /// Session cookie settings.
    pub session: SessionConfig,

    /// Global middleware and per-group middleware bundles.
    pub middleware: MiddlewareConfig,

    /// Settings for the `auth` middleware.
    pub auth: AuthConfig,

    /// Settings for the `rate_limit` middleware.
    pub rate_limit: RateLimitConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Total time allowed for one request, in seconds.
    pub request_timeout_secs: u64,

    /// Maximum accepted request body in bytes.
    pub max_body_bytes: usize,

    /// Largest single uploaded file in bytes. Larger parts are reported
    /// with an error code instead of being stored.
    pub max_file_bytes: u64,

    /// Directory uploaded files are written to. Defaults to the system temp dir.
    pub upload_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
            max_body_bytes: 8 * 1024 * 1024, // 8MB
            max_file_bytes: 2 * 1024 * 1024, // 2MB
            upload_dir: None,
        }
    }
}

impl ServerConfig {
    pub fn upload_dir(&self) -> PathBuf {
        self.upload_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Name of the cookie carrying the session id.
    pub cookie_name: String,

    /// Seconds a session may sit unused before it expires.
    pub idle_timeout_secs: u64,

    /// Seconds between sweeps of expired sessions and idle rate-limit buckets.
    pub sweep_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "FASTYSESSID".to_string(),
            idle_timeout_secs: 1440,
            sweep_interval_secs: 60,
        }
    }
}

/// Middleware wiring.
///
/// Entries are identifiers looked up in the
/// [`MiddlewareRegistry`](crate::pipeline::MiddlewareRegistry).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MiddlewareConfig {
    /// Middleware run for every request, in order, before routing.
    pub global: Vec<String>,

    /// Middleware bundles keyed by group name (`admin`, `frontend`).
    pub groups: BTreeMap<String, Vec<String>>,
}

impl Default for MiddlewareConfig {
    fn default() -> Self {
        let mut groups = BTreeMap::new();
        groups.insert("admin".to_string(), vec!["auth".to_string()]);
        groups.insert("frontend".to_string(), Vec::new());
        Self {
            global: vec!["request_log".to_string()],
            groups,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Session key that marks a request as authenticated.
    pub session_key: String,

    /// Where rejected requests are redirected. A 401 is written when unset.
    pub login_path: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_key: "user_id".to_string(),
            login_path: None,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Sustained requests per second per client address.
    pub requests_per_second: u32,

    /// Burst capacity.
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 100,
            burst_size: 50,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus scrape endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
