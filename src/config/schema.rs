//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the tool.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default admin API endpoint of the managed proxy.
pub const DEFAULT_ADMIN_URL: &str = "http://127.0.0.1:2019";

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct HostrouteConfig {
    /// Control-plane endpoint settings.
    pub admin: AdminConfig,

    /// Local state directory and lock timings.
    pub state: StateConfig,

    /// Managed proxy process.
    pub proxy: ProcessConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Admin API (control plane) configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AdminConfig {
    /// Base URL (e.g., "http://127.0.0.1:2019" or "unix:///run/caddy/admin.sock").
    pub url: String,

    /// HTTP server name on the control plane. Auto-detected when unset.
    pub server: Option<String>,

    /// Per-call timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_ADMIN_URL.to_string(),
            server: None,
            timeout_secs: 5,
        }
    }
}

impl AdminConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Local state configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct StateConfig {
    /// State directory. Resolved per platform when unset.
    pub dir: Option<PathBuf>,

    /// Give up acquiring the registry lock after this many milliseconds.
    pub lock_timeout_ms: u64,

    /// Interval between lock attempts in milliseconds.
    pub lock_poll_ms: u64,

    /// A lock marker older than this is considered abandoned.
    pub lock_stale_secs: u64,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            dir: None,
            lock_timeout_ms: 5_000,
            lock_poll_ms: 100,
            lock_stale_secs: 30,
        }
    }
}

/// Managed proxy process configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ProcessConfig {
    /// Proxy executable, invoked as `<binary> stop`.
    pub binary: String,

    /// Stop the proxy once the last host is removed.
    pub stop_when_empty: bool,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            binary: "caddy".to_string(),
            stop_when_empty: true,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
        }
    }
}
