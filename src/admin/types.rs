//! Control-plane wire types and error definitions.

use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur talking to the admin API.
#[derive(Debug, Error)]
pub enum AdminError {
    /// Non-2xx response outside the documented tolerances.
    #[error("admin API responded {status_code}: {body}")]
    Status { status_code: u16, body: String },

    /// Connection, protocol, or I/O failure.
    #[error("admin API {method} {path} failed: {message}")]
    Transport {
        method: String,
        path: String,
        message: String,
    },

    /// The call did not complete within the per-call timeout.
    #[error("admin API {method} {path} timed out after {}ms", .timeout.as_millis())]
    Timeout {
        method: String,
        path: String,
        timeout: std::time::Duration,
    },

    /// 2xx response whose body has an unexpected shape.
    #[error("parse admin API response from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("serialize request body: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("invalid admin URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Result type for admin API operations.
pub type AdminResult<T> = Result<T, AdminError>;

/// The part of an HTTP server definition this tool reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct HttpServer {
    /// Listen addresses, e.g. `":80"`, `"0.0.0.0:443"`, `":8000-8010"`.
    #[serde(default)]
    pub listen: Vec<String>,
}

impl HttpServer {
    /// True if any listen address covers `port`.
    pub fn listens_on(&self, port: u16) -> bool {
        self.listen.iter().any(|addr| address_covers_port(addr, port))
    }
}

fn address_covers_port(addr: &str, port: u16) -> bool {
    let Some((_, ports)) = addr.rsplit_once(':') else {
        return false;
    };
    match ports.split_once('-') {
        Some((start, end)) => match (start.parse::<u16>(), end.parse::<u16>()) {
            (Ok(start), Ok(end)) => (start..=end).contains(&port),
            _ => false,
        },
        None => ports.parse::<u16>() == Ok(port),
    }
}
