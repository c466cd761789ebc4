//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate the admin endpoint shape (http(s) URL or unix socket path)
//! - Validate value ranges (timeouts > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: HostrouteConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;

use crate::admin::transport::unix_socket_path;
use crate::config::schema::HostrouteConfig;

/// A single semantic problem with a configuration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field (e.g., "admin.url").
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a fully merged configuration.
pub fn validate_config(config: &HostrouteConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    validate_admin_url(&config.admin.url, &mut errors);

    if config.admin.timeout_secs == 0 {
        errors.push(ValidationError::new("admin.timeout_secs", "must be greater than 0"));
    }
    if matches!(config.admin.server.as_deref(), Some(name) if name.contains('/')) {
        errors.push(ValidationError::new("admin.server", "must not contain '/'"));
    }
    if config.state.lock_timeout_ms == 0 {
        errors.push(ValidationError::new("state.lock_timeout_ms", "must be greater than 0"));
    }
    if config.state.lock_poll_ms == 0 {
        errors.push(ValidationError::new("state.lock_poll_ms", "must be greater than 0"));
    }
    if config.state.lock_stale_secs == 0 {
        errors.push(ValidationError::new("state.lock_stale_secs", "must be greater than 0"));
    }
    if config.proxy.binary.trim().is_empty() {
        errors.push(ValidationError::new("proxy.binary", "must not be empty"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_admin_url(raw: &str, errors: &mut Vec<ValidationError>) {
    if let Some(path) = unix_socket_path(raw) {
        if path.as_os_str().is_empty() {
            errors.push(ValidationError::new("admin.url", "unix socket path is empty"));
        }
        return;
    }

    match url::Url::parse(raw) {
        Ok(url) if !matches!(url.scheme(), "http" | "https") => errors.push(ValidationError::new(
            "admin.url",
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Ok(url) if url.host_str().is_none() => {
            errors.push(ValidationError::new("admin.url", "missing host"))
        }
        Ok(_) => {}
        Err(e) => errors.push(ValidationError::new("admin.url", format!("invalid URL '{}': {}", raw, e))),
    }
}
