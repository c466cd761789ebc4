//! Requests, outcomes and errors of the reconciliation workflows.

use std::path::PathBuf;
use thiserror::Error;

use crate::admin::AdminError;
use crate::state::{LockError, RegistryEntry, RegistryError};

/// Errors that abort a reconciliation command.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Missing or contradictory arguments. Nothing was touched.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Lock timeout or lock I/O failure. Nothing was touched.
    #[error(transparent)]
    Lock(#[from] LockError),

    /// Registry unreadable, corrupt, or not writable.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Admin API failure. Earlier successful steps are not rolled back.
    #[error(transparent)]
    ControlPlane(#[from] AdminError),

    /// Server auto-detection found no HTTP servers.
    #[error("no HTTP servers configured on the proxy; start it with your base config first")]
    NoServersConfigured,

    #[error("create state dir {}: {source}", .path.display())]
    StateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ReconcileError {
    /// True for a lock acquisition timeout.
    pub fn is_lock_timeout(&self) -> bool {
        matches!(self, ReconcileError::Lock(LockError::Timeout { .. }))
    }
}

/// Map `host` to a backend and optional WebSocket frontend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpsertRequest {
    pub host: String,
    /// Default traffic target (port or host:port). Required.
    pub backend: Option<String>,
    /// WebSocket-upgrade target (port or host:port).
    pub frontend: Option<String>,
    /// Explicit server name; wins over the registry and auto-detection.
    pub server: Option<String>,
}

impl UpsertRequest {
    pub fn new(host: impl Into<String>, backend: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            backend: Some(backend.into()),
            ..Default::default()
        }
    }

    pub fn frontend(mut self, frontend: impl Into<String>) -> Self {
        self.frontend = Some(frontend.into());
        self
    }

    pub fn server(mut self, server: impl Into<String>) -> Self {
        self.server = Some(server.into());
        self
    }

    /// Check required fields; returns (host, frontend, backend).
    pub(crate) fn validate(&self) -> Result<(&str, Option<&str>, &str), ReconcileError> {
        let host = non_empty(Some(&self.host))
            .ok_or_else(|| ReconcileError::InvalidInput("host is required".into()))?;
        let frontend = non_empty(self.frontend.as_ref());
        let backend = match (non_empty(self.backend.as_ref()), frontend) {
            (Some(backend), _) => backend,
            (None, Some(_)) => {
                return Err(ReconcileError::InvalidInput(
                    "a frontend target requires a backend target".into(),
                ))
            }
            (None, None) => {
                return Err(ReconcileError::InvalidInput("backend target is required".into()))
            }
        };
        Ok((host, frontend, backend))
    }
}

/// Remove the route and registry entry for `host`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoveRequest {
    pub host: String,
    pub server: Option<String>,
}

impl RemoveRequest {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            server: None,
        }
    }

    pub fn server(mut self, server: impl Into<String>) -> Self {
        self.server = Some(server.into());
        self
    }
}

pub(crate) fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.is_empty())
}

/// What happened on the control plane during an upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertAction {
    /// No route for the host existed; one was appended.
    Created,
    /// The route at `index` was replaced.
    Updated { index: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub server: String,
    pub action: UpsertAction,
    /// The registry entry as persisted.
    pub entry: RegistryEntry,
}

/// Result of the best-effort proxy stop after the last host is removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyShutdown {
    /// Hosts remain; the proxy keeps running.
    NotNeeded,
    /// Stopping is turned off in configuration.
    Disabled,
    Stopped,
    /// Stop was attempted and failed; the command still succeeded.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveOutcome {
    pub host: String,
    pub server: String,
    /// Index the route was deleted from; `None` means nothing to remove.
    pub removed_index: Option<usize>,
    /// Whether the registry had an entry for the host.
    pub had_entry: bool,
    pub proxy: ProxyShutdown,
}
