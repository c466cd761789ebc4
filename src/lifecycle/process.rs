//! Managed proxy process control.
//!
//! # Responsibilities
//! - Stop the proxy once it no longer serves any managed host
//!
//! # Design Decisions
//! - Stopping is delegated to the proxy's own CLI (`<binary> stop`)
//! - Failures are returned, and callers downgrade them to warnings

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

use crate::config::ProcessConfig;

/// Errors from controlling the proxy process.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}: {output}")]
    Failed {
        command: String,
        status: std::process::ExitStatus,
        output: String,
    },
}

/// A proxy process that can be asked to stop.
#[async_trait]
pub trait ProxyProcess: Send + Sync {
    async fn stop(&self) -> Result<(), ProcessError>;
}

/// Caddy-style proxy stopped via `<binary> stop`.
#[derive(Debug, Clone)]
pub struct CaddyProcess {
    binary: String,
}

impl CaddyProcess {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn from_config(config: &ProcessConfig) -> Self {
        Self::new(config.binary.clone())
    }

    fn command_line(&self) -> String {
        format!("{} stop", self.binary)
    }
}

#[async_trait]
impl ProxyProcess for CaddyProcess {
    async fn stop(&self) -> Result<(), ProcessError> {
        tracing::debug!(binary = %self.binary, "Stopping proxy process");
        let output = Command::new(&self.binary)
            .arg("stop")
            .output()
            .await
            .map_err(|source| ProcessError::Spawn {
                command: self.command_line(),
                source,
            })?;

        if output.status.success() {
            return Ok(());
        }
        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        Err(ProcessError::Failed {
            command: self.command_line(),
            status: output.status,
            output: combined.trim().to_string(),
        })
    }
}
