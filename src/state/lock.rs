//! Cross-process registry lock.
//!
//! # Responsibilities
//! - Serialize mutating commands across separate invocations
//! - Recover from holders that crashed without releasing
//!
//! # Design Decisions
//! - Marker is a directory: `create_dir` is atomic and fails with
//!   `AlreadyExists` when someone else holds it
//! - The marker's mtime is the staleness clock; markers older than the
//!   stale threshold are removed and the attempt is retried immediately
//! - Release happens in `Drop`, so every exit path of the holder releases;
//!   `Drop` cannot await, so release is the one blocking filesystem call
//! - A stale marker that cannot be removed is waited on like a live one
//! - No fencing token: a live holder slower than the stale threshold can be
//!   reclaimed by another process

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use thiserror::Error;

use crate::config::StateConfig;

/// Name of the marker directory inside the state directory.
pub const LOCK_DIR_NAME: &str = "registry.lock";

/// Errors from lock acquisition.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another holder kept the lock past the deadline.
    #[error("timed out after {}ms waiting for registry lock at {}", .waited.as_millis(), .path.display())]
    Timeout { path: PathBuf, waited: Duration },

    /// Creating the marker failed for a reason other than contention.
    #[error("lock state at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Timing parameters for [`StateLock::acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockOptions {
    /// Overall acquisition deadline.
    pub timeout: Duration,
    /// Wait between attempts while the lock is held.
    pub poll_interval: Duration,
    /// Markers older than this are treated as abandoned.
    pub stale_after: Duration,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(100),
            stale_after: Duration::from_secs(30),
        }
    }
}

impl From<&StateConfig> for LockOptions {
    fn from(config: &StateConfig) -> Self {
        Self {
            timeout: Duration::from_millis(config.lock_timeout_ms),
            poll_interval: Duration::from_millis(config.lock_poll_ms),
            stale_after: Duration::from_secs(config.lock_stale_secs),
        }
    }
}

/// Held registry lock. Dropping it removes the marker.
#[derive(Debug)]
pub struct StateLock {
    path: PathBuf,
}

impl StateLock {
    /// Acquire the lock for `state_dir`, waiting up to `options.timeout`.
    pub async fn acquire(state_dir: &Path, options: LockOptions) -> Result<Self, LockError> {
        let path = state_dir.join(LOCK_DIR_NAME);
        let started = Instant::now();
        let deadline = started + options.timeout;
        tracing::debug!(path = %path.display(), "Acquiring registry lock");

        loop {
            match tokio::fs::create_dir(&path).await {
                Ok(()) => {
                    tracing::debug!(path = %path.display(), "Registry lock acquired");
                    return Ok(Self { path });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
                Err(source) => return Err(LockError::Io { path, source }),
            }

            if let Some(age) = marker_age(&path).await {
                if age > options.stale_after {
                    tracing::warn!(
                        path = %path.display(),
                        age_secs = age.as_secs(),
                        "Removing stale registry lock"
                    );
                    match tokio::fs::remove_dir(&path).await {
                        Ok(()) => continue,
                        Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                        // Unremovable marker: keep waiting until the deadline.
                        Err(e) => tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to remove stale registry lock"
                        ),
                    }
                }
            }

            if Instant::now() >= deadline {
                return Err(LockError::Timeout {
                    path,
                    waited: started.elapsed(),
                });
            }
            tokio::time::sleep(options.poll_interval).await;
        }
    }

    /// Path of the marker directory.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        tracing::debug!(path = %self.path.display(), "Releasing registry lock");
        let _ = std::fs::remove_dir(&self.path);
    }
}

/// Age of the marker, or `None` if it vanished or has no usable mtime.
async fn marker_age(path: &Path) -> Option<Duration> {
    let modified = tokio::fs::metadata(path).await.ok()?.modified().ok()?;
    // Clock skew into the future reads as age zero.
    Some(SystemTime::now().duration_since(modified).unwrap_or_default())
}
