//! State directory resolution.
//!
//! # Resolution Order
//! 1. Configured directory (flag, `HOSTROUTE_STATE_DIR`, or config file)
//! 2. `$XDG_STATE_HOME/hostroute`
//! 3. macOS: `~/Library/Application Support/hostroute`
//! 4. `~/.local/state/hostroute`
//! 5. `<temp dir>/hostroute`

use std::path::{Path, PathBuf};

const APP_DIR: &str = "hostroute";

/// Resolve the state directory for the current platform.
///
/// The home directory comes from [`dirs::home_dir`], which falls back to the
/// password database when `HOME` is unset.
pub fn resolve_state_dir<F>(configured: Option<&Path>, env: F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    resolve_for_os(configured, env, dirs::home_dir(), std::env::consts::OS)
}

fn resolve_for_os<F>(configured: Option<&Path>, env: F, home: Option<PathBuf>, os: &str) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(dir) = configured.filter(|d| !d.as_os_str().is_empty()) {
        return dir.to_path_buf();
    }
    if let Some(xdg) = env("XDG_STATE_HOME").filter(|v| !v.is_empty()) {
        return PathBuf::from(xdg).join(APP_DIR);
    }
    match home.filter(|h| !h.as_os_str().is_empty()) {
        Some(home) if os == "macos" => home
            .join("Library")
            .join("Application Support")
            .join(APP_DIR),
        Some(home) => home.join(".local").join("state").join(APP_DIR),
        None => std::env::temp_dir().join(APP_DIR),
    }
}
