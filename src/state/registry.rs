//! Local registry of managed hosts.
//!
//! # Responsibilities
//! - Record which hosts this tool believes it configured, and where
//! - Load tolerantly (missing or empty file is an empty registry)
//! - Save atomically (temp file + rename) so readers never see partial writes
//!
//! # Design Decisions
//! - `BTreeMap` keyed by host: stable, sorted encoding so an unmodified
//!   snapshot re-saves byte-for-byte
//! - Timestamps are whole seconds in UTC

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const REGISTRY_FILE_NAME: &str = "registry.json";
const REGISTRY_TMP_NAME: &str = "registry.json.tmp";

/// Errors from loading or saving the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The file exists but cannot be parsed.
    #[error("registry at {} is corrupt ({source}); repair or delete it", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("read registry {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("write registry {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("serialize registry: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// One managed host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub host: String,
    /// Control-plane server the host's rule lives under.
    pub server: String,
    /// WebSocket-upgrade target, port or host:port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frontend: Option<String>,
    /// Default traffic target, port or host:port.
    pub backend: String,
    pub updated: DateTime<Utc>,
}

impl RegistryEntry {
    /// Create an entry stamped with the current time.
    pub fn new(host: &str, server: &str, frontend: Option<&str>, backend: &str) -> Self {
        Self {
            host: host.to_string(),
            server: server.to_string(),
            frontend: frontend.filter(|f| !f.is_empty()).map(str::to_string),
            backend: backend.to_string(),
            updated: Utc::now().trunc_subsecs(0),
        }
    }
}

/// Snapshot of all managed hosts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    #[serde(default, deserialize_with = "null_as_empty")]
    entries: BTreeMap<String, RegistryEntry>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<BTreeMap<String, RegistryEntry>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::deserialize(deserializer)?.unwrap_or_default())
}

impl Registry {
    pub fn get(&self, host: &str) -> Option<&RegistryEntry> {
        self.entries.get(host)
    }

    /// Insert or replace the entry for `entry.host`.
    pub fn upsert(&mut self, entry: RegistryEntry) {
        self.entries.insert(entry.host.clone(), entry);
    }

    pub fn remove(&mut self, host: &str) -> Option<RegistryEntry> {
        self.entries.remove(host)
    }

    /// Entries in host order.
    pub fn entries(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pretty JSON encoding, as persisted.
    pub fn to_json(&self) -> Result<String, RegistryError> {
        serde_json::to_string_pretty(self).map_err(RegistryError::Serialize)
    }
}

/// Path of the registry file inside `state_dir`.
pub fn registry_path(state_dir: &Path) -> PathBuf {
    state_dir.join(REGISTRY_FILE_NAME)
}

/// Load the registry. A missing or empty file yields an empty registry.
pub fn load(state_dir: &Path) -> Result<Registry, RegistryError> {
    let path = registry_path(state_dir);
    let data = match std::fs::read(&path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Registry::default()),
        Err(source) => return Err(RegistryError::Read { path, source }),
    };
    if data.iter().all(u8::is_ascii_whitespace) {
        return Ok(Registry::default());
    }
    serde_json::from_slice(&data).map_err(|source| RegistryError::Corrupt { path, source })
}

/// Persist the registry atomically.
pub fn save(state_dir: &Path, registry: &Registry) -> Result<(), RegistryError> {
    let path = registry_path(state_dir);
    let tmp = state_dir.join(REGISTRY_TMP_NAME);
    let data = registry.to_json()?;

    write_private(&tmp, data.as_bytes()).map_err(|source| RegistryError::Write {
        path: tmp.clone(),
        source,
    })?;
    if let Err(source) = std::fs::rename(&tmp, &path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(RegistryError::Write { path, source });
    }
    tracing::debug!(entries = registry.len(), "Registry saved");
    Ok(())
}

fn write_private(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(data)?;
    file.sync_all()
}

/// Create the state directory (mode 0700 on Unix) if it does not exist.
pub fn ensure_state_dir(state_dir: &Path) -> io::Result<()> {
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(state_dir)
}
