//! Local state subsystem.
//!
//! # Layout
//! ```text
//! <state dir>/
//!     registry.json       host → RegistryEntry, rewritten atomically
//!     registry.json.tmp   transient, renamed over registry.json
//!     registry.lock/      mutex marker; its mtime is the staleness clock
//! ```
//!
//! # Design Decisions
//! - Mutations happen only while holding [`StateLock`]
//! - Readers (`list`) need no lock thanks to atomic rename

pub mod lock;
pub mod registry;

pub use lock::{LockError, LockOptions, StateLock};
pub use registry::{Registry, RegistryEntry, RegistryError};
