//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! defaults
//!     → config file (TOML, optional) via loader.rs
//!     → environment variables (HOSTROUTE_*)
//!     → command-line flags
//!     → validation.rs (semantic checks)
//!     → HostrouteConfig (validated, immutable)
//!
//! paths.rs turns the optional state dir into a concrete directory.
//! ```
//!
//! # Design Decisions
//! - One explicit structure; no ambient lookups inside workflows
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod paths;
pub mod schema;
pub mod validation;

pub use loader::{resolve_config, ConfigError, Overrides};
pub use schema::HostrouteConfig;
pub use schema::{AdminConfig, ObservabilityConfig, ProcessConfig, StateConfig};
