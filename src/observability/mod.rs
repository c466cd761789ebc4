//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events (lock, registry, admin API, reconcile)
//!     → inside a per-command span carrying an operation ID
//!
//! Consumer:
//!     → logging.rs (fmt layer on stderr, EnvFilter)
//! ```
//!
//! # Design Decisions
//! - Structured fields (host, server, index) instead of formatted strings
//! - One operation ID per invocation correlates all of its events

pub mod logging;

pub use logging::init_logging;

/// Span wrapping one command invocation.
pub fn command_span(name: &'static str) -> tracing::Span {
    tracing::info_span!("command", cmd = name, op_id = %uuid::Uuid::new_v4())
}
