//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! remove → registry empty → process.rs (`<binary> stop`)
//!     → Ok: report "stopped"
//!     → Err: warn, command still succeeds
//! ```
//!
//! # Design Decisions
//! - The proxy is started outside this tool; only stopping is managed
//! - Stopping is best effort and never fails a command

pub mod process;

pub use process::{CaddyProcess, ProcessError, ProxyProcess};
