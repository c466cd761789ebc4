//! Route reconciliation subsystem.
//!
//! # Data Flow
//! ```text
//! UpsertRequest / RemoveRequest
//!     → orchestrator.rs
//!         state::StateLock     (held for the whole workflow)
//!         state::registry      (local intent)
//!         admin::ControlPlane  (remote truth)
//!         routing              (build + locate)
//!         lifecycle            (best-effort proxy stop)
//!     → UpsertOutcome / RemoveOutcome
//! ```
//!
//! # Design Decisions
//! - Sequential: one call awaited after another, no internal parallelism
//! - No automatic retries; re-running a command is the retry mechanism
//! - Idempotent: upserting twice yields one route and one entry

pub mod orchestrator;
pub mod types;

pub use orchestrator::{pick_default_server, Reconciler};
pub use types::{
    ProxyShutdown, ReconcileError, RemoveOutcome, RemoveRequest, UpsertAction, UpsertOutcome,
    UpsertRequest,
};
