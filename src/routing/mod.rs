//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Upsert:
//!     host + targets
//!     → builder.rs (canonical Route: CORS, WebSocket, default branches)
//!     → serialized into the control plane's route list
//!
//! Lookup:
//!     route list (opaque JSON from the control plane)
//!     → matcher.rs (scan match[].host[])
//!     → index of the owned route, or None
//! ```
//!
//! # Design Decisions
//! - A host owns at most one top-level route, identified by its host matcher
//! - Owned routes are replaced wholesale, never merged
//! - Deterministic: same input always builds the same route

pub mod builder;
pub mod matcher;
pub mod rule;

pub use builder::build_route;
pub use matcher::find_route_index;
pub use rule::{Handler, HeaderOps, MatchSet, Route, Upstream};
