//! Host route reconciliation library.
//!
//! # Architecture Overview
//!
//! ```text
//!   hostroute add/remove
//!          │
//!          ▼
//!   ┌──────────────┐   lock    ┌──────────────┐
//!   │  reconcile   │──────────▶│    state     │  registry.json, registry.lock/
//!   │ orchestrator │◀─────────▶│  (registry)  │
//!   └──────┬───────┘           └──────────────┘
//!          │ build / locate
//!          ▼
//!   ┌──────────────┐  JSON over HTTP or unix socket  ┌────────────────┐
//!   │   routing    │────────────────────────────────▶│ proxy admin API│
//!   │ + admin      │◀────────────────────────────────│ (control plane)│
//!   └──────────────┘                                 └────────────────┘
//!
//!   Cross-cutting: config (flag > env > file > default), observability,
//!   lifecycle (best-effort proxy stop), net (free ports)
//! ```

// Core subsystems
pub mod admin;
pub mod reconcile;
pub mod routing;
pub mod state;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use admin::{AdminClient, ControlPlane};
pub use config::HostrouteConfig;
pub use reconcile::{Reconciler, RemoveRequest, UpsertRequest};
