//! Control-plane (proxy admin API) subsystem.
//!
//! # Data Flow
//! ```text
//! admin URL (http://host:port or unix:///path)
//!     → transport.rs (reqwest over TCP, or hyper over a Unix socket)
//!     → client.rs (paths, timeouts, status tolerances)
//!     → ControlPlane trait consumed by the reconciler
//! ```
//!
//! # Endpoints
//! - `GET    /config/apps/http/servers`
//! - `GET    /config/apps/http/servers/{name}/routes`
//! - `POST   /config/apps/http/servers/{name}/routes`
//! - `PUT    /config/apps/http/servers/{name}/routes/{index}`
//! - `DELETE /config/apps/http/servers/{name}/routes/{index}`

pub mod client;
pub mod transport;
pub mod types;

pub use client::{AdminClient, ControlPlane};
pub use types::{AdminError, AdminResult, HttpServer};
