//! Local network helpers.
//!
//! # Responsibilities
//! - Discover free loopback ports for new backends (`ports` command)

pub mod ports;

pub use ports::free_ports;
