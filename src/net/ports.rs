//! Free local TCP port discovery.
//!
//! # Design Decisions
//! - Ask the OS for ephemeral ports by binding `127.0.0.1:0`
//! - Keep every listener open until all ports are chosen so the same
//!   port cannot be handed out twice in one call
//! - Ports are released on return; callers race other processes for them

use std::io;
use tokio::net::TcpListener;

/// Return `count` distinct currently-free ports on the loopback interface.
pub async fn free_ports(count: usize) -> io::Result<Vec<u16>> {
    let mut listeners = Vec::with_capacity(count);
    for _ in 0..count {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        listeners.push(listener);
    }

    let ports = listeners
        .iter()
        .map(|l| l.local_addr().map(|addr| addr.port()))
        .collect::<io::Result<Vec<_>>>()?;
    tracing::debug!(?ports, "Allocated free ports");
    Ok(ports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[tokio::test]
    async fn test_ports_are_distinct_and_nonzero() {
        let ports = free_ports(5).await.unwrap();
        assert_eq!(ports.len(), 5);
        assert!(ports.iter().all(|p| *p != 0));
        assert_eq!(ports.iter().collect::<HashSet<_>>().len(), 5);
    }

    #[tokio::test]
    async fn test_ports_are_released() {
        let port = free_ports(1).await.unwrap()[0];
        let rebound = TcpListener::bind(("127.0.0.1", port)).await;
        assert!(rebound.is_ok());
    }

    #[tokio::test]
    async fn test_zero_count() {
        assert!(free_ports(0).await.unwrap().is_empty());
    }
}
