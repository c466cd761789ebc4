//! Admin API client with timeout and error handling.
//!
//! # Responsibilities
//! - List HTTP servers and their route lists
//! - Append, replace and delete routes by index
//! - Map status codes onto the documented tolerances
//!
//! # Tolerances
//! - 404 on a list fetch: empty list
//! - Empty or `null` body on a list fetch: empty list
//! - 404 on delete: already absent, success
//!
//! Everything else outside 2xx is [`AdminError::Status`]. No retries.

use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::timeout;

use crate::admin::transport::{RawResponse, Transport};
use crate::admin::types::{AdminError, AdminResult, HttpServer};
use crate::config::AdminConfig;
use crate::routing::Route;

const SERVERS_PATH: &str = "/config/apps/http/servers";

/// Operations the reconciler needs from the control plane.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Declared HTTP servers by name.
    async fn servers(&self) -> AdminResult<BTreeMap<String, HttpServer>>;

    /// Ordered route list of `server`, as opaque JSON.
    async fn routes(&self, server: &str) -> AdminResult<Vec<Value>>;

    /// Append `route` to the end of `server`'s list.
    async fn append_route(&self, server: &str, route: &Route) -> AdminResult<()>;

    /// Replace the route at `index`.
    async fn replace_route(&self, server: &str, index: usize, route: &Route) -> AdminResult<()>;

    /// Delete the route at `index`. Absent is success.
    async fn delete_route(&self, server: &str, index: usize) -> AdminResult<()>;
}

/// HTTP/Unix-socket client for the proxy's admin API.
#[derive(Debug, Clone)]
pub struct AdminClient {
    transport: Transport,
    timeout_duration: Duration,
}

impl AdminClient {
    /// Create a client for `admin_url` (`http(s)://...` or `unix:...`).
    pub fn new(admin_url: &str, timeout_duration: Duration) -> AdminResult<Self> {
        Ok(Self {
            transport: Transport::from_admin_url(admin_url)?,
            timeout_duration,
        })
    }

    pub fn from_config(config: &AdminConfig) -> AdminResult<Self> {
        Self::new(&config.url, config.timeout())
    }

    async fn call(&self, method: Method, path: &str, body: Option<Vec<u8>>) -> AdminResult<RawResponse> {
        tracing::debug!(method = %method, path, "Admin API request");
        match timeout(self.timeout_duration, self.transport.send(method.clone(), path, body)).await {
            Ok(Ok(response)) => {
                tracing::debug!(method = %method, path, status = response.status.as_u16(), "Admin API response");
                Ok(response)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(AdminError::Timeout {
                method: method.to_string(),
                path: path.to_string(),
                timeout: self.timeout_duration,
            }),
        }
    }

    /// GET a collection; 404, empty and `null` all mean "nothing there".
    async fn get_collection<T>(&self, path: &str) -> AdminResult<T>
    where
        T: DeserializeOwned + Default,
    {
        let response = self.call(Method::GET, path, None).await?;
        if response.status == StatusCode::NOT_FOUND {
            return Ok(T::default());
        }
        ensure_success(&response)?;
        if response.is_blank() {
            return Ok(T::default());
        }
        let parsed: Option<T> = serde_json::from_slice(&response.body).map_err(|source| AdminError::Decode {
            path: path.to_string(),
            source,
        })?;
        Ok(parsed.unwrap_or_default())
    }

    async fn send_route(&self, method: Method, path: &str, route: &Route) -> AdminResult<()> {
        let body = serde_json::to_vec(route).map_err(AdminError::Encode)?;
        let response = self.call(method, path, Some(body)).await?;
        ensure_success(&response)
    }
}

fn routes_path(server: &str) -> String {
    format!("{}/{}/routes", SERVERS_PATH, server)
}

fn route_path(server: &str, index: usize) -> String {
    format!("{}/{}/routes/{}", SERVERS_PATH, server, index)
}

fn ensure_success(response: &RawResponse) -> AdminResult<()> {
    if response.status.is_success() {
        return Ok(());
    }
    Err(AdminError::Status {
        status_code: response.status.as_u16(),
        body: response.body_text(),
    })
}

#[async_trait]
impl ControlPlane for AdminClient {
    async fn servers(&self) -> AdminResult<BTreeMap<String, HttpServer>> {
        self.get_collection(SERVERS_PATH).await
    }

    async fn routes(&self, server: &str) -> AdminResult<Vec<Value>> {
        self.get_collection(&routes_path(server)).await
    }

    async fn append_route(&self, server: &str, route: &Route) -> AdminResult<()> {
        self.send_route(Method::POST, &routes_path(server), route).await
    }

    async fn replace_route(&self, server: &str, index: usize, route: &Route) -> AdminResult<()> {
        self.send_route(Method::PUT, &route_path(server, index), route).await
    }

    async fn delete_route(&self, server: &str, index: usize) -> AdminResult<()> {
        let response = self.call(Method::DELETE, &route_path(server, index), None).await?;
        if response.status == StatusCode::NOT_FOUND {
            tracing::debug!(server, index, "Route already absent");
            return Ok(());
        }
        ensure_success(&response)
    }
}
