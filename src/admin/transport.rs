//! Byte-level transport to the admin API.
//!
//! # Responsibilities
//! - Select HTTP(S) or Unix-domain socket from the admin URL scheme
//! - Send one request, return status and full body
//!
//! # Design Decisions
//! - HTTP goes through reqwest
//! - Unix sockets use a one-shot hyper HTTP/1 connection per call
//! - Timeouts are enforced by the caller (`client.rs`), not here

use axum::body::{Body, Bytes};
use axum::http::{header, Method, Request, StatusCode};
use hyper_util::rt::TokioIo;
use std::path::{Path, PathBuf};
use tokio::net::UnixStream;

use crate::admin::types::{AdminError, AdminResult};

/// Socket path for `unix://<path>` or `unix:<path>` admin URLs.
pub fn unix_socket_path(admin_url: &str) -> Option<PathBuf> {
    admin_url
        .strip_prefix("unix://")
        .or_else(|| admin_url.strip_prefix("unix:"))
        .map(PathBuf::from)
}

/// Status and body of a completed exchange.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl RawResponse {
    /// Body as trimmed text, for error reporting.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).trim().to_string()
    }

    /// True if the body carries no content.
    pub fn is_blank(&self) -> bool {
        self.body.iter().all(u8::is_ascii_whitespace)
    }
}

/// How requests reach the admin API.
#[derive(Debug, Clone)]
pub enum Transport {
    Http {
        client: reqwest::Client,
        base_url: String,
    },
    Unix {
        socket: PathBuf,
    },
}

impl Transport {
    /// Parse an admin URL into a transport.
    pub fn from_admin_url(admin_url: &str) -> AdminResult<Self> {
        if let Some(socket) = unix_socket_path(admin_url) {
            if socket.as_os_str().is_empty() {
                return Err(AdminError::InvalidUrl {
                    url: admin_url.to_string(),
                    reason: "empty socket path".to_string(),
                });
            }
            return Ok(Transport::Unix { socket });
        }

        let parsed = url::Url::parse(admin_url).map_err(|e| AdminError::InvalidUrl {
            url: admin_url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AdminError::InvalidUrl {
                url: admin_url.to_string(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }

        Ok(Transport::Http {
            client: reqwest::Client::new(),
            base_url: admin_url.trim_end_matches('/').to_string(),
        })
    }

    /// Send `method path` with an optional JSON body.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        json_body: Option<Vec<u8>>,
    ) -> AdminResult<RawResponse> {
        match self {
            Transport::Http { client, base_url } => {
                send_http(client, base_url, method, path, json_body).await
            }
            Transport::Unix { socket } => send_unix(socket, method, path, json_body).await,
        }
    }
}

fn transport_error(method: &Method, path: &str, err: impl std::fmt::Display) -> AdminError {
    AdminError::Transport {
        method: method.to_string(),
        path: path.to_string(),
        message: err.to_string(),
    }
}

async fn send_http(
    client: &reqwest::Client,
    base_url: &str,
    method: Method,
    path: &str,
    json_body: Option<Vec<u8>>,
) -> AdminResult<RawResponse> {
    let mut request = client.request(method.clone(), format!("{}{}", base_url, path));
    if let Some(body) = json_body {
        request = request.header(header::CONTENT_TYPE, "application/json").body(body);
    }

    let response = request
        .send()
        .await
        .map_err(|e| transport_error(&method, path, e))?;
    let status = response.status();
    let body = response
        .bytes()
        .await
        .map_err(|e| transport_error(&method, path, e))?;
    Ok(RawResponse { status, body })
}

async fn send_unix(
    socket: &Path,
    method: Method,
    path: &str,
    json_body: Option<Vec<u8>>,
) -> AdminResult<RawResponse> {
    let stream = UnixStream::connect(socket)
        .await
        .map_err(|e| transport_error(&method, path, format!("connect {}: {}", socket.display(), e)))?;
    let (mut sender, connection) = hyper::client::conn::http1::handshake::<_, Body>(TokioIo::new(stream))
        .await
        .map_err(|e| transport_error(&method, path, e))?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::debug!(error = %e, "Admin socket connection ended with error");
        }
    });

    let mut builder = Request::builder()
        .method(method.clone())
        .uri(path)
        .header(header::HOST, "localhost");
    let body = match json_body {
        Some(bytes) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(bytes)
        }
        None => Body::empty(),
    };
    let request = builder
        .body(body)
        .map_err(|e| transport_error(&method, path, e))?;

    let response = sender
        .send_request(request)
        .await
        .map_err(|e| transport_error(&method, path, e))?;
    let status = response.status();
    let body = axum::body::to_bytes(Body::new(response.into_body()), usize::MAX)
        .await
        .map_err(|e| transport_error(&method, path, e))?;
    Ok(RawResponse { status, body })
}
