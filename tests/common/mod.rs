//! Shared utilities for integration testing.
//!
//! `FakeAdmin` is an in-process stand-in for the proxy admin API, serving
//! the five endpoints the reconciler uses over TCP or a Unix socket.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

use hostroute::lifecycle::{ProcessError, ProxyProcess};

#[derive(Default)]
struct AdminState {
    listen: BTreeMap<String, Vec<String>>,
    routes: BTreeMap<String, Vec<Value>>,
    requests: Vec<(Method, String)>,
}

/// In-memory admin API.
#[derive(Clone, Default)]
pub struct FakeAdmin {
    state: Arc<Mutex<AdminState>>,
}

impl FakeAdmin {
    pub fn with_server(name: &str, listen: &[&str]) -> Self {
        let admin = Self::default();
        {
            let mut state = admin.state.lock().unwrap();
            state
                .listen
                .insert(name.to_string(), listen.iter().map(|s| s.to_string()).collect());
            state.routes.insert(name.to_string(), Vec::new());
        }
        admin
    }

    pub fn seed_route(&self, server: &str, route: Value) {
        self.state
            .lock()
            .unwrap()
            .routes
            .entry(server.to_string())
            .or_default()
            .push(route);
    }

    pub fn routes(&self, server: &str) -> Vec<Value> {
        self.state.lock().unwrap().routes.get(server).cloned().unwrap_or_default()
    }

    /// Requests seen so far, as ("METHOD", path).
    pub fn requests(&self) -> Vec<(String, String)> {
        self.state
            .lock()
            .unwrap()
            .requests
            .iter()
            .map(|(m, p)| (m.to_string(), p.clone()))
            .collect()
    }

    /// Mutating requests only.
    pub fn writes(&self) -> Vec<(String, String)> {
        self.requests()
            .into_iter()
            .filter(|(m, _)| m != "GET")
            .collect()
    }

    fn router(&self) -> Router {
        Router::new()
            .route("/config/apps/http/servers", get(list_servers))
            .route(
                "/config/apps/http/servers/{name}/routes",
                get(list_routes).post(append_route),
            )
            .route(
                "/config/apps/http/servers/{name}/routes/{index}",
                put(replace_route).delete(delete_route),
            )
            .layer(axum::middleware::from_fn_with_state(self.clone(), record))
            .with_state(self.clone())
    }

    /// Serve on an ephemeral TCP port; returns the admin base URL.
    pub async fn serve_tcp(&self) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = self.router();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    /// Serve on a Unix socket at `path`; returns the admin URL.
    #[cfg(unix)]
    pub async fn serve_unix(&self, path: &std::path::Path) -> String {
        let listener = tokio::net::UnixListener::bind(path).unwrap();
        let app = self.router();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("unix://{}", path.display())
    }
}

async fn record(
    State(admin): State<FakeAdmin>,
    method: Method,
    uri: Uri,
    request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    admin
        .state
        .lock()
        .unwrap()
        .requests
        .push((method, uri.path().to_string()));
    next.run(request).await
}

async fn list_servers(State(admin): State<FakeAdmin>) -> Response {
    let state = admin.state.lock().unwrap();
    if state.listen.is_empty() {
        return StatusCode::NOT_FOUND.into_response();
    }
    let servers: BTreeMap<_, _> = state
        .listen
        .iter()
        .map(|(name, listen)| (name.clone(), json!({"listen": listen, "routes": state.routes[name]})))
        .collect();
    Json(servers).into_response()
}

async fn list_routes(State(admin): State<FakeAdmin>, Path(name): Path<String>) -> Response {
    match admin.state.lock().unwrap().routes.get(&name) {
        Some(routes) => Json(routes.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn append_route(
    State(admin): State<FakeAdmin>,
    Path(name): Path<String>,
    Json(route): Json<Value>,
) -> StatusCode {
    match admin.state.lock().unwrap().routes.get_mut(&name) {
        Some(routes) => {
            routes.push(route);
            StatusCode::OK
        }
        None => StatusCode::NOT_FOUND,
    }
}

async fn replace_route(
    State(admin): State<FakeAdmin>,
    Path((name, index)): Path<(String, usize)>,
    Json(route): Json<Value>,
) -> StatusCode {
    let mut state = admin.state.lock().unwrap();
    match state.routes.get_mut(&name).and_then(|routes| routes.get_mut(index)) {
        Some(slot) => {
            *slot = route;
            StatusCode::OK
        }
        None => StatusCode::NOT_FOUND,
    }
}

async fn delete_route(
    State(admin): State<FakeAdmin>,
    Path((name, index)): Path<(String, usize)>,
) -> StatusCode {
    let mut state = admin.state.lock().unwrap();
    match state.routes.get_mut(&name) {
        Some(routes) if index < routes.len() => {
            routes.remove(index);
            StatusCode::OK
        }
        _ => StatusCode::NOT_FOUND,
    }
}

/// Proxy process double that counts stop requests.
#[derive(Clone, Default)]
pub struct CountingProcess {
    pub stops: Arc<AtomicUsize>,
}

impl CountingProcess {
    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProxyProcess for CountingProcess {
    async fn stop(&self) -> Result<(), ProcessError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Dial address of the last (default) branch of a built route.
pub fn default_dial(route: &Value) -> &str {
    let branches = route["handle"][0]["routes"].as_array().expect("subroute branches");
    branches.last().expect("default branch")["handle"][1]["upstreams"][0]["dial"]
        .as_str()
        .expect("dial address")
}
