//! Canonical route construction.
//!
//! # Shape
//! ```text
//! match host == <host>, terminal
//!   └─ subroute
//!        1. OPTIONS            → CORS preflight headers, 204   (terminal)
//!        2. WebSocket upgrade  → CORS headers, proxy frontend  (terminal, only with frontend)
//!        3. anything else      → CORS headers, proxy backend
//! ```
//!
//! Branch order matters: the proxy evaluates sub-routes first-match.

use crate::routing::rule::{HeaderOps, Handler, MatchSet, Route, Upstream};

/// Placeholder the proxy expands to the request's Origin header.
const ORIGIN_PLACEHOLDER: &str = "{http.request.header.origin}";
const PREFLIGHT_METHODS: &str = "GET, POST, PUT, PATCH, DELETE";
const PREFLIGHT_MAX_AGE_SECS: &str = "3600";

/// Build the route owned by this tool for `host`.
///
/// An empty `frontend` is treated as absent.
pub fn build_route(host: &str, frontend: Option<&str>, backend: &str) -> Route {
    let mut branches = Vec::with_capacity(3);

    branches.push(Route {
        matchers: vec![MatchSet::method("OPTIONS")],
        handle: vec![
            cors_headers(true),
            Handler::StaticResponse { status_code: 204 },
        ],
        terminal: true,
    });

    if let Some(frontend) = frontend.filter(|f| !f.is_empty()) {
        branches.push(Route {
            matchers: vec![MatchSet::default()
                .with_header("Connection", "*Upgrade*")
                .with_header("Upgrade", "websocket")],
            handle: vec![cors_headers(false), reverse_proxy(frontend)],
            terminal: true,
        });
    }

    branches.push(Route {
        matchers: Vec::new(),
        handle: vec![cors_headers(false), reverse_proxy(backend)],
        terminal: false,
    });

    Route {
        matchers: vec![MatchSet::host(host)],
        handle: vec![Handler::Subroute { routes: branches }],
        terminal: true,
    }
}

fn cors_headers(preflight: bool) -> Handler {
    let mut ops = HeaderOps::default()
        .set("Access-Control-Allow-Origin", ORIGIN_PLACEHOLDER)
        .set("Access-Control-Expose-Headers", "Authorization")
        .set("Access-Control-Allow-Credentials", "true")
        .set("Vary", "Origin");
    if preflight {
        ops = ops
            .set("Access-Control-Allow-Methods", PREFLIGHT_METHODS)
            .set("Access-Control-Max-Age", PREFLIGHT_MAX_AGE_SECS);
    }
    Handler::Headers { response: ops }
}

fn reverse_proxy(target: &str) -> Handler {
    Handler::ReverseProxy {
        upstreams: vec![Upstream::from_target(target)],
    }
}
