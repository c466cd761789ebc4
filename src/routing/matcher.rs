//! Locating existing routes in a control-plane route list.
//!
//! # Responsibilities
//! - Find the route that owns a host (exact string match on `match[].host[]`)
//! - Tolerate routes written by anything else
//!
//! # Design Decisions
//! - Input is opaque JSON: the list may hold handlers this tool never emits
//! - Any shape that is not `{"match": [{"host": ["..."]}]}` is "no match", never an error
//! - No wildcard or case folding; the host is compared byte for byte
//! - First match wins

use serde_json::Value;

/// Index of the first route whose host matcher lists `host`.
pub fn find_route_index(routes: &[Value], host: &str) -> Option<usize> {
    routes.iter().position(|route| route_matches_host(route, host))
}

/// True if any match set of `route` lists `host`.
pub fn route_matches_host(route: &Value, host: &str) -> bool {
    route_hosts(route).any(|h| h == host)
}

/// All host strings listed in the match sets of `route`.
pub fn route_hosts(route: &Value) -> impl Iterator<Item = &str> {
    route
        .get("match")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|set| set.get("host").and_then(Value::as_array))
        .flatten()
        .filter_map(Value::as_str)
}
