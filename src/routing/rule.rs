//! Typed route rules as understood by the control plane.
//!
//! Only rules this tool writes are modeled here. Rule lists read back from
//! the control plane stay as opaque JSON (see `matcher.rs`) because other
//! tools may own entries with handlers we know nothing about.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A route: match sets OR'ed together, handlers applied in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    #[serde(rename = "match", default, skip_serializing_if = "Vec::is_empty")]
    pub matchers: Vec<MatchSet>,

    pub handle: Vec<Handler>,

    /// Stop evaluating sibling routes once this one matches.
    #[serde(default, skip_serializing_if = "is_false")]
    pub terminal: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Conditions AND'ed together within one match set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSet {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub host: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub method: Vec<String>,

    /// Header name → accepted patterns (`*` wildcards allowed by the proxy).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub header: BTreeMap<String, Vec<String>>,
}

impl MatchSet {
    pub fn host(host: impl Into<String>) -> Self {
        Self {
            host: vec![host.into()],
            ..Default::default()
        }
    }

    pub fn method(method: impl Into<String>) -> Self {
        Self {
            method: vec![method.into()],
            ..Default::default()
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.header.entry(name.into()).or_default().push(pattern.into());
        self
    }
}

/// Handler variants this tool emits, tagged by the `handler` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "handler", rename_all = "snake_case")]
pub enum Handler {
    Headers { response: HeaderOps },
    StaticResponse { status_code: u16 },
    ReverseProxy { upstreams: Vec<Upstream> },
    Subroute { routes: Vec<Route> },
}

/// Response header operations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderOps {
    pub set: BTreeMap<String, Vec<String>>,
}

impl HeaderOps {
    pub fn set(mut self, name: &str, value: &str) -> Self {
        self.set.insert(name.to_string(), vec![value.to_string()]);
        self
    }
}

/// A reverse-proxy upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upstream {
    /// Dial address, `host:port`.
    pub dial: String,
}

impl Upstream {
    /// Normalize a target: a bare port becomes `127.0.0.1:<port>`,
    /// anything containing a colon is used verbatim.
    pub fn from_target(target: &str) -> Self {
        let dial = if target.contains(':') {
            target.to_string()
        } else {
            format!("127.0.0.1:{}", target)
        };
        Self { dial }
    }
}
