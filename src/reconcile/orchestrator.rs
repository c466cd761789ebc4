//! Upsert and remove workflows.
//!
//! # Ordering
//! ```text
//! validate → lock → load registry → resolve server → fetch routes
//!     → locate → PUT (replace) or POST (append) / DELETE
//!     → update + save registry → [remove only] best-effort proxy stop
//!     → unlock (guard drop, on every path)
//! ```
//!
//! The remote write always precedes the local write. A crash between the two
//! leaves the registry stale; the next `add` for the host re-locates the
//! remote route and replaces it, so re-running converges.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::admin::{ControlPlane, HttpServer};
use crate::lifecycle::ProxyProcess;
use crate::reconcile::types::{
    non_empty, ProxyShutdown, ReconcileError, RemoveOutcome, RemoveRequest, UpsertAction,
    UpsertOutcome, UpsertRequest,
};
use crate::routing::{build_route, find_route_index};
use crate::state::registry::{self, Registry, RegistryEntry};
use crate::state::{LockOptions, StateLock};

/// Reconciles the local registry with the proxy's route list.
pub struct Reconciler<C, P> {
    control_plane: C,
    process: P,
    state_dir: PathBuf,
    lock_options: LockOptions,
    stop_when_empty: bool,
}

impl<C, P> Reconciler<C, P>
where
    C: ControlPlane,
    P: ProxyProcess,
{
    pub fn new(control_plane: C, process: P, state_dir: impl Into<PathBuf>) -> Self {
        Self {
            control_plane,
            process,
            state_dir: state_dir.into(),
            lock_options: LockOptions::default(),
            stop_when_empty: true,
        }
    }

    pub fn with_lock_options(mut self, lock_options: LockOptions) -> Self {
        self.lock_options = lock_options;
        self
    }

    pub fn with_stop_when_empty(mut self, stop_when_empty: bool) -> Self {
        self.stop_when_empty = stop_when_empty;
        self
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    pub fn control_plane(&self) -> &C {
        &self.control_plane
    }

    /// Create or replace the route for a host, then record it.
    pub async fn upsert(&self, request: &UpsertRequest) -> Result<UpsertOutcome, ReconcileError> {
        let (host, frontend, backend) = request.validate()?;
        let _lock = self.lock().await?;

        let mut registry = registry::load(&self.state_dir)?;
        let recorded = registry.get(host).map(|e| e.server.clone());
        let server = self
            .resolve_server(non_empty(request.server.as_ref()), recorded.as_deref())
            .await?;

        let routes = self.control_plane.routes(&server).await?;
        let route = build_route(host, frontend, backend);

        let action = match find_route_index(&routes, host) {
            Some(index) => {
                tracing::info!(host, server = %server, index, "Updating route");
                self.control_plane.replace_route(&server, index, &route).await?;
                UpsertAction::Updated { index }
            }
            None => {
                tracing::info!(host, server = %server, "Creating route");
                self.control_plane.append_route(&server, &route).await?;
                UpsertAction::Created
            }
        };

        let entry = RegistryEntry::new(host, &server, frontend, backend);
        registry.upsert(entry.clone());
        registry::save(&self.state_dir, &registry)?;

        Ok(UpsertOutcome {
            server,
            action,
            entry,
        })
    }

    /// Delete the route and registry entry for a host. Absence is not an error.
    pub async fn remove(&self, request: &RemoveRequest) -> Result<RemoveOutcome, ReconcileError> {
        let host = non_empty(Some(&request.host))
            .ok_or_else(|| ReconcileError::InvalidInput("host is required".into()))?;
        let _lock = self.lock().await?;

        let mut registry = registry::load(&self.state_dir)?;
        let recorded = registry.get(host).map(|e| e.server.clone());
        let server = self
            .resolve_server(non_empty(request.server.as_ref()), recorded.as_deref())
            .await?;

        let routes = self.control_plane.routes(&server).await?;
        let removed_index = match find_route_index(&routes, host) {
            Some(index) => {
                tracing::info!(host, server = %server, index, "Deleting route");
                self.control_plane.delete_route(&server, index).await?;
                Some(index)
            }
            None => {
                tracing::info!(host, server = %server, "No route to delete");
                None
            }
        };

        let had_entry = registry.remove(host).is_some();
        registry::save(&self.state_dir, &registry)?;

        let proxy = if registry.is_empty() {
            self.stop_proxy().await
        } else {
            ProxyShutdown::NotNeeded
        };

        Ok(RemoveOutcome {
            host: host.to_string(),
            server,
            removed_index,
            had_entry,
            proxy,
        })
    }

    /// Current registry snapshot. Takes no lock; saves are atomic renames.
    pub fn list(&self) -> Result<Registry, ReconcileError> {
        Ok(registry::load(&self.state_dir)?)
    }

    async fn lock(&self) -> Result<StateLock, ReconcileError> {
        registry::ensure_state_dir(&self.state_dir).map_err(|source| ReconcileError::StateDir {
            path: self.state_dir.clone(),
            source,
        })?;
        Ok(StateLock::acquire(&self.state_dir, self.lock_options).await?)
    }

    /// Explicit name, else the name recorded for the host, else auto-detect.
    async fn resolve_server(
        &self,
        explicit: Option<&str>,
        recorded: Option<&str>,
    ) -> Result<String, ReconcileError> {
        if let Some(name) = explicit {
            return Ok(name.to_string());
        }
        if let Some(name) = recorded.filter(|n| !n.is_empty()) {
            tracing::debug!(server = name, "Using server recorded in registry");
            return Ok(name.to_string());
        }

        let servers = self.control_plane.servers().await?;
        let name = pick_default_server(&servers).ok_or(ReconcileError::NoServersConfigured)?;
        tracing::debug!(server = %name, candidates = servers.len(), "Auto-detected server");
        Ok(name)
    }

    async fn stop_proxy(&self) -> ProxyShutdown {
        if !self.stop_when_empty {
            return ProxyShutdown::Disabled;
        }
        match self.process.stop().await {
            Ok(()) => {
                tracing::info!("Stopped proxy, no hosts remaining");
                ProxyShutdown::Stopped
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to stop proxy (no hosts remaining)");
                ProxyShutdown::Failed(e.to_string())
            }
        }
    }
}

/// First server (by name) listening on port 80, else the first server.
pub fn pick_default_server(servers: &BTreeMap<String, HttpServer>) -> Option<String> {
    servers
        .iter()
        .find(|(_, server)| server.listens_on(80))
        .or_else(|| servers.iter().next())
        .map(|(name, _)| name.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::{AdminError, AdminResult};
    use crate::lifecycle::ProcessError;
    use crate::routing::{Handler, Route};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Servers,
        Routes(String),
        Append(String),
        Replace(String, usize),
        Delete(String, usize),
    }

    /// In-memory control plane with one route list per server.
    #[derive(Default)]
    struct FakeControlPlane {
        servers: BTreeMap<String, HttpServer>,
        routes: Mutex<BTreeMap<String, Vec<Value>>>,
        calls: Mutex<Vec<Call>>,
        fail_writes: bool,
    }

    impl FakeControlPlane {
        fn with_server(name: &str, listen: &[&str]) -> Self {
            let mut fake = Self::default();
            fake.add_server(name, listen);
            fake
        }

        fn add_server(&mut self, name: &str, listen: &[&str]) {
            self.servers.insert(
                name.to_string(),
                HttpServer {
                    listen: listen.iter().map(|s| s.to_string()).collect(),
                },
            );
            self.routes.lock().unwrap().entry(name.to_string()).or_default();
        }

        fn seed(&self, server: &str, route: Value) {
            self.routes.lock().unwrap().entry(server.to_string()).or_default().push(route);
        }

        fn routes_of(&self, server: &str) -> Vec<Value> {
            self.routes.lock().unwrap().get(server).cloned().unwrap_or_default()
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }

        fn write_guard(&self) -> AdminResult<()> {
            if self.fail_writes {
                return Err(AdminError::Status {
                    status_code: 500,
                    body: "boom".into(),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl ControlPlane for FakeControlPlane {
        async fn servers(&self) -> AdminResult<BTreeMap<String, HttpServer>> {
            self.record(Call::Servers);
            Ok(self.servers.clone())
        }

        async fn routes(&self, server: &str) -> AdminResult<Vec<Value>> {
            self.record(Call::Routes(server.to_string()));
            Ok(self.routes_of(server))
        }

        async fn append_route(&self, server: &str, route: &Route) -> AdminResult<()> {
            self.record(Call::Append(server.to_string()));
            self.write_guard()?;
            self.seed(server, serde_json::to_value(route).unwrap());
            Ok(())
        }

        async fn replace_route(&self, server: &str, index: usize, route: &Route) -> AdminResult<()> {
            self.record(Call::Replace(server.to_string(), index));
            self.write_guard()?;
            self.routes.lock().unwrap().get_mut(server).unwrap()[index] = serde_json::to_value(route).unwrap();
            Ok(())
        }

        async fn delete_route(&self, server: &str, index: usize) -> AdminResult<()> {
            self.record(Call::Delete(server.to_string(), index));
            self.write_guard()?;
            let mut routes = self.routes.lock().unwrap();
            let list = routes.get_mut(server).unwrap();
            if index < list.len() {
                list.remove(index);
            }
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct FakeProcess {
        stops: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl ProxyProcess for FakeProcess {
        async fn stop(&self) -> Result<(), ProcessError> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ProcessError::Spawn {
                    command: "caddy stop".into(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
                });
            }
            Ok(())
        }
    }

    fn reconciler(
        fake: FakeControlPlane,
        process: FakeProcess,
        dir: &tempfile::TempDir,
    ) -> Reconciler<FakeControlPlane, FakeProcess> {
        Reconciler::new(fake, process, dir.path().join("state")).with_lock_options(LockOptions {
            timeout: Duration::from_millis(300),
            poll_interval: Duration::from_millis(20),
            stale_after: Duration::from_secs(30),
        })
    }

    fn default_dial(route: &Value) -> Value {
        let branches = route["handle"][0]["routes"].as_array().unwrap();
        branches.last().unwrap()["handle"][1]["upstreams"][0]["dial"].clone()
    }

    #[tokio::test]
    async fn test_add_then_readd_replaces_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let r = reconciler(FakeControlPlane::with_server("srv0", &[":80"]), FakeProcess::default(), &dir);

        let first = r.upsert(&UpsertRequest::new("x.localhost", "3002")).await.unwrap();
        assert_eq!(first.action, UpsertAction::Created);
        assert_eq!(first.server, "srv0");
        let routes = r.control_plane().routes_of("srv0");
        assert_eq!(routes.len(), 1);
        assert_eq!(default_dial(&routes[0]), json!("127.0.0.1:3002"));

        let entry = r.list().unwrap().get("x.localhost").cloned().unwrap();
        assert_eq!(entry.backend, "3002");
        assert_eq!(entry.frontend, None);
        assert_eq!(entry.server, "srv0");

        let second = r.upsert(&UpsertRequest::new("x.localhost", "4000")).await.unwrap();
        assert_eq!(second.action, UpsertAction::Updated { index: 0 });
        let routes = r.control_plane().routes_of("srv0");
        assert_eq!(routes.len(), 1);
        assert_eq!(default_dial(&routes[0]), json!("127.0.0.1:4000"));
        assert_eq!(r.list().unwrap().get("x.localhost").unwrap().backend, "4000");
        assert_eq!(r.list().unwrap().len(), 1);

        // The second run used the recorded server instead of auto-detecting.
        let calls = r.control_plane().calls();
        assert_eq!(calls.iter().filter(|c| **c == Call::Servers).count(), 1);
        assert_eq!(calls.last(), Some(&Call::Replace("srv0".into(), 0)));
    }

    #[tokio::test]
    async fn test_identical_upserts_are_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let r = reconciler(FakeControlPlane::with_server("srv0", &[":80"]), FakeProcess::default(), &dir);
        let request = UpsertRequest::new("x.localhost", "3002").frontend("3001");

        r.upsert(&request).await.unwrap();
        let after_first = r.control_plane().routes_of("srv0");
        r.upsert(&request).await.unwrap();
        assert_eq!(r.control_plane().routes_of("srv0"), after_first);
        assert_eq!(r.list().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_foreign_routes_are_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let fake = FakeControlPlane::with_server("srv0", &[":80"]);
        let foreign_a = json!({"match": [{"host": ["a.localhost"]}], "handle": [{"handler": "file_server"}]});
        let catch_all = json!({"handle": [{"handler": "static_response", "body": "hi"}]});
        let stale_x = json!({"match": [{"host": ["x.localhost"]}], "handle": []});
        fake.seed("srv0", foreign_a.clone());
        fake.seed("srv0", stale_x);
        fake.seed("srv0", catch_all.clone());
        let r = reconciler(fake, FakeProcess::default(), &dir);

        let outcome = r.upsert(&UpsertRequest::new("x.localhost", "3002")).await.unwrap();
        assert_eq!(outcome.action, UpsertAction::Updated { index: 1 });

        let routes = r.control_plane().routes_of("srv0");
        assert_eq!(routes[0], foreign_a);
        assert_eq!(routes[2], catch_all);
        let built: Route = serde_json::from_value(routes[1].clone()).unwrap();
        assert!(matches!(built.handle.as_slice(), [Handler::Subroute { .. }]));
    }

    #[tokio::test]
    async fn test_server_resolution_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let mut fake = FakeControlPlane::with_server("admin", &[":2020"]);
        fake.add_server("web", &["0.0.0.0:80"]);
        fake.add_server("zeta", &[":443"]);
        let r = reconciler(fake, FakeProcess::default(), &dir);

        // Auto-detect prefers the port-80 server.
        let auto = r.upsert(&UpsertRequest::new("a.localhost", "3000")).await.unwrap();
        assert_eq!(auto.server, "web");

        // Explicit beats auto-detect.
        let explicit = r
            .upsert(&UpsertRequest::new("b.localhost", "3000").server("zeta"))
            .await
            .unwrap();
        assert_eq!(explicit.server, "zeta");

        // Recorded beats auto-detect.
        let again = r.upsert(&UpsertRequest::new("b.localhost", "3001")).await.unwrap();
        assert_eq!(again.server, "zeta");
        assert_eq!(again.action, UpsertAction::Updated { index: 0 });
    }

    #[test]
    fn test_pick_default_server_without_port_80() {
        let mut servers = BTreeMap::new();
        servers.insert("b".to_string(), HttpServer { listen: vec![":8080".into()] });
        servers.insert("a".to_string(), HttpServer { listen: vec![":443".into()] });
        assert_eq!(pick_default_server(&servers), Some("a".to_string()));
        assert_eq!(pick_default_server(&BTreeMap::new()), None);
    }

    #[tokio::test]
    async fn test_no_servers_configured() {
        let dir = tempfile::tempdir().unwrap();
        let r = reconciler(FakeControlPlane::default(), FakeProcess::default(), &dir);

        let err = r.upsert(&UpsertRequest::new("x.localhost", "3002")).await.unwrap_err();
        assert!(matches!(err, ReconcileError::NoServersConfigured));
        assert!(r.list().unwrap().is_empty());
        assert!(!dir.path().join("state").join("registry.lock").exists());
    }

    #[tokio::test]
    async fn test_invalid_input_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let r = reconciler(FakeControlPlane::with_server("srv0", &[":80"]), FakeProcess::default(), &dir);
        let request = UpsertRequest {
            host: "x.localhost".into(),
            frontend: Some("3001".into()),
            ..Default::default()
        };

        let err = r.upsert(&request).await.unwrap_err();
        assert!(matches!(err, ReconcileError::InvalidInput(_)));
        assert!(r.control_plane().calls().is_empty());
        assert!(!dir.path().join("state").exists());
    }

    #[tokio::test]
    async fn test_failed_remote_write_leaves_registry_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let mut fake = FakeControlPlane::with_server("srv0", &[":80"]);
        fake.fail_writes = true;
        let r = reconciler(fake, FakeProcess::default(), &dir);

        let err = r.upsert(&UpsertRequest::new("x.localhost", "3002")).await.unwrap_err();
        assert!(matches!(err, ReconcileError::ControlPlane(AdminError::Status { status_code: 500, .. })));
        assert!(r.list().unwrap().is_empty());
        assert!(!dir.path().join("state").join("registry.lock").exists());
    }

    #[tokio::test]
    async fn test_lock_timeout_when_held() {
        let dir = tempfile::tempdir().unwrap();
        let r = reconciler(FakeControlPlane::with_server("srv0", &[":80"]), FakeProcess::default(), &dir);
        registry::ensure_state_dir(r.state_dir()).unwrap();
        let _held = StateLock::acquire(r.state_dir(), LockOptions::default()).await.unwrap();

        let err = r.upsert(&UpsertRequest::new("x.localhost", "3002")).await.unwrap_err();
        assert!(err.is_lock_timeout());
        assert!(r.control_plane().calls().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_registry_aborts_before_remote_calls() {
        let dir = tempfile::tempdir().unwrap();
        let r = reconciler(FakeControlPlane::with_server("srv0", &[":80"]), FakeProcess::default(), &dir);
        registry::ensure_state_dir(r.state_dir()).unwrap();
        std::fs::write(registry::registry_path(r.state_dir()), "[oops").unwrap();

        let err = r.upsert(&UpsertRequest::new("x.localhost", "3002")).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Registry(_)));
        assert!(r.control_plane().calls().is_empty());
    }

    #[tokio::test]
    async fn test_remove_when_absent_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let process = FakeProcess::default();
        let r = reconciler(FakeControlPlane::with_server("srv0", &[":80"]), process.clone(), &dir)
            .with_stop_when_empty(false);

        let outcome = r.remove(&RemoveRequest::new("ghost.localhost")).await.unwrap();
        assert_eq!(outcome.removed_index, None);
        assert!(!outcome.had_entry);
        assert_eq!(outcome.proxy, ProxyShutdown::Disabled);
        assert_eq!(process.stops.load(Ordering::SeqCst), 0);
        assert!(!r.control_plane().calls().iter().any(|c| matches!(c, Call::Delete(..))));
    }

    #[tokio::test]
    async fn test_remove_deletes_route_and_entry() {
        let dir = tempfile::tempdir().unwrap();
        let process = FakeProcess::default();
        let r = reconciler(FakeControlPlane::with_server("srv0", &[":80"]), process.clone(), &dir);
        r.upsert(&UpsertRequest::new("a.localhost", "3000")).await.unwrap();
        r.upsert(&UpsertRequest::new("b.localhost", "3001")).await.unwrap();

        let outcome = r.remove(&RemoveRequest::new("b.localhost")).await.unwrap();
        assert_eq!(outcome.removed_index, Some(1));
        assert!(outcome.had_entry);
        assert_eq!(outcome.proxy, ProxyShutdown::NotNeeded);
        assert_eq!(r.control_plane().routes_of("srv0").len(), 1);
        assert!(r.list().unwrap().get("b.localhost").is_none());

        let last = r.remove(&RemoveRequest::new("a.localhost")).await.unwrap();
        assert_eq!(last.removed_index, Some(0));
        assert_eq!(last.proxy, ProxyShutdown::Stopped);
        assert_eq!(process.stops.load(Ordering::SeqCst), 1);
        assert!(r.list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_repairs_divergence() {
        let dir = tempfile::tempdir().unwrap();
        let process = FakeProcess { fail: true, ..Default::default() };
        let r = reconciler(FakeControlPlane::with_server("srv0", &[":80"]), process.clone(), &dir);

        // Registry believes the host exists, but the control plane restarted without it.
        registry::ensure_state_dir(r.state_dir()).unwrap();
        let mut stale = Registry::default();
        stale.upsert(RegistryEntry::new("x.localhost", "srv0", None, "3002"));
        registry::save(r.state_dir(), &stale).unwrap();

        let outcome = r.remove(&RemoveRequest::new("x.localhost")).await.unwrap();
        assert_eq!(outcome.removed_index, None);
        assert!(outcome.had_entry);
        assert!(matches!(outcome.proxy, ProxyShutdown::Failed(ref m) if m.contains("caddy stop")));
        assert!(r.list().unwrap().is_empty());
        // Recorded server was used; no auto-detection.
        assert!(!r.control_plane().calls().contains(&Call::Servers));
    }

    #[tokio::test]
    async fn test_remove_requires_host() {
        let dir = tempfile::tempdir().unwrap();
        let r = reconciler(FakeControlPlane::with_server("srv0", &[":80"]), FakeProcess::default(), &dir);
        let err = r.remove(&RemoveRequest::new("")).await.unwrap_err();
        assert!(matches!(err, ReconcileError::InvalidInput(_)));
    }
}
