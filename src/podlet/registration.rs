use arc_swap::{ArcSwap, ArcSwapOption};
use reqwest::Url;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

use super::manifest::Manifest;
use super::proxy::RouteTable;
use crate::config::PodletConfig;

/// Lifecycle state of a mounted podlet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PodletState {
    /// No manifest fetch attempted yet
    Uninitialized,
    /// Manifest present, proxy routes mounted
    Active,
    /// Every manifest fetch so far has failed
    Degraded,
}

#[derive(Debug, Clone, Default)]
struct ManifestSnapshot {
    manifest: Option<Arc<Manifest>>,
    fetched_at: Option<Instant>,
    last_failure: Option<Instant>,
    attempted: bool,
    /// Set when the podlet signals a new version; forces a refetch
    stale: bool,
    /// Bumped on every fetch outcome
    generation: u64,
}

/// Fallback body tied to the endpoint it came from
#[derive(Debug)]
pub struct CachedFallback {
    pub endpoint: Url,
    pub version: Option<String>,
    /// `None` records a failed fetch; it is retried once a new manifest is
    /// published
    pub content: Option<String>,
}

/// Shared state of one podlet mounted on the layout.
///
/// Manifest, fallback cache and route table are immutable snapshots
/// published by pointer swap; readers never lock.
#[derive(Debug)]
pub struct Registration {
    config: PodletConfig,
    snapshot: ArcSwap<ManifestSnapshot>,
    fallback: ArcSwapOption<CachedFallback>,
    routes: ArcSwap<RouteTable>,
    refresh: Mutex<()>,
}

impl Registration {
    pub fn new(config: PodletConfig) -> Self {
        Self {
            config,
            snapshot: ArcSwap::from_pointee(ManifestSnapshot::default()),
            fallback: ArcSwapOption::empty(),
            routes: ArcSwap::from_pointee(RouteTable::default()),
            refresh: Mutex::new(()),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &PodletConfig {
        &self.config
    }

    pub fn state(&self) -> PodletState {
        let snapshot = self.snapshot.load();
        match (&snapshot.manifest, snapshot.attempted) {
            (Some(_), _) => PodletState::Active,
            (None, true) => PodletState::Degraded,
            (None, false) => PodletState::Uninitialized,
        }
    }

    pub fn manifest(&self) -> Option<Arc<Manifest>> {
        self.snapshot.load().manifest.clone()
    }

    pub(crate) fn generation(&self) -> u64 {
        self.snapshot.load().generation
    }

    /// Serializes manifest refreshes of this registration
    pub(crate) fn refresh_lock(&self) -> &Mutex<()> {
        &self.refresh
    }

    /// Whether a page request arriving at `now` should fetch the manifest
    pub fn needs_refresh(&self, now: Instant) -> bool {
        let snapshot = self.snapshot.load();

        let due = match snapshot.manifest {
            None => true,
            Some(_) => {
                snapshot.stale
                    || self
                        .config
                        .manifest_ttl()
                        .zip(snapshot.fetched_at)
                        .is_some_and(|(ttl, at)| now.duration_since(at) >= ttl)
            }
        };

        due && snapshot
            .last_failure
            .is_none_or(|at| now.duration_since(at) >= self.config.retry_backoff())
    }

    /// Replace the manifest. A cached fallback from a different endpoint or
    /// version is dropped.
    pub(crate) fn publish_manifest(&self, manifest: Arc<Manifest>) {
        let keep_fallback = self.fallback.load_full().is_some_and(|cached| {
            cached.content.is_some()
                && manifest.fallback_endpoint.as_ref() == Some(&cached.endpoint)
                && manifest.version == cached.version
        });
        if !keep_fallback {
            self.fallback.store(None);
        }

        let now = Instant::now();
        self.snapshot.rcu(|current| ManifestSnapshot {
            manifest: Some(manifest.clone()),
            fetched_at: Some(now),
            last_failure: None,
            attempted: true,
            stale: false,
            generation: current.generation + 1,
        });
    }

    /// Record a failed fetch. An existing manifest stays in place.
    pub(crate) fn record_failure(&self) {
        let now = Instant::now();
        self.snapshot.rcu(|current| ManifestSnapshot {
            last_failure: Some(now),
            attempted: true,
            generation: current.generation + 1,
            ..(**current).clone()
        });
    }

    /// Force a manifest refetch on the next page request
    pub fn invalidate_manifest(&self) {
        self.snapshot.rcu(|current| ManifestSnapshot {
            stale: true,
            ..(**current).clone()
        });
    }

    /// Cached fallback outcome for `manifest`. Entries from another endpoint
    /// or version are ignored.
    pub fn cached_fallback(&self, manifest: &Manifest) -> Option<Arc<CachedFallback>> {
        let endpoint = manifest.fallback_endpoint.as_ref()?;
        self.fallback
            .load_full()
            .filter(|cached| &cached.endpoint == endpoint && cached.version == manifest.version)
    }

    pub(crate) fn store_fallback(&self, fallback: CachedFallback) {
        self.fallback.store(Some(Arc::new(fallback)));
    }

    pub fn invalidate_fallback(&self) {
        self.fallback.store(None);
    }

    /// Current proxy route table; one consistent snapshot per call
    pub fn routes(&self) -> Arc<RouteTable> {
        self.routes.load_full()
    }

    /// Publish a fully built table, returning the one it replaced
    pub(crate) fn swap_routes(&self, table: RouteTable) -> Arc<RouteTable> {
        self.routes.swap(Arc::new(table))
    }
}
