//! In-process counters, reported on the health endpoint

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Metrics {
    pages_rendered: AtomicU64,
    content_live: AtomicU64,
    content_fallback: AtomicU64,
    manifest_fetched: AtomicU64,
    manifest_failed: AtomicU64,
    proxy_forwarded: AtomicU64,
    proxy_failed: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn incr(counter: &AtomicU64, name: &'static str) {
        counter.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(counter = name, "Metric incremented");
    }

    pub fn page_rendered(&self) {
        Self::incr(&self.pages_rendered, "pages_rendered");
    }

    pub fn content_live(&self) {
        Self::incr(&self.content_live, "content_live");
    }

    pub fn content_fallback(&self) {
        Self::incr(&self.content_fallback, "content_fallback");
    }

    pub fn manifest_fetched(&self) {
        Self::incr(&self.manifest_fetched, "manifest_fetched");
    }

    pub fn manifest_failed(&self) {
        Self::incr(&self.manifest_failed, "manifest_failed");
    }

    pub fn proxy_forwarded(&self) {
        Self::incr(&self.proxy_forwarded, "proxy_forwarded");
    }

    pub fn proxy_failed(&self) {
        Self::incr(&self.proxy_failed, "proxy_failed");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            pages_rendered: self.pages_rendered.load(Ordering::Relaxed),
            content_live: self.content_live.load(Ordering::Relaxed),
            content_fallback: self.content_fallback.load(Ordering::Relaxed),
            manifest_fetched: self.manifest_fetched.load(Ordering::Relaxed),
            manifest_failed: self.manifest_failed.load(Ordering::Relaxed),
            proxy_forwarded: self.proxy_forwarded.load(Ordering::Relaxed),
            proxy_failed: self.proxy_failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub pages_rendered: u64,
    pub content_live: u64,
    pub content_fallback: u64,
    pub manifest_fetched: u64,
    pub manifest_failed: u64,
    pub proxy_forwarded: u64,
    pub proxy_failed: u64,
}
