use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use reqwest::{Client, Url};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::context::PodiumContext;
use super::error::PodletError;
use super::manifest::Manifest;
use super::registration::{CachedFallback, Registration};

const PODLET_VERSION: &str = "podlet-version";

/// Where a fragment's content came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Served {
    Live,
    Fallback,
}

/// Rendered output of one podlet for one page request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub podlet: String,
    pub content: String,
    pub served: Served,
}

impl Fragment {
    pub fn live(podlet: impl Into<String>, content: String) -> Self {
        Self {
            podlet: podlet.into(),
            content,
            served: Served::Live,
        }
    }

    pub fn fallback(podlet: impl Into<String>, content: String) -> Self {
        Self {
            podlet: podlet.into(),
            content,
            served: Served::Fallback,
        }
    }
}

/// Fetches podlet content, degrading to fallback content on any failure
#[derive(Debug, Clone)]
pub struct FragmentClient {
    client: Client,
}

impl FragmentClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Never fails: the worst case is an empty fallback fragment.
    pub async fn fetch_content(
        &self,
        registration: &Registration,
        manifest: &Manifest,
        context: &PodiumContext,
    ) -> Fragment {
        let podlet = registration.name();
        let timeout = registration.config().timeout();

        let mut url = manifest.content_endpoint.clone();
        if let Some(query) = context.query.as_deref().filter(|q| !q.is_empty()) {
            url.set_query(Some(query));
        }

        match self.get_text(&url, timeout, context.headers(podlet)).await {
            Ok((content, headers)) => {
                check_version(registration, manifest, &headers);
                Fragment::live(podlet, content)
            }
            Err(reason) => {
                let err = PodletError::ContentFetchFailed {
                    podlet: podlet.to_string(),
                    reason,
                };
                warn!(podlet, error = %err, "Serving fallback content");
                let content = self
                    .fallback_content(registration, manifest, context)
                    .await
                    .unwrap_or_default();
                Fragment::fallback(podlet, content)
            }
        }
    }

    /// Cached fallback for `manifest`, fetching it on first use.
    ///
    /// `None` when the manifest declares no fallback or the fetch failed. A
    /// failed fetch is cached too, so a podlet that is down is not asked
    /// again until a new manifest is published.
    pub async fn fallback_content(
        &self,
        registration: &Registration,
        manifest: &Manifest,
        context: &PodiumContext,
    ) -> Option<String> {
        if let Some(cached) = registration.cached_fallback(manifest) {
            return cached.content.clone();
        }

        let endpoint = manifest.fallback_endpoint.as_ref()?;
        let podlet = registration.name();

        match self
            .get_text(endpoint, registration.config().timeout(), context.headers(podlet))
            .await
        {
            Ok((content, _)) => {
                debug!(podlet, url = %endpoint, bytes = content.len(), "Fallback cached");
                registration.store_fallback(CachedFallback {
                    endpoint: endpoint.clone(),
                    version: manifest.version.clone(),
                    content: Some(content.clone()),
                });
                Some(content)
            }
            Err(reason) => {
                warn!(podlet, url = %endpoint, error = %reason, "Fallback fetch failed");
                registration.store_fallback(CachedFallback {
                    endpoint: endpoint.clone(),
                    version: manifest.version.clone(),
                    content: None,
                });
                None
            }
        }
    }

    async fn get_text(
        &self,
        url: &Url,
        timeout: Duration,
        headers: HeaderMap,
    ) -> Result<(String, HeaderMap), String> {
        let response = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .headers(headers)
            .header(ACCEPT, HeaderValue::from_static("text/html"))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    "timed out".to_string()
                } else {
                    e.to_string()
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {}", status.as_u16()));
        }

        let headers = response.headers().clone();
        let content = response
            .text()
            .await
            .map_err(|e| format!("failed to read body: {e}"))?;

        Ok((content, headers))
    }
}

/// A podlet announcing a different version than its manifest has been
/// redeployed; refetch the manifest on the next request. Unversioned
/// manifests are never compared.
fn check_version(registration: &Registration, manifest: &Manifest, headers: &HeaderMap) {
    let Some(expected) = manifest.version.as_deref() else {
        return;
    };
    let Some(announced) = headers.get(PODLET_VERSION).and_then(|v| v.to_str().ok()) else {
        return;
    };

    if expected != announced {
        debug!(
            podlet = registration.name(),
            manifest_version = expected,
            announced,
            "Podlet version changed, manifest marked stale"
        );
        registration.invalidate_manifest();
    }
}
