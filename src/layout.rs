//! Composition core
//!
//! A [`Layout`] owns one [`Registration`] per configured podlet and drives
//! each through its lifecycle:
//!
//! - **Uninitialized**: the first page request fetches the manifest.
//! - **Active**: manifest present, proxy routes mounted. Content failures
//!   serve fallback content but never demote the registration.
//! - **Degraded**: every fetch so far failed. Page requests render an empty
//!   fragment and retry the fetch; proxy requests find no routes.
//!
//! There is no background refresh. The only retry trigger is an incoming
//! page request.

use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::config::Config;
use crate::observability::Metrics;
use crate::podlet::http::{HttpConfig, HttpError, PodletClients};
use crate::podlet::{
    Fragment, FragmentClient, Manifest, ManifestFetcher, PodiumContext, PodletError,
    ProxyRequest, ProxyResponse, ProxyRouter, Registration, Served,
};
use crate::template::{PageContext, PageTemplate, WrapTemplate};

/// Inbound page request, as seen by the layout
#[derive(Debug, Clone, Default)]
pub struct PageRequest {
    /// Scheme and host, e.g. `http://localhost:7000`
    pub origin: String,
    pub pathname: String,
    pub query: Option<String>,
}

pub struct Layout {
    name: String,
    title: String,
    registrations: Vec<Arc<Registration>>,
    index: HashMap<String, usize>,
    fetcher: ManifestFetcher,
    fragments: FragmentClient,
    proxy: ProxyRouter,
    template: Arc<dyn PageTemplate>,
    metrics: Arc<Metrics>,
}

impl Layout {
    /// Build a layout from configuration with the configured wrap template
    pub fn from_config(config: &Config) -> Result<Self, HttpError> {
        let template = Arc::new(WrapTemplate::from_config(&config.layout.template));
        Self::new(config, template)
    }

    /// Build a layout with a custom page template. Registrations are
    /// created here, before any request is served.
    pub fn new(config: &Config, template: Arc<dyn PageTemplate>) -> Result<Self, HttpError> {
        let clients = PodletClients::new(&HttpConfig::default())?;

        let registrations: Vec<Arc<Registration>> = config
            .podlets
            .iter()
            .cloned()
            .map(|podlet| Arc::new(Registration::new(podlet)))
            .collect();
        let index = registrations
            .iter()
            .enumerate()
            .map(|(i, reg)| (reg.name().to_string(), i))
            .collect();

        info!(
            layout = %config.layout.name,
            podlets = registrations.len(),
            "Layout created"
        );

        Ok(Self {
            name: config.layout.name.clone(),
            title: config.layout.title.clone(),
            registrations,
            index,
            fetcher: ManifestFetcher::new(clients.fetch.clone()),
            fragments: FragmentClient::new(clients.fetch),
            proxy: ProxyRouter::new(clients.proxy, config.proxy.timeout(), config.layout.name.clone()),
            template,
            metrics: Arc::new(Metrics::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Registrations in page order
    pub fn registrations(&self) -> &[Arc<Registration>] {
        &self.registrations
    }

    pub fn registration(&self, podlet: &str) -> Option<&Arc<Registration>> {
        self.index.get(podlet).map(|&i| &self.registrations[i])
    }

    fn context(&self, page: &PageRequest) -> PodiumContext {
        PodiumContext {
            requested_by: self.name.clone(),
            mount_origin: page.origin.clone(),
            mount_pathname: page.pathname.clone(),
            query: page.query.clone(),
        }
    }

    /// Current manifest of `registration`, fetching it first if the
    /// registration needs a refresh.
    ///
    /// Concurrent callers share one in-flight fetch. Without a manifest they
    /// wait on the lock and take the outcome of the fetch that ran meanwhile;
    /// with a stale one they serve it rather than wait.
    pub async fn ensure_manifest(
        &self,
        registration: &Registration,
        context: &PodiumContext,
    ) -> Option<Arc<Manifest>> {
        // Read before the refresh check so a fetch that completes in between
        // is noticed after taking the lock
        let seen = registration.generation();
        if !registration.needs_refresh(Instant::now()) {
            return registration.manifest();
        }

        let current = registration.manifest();
        let _guard = if current.is_some() {
            match registration.refresh_lock().try_lock() {
                Ok(guard) => guard,
                Err(_) => return current,
            }
        } else {
            registration.refresh_lock().lock().await
        };
        if registration.generation() != seen {
            return registration.manifest();
        }

        match self.fetcher.fetch_manifest(registration.config(), context).await {
            Ok(manifest) => {
                let manifest = Arc::new(manifest);
                self.proxy.mount_routes(registration, &manifest);
                registration.publish_manifest(manifest.clone());
                self.metrics.manifest_fetched();

                // Fetch the fallback while the podlet is known to be up
                self.fragments
                    .fallback_content(registration, &manifest, context)
                    .await;

                info!(
                    podlet = registration.name(),
                    version = manifest.version.as_deref().unwrap_or("-"),
                    "Podlet active"
                );
                Some(manifest)
            }
            Err(err) => {
                self.metrics.manifest_failed();
                registration.record_failure();
                let current = registration.manifest();
                if current.is_some() {
                    warn!(podlet = registration.name(), error = %err, "Manifest refresh failed, keeping previous manifest");
                } else {
                    self.proxy.unmount_routes(registration);
                    warn!(podlet = registration.name(), error = %err, "Podlet degraded");
                }
                current
            }
        }
    }

    /// Render one podlet. Never fails; a degraded podlet renders empty.
    pub async fn render_podlet(
        &self,
        registration: &Registration,
        context: &PodiumContext,
    ) -> Fragment {
        let fragment = match self.ensure_manifest(registration, context).await {
            Some(manifest) => {
                self.fragments
                    .fetch_content(registration, &manifest, context)
                    .await
            }
            None => Fragment::fallback(registration.name(), String::new()),
        };

        match fragment.served {
            Served::Live => self.metrics.content_live(),
            Served::Fallback => self.metrics.content_fallback(),
        }
        fragment
    }

    /// Render all podlets concurrently and wrap them in the page template
    pub async fn render_page(&self, page: &PageRequest) -> String {
        let context = self.context(page);
        let fragments = join_all(
            self.registrations
                .iter()
                .map(|reg| self.render_podlet(reg, &context)),
        )
        .await;

        self.metrics.page_rendered();
        self.template.render(&PageContext {
            title: &self.title,
            fragments: &fragments,
        })
    }

    /// Forward a resource request to the podlet named `podlet`.
    ///
    /// Proxy requests never fetch manifests; routes exist only once a page
    /// request has activated the podlet.
    pub async fn proxy(
        &self,
        podlet: &str,
        request: ProxyRequest,
    ) -> Result<ProxyResponse, PodletError> {
        let registration = self
            .registration(podlet)
            .ok_or_else(|| PodletError::RouteNotFound {
                podlet: podlet.to_string(),
                resource: request.resource.clone(),
            })?;

        let result = self.proxy.forward(registration, request).await;
        match &result {
            Ok(_) => self.metrics.proxy_forwarded(),
            Err(PodletError::ProxyUpstreamUnavailable { .. } | PodletError::ProxyUpstreamTimeout { .. }) => {
                self.metrics.proxy_failed()
            }
            Err(_) => {}
        }
        result
    }
}
