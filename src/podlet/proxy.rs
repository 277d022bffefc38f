//! Same-origin proxy for podlet resources
//!
//! Each registration carries a [`RouteTable`] built from its manifest. A
//! new table is built completely before it replaces the old one with a
//! single pointer swap, so a request sees either the old or the new set of
//! routes, never a mix.

use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, StatusCode, Url};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::error::{PodletError, Result};
use super::http::{forward_request_headers, forward_response_headers};
use super::manifest::Manifest;
use super::registration::Registration;
use super::public_pathname;

const REQUESTED_BY: HeaderName = HeaderName::from_static("podium-requested-by");

/// One mounted resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRoute {
    pub podlet: String,
    pub resource: String,
    /// Public path, `/podium-resource/{podlet}/{resource}`
    pub path: String,
    pub target: Url,
    pub methods: Vec<Method>,
}

impl ProxyRoute {
    /// Target URL for a request that matched this route with an optional
    /// trailing path and query string.
    pub fn target_for(&self, rest: Option<&str>, query: Option<&str>) -> Url {
        let mut url = self.target.clone();

        if let Some(rest) = rest.map(|r| r.trim_start_matches('/')).filter(|r| !r.is_empty()) {
            let joined = format!("{}/{}", url.path().trim_end_matches('/'), rest);
            url.set_path(&joined);
        }

        if let Some(query) = query.filter(|q| !q.is_empty()) {
            let merged = match url.query() {
                Some(existing) if !existing.is_empty() => format!("{existing}&{query}"),
                _ => query.to_string(),
            };
            url.set_query(Some(&merged));
        }

        url
    }

    pub fn allows(&self, method: &Method) -> bool {
        self.methods.contains(method)
    }
}

/// Resource routes of one podlet, keyed by resource name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteTable {
    routes: HashMap<String, ProxyRoute>,
}

impl RouteTable {
    pub fn from_manifest(manifest: &Manifest) -> Self {
        let base = public_pathname(&manifest.name);
        let routes = manifest
            .resources
            .iter()
            .map(|resource| {
                let route = ProxyRoute {
                    podlet: manifest.name.clone(),
                    resource: resource.name.clone(),
                    path: format!("{base}/{}", resource.name),
                    target: resource.target_url.clone(),
                    methods: resource.methods.clone(),
                };
                (resource.name.clone(), route)
            })
            .collect();

        Self { routes }
    }

    pub fn get(&self, resource: &str) -> Option<&ProxyRoute> {
        self.routes.get(resource)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Public paths, sorted
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.routes.values().map(|r| r.path.clone()).collect();
        paths.sort();
        paths
    }
}

/// Inbound request for a proxied resource, body fully read
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    pub resource: String,
    /// Path below the resource, without leading slash
    pub rest: Option<String>,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Upstream response, passed through with a streamed body
pub struct ProxyResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: BoxStream<'static, reqwest::Result<Bytes>>,
}

impl fmt::Debug for ProxyResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Installs resource routes and forwards matching requests
#[derive(Debug, Clone)]
pub struct ProxyRouter {
    client: Client,
    timeout: Duration,
    requested_by: String,
}

impl ProxyRouter {
    pub fn new(client: Client, timeout: Duration, requested_by: impl Into<String>) -> Self {
        Self {
            client,
            timeout,
            requested_by: requested_by.into(),
        }
    }

    /// Install the routes `manifest` declares, replacing whatever the
    /// registration had. Idempotent for an unchanged manifest.
    pub fn mount_routes(&self, registration: &Registration, manifest: &Manifest) {
        let table = RouteTable::from_manifest(manifest);
        if *registration.routes() == table {
            return;
        }

        let paths = table.paths();
        let previous = registration.swap_routes(table);

        let retired: Vec<String> = previous
            .paths()
            .into_iter()
            .filter(|p| !paths.contains(p))
            .collect();

        info!(
            podlet = registration.name(),
            mounted = ?paths,
            retired = ?retired,
            "Proxy routes installed"
        );
    }

    /// Drop all routes of a registration
    pub fn unmount_routes(&self, registration: &Registration) {
        let previous = registration.swap_routes(RouteTable::default());
        if !previous.is_empty() {
            info!(podlet = registration.name(), retired = ?previous.paths(), "Proxy routes removed");
        }
    }

    /// Forward `request` to the target of the matching route
    pub async fn forward(
        &self,
        registration: &Registration,
        request: ProxyRequest,
    ) -> Result<ProxyResponse> {
        let podlet = registration.name();
        let routes = registration.routes();

        let route = routes
            .get(&request.resource)
            .ok_or_else(|| PodletError::RouteNotFound {
                podlet: podlet.to_string(),
                resource: request.resource.clone(),
            })?;

        if !route.allows(&request.method) {
            return Err(PodletError::MethodNotAllowed {
                podlet: podlet.to_string(),
                resource: request.resource.clone(),
                method: request.method.clone(),
                allowed: route.methods.clone(),
            });
        }

        let target = route.target_for(request.rest.as_deref(), request.query.as_deref());
        debug!(
            podlet,
            resource = %route.resource,
            method = %request.method,
            %target,
            "Proxying {}",
            route.path
        );

        let mut headers = forward_request_headers(&request.headers);
        if let Ok(value) = HeaderValue::from_str(&self.requested_by) {
            headers.insert(REQUESTED_BY, value);
        }

        let response = self
            .client
            .request(request.method.clone(), target.clone())
            .timeout(self.timeout)
            .headers(headers)
            .body(request.body)
            .send()
            .await
            .map_err(|e| {
                warn!(podlet, resource = %route.resource, %target, error = %e, "Proxy upstream failed");
                if e.is_timeout() {
                    PodletError::ProxyUpstreamTimeout {
                        podlet: podlet.to_string(),
                        resource: route.resource.clone(),
                    }
                } else {
                    PodletError::ProxyUpstreamUnavailable {
                        podlet: podlet.to_string(),
                        resource: route.resource.clone(),
                        reason: e.to_string(),
                    }
                }
            })?;

        Ok(ProxyResponse {
            status: response.status(),
            headers: forward_response_headers(response.headers()),
            body: response.bytes_stream().boxed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::podlet::manifest::Resource;

    fn manifest(resources: &[(&str, &str, Vec<Method>)]) -> Manifest {
        Manifest {
            name: "component".to_string(),
            version: None,
            content_endpoint: Url::parse("http://podlet.local/content").unwrap(),
            fallback_endpoint: None,
            resources: resources
                .iter()
                .map(|(name, target, methods)| Resource {
                    name: name.to_string(),
                    target_url: Url::parse(target).unwrap(),
                    methods: methods.clone(),
                })
                .collect(),
        }
    }

    fn router() -> ProxyRouter {
        ProxyRouter::new(Client::new(), Duration::from_secs(1), "layout")
    }

    #[test]
    fn test_route_table_from_manifest() {
        let table = RouteTable::from_manifest(&manifest(&[
            ("localApi", "http://api.local/echo", vec![Method::GET, Method::POST]),
            ("other", "http://api.local/other", vec![Method::DELETE]),
        ]));

        assert_eq!(table.len(), 2);
        assert_eq!(
            table.paths(),
            vec![
                "/podium-resource/component/localApi".to_string(),
                "/podium-resource/component/other".to_string(),
            ]
        );

        let route = table.get("localApi").unwrap();
        assert!(route.allows(&Method::POST));
        assert!(!route.allows(&Method::PUT));
        assert!(table.get("missing").is_none());
    }

    #[test]
    fn test_target_for_rest_and_query() {
        let table = RouteTable::from_manifest(&manifest(&[(
            "api",
            "http://api.local/v1/items?tenant=a",
            vec![Method::GET],
        )]));
        let route = table.get("api").unwrap();

        assert_eq!(
            route.target_for(None, None).as_str(),
            "http://api.local/v1/items?tenant=a"
        );
        assert_eq!(
            route.target_for(Some("42/tags"), Some("page=2")).as_str(),
            "http://api.local/v1/items/42/tags?tenant=a&page=2"
        );
        assert_eq!(
            route.target_for(Some(""), Some("")).as_str(),
            "http://api.local/v1/items?tenant=a"
        );
    }

    #[test]
    fn test_target_for_root_target() {
        let table = RouteTable::from_manifest(&manifest(&[("api", "http://api.local/", vec![Method::GET])]));
        let route = table.get("api").unwrap();

        assert_eq!(route.target_for(Some("x"), None).as_str(), "http://api.local/x");
    }

    #[test]
    fn test_mount_replaces_routes() {
        let reg = Registration::new(crate::config::PodletConfig::new("component", "http://podlet.local"));
        let router = router();

        router.mount_routes(&reg, &manifest(&[("a", "http://api.local/a", vec![Method::GET])]));
        let first = reg.routes();
        assert!(first.get("a").is_some());

        // unchanged manifest keeps the same table instance
        router.mount_routes(&reg, &manifest(&[("a", "http://api.local/a", vec![Method::GET])]));
        assert!(std::sync::Arc::ptr_eq(&first, &reg.routes()));

        router.mount_routes(&reg, &manifest(&[("b", "http://api.local/b", vec![Method::GET])]));
        let second = reg.routes();
        assert!(second.get("a").is_none());
        assert!(second.get("b").is_some());
        // a reader holding the old snapshot still sees the complete old table
        assert!(first.get("a").is_some());

        router.unmount_routes(&reg);
        assert!(reg.routes().is_empty());
    }

    #[tokio::test]
    async fn test_forward_unknown_resource() {
        let reg = Registration::new(crate::config::PodletConfig::new("component", "http://podlet.local"));
        let request = ProxyRequest {
            method: Method::GET,
            resource: "localApi".to_string(),
            rest: None,
            query: None,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        };

        let result = router().forward(&reg, request).await;
        assert!(matches!(result, Err(PodletError::RouteNotFound { .. })));
    }

    #[tokio::test]
    async fn test_forward_rejects_undeclared_method() {
        let reg = Registration::new(crate::config::PodletConfig::new("component", "http://podlet.local"));
        let router = router();
        router.mount_routes(&reg, &manifest(&[("api", "http://api.local/", vec![Method::GET, Method::POST])]));

        let request = ProxyRequest {
            method: Method::DELETE,
            resource: "api".to_string(),
            rest: None,
            query: None,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        };

        match router.forward(&reg, request).await {
            Err(PodletError::MethodNotAllowed { allowed, .. }) => {
                assert_eq!(allowed, vec![Method::GET, Method::POST]);
            }
            other => panic!("expected MethodNotAllowed, got {other:?}"),
        }
    }
}
