//! Outbound HTTP clients and header hygiene for podlet traffic

use reqwest::header::{self, HeaderMap, HeaderName};
use reqwest::{Client, redirect};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

/// HTTP client configuration shared by all podlets.
///
/// Per-request timeouts come from the podlet and proxy configuration; this
/// only bounds connection setup.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub connect_timeout: Duration,
    pub pool_idle_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(2),
            pool_idle_timeout: Duration::from_secs(30),
            user_agent: concat!("podium-layout/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// The two pooled clients the layout uses.
///
/// Manifest/content/fallback fetches follow a few redirects; proxied calls
/// never do, so the client sees the podlet's redirect as-is.
#[derive(Debug, Clone)]
pub struct PodletClients {
    pub fetch: Client,
    pub proxy: Client,
}

impl PodletClients {
    pub fn new(config: &HttpConfig) -> Result<Self, HttpError> {
        let fetch = Client::builder()
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(config.pool_idle_timeout)
            .user_agent(&config.user_agent)
            .redirect(redirect::Policy::limited(5))
            .build()?;

        let proxy = Client::builder()
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(config.pool_idle_timeout)
            .redirect(redirect::Policy::none())
            .build()?;

        Ok(Self { fetch, proxy })
    }
}

/// Connection-scoped headers that must not cross a proxy hop
pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "proxy-connection"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
    )
}

/// Names listed in the `Connection` header are hop-by-hop as well
fn connection_listed(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect()
}

fn strip(headers: &HeaderMap, extra: &[HeaderName]) -> HeaderMap {
    let listed = connection_listed(headers);
    let mut out = HeaderMap::with_capacity(headers.len());

    for (name, value) in headers {
        if is_hop_by_hop(name)
            || extra.contains(name)
            || listed.iter().any(|l| l == name.as_str())
        {
            continue;
        }
        out.append(name.clone(), value.clone());
    }
    out
}

/// Headers of an inbound client request, ready to send to a resource
/// target. `Host` would point the target at the layout, and the body length
/// is recomputed by the client.
pub fn forward_request_headers(inbound: &HeaderMap) -> HeaderMap {
    strip(inbound, &[header::HOST, header::CONTENT_LENGTH])
}

/// Headers of a resource target's response, ready to return to the client
pub fn forward_response_headers(upstream: &HeaderMap) -> HeaderMap {
    strip(upstream, &[])
}
