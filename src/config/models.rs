use crate::humanize::ByteSize;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub layout: LayoutConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
    /// Podlets in the order they appear on the page
    #[serde(default)]
    pub podlets: Vec<PodletConfig>,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 7000))
}

/// Layout (page) configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LayoutConfig {
    /// Sent to podlets as `podium-requested-by`
    #[serde(default = "default_layout_name")]
    pub name: String,
    /// Path the page is served on
    #[serde(default = "default_pathname")]
    pub pathname: String,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default)]
    pub template: TemplateConfig,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            name: default_layout_name(),
            pathname: default_pathname(),
            title: default_title(),
            template: TemplateConfig::default(),
        }
    }
}

fn default_layout_name() -> String {
    "layout".to_string()
}

fn default_pathname() -> String {
    "/".to_string()
}

fn default_title() -> String {
    "Podium layout".to_string()
}

/// Document wrapping around the concatenated podlet fragments.
///
/// `{title}` in `open` or `close` is replaced with the layout title.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TemplateConfig {
    #[serde(default = "default_template_open")]
    pub open: String,
    #[serde(default = "default_template_close")]
    pub close: String,
    #[serde(default)]
    pub separator: String,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            open: default_template_open(),
            close: default_template_close(),
            separator: String::new(),
        }
    }
}

fn default_template_open() -> String {
    "<!doctype html><html><head><meta charset=\"utf-8\"><title>{title}</title></head><body>"
        .to_string()
}

fn default_template_close() -> String {
    "</body></html>".to_string()
}

/// Resource proxy configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProxyConfig {
    #[serde(default = "default_proxy_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: ByteSize,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_proxy_timeout_ms(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl ProxyConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_proxy_timeout_ms() -> u64 {
    5_000
}

fn default_max_body_bytes() -> ByteSize {
    ByteSize::mib(5)
}

/// One podlet mounted on the layout
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PodletConfig {
    /// Must equal the `name` in the podlet's manifest
    pub name: String,
    /// Base URL the manifest path is resolved against
    pub base_url: String,
    #[serde(default = "default_manifest_path")]
    pub manifest_path: String,
    /// Timeout for manifest, content and fallback fetches
    #[serde(default = "default_podlet_timeout_ms")]
    pub timeout_ms: u64,
    /// Refetch the manifest once it is older than this. Unset means the
    /// manifest is only fetched while absent or after invalidation.
    #[serde(default)]
    pub manifest_ttl_ms: Option<u64>,
    /// Minimum delay between manifest attempts while degraded
    #[serde(default)]
    pub manifest_retry_backoff_ms: u64,
    #[serde(default = "default_max_manifest_bytes")]
    pub max_manifest_bytes: ByteSize,
}

impl PodletConfig {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            manifest_path: default_manifest_path(),
            timeout_ms: default_podlet_timeout_ms(),
            manifest_ttl_ms: None,
            manifest_retry_backoff_ms: 0,
            max_manifest_bytes: default_max_manifest_bytes(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn manifest_ttl(&self) -> Option<Duration> {
        self.manifest_ttl_ms.map(Duration::from_millis)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.manifest_retry_backoff_ms)
    }

    /// `base_url` joined with `manifest_path`
    pub fn manifest_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.manifest_path.trim_start_matches('/')
        )
    }
}

fn default_manifest_path() -> String {
    "/manifest.json".to_string()
}

fn default_podlet_timeout_ms() -> u64 {
    1_000
}

fn default_max_manifest_bytes() -> ByteSize {
    ByteSize::kib(64)
}
