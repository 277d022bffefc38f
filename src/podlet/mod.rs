//! Podlet integration core
//!
//! Everything the layout needs to talk to one remote fragment server:
//!
//! - [`Manifest`] - typed snapshot of a podlet's declared endpoints
//! - [`ManifestFetcher`] - retrieves and validates the manifest
//! - [`FragmentClient`] - fetches rendered content, degrading to fallback
//! - [`ProxyRouter`] - per-podlet route table for declared resources
//! - [`Registration`] - shared, swap-published state of one mounted podlet
//!
//! The [`crate::layout::Layout`] ties these together into the per-request
//! lifecycle.

mod context;
mod error;
mod fetcher;
mod fragment;
pub mod http;
mod manifest;
mod proxy;
mod registration;

pub use context::PodiumContext;
pub use error::{PodletError, Result};
pub use fetcher::ManifestFetcher;
pub use fragment::{Fragment, FragmentClient, Served};
pub use manifest::{Manifest, ManifestError, Resource};
pub use proxy::{ProxyRequest, ProxyResponse, ProxyRoute, ProxyRouter, RouteTable};
pub use registration::{PodletState, Registration};

/// Public path prefix of every proxied resource
pub const PROXY_PREFIX: &str = "/podium-resource";

/// Podlet and resource names end up as path segments, so keep them boring.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// `/podium-resource/{podlet}`
pub fn public_pathname(podlet: &str) -> String {
    format!("{PROXY_PREFIX}/{podlet}")
}
