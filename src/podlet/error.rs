use reqwest::Method;
use thiserror::Error;

/// Failures of the podlet integration core.
///
/// None of these is fatal: manifest and content failures are recovered by
/// serving fallback content, proxy failures become gateway responses.
#[derive(Debug, Error)]
pub enum PodletError {
    #[error("manifest for podlet '{podlet}' unavailable: {reason}")]
    ManifestUnavailable { podlet: String, reason: String },

    #[error("content for podlet '{podlet}' failed: {reason}")]
    ContentFetchFailed { podlet: String, reason: String },

    #[error("upstream for resource '{podlet}/{resource}' unavailable: {reason}")]
    ProxyUpstreamUnavailable {
        podlet: String,
        resource: String,
        reason: String,
    },

    #[error("upstream for resource '{podlet}/{resource}' timed out")]
    ProxyUpstreamTimeout { podlet: String, resource: String },

    #[error("no proxy route for '{podlet}/{resource}'")]
    RouteNotFound { podlet: String, resource: String },

    #[error("method {method} not allowed for '{podlet}/{resource}'")]
    MethodNotAllowed {
        podlet: String,
        resource: String,
        method: Method,
        allowed: Vec<Method>,
    },

    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

pub type Result<T> = std::result::Result<T, PodletError>;
