use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use super::public_pathname;

const REQUESTED_BY: HeaderName = HeaderName::from_static("podium-requested-by");
const MOUNT_ORIGIN: HeaderName = HeaderName::from_static("podium-mount-origin");
const MOUNT_PATHNAME: HeaderName = HeaderName::from_static("podium-mount-pathname");
const PUBLIC_PATHNAME: HeaderName = HeaderName::from_static("podium-public-pathname");

/// Request context the layout shares with podlets on every outbound call
#[derive(Debug, Clone, Default)]
pub struct PodiumContext {
    /// Layout name
    pub requested_by: String,
    /// Scheme and host the page was requested on
    pub mount_origin: String,
    /// Path the page was requested on
    pub mount_pathname: String,
    /// Raw query string of the page request, forwarded to content endpoints
    pub query: Option<String>,
}

impl PodiumContext {
    pub fn new(requested_by: impl Into<String>) -> Self {
        Self {
            requested_by: requested_by.into(),
            ..Self::default()
        }
    }

    /// Context headers for a call to `podlet`. Values that are not valid
    /// header values are skipped.
    pub fn headers(&self, podlet: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let pairs = [
            (REQUESTED_BY, self.requested_by.clone()),
            (MOUNT_ORIGIN, self.mount_origin.clone()),
            (MOUNT_PATHNAME, self.mount_pathname.clone()),
            (PUBLIC_PATHNAME, public_pathname(podlet)),
        ];

        for (name, value) in pairs {
            if value.is_empty() {
                continue;
            }
            if let Ok(value) = HeaderValue::from_str(&value) {
                headers.insert(name, value);
            }
        }
        headers
    }
}
