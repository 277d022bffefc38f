use bytes::BytesMut;
use reqwest::header::{ACCEPT, HeaderValue};
use reqwest::{Client, Url};
use tracing::debug;

use super::context::PodiumContext;
use super::error::{PodletError, Result};
use super::manifest::Manifest;
use crate::config::PodletConfig;

/// Retrieves podlet manifests.
///
/// One GET per call, bounded by the podlet timeout. Retrying is the
/// caller's decision.
#[derive(Debug, Clone)]
pub struct ManifestFetcher {
    client: Client,
}

impl ManifestFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn fetch_manifest(
        &self,
        podlet: &PodletConfig,
        context: &PodiumContext,
    ) -> Result<Manifest> {
        let unavailable = |reason: String| PodletError::ManifestUnavailable {
            podlet: podlet.name.clone(),
            reason,
        };

        let url = Url::parse(&podlet.manifest_url())
            .map_err(|e| unavailable(format!("invalid manifest URL: {e}")))?;

        debug!(podlet = %podlet.name, %url, "Fetching manifest");

        let mut response = self
            .client
            .get(url.clone())
            .timeout(podlet.timeout())
            .headers(context.headers(&podlet.name))
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    unavailable("timed out".to_string())
                } else {
                    unavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(unavailable(format!("HTTP {}", status.as_u16())));
        }

        let limit = podlet.max_manifest_bytes.as_usize();
        let too_large = || unavailable(format!("manifest exceeds {limit} bytes"));
        if response
            .content_length()
            .is_some_and(|len| len > podlet.max_manifest_bytes.as_u64())
        {
            return Err(too_large());
        }

        // Chunked bodies carry no length up front; stop reading at the limit
        let mut body = BytesMut::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| unavailable(format!("failed to read body: {e}")))?
        {
            if body.len() + chunk.len() > limit {
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }

        let manifest = Manifest::parse(&body, &url).map_err(|e| unavailable(e.to_string()))?;

        if manifest.name != podlet.name {
            return Err(unavailable(format!(
                "manifest declares name '{}'",
                manifest.name
            )));
        }

        debug!(
            podlet = %podlet.name,
            version = manifest.version.as_deref().unwrap_or("-"),
            resources = manifest.resources.len(),
            "Manifest fetched"
        );

        Ok(manifest)
    }
}
