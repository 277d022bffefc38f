//! Podlet manifest model
//!
//! Wire format served by a podlet:
//!
//! ```json
//! {
//!   "name": "component",
//!   "version": "1.0.0",
//!   "content": "/content",
//!   "fallback": "/fallback",
//!   "proxy": [
//!     { "name": "localApi", "uri": "http://localhost:7101/api", "methods": ["GET", "POST"] }
//!   ]
//! }
//! ```
//!
//! Relative URIs are resolved against the manifest URL. The parsed
//! [`Manifest`] only holds absolute http(s) URLs and is never mutated after
//! construction; a refresh replaces it.

use reqwest::{Method, Url};
use serde::Deserialize;
use std::collections::HashSet;
use thiserror::Error;

use super::is_valid_name;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("malformed manifest JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid name '{0}'")]
    InvalidName(String),
    #[error("duplicate proxy resource '{0}'")]
    DuplicateResource(String),
    #[error("{field} has invalid URI '{value}'")]
    InvalidUri { field: String, value: String },
    #[error("{field} must be http or https, got '{scheme}'")]
    UnsupportedScheme { field: String, scheme: String },
    #[error("resource '{resource}' declares invalid method '{method}'")]
    InvalidMethod { resource: String, method: String },
}

#[derive(Debug, Deserialize)]
struct ManifestDocument {
    name: String,
    #[serde(default)]
    version: Option<String>,
    content: String,
    #[serde(default)]
    fallback: Option<String>,
    #[serde(default)]
    proxy: Vec<ResourceDocument>,
}

#[derive(Debug, Deserialize)]
struct ResourceDocument {
    name: String,
    uri: String,
    #[serde(default)]
    methods: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub name: String,
    pub version: Option<String>,
    pub content_endpoint: Url,
    pub fallback_endpoint: Option<Url>,
    pub resources: Vec<Resource>,
}

/// A proxyable endpoint declared by the podlet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub name: String,
    pub target_url: Url,
    /// Declared methods, deduplicated, in declaration order
    pub methods: Vec<Method>,
}

impl Resource {
    pub fn allows(&self, method: &Method) -> bool {
        self.methods.contains(method)
    }
}

impl Manifest {
    /// Parse and validate a manifest body fetched from `manifest_url`
    pub fn parse(body: &[u8], manifest_url: &Url) -> Result<Self, ManifestError> {
        let doc: ManifestDocument = serde_json::from_slice(body)?;

        if !is_valid_name(&doc.name) {
            return Err(ManifestError::InvalidName(doc.name));
        }

        let content_endpoint = resolve(manifest_url, "content", &doc.content)?;
        let fallback_endpoint = doc
            .fallback
            .as_deref()
            .filter(|uri| !uri.is_empty())
            .map(|uri| resolve(manifest_url, "fallback", uri))
            .transpose()?;

        let mut seen = HashSet::new();
        let mut resources = Vec::with_capacity(doc.proxy.len());
        for entry in doc.proxy {
            if !is_valid_name(&entry.name) {
                return Err(ManifestError::InvalidName(entry.name));
            }
            if !seen.insert(entry.name.clone()) {
                return Err(ManifestError::DuplicateResource(entry.name));
            }

            let target_url = resolve(manifest_url, &format!("proxy.{}", entry.name), &entry.uri)?;
            let methods = parse_methods(&entry.name, &entry.methods)?;

            resources.push(Resource {
                name: entry.name,
                target_url,
                methods,
            });
        }

        Ok(Self {
            name: doc.name,
            version: doc.version.filter(|v| !v.is_empty()),
            content_endpoint,
            fallback_endpoint,
            resources,
        })
    }

    pub fn resource(&self, name: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.name == name)
    }
}

fn resolve(base: &Url, field: &str, uri: &str) -> Result<Url, ManifestError> {
    let url = base.join(uri).map_err(|_| ManifestError::InvalidUri {
        field: field.to_string(),
        value: uri.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(ManifestError::UnsupportedScheme {
            field: field.to_string(),
            scheme: scheme.to_string(),
        }),
    }
}

/// An empty method list means GET only.
fn parse_methods(resource: &str, raw: &[String]) -> Result<Vec<Method>, ManifestError> {
    if raw.is_empty() {
        return Ok(vec![Method::GET]);
    }

    let mut methods = Vec::with_capacity(raw.len());
    for name in raw {
        let method = Method::from_bytes(name.trim().to_ascii_uppercase().as_bytes()).map_err(
            |_| ManifestError::InvalidMethod {
                resource: resource.to_string(),
                method: name.clone(),
            },
        )?;
        if !methods.contains(&method) {
            methods.push(method);
        }
    }
    Ok(methods)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn manifest_url() -> Url {
        Url::parse("http://podlet.local:7100/manifest.json").unwrap()
    }

    fn parse(value: serde_json::Value) -> Result<Manifest, ManifestError> {
        Manifest::parse(value.to_string().as_bytes(), &manifest_url())
    }

    #[test]
    fn test_parse_full_manifest() {
        let manifest = parse(json!({
            "name": "component",
            "version": "1.0.0",
            "content": "http://podlet.local:7100/content",
            "fallback": "http://podlet.local:7100/fallback",
            "proxy": [
                { "name": "localApi", "uri": "http://api.local:9000/echo", "methods": ["GET", "post", "PUT"] }
            ]
        }))
        .unwrap();

        assert_eq!(manifest.name, "component");
        assert_eq!(manifest.version.as_deref(), Some("1.0.0"));
        assert_eq!(manifest.content_endpoint.as_str(), "http://podlet.local:7100/content");
        assert_eq!(
            manifest.fallback_endpoint.as_ref().map(Url::as_str),
            Some("http://podlet.local:7100/fallback")
        );

        let resource = manifest.resource("localApi").unwrap();
        assert_eq!(resource.target_url.as_str(), "http://api.local:9000/echo");
        assert_eq!(resource.methods, vec![Method::GET, Method::POST, Method::PUT]);
        assert!(resource.allows(&Method::POST));
        assert!(!resource.allows(&Method::DELETE));
    }

    #[test]
    fn test_relative_uris_resolve_against_manifest_url() {
        let manifest = parse(json!({
            "name": "component",
            "content": "/content",
            "fallback": "fallback.html",
            "proxy": [{ "name": "api", "uri": "/api/items" }]
        }))
        .unwrap();

        assert_eq!(manifest.content_endpoint.as_str(), "http://podlet.local:7100/content");
        assert_eq!(
            manifest.fallback_endpoint.as_ref().unwrap().as_str(),
            "http://podlet.local:7100/fallback.html"
        );
        let api = manifest.resource("api").unwrap();
        assert_eq!(api.target_url.as_str(), "http://podlet.local:7100/api/items");
        assert_eq!(api.methods, vec![Method::GET]);
    }

    #[test]
    fn test_missing_optional_fields() {
        let manifest = parse(json!({ "name": "component", "content": "/content" })).unwrap();

        assert!(manifest.version.is_none());
        assert!(manifest.fallback_endpoint.is_none());
        assert!(manifest.resources.is_empty());
    }

    #[test]
    fn test_empty_fallback_is_absent() {
        let manifest = parse(json!({ "name": "c", "content": "/", "fallback": "" })).unwrap();
        assert!(manifest.fallback_endpoint.is_none());
    }

    #[test]
    fn test_duplicate_methods_collapse() {
        let manifest = parse(json!({
            "name": "c",
            "content": "/",
            "proxy": [{ "name": "api", "uri": "/api", "methods": ["GET", "get", "POST"] }]
        }))
        .unwrap();
        assert_eq!(manifest.resources[0].methods, vec![Method::GET, Method::POST]);
    }

    #[test]
    fn test_rejects_duplicate_resources() {
        let result = parse(json!({
            "name": "c",
            "content": "/",
            "proxy": [
                { "name": "api", "uri": "/a" },
                { "name": "api", "uri": "/b" }
            ]
        }));
        assert!(matches!(result, Err(ManifestError::DuplicateResource(name)) if name == "api"));
    }

    #[test]
    fn test_rejects_bad_names() {
        assert!(matches!(
            parse(json!({ "name": "a b", "content": "/" })),
            Err(ManifestError::InvalidName(_))
        ));
        assert!(matches!(
            parse(json!({ "name": "c", "content": "/", "proxy": [{ "name": "x/y", "uri": "/" }] })),
            Err(ManifestError::InvalidName(_))
        ));
    }

    #[test]
    fn test_rejects_non_http_scheme() {
        let result = parse(json!({ "name": "c", "content": "file:///etc/passwd" }));
        assert!(matches!(result, Err(ManifestError::UnsupportedScheme { .. })));
    }

    #[test]
    fn test_rejects_invalid_method() {
        let result = parse(json!({
            "name": "c",
            "content": "/",
            "proxy": [{ "name": "api", "uri": "/", "methods": ["GE T"] }]
        }));
        assert!(matches!(result, Err(ManifestError::InvalidMethod { .. })));
    }

    #[test]
    fn test_rejects_malformed_json() {
        let result = Manifest::parse(b"{ not json", &manifest_url());
        assert!(matches!(result, Err(ManifestError::Json(_))));

        let result = parse(json!({ "name": "c" }));
        assert!(matches!(result, Err(ManifestError::Json(_))));
    }
}
