use super::models::{Config, PodletConfig};
use crate::podlet::{PROXY_PREFIX, is_valid_name};
use reqwest::Url;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Podlet name '{0}' must be non-empty and contain only [A-Za-z0-9._-]")]
    InvalidPodletName(String),

    #[error("Podlet '{0}' is configured more than once")]
    DuplicatePodlet(String),

    #[error("Podlet '{podlet}' has an invalid base_url '{url}', expected http:// or https://")]
    InvalidBaseUrl { podlet: String, url: String },

    #[error("Timeout must be positive: {field}")]
    InvalidTimeout { field: String },

    #[error("Layout pathname '{0}' must start with '/' and must not clash with /podium-resource or /health")]
    InvalidPathname(String),

    #[error("Proxy max_body_bytes must be positive")]
    InvalidMaxBodyBytes,
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_layout(config)?;
    validate_proxy(config)?;
    validate_podlets(&config.podlets)?;
    Ok(())
}

fn validate_layout(config: &Config) -> Result<(), ValidationError> {
    let pathname = &config.layout.pathname;
    if !pathname.starts_with('/')
        || pathname.starts_with(PROXY_PREFIX)
        || pathname == "/health"
        || pathname.contains(['{', '}'])
    {
        return Err(ValidationError::InvalidPathname(pathname.clone()));
    }
    Ok(())
}

fn validate_proxy(config: &Config) -> Result<(), ValidationError> {
    if config.proxy.timeout_ms == 0 {
        return Err(ValidationError::InvalidTimeout {
            field: "proxy.timeout_ms".to_string(),
        });
    }
    if config.proxy.max_body_bytes.as_u64() == 0 {
        return Err(ValidationError::InvalidMaxBodyBytes);
    }
    Ok(())
}

fn validate_podlets(podlets: &[PodletConfig]) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();

    for podlet in podlets {
        if !is_valid_name(&podlet.name) {
            return Err(ValidationError::InvalidPodletName(podlet.name.clone()));
        }

        if !seen.insert(podlet.name.as_str()) {
            return Err(ValidationError::DuplicatePodlet(podlet.name.clone()));
        }

        let valid_url = Url::parse(&podlet.base_url)
            .map(|url| matches!(url.scheme(), "http" | "https"))
            .unwrap_or(false);
        if !valid_url {
            return Err(ValidationError::InvalidBaseUrl {
                podlet: podlet.name.clone(),
                url: podlet.base_url.clone(),
            });
        }

        if podlet.timeout_ms == 0 {
            return Err(ValidationError::InvalidTimeout {
                field: format!("podlets.{}.timeout_ms", podlet.name),
            });
        }
    }

    Ok(())
}
