//! API utility functions
//!
//! Stateless helpers for turning inbound requests into layout calls.

use axum::body::Body;
use axum::http::{HeaderMap, header};
use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};

use crate::api::error::ApiError;

/// Reads the whole request body, rejecting bodies above `limit` bytes
pub async fn read_body(body: Body, limit: usize) -> Result<Bytes, ApiError> {
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => {
            Err(ApiError::PayloadTooLarge(limit))
        }
        Err(err) => Err(ApiError::InvalidRequest(format!(
            "failed to read body: {err}"
        ))),
    }
}

/// Origin the page was requested on, from `X-Forwarded-Proto`/`Host`
pub fn request_origin(headers: &HeaderMap) -> String {
    let host = headers
        .get("x-forwarded-host")
        .or_else(|| headers.get(header::HOST))
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .filter(|s| matches!(*s, "http" | "https"))
        .unwrap_or("http");

    format!("{scheme}://{host}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[tokio::test]
    async fn test_read_body_within_limit() {
        let body = Body::from("proxy payload");
        let bytes = read_body(body, 1024).await.unwrap();
        assert_eq!(&bytes[..], b"proxy payload");

        let empty = read_body(Body::empty(), 0).await.unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn test_read_body_too_large() {
        let body = Body::from(vec![0u8; 1000]);
        match read_body(body, 999).await {
            Err(ApiError::PayloadTooLarge(limit)) => assert_eq!(limit, 999),
            other => panic!("Expected PayloadTooLarge error, got {other:?}"),
        }
    }

    #[test]
    fn test_request_origin() {
        let mut headers = HeaderMap::new();
        assert_eq!(request_origin(&headers), "http://localhost");

        headers.insert(header::HOST, HeaderValue::from_static("layout.local:7000"));
        assert_eq!(request_origin(&headers), "http://layout.local:7000");

        headers.insert("x-forwarded-proto", HeaderValue::from_static("https"));
        headers.insert("x-forwarded-host", HeaderValue::from_static("shop.example.com"));
        assert_eq!(request_origin(&headers), "https://shop.example.com");
    }
}
