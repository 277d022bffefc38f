use axum::{
    Json,
    http::{HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use super::models::ErrorResponse;
use crate::podlet::PodletError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("payload too large: limit is {0} bytes")]
    PayloadTooLarge(usize),
    #[error("resource not found: {0}")]
    NotFound(String),
    #[error("method {method} not allowed for {resource}")]
    MethodNotAllowed { resource: String, method: Method, allowed: Vec<Method> },
    #[error("bad gateway: {0}")]
    BadGateway(String),
    #[error("gateway timeout: {0}")]
    GatewayTimeout(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::GatewayTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidRequest(_) => "INVALID_REQUEST",
            ApiError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::MethodNotAllowed { .. } => "METHOD_NOT_ALLOWED",
            ApiError::BadGateway(_) => "PROXY_UPSTREAM_UNAVAILABLE",
            ApiError::GatewayTimeout(_) => "PROXY_UPSTREAM_TIMEOUT",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let allow = match &self {
            ApiError::MethodNotAllowed { allowed, .. } => Some(
                allowed
                    .iter()
                    .map(Method::as_str)
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
            _ => None,
        };

        let body = ErrorResponse {
            code: self.code(),
            message: self.to_string(),
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(value) = allow.and_then(|a| HeaderValue::from_str(&a).ok()) {
            response.headers_mut().insert(header::ALLOW, value);
        }
        response
    }
}

impl From<PodletError> for ApiError {
    fn from(err: PodletError) -> Self {
        let message = err.to_string();
        match err {
            PodletError::RouteNotFound { .. } => ApiError::NotFound(message),
            PodletError::MethodNotAllowed {
                podlet,
                resource,
                method,
                allowed,
            } => ApiError::MethodNotAllowed {
                resource: format!("{podlet}/{resource}"),
                method,
                allowed,
            },
            PodletError::PayloadTooLarge { limit } => ApiError::PayloadTooLarge(limit),
            PodletError::InvalidRequest(reason) => ApiError::InvalidRequest(reason),
            PodletError::ProxyUpstreamUnavailable { .. } => ApiError::BadGateway(message),
            PodletError::ProxyUpstreamTimeout { .. } => ApiError::GatewayTimeout(message),
            // Recovered by the layout before they reach a handler
            PodletError::ManifestUnavailable { .. } | PodletError::ContentFetchFailed { .. } => {
                ApiError::Internal(message)
            }
        }
    }
}
