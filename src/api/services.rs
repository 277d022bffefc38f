use axum::{
    Json,
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
};

use super::{
    error::ApiError,
    models::{HealthResponse, PodletHealth, ResourcePath},
    state::AppState,
    utils::{read_body, request_origin},
};
use crate::layout::PageRequest;
use crate::podlet::{PodletState, ProxyRequest};

/// Layout page (GET {layout.pathname})
///
/// Always renders: podlets that are down contribute their fallback or
/// nothing at all.
pub async fn render_page(
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
) -> Html<String> {
    let page = PageRequest {
        origin: request_origin(&headers),
        pathname: uri.path().to_string(),
        query: uri.query().map(str::to_owned),
    };

    Html(state.layout.render_page(&page).await)
}

/// Resource proxy (any method on /podium-resource/{podlet}/{resource}[/{*rest}])
///
/// ## Flow:
/// 1. Read the body, enforcing `proxy.max_body_bytes`
/// 2. Look up the podlet's current route table (404 if not mounted)
/// 3. Check the method against the resource's declared methods (405)
/// 4. Forward to the target; upstream failure is 502, timeout 504
/// 5. Stream the upstream status, headers and body back unchanged
pub async fn proxy_resource(
    State(state): State<AppState>,
    Path(path): Path<ResourcePath>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, ApiError> {
    let limit = state.config.proxy.max_body_bytes.as_usize();
    let body = read_body(body, limit).await?;

    let request = ProxyRequest {
        method,
        resource: path.resource,
        rest: path.rest,
        query: uri.query().map(str::to_owned),
        headers,
        body,
    };

    let upstream = state.layout.proxy(&path.podlet, request).await?;

    let mut response = Response::new(Body::from_stream(upstream.body));
    *response.status_mut() = upstream.status;
    *response.headers_mut() = upstream.headers;
    Ok(response)
}

/// Health check endpoint (GET /health)
///
/// Reports each podlet's lifecycle state and mounted routes. The layout is
/// healthy as long as it can answer; a degraded podlet only flips `status`
/// to "degraded".
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let podlets: Vec<PodletHealth> = state
        .layout
        .registrations()
        .iter()
        .map(|reg| PodletHealth {
            name: reg.name().to_string(),
            state: reg.state(),
            version: reg.manifest().and_then(|m| m.version.clone()),
            routes: reg.routes().paths(),
        })
        .collect();

    let degraded = podlets.iter().any(|p| p.state == PodletState::Degraded);

    let response = HealthResponse {
        status: if degraded { "degraded" } else { "healthy" }.to_string(),
        podlets,
        metrics: state.layout.metrics().snapshot(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    (StatusCode::OK, Json(response))
}
