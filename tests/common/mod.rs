//! Test podlet and echo service running on ephemeral ports
#![allow(dead_code)]

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderValue, Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
    routing::{any, get},
};
use podium_layout::api::{self, state::AppState};
use podium_layout::config::Config;
use podium_layout::layout::Layout;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Duration, sleep};

/// A server that can be stopped, closing its listener and connections
pub struct TestServer {
    pub url: String,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl TestServer {
    async fn start(app: Router) -> Self {
        let addr = SocketAddr::from(([127, 0, 0, 1], 0));
        let listener = TcpListener::bind(addr).await.expect("bind test server");
        let bound = listener.local_addr().expect("local addr");
        let (tx, rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = rx.await;
                })
                .await
                .expect("test server failed");
        });

        Self {
            url: format!("http://{}", bound),
            shutdown: Some(tx),
            handle: Some(handle),
        }
    }

    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
        }
    }
}

/// Knobs and counters of the test podlet
pub struct PodletControl {
    pub name: String,
    pub api_url: String,
    pub manifest_up: AtomicBool,
    pub content_up: AtomicBool,
    /// Version declared in the manifest
    pub manifest_version: Mutex<String>,
    /// Version announced on content responses
    pub content_version: Mutex<String>,
    /// Name of the GET/POST/PUT echo resource
    pub api_resource: Mutex<String>,
    /// Replaces the manifest response when set
    pub manifest_override: Mutex<Option<(StatusCode, String)>>,
    pub manifest_hits: AtomicUsize,
    pub content_hits: AtomicUsize,
    pub fallback_hits: AtomicUsize,
    pub last_content_headers: Mutex<Option<HeaderMap>>,
    pub last_content_query: Mutex<Option<String>>,
}

impl PodletControl {
    fn new(name: &str, api_url: &str) -> Self {
        Self {
            name: name.to_string(),
            api_url: api_url.to_string(),
            manifest_up: AtomicBool::new(true),
            content_up: AtomicBool::new(true),
            manifest_version: Mutex::new("1.0.0".to_string()),
            content_version: Mutex::new("1.0.0".to_string()),
            api_resource: Mutex::new("localApi".to_string()),
            manifest_override: Mutex::new(None),
            manifest_hits: AtomicUsize::new(0),
            content_hits: AtomicUsize::new(0),
            fallback_hits: AtomicUsize::new(0),
            last_content_headers: Mutex::new(None),
            last_content_query: Mutex::new(None),
        }
    }

    pub fn set_version(&self, version: &str) {
        *self.manifest_version.lock().unwrap() = version.to_string();
        *self.content_version.lock().unwrap() = version.to_string();
    }

    pub fn hits(&self) -> (usize, usize, usize) {
        (
            self.manifest_hits.load(Ordering::SeqCst),
            self.content_hits.load(Ordering::SeqCst),
            self.fallback_hits.load(Ordering::SeqCst),
        )
    }
}

pub struct TestPodlet {
    pub server: TestServer,
    pub control: Arc<PodletControl>,
}

impl TestPodlet {
    pub async fn start(name: &str, api_url: &str) -> Self {
        let control = Arc::new(PodletControl::new(name, api_url));
        let app = Router::new()
            .route("/manifest.json", get(serve_manifest))
            .route("/content", get(serve_content))
            .route("/fallback", get(serve_fallback))
            .with_state(control.clone());

        Self {
            server: TestServer::start(app).await,
            control,
        }
    }

    pub fn url(&self) -> &str {
        &self.server.url
    }

    pub async fn stop(&mut self) {
        self.server.stop().await;
    }
}

async fn serve_manifest(State(control): State<Arc<PodletControl>>) -> Response {
    control.manifest_hits.fetch_add(1, Ordering::SeqCst);

    if let Some((status, body)) = control.manifest_override.lock().unwrap().clone() {
        return (status, body).into_response();
    }
    if !control.manifest_up.load(Ordering::SeqCst) {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    let api = &control.api_url;
    let manifest = json!({
        "name": control.name,
        "version": control.manifest_version.lock().unwrap().clone(),
        "content": "/content",
        "fallback": "/fallback",
        "proxy": [
            {
                "name": control.api_resource.lock().unwrap().clone(),
                "uri": format!("{api}/api"),
                "methods": ["GET", "POST", "PUT"]
            },
            {
                "name": "inspect",
                "uri": format!("{api}/inspect"),
                "methods": ["GET", "POST", "PUT", "PATCH", "DELETE"]
            },
            { "name": "slow", "uri": format!("{api}/slow") },
            { "name": "redirect", "uri": format!("{api}/redirect") }
        ]
    });

    Json(manifest).into_response()
}

async fn serve_content(
    State(control): State<Arc<PodletControl>>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    control.content_hits.fetch_add(1, Ordering::SeqCst);
    *control.last_content_headers.lock().unwrap() = Some(headers);
    *control.last_content_query.lock().unwrap() = uri.query().map(str::to_owned);

    if !control.content_up.load(Ordering::SeqCst) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response();
    }

    let version = control.content_version.lock().unwrap().clone();
    let mut response = "<p>content component</p>".into_response();
    response.headers_mut().insert(
        "podlet-version",
        HeaderValue::from_str(&version).unwrap(),
    );
    response
}

async fn serve_fallback(State(control): State<Arc<PodletControl>>) -> &'static str {
    control.fallback_hits.fetch_add(1, Ordering::SeqCst);
    "<p>fallback component</p>"
}

/// Echo service standing in for a podlet's backend API
pub async fn start_echo_service() -> TestServer {
    let app = Router::new()
        .route("/api", any(echo_api))
        .route("/inspect", any(inspect))
        .route("/inspect/{*rest}", any(inspect))
        .route(
            "/slow",
            get(|| async {
                sleep(Duration::from_secs(3)).await;
                "too late"
            }),
        )
        .route(
            "/redirect",
            get(|| async { (StatusCode::FOUND, [(header::LOCATION, "/api")]) }),
        );

    TestServer::start(app).await
}

async fn echo_api(method: Method, body: Bytes) -> Response {
    let payload = String::from_utf8_lossy(&body).to_string();
    match method {
        Method::GET => Json(json!({ "body": "GET proxy target" })).into_response(),
        Method::POST => {
            Json(json!({ "payload": payload, "body": "POST proxy target" })).into_response()
        }
        Method::PUT => {
            Json(json!({ "payload": payload, "body": "PUT proxy target" })).into_response()
        }
        _ => StatusCode::METHOD_NOT_ALLOWED.into_response(),
    }
}

/// Echoes the raw body back and reports what arrived in `x-seen-*` headers
async fn inspect(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Response {
    let seen = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string()
    };

    let mut response = (StatusCode::CREATED, body).into_response();
    let out = response.headers_mut();
    let pairs = [
        ("x-seen-method", method.to_string()),
        ("x-seen-path", uri.path().to_string()),
        ("x-seen-query", uri.query().unwrap_or("").to_string()),
        ("x-seen-host", seen("host")),
        ("x-seen-custom", seen("x-custom")),
        ("x-seen-requested-by", seen("podium-requested-by")),
        ("x-seen-connection-token", seen("x-hop")),
    ];
    for (name, value) in pairs {
        out.insert(name, HeaderValue::from_str(&value).unwrap());
    }
    out.insert("x-upstream", HeaderValue::from_static("echo"));
    response
}

/// Layout config pointing at `podlet_url`, wrapping content in `## ... ##`
pub fn layout_config(podlet_url: &str, extra_podlet_toml: &str) -> Config {
    let toml = format!(
        r###"
[layout]
name = "test-layout"
pathname = "/"

[layout.template]
open = "## "
close = " ##"

[proxy]
timeout_ms = 500
max_body_bytes = "64KB"

[[podlets]]
name = "component"
base_url = "{podlet_url}"
timeout_ms = 1000
{extra_podlet_toml}
"###
    );

    toml::from_str(&toml).expect("Failed to parse test config")
}

pub fn build_app(config: Config) -> (Router, AppState) {
    let layout = Layout::from_config(&config).expect("Failed to build layout");
    let state = AppState::new(config, layout);
    (api::router(state.clone()), state)
}

/// Echo service, podlet and layout app wired together
pub struct Harness {
    pub echo: TestServer,
    pub podlet: TestPodlet,
    pub app: Router,
    pub state: AppState,
}

impl Harness {
    pub async fn start() -> Self {
        Self::start_with("").await
    }

    pub async fn start_with(extra_podlet_toml: &str) -> Self {
        let echo = start_echo_service().await;
        let podlet = TestPodlet::start("component", &echo.url).await;
        let (app, state) = build_app(layout_config(podlet.url(), extra_podlet_toml));

        Self {
            echo,
            podlet,
            app,
            state,
        }
    }
}
