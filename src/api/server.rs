use axum::{
    Router,
    routing::{any, get},
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::{
    services::{health, proxy_resource, render_page},
    state::AppState,
};
use crate::config::Config;
use crate::layout::Layout;
use crate::podlet::PROXY_PREFIX;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// All layout routes: the page, the resource proxy family and health
pub fn router(state: AppState) -> Router {
    let pathname = state.config.layout.pathname.clone();
    let resource = format!("{PROXY_PREFIX}/{{podlet}}/{{resource}}");

    Router::new()
        .route(&pathname, get(render_page))
        .route(&resource, any(proxy_resource))
        .route(&format!("{resource}/{{*rest}}"), any(proxy_resource))
        .route("/health", get(health))
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

pub async fn run(config: Config) -> Result<(), AnyError> {
    let address = config.server.bind_addr;

    let layout = Layout::from_config(&config)
        .map_err(|e| format!("Failed to build layout: {}", e))?;
    for registration in layout.registrations() {
        info!(
            podlet = registration.name(),
            manifest = %registration.config().manifest_url(),
            "Podlet registered"
        );
    }

    let app = router(AppState::new(config, layout));

    let listener = TcpListener::bind(address).await?;
    info!(%address, "Podium layout listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
