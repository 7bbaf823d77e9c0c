//! Tracking server binary.
//!
//! Starts the tracking actors and an axum HTTP server with structured logging
//! and graceful shutdown on SIGTERM/SIGINT.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracking_core::lifecycle::{setup_tracing, TrackingSystem};
use tracking_server::{app, config, middleware::StaticIdentityProvider, AppState};

fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("TRACKING_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

#[tokio::main]
async fn main() {
    let (resolved_config_path, config_source) = resolve_config_path();
    let selected_config_path = resolved_config_path.as_deref().or(Some("config.toml"));

    let config = config::load_config(selected_config_path)
        .expect("failed to load configuration, the server cannot start without valid config");

    setup_tracing(&config.logging.level, config.logging.json);

    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        "resolved startup configuration path"
    );
    if config.auth.tokens.is_empty() {
        tracing::warn!("no bearer tokens configured, every protected request will be rejected");
    }

    let system = TrackingSystem::new(config.tracking.clone());
    for driver in config.drivers.iter().cloned() {
        let driver_id = driver.id.clone();
        if let Err(e) = system.store.add_driver(driver).await {
            tracing::warn!(%driver_id, error = %e, "failed to seed driver");
        }
    }

    let identity = Arc::new(StaticIdentityProvider::new(config.auth.tokens.clone()));
    let app = app(AppState::new(&system, identity));
    let addr = SocketAddr::new(config.server.host, config.server.port);

    tracing::info!(%addr, "starting tracking server");

    let listener = TcpListener::bind(addr)
        .await
        .expect("failed to bind to address, is another process using this port?");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    if let Err(e) = system.shutdown().await {
        tracing::error!(error = %e, "tracking system did not stop cleanly");
    }
    tracing::info!("tracking server shut down");
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, initiating graceful shutdown"); }
        () = terminate => { tracing::info!("received SIGTERM, initiating graceful shutdown"); }
    }
}
