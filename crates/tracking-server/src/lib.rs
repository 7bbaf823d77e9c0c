//! HTTP and WebSocket surface of the order tracking service.
//!
//! Everything except `/health` sits behind [`middleware::auth_middleware`].

pub mod api;
pub mod api_ws;
pub mod config;
pub mod middleware;

use axum::{
    extract::Extension,
    routing::{get, patch, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracking_core::config::ConnectionConfig;
use tracking_core::hub::HubClient;
use tracking_core::lifecycle::TrackingSystem;
use tracking_core::service::{OrderService, SimulationService};

use crate::middleware::IdentityProvider;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub orders: OrderService,
    pub simulation: SimulationService,
    pub hub: HubClient,
    /// Settings handed to every new connection actor.
    pub connection: ConnectionConfig,
    pub identity: Arc<dyn IdentityProvider>,
}

impl AppState {
    pub fn new(system: &TrackingSystem, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            orders: system.orders.clone(),
            simulation: system.simulation.clone(),
            hub: system.hub.clone(),
            connection: system.config.connection.clone(),
            identity,
        }
    }
}

/// Health check handler. Reports hub figures when the hub is reachable.
async fn health(Extension(state): Extension<Arc<AppState>>) -> Json<Value> {
    match state.hub.stats().await {
        Ok(stats) => Json(json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
            "hub": stats,
        })),
        Err(e) => Json(json!({
            "status": "degraded",
            "version": env!("CARGO_PKG_VERSION"),
            "error": e.to_string(),
        })),
    }
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/api/v1/tracking/ws", get(api_ws::ws_handler))
        .route(
            "/api/v1/tracking/location/{order_id}",
            post(api::update_location_handler),
        )
        .route("/api/v1/orders", post(api::create_order_handler))
        .route(
            "/api/v1/orders/{order_id}",
            get(api::get_order_handler).delete(api::delete_order_handler),
        )
        .route(
            "/api/v1/orders/{order_id}/status",
            patch(api::change_status_handler),
        )
        .route(
            "/api/v1/orders/{order_id}/restore",
            post(api::restore_order_handler),
        )
        .route(
            "/api/v1/orders/{order_id}/simulate",
            post(api::start_simulation_handler).delete(api::cancel_simulation_handler),
        )
        .route(
            "/api/v1/orders/{order_id}/simulation-status",
            get(api::simulation_status_handler),
        )
        .route(
            "/api/v1/orders/{order_id}/assign-driver",
            post(api::assign_driver_handler),
        )
        .route(
            "/api/v1/orders/{order_id}/simulate-movement",
            post(api::simulate_movement_handler),
        )
        .layer(axum::middleware::from_fn(middleware::auth_middleware));

    Router::new()
        .route("/health", get(health))
        .merge(protected_routes)
        .layer(Extension(Arc::new(state)))
}
