//! REST handlers for orders, location pings and simulations.

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracking_core::error::OrderError;
use tracking_core::model::{Order, OrderCreate, OrderId};
use tracking_core::service::{DriverAssignment, SimulationStatus};

use crate::middleware::AuthenticatedUser;
use crate::AppState;

/// API error type mapping to HTTP status codes.
///
/// Serialized as `{"error": {"code", "message", "details"?}}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    BadRequest {
        message: String,
        details: Vec<String>,
    },
    #[error("missing or invalid credentials")]
    Unauthorized,
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest { .. } => "BAD_REQUEST",
            ApiError::Unauthorized => "UNAUTHORIZED",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }
}

impl From<OrderError> for ApiError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::NotFound(_) => ApiError::NotFound(e.to_string()),
            OrderError::InvalidStatus(_) => ApiError::BadRequest {
                message: e.to_string(),
                details: Vec::new(),
            },
            OrderError::Deleted(_)
            | OrderError::NotDeleted(_)
            | OrderError::InvalidTransition { .. }
            | OrderError::InvalidState { .. }
            | OrderError::SimulationRunning(_) => ApiError::Conflict(e.to_string()),
            OrderError::Repository(_) | OrderError::Notification(_) => {
                ApiError::Internal(e.to_string())
            }
        }
    }
}

/// Malformed or mistyped bodies are validation errors like any other.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest {
            message: "invalid request body".to_string(),
            details: vec![rejection.body_text()],
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "request rejected");
        }

        let mut error = json!({
            "code": self.code(),
            "message": self.to_string(),
        });
        if let ApiError::BadRequest { details, .. } = &self {
            if !details.is_empty() {
                error["details"] = json!(details);
            }
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

/// Success envelope: `{"success": true, "data": ...}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        success: true,
        data,
    })
}

#[derive(Debug, Deserialize)]
pub struct LocationRequest {
    pub latitude: f64,
    pub longitude: f64,
}

impl LocationRequest {
    fn validate(&self) -> Result<(), ApiError> {
        let mut details = Vec::new();
        if !(-90.0..=90.0).contains(&self.latitude) {
            details.push(format!(
                "latitude must be between -90 and 90, got {}",
                self.latitude
            ));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            details.push(format!(
                "longitude must be between -180 and 180, got {}",
                self.longitude
            ));
        }
        if details.is_empty() {
            Ok(())
        } else {
            Err(ApiError::BadRequest {
                message: "invalid location data".to_string(),
                details,
            })
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LocationResponse {
    pub order_id: OrderId,
    /// Connections the ping was queued for.
    pub delivered: usize,
}

/// Handler for `POST /api/v1/tracking/location/{order_id}`.
pub async fn update_location_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(order_id): Path<String>,
    payload: Result<Json<LocationRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<LocationResponse>>, ApiError> {
    let Json(payload) = payload?;
    payload.validate()?;

    let order_id = OrderId::from(order_id);
    let delivered = state
        .orders
        .update_driver_location(&order_id, payload.latitude, payload.longitude)
        .await?;

    tracing::info!(
        %order_id,
        user_id = %user.0,
        latitude = payload.latitude,
        longitude = payload.longitude,
        clients = delivered,
        "driver location updated"
    );
    Ok(ok(LocationResponse {
        order_id,
        delivered,
    }))
}

/// Handler for `POST /api/v1/orders`.
pub async fn create_order_handler(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<OrderCreate>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<Order>>), ApiError> {
    let Json(payload) = payload?;
    if payload.company_id.trim().is_empty() {
        return Err(ApiError::BadRequest {
            message: "company_id is required".to_string(),
            details: Vec::new(),
        });
    }
    let order = state.orders.create_order(payload).await?;
    Ok((StatusCode::CREATED, ok(order)))
}

/// Handler for `GET /api/v1/orders/{order_id}`.
pub async fn get_order_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(order_id): Path<String>,
) -> Result<Json<ApiResponse<Order>>, ApiError> {
    let order = state.orders.get_order(&OrderId::from(order_id)).await?;
    Ok(ok(order))
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

/// Handler for `PATCH /api/v1/orders/{order_id}/status`.
pub async fn change_status_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(order_id): Path<String>,
    payload: Result<Json<StatusRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<Order>>, ApiError> {
    let Json(payload) = payload?;
    let order = state
        .orders
        .change_status(&OrderId::from(order_id), &payload.status)
        .await?;
    Ok(ok(order))
}

/// Handler for `DELETE /api/v1/orders/{order_id}`.
pub async fn delete_order_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(order_id): Path<String>,
) -> Result<Json<ApiResponse<Order>>, ApiError> {
    let order = state.orders.soft_delete(&OrderId::from(order_id)).await?;
    Ok(ok(order))
}

/// Handler for `POST /api/v1/orders/{order_id}/restore`.
pub async fn restore_order_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(order_id): Path<String>,
) -> Result<Json<ApiResponse<Order>>, ApiError> {
    let order = state.orders.restore(&OrderId::from(order_id)).await?;
    Ok(ok(order))
}

/// Handler for `POST /api/v1/orders/{order_id}/simulate`.
///
/// Returns as soon as the run is scheduled; progress arrives over the
/// WebSocket.
pub async fn start_simulation_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(order_id): Path<String>,
) -> Result<(StatusCode, Json<ApiResponse<serde_json::Value>>), ApiError> {
    let order_id = OrderId::from(order_id);
    // The run owns itself; dropping the handle detaches it.
    let _ = state.simulation.simulate_order_flow(&order_id).await?;
    Ok((
        StatusCode::ACCEPTED,
        ok(json!({
            "order_id": order_id,
            "message": "simulation started",
        })),
    ))
}

/// Handler for `DELETE /api/v1/orders/{order_id}/simulate`.
pub async fn cancel_simulation_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(order_id): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let order_id = OrderId::from(order_id);
    if !state.simulation.cancel_simulation(&order_id) {
        return Err(ApiError::NotFound(format!(
            "no simulation running for order {}",
            order_id
        )));
    }
    Ok(ok(json!({
        "order_id": order_id,
        "message": "simulation cancelled",
    })))
}

/// Handler for `GET /api/v1/orders/{order_id}/simulation-status`.
pub async fn simulation_status_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(order_id): Path<String>,
) -> Result<Json<ApiResponse<SimulationStatus>>, ApiError> {
    let status = state
        .simulation
        .simulation_status(&OrderId::from(order_id))
        .await?;
    Ok(ok(status))
}

/// Handler for `POST /api/v1/orders/{order_id}/assign-driver`.
pub async fn assign_driver_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(order_id): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let order_id = OrderId::from(order_id);
    let data = match state.simulation.simulate_random_driver(&order_id).await? {
        DriverAssignment::Assigned(driver) => json!({
            "order_id": order_id,
            "simulated": false,
            "driver": driver,
        }),
        DriverAssignment::Simulated => json!({
            "order_id": order_id,
            "simulated": true,
        }),
    };
    Ok(ok(data))
}

/// Handler for `POST /api/v1/orders/{order_id}/simulate-movement`.
pub async fn simulate_movement_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(order_id): Path<String>,
) -> Result<(StatusCode, Json<ApiResponse<serde_json::Value>>), ApiError> {
    let order_id = OrderId::from(order_id);
    let _ = state.simulation.simulate_driver_movement(&order_id).await?;
    Ok((
        StatusCode::ACCEPTED,
        ok(json!({
            "order_id": order_id,
            "message": "driver movement started",
        })),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracking_core::status::OrderStatus;

    #[test]
    fn test_location_bounds_are_inclusive() {
        let edge = LocationRequest {
            latitude: 90.0,
            longitude: -180.0,
        };
        assert!(edge.validate().is_ok());

        let outside = LocationRequest {
            latitude: 91.0,
            longitude: 180.5,
        };
        match outside.validate() {
            Err(ApiError::BadRequest { details, .. }) => assert_eq!(details.len(), 2),
            other => panic!("expected a validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_domain_errors_map_to_status_codes() {
        let cases = [
            (OrderError::NotFound("o".into()), StatusCode::NOT_FOUND),
            (OrderError::InvalidStatus("x".into()), StatusCode::BAD_REQUEST),
            (
                OrderError::InvalidTransition {
                    from: OrderStatus::Delivered,
                    to: OrderStatus::Pending,
                },
                StatusCode::CONFLICT,
            ),
            (OrderError::Deleted("o".into()), StatusCode::CONFLICT),
            (OrderError::SimulationRunning("o".into()), StatusCode::CONFLICT),
            (OrderError::Repository("down".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (OrderError::Notification("gone".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, expected) in cases {
            assert_eq!(ApiError::from(error).status(), expected);
        }
    }
}
