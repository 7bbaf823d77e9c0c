use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use tracking_core::config::{DelayRange, SimulationConfig, TrackingConfig};
use tracking_core::lifecycle::TrackingSystem;
use tracking_server::{app, middleware::StaticIdentityProvider, AppState};

const TOKEN: &str = "secret";

struct TestApp {
    router: Router,
    system: TrackingSystem,
}

fn setup() -> TestApp {
    let system = TrackingSystem::new(TrackingConfig {
        simulation: SimulationConfig {
            accept_delay: DelayRange::fixed(60_000),
            movement_steps: 2,
            movement_interval_ms: 5,
            ..SimulationConfig::default()
        },
        ..TrackingConfig::default()
    });
    let identity = Arc::new(StaticIdentityProvider::default().with_token(TOKEN, "user_1"));
    TestApp {
        router: app(AppState::new(&system, identity)),
        system,
    }
}

impl TestApp {
    async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn create_order(&self) -> String {
        let (status, body) = self
            .send(
                "POST",
                "/api/v1/orders",
                Some(TOKEN),
                Some(json!({
                    "company_id": "company_1",
                    "company_name": "Acme Logistics",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["success"], true);
        body["data"]["id"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn test_health_is_public() {
    let app = setup();
    let (status, body) = app.send("GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["hub"]["connections"], 0);
}

#[tokio::test]
async fn test_missing_token_is_rejected() {
    let app = setup();
    let (status, body) = app.send("GET", "/api/v1/orders/any", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_unknown_token_is_rejected() {
    let app = setup();
    let (status, _) = app
        .send("GET", "/api/v1/orders/any", Some("forged"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.send("GET", "/api/v1/tracking/ws", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.system.hub.stats().await.unwrap().connections, 0);
}

#[tokio::test]
async fn test_query_token_with_reserved_characters() {
    let system = TrackingSystem::new(TrackingConfig::default());
    let identity = Arc::new(StaticIdentityProvider::default().with_token("k+y/=&1", "user_2"));
    let app = TestApp {
        router: app(AppState::new(&system, identity)),
        system,
    };

    let (status, body) = app
        .send("GET", "/api/v1/orders/missing?token=k%2By%2F%3D%261", None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, _) = app
        .send("GET", "/api/v1/orders/missing?token=k+y/=&1", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_out_of_range_location_is_rejected_before_the_core() {
    let app = setup();
    let order_id = app.create_order().await;

    let (status, body) = app
        .send(
            "POST",
            &format!("/api/v1/tracking/location/{}", order_id),
            Some(TOKEN),
            Some(json!({ "latitude": 91.0, "longitude": 0.0 })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
    let details = body["error"]["details"].as_array().unwrap();
    assert_eq!(details.len(), 1);
    assert!(details[0].as_str().unwrap().contains("latitude"));
}

#[tokio::test]
async fn test_malformed_bodies_get_json_bad_request() {
    let app = setup();
    let order_id = app.create_order().await;

    let (status, body) = app
        .send(
            "POST",
            &format!("/api/v1/tracking/location/{}", order_id),
            Some(TOKEN),
            Some(json!({ "latitude": "north" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
    assert_eq!(body["error"]["message"], "invalid request body");
    assert!(body["error"]["details"][0].as_str().unwrap().contains("latitude"));

    let (status, body) = app
        .send(
            "PATCH",
            &format!("/api/v1/orders/{}/status", order_id),
            Some(TOKEN),
            Some(json!({ "state": "ACCEPTED" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let (status, body) = app
        .send("POST", "/api/v1/orders", Some(TOKEN), Some(json!([1, 2, 3])))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_location_for_existing_order_is_accepted() {
    let app = setup();
    let order_id = app.create_order().await;

    let (status, body) = app
        .send(
            "POST",
            &format!("/api/v1/tracking/location/{}", order_id),
            Some(TOKEN),
            Some(json!({ "latitude": 13.7, "longitude": -89.2 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["delivered"], 0);

    let (status, _) = app
        .send(
            "POST",
            "/api/v1/tracking/location/missing",
            Some(TOKEN),
            Some(json!({ "latitude": 13.7, "longitude": -89.2 })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_status_changes_follow_the_transition_table() {
    let app = setup();
    let order_id = app.create_order().await;
    let uri = format!("/api/v1/orders/{}/status", order_id);

    let (status, body) = app
        .send("PATCH", &uri, Some(TOKEN), Some(json!({ "status": "ACCEPTED" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ACCEPTED");

    let (status, body) = app
        .send("PATCH", &uri, Some(TOKEN), Some(json!({ "status": "PENDING" })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");

    let (status, _) = app
        .send("PATCH", &uri, Some(TOKEN), Some(json!({ "status": "TELEPORTED" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(
            "PATCH",
            "/api/v1/orders/missing/status",
            Some(TOKEN),
            Some(json!({ "status": "ACCEPTED" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = app
        .send("GET", &format!("/api/v1/orders/{}", order_id), Some(TOKEN), None)
        .await;
    assert_eq!(body["data"]["history"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_soft_delete_and_restore() {
    let app = setup();
    let order_id = app.create_order().await;
    let order_uri = format!("/api/v1/orders/{}", order_id);

    let (status, body) = app.send("DELETE", &order_uri, Some(TOKEN), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body["data"]["deleted_at"].is_null());

    let (status, _) = app
        .send(
            "PATCH",
            &format!("{}/status", order_uri),
            Some(TOKEN),
            Some(json!({ "status": "ACCEPTED" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let restore_uri = format!("{}/restore", order_uri);
    let (status, body) = app.send("POST", &restore_uri, Some(TOKEN), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["deleted_at"].is_null());

    let (status, _) = app.send("POST", &restore_uri, Some(TOKEN), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_simulation_endpoints() {
    let app = setup();
    let order_id = app.create_order().await;
    let simulate_uri = format!("/api/v1/orders/{}/simulate", order_id);

    let (status, _) = app.send("POST", &simulate_uri, Some(TOKEN), None).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, body) = app.send("POST", &simulate_uri, Some(TOKEN), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("already running"));

    let (status, body) = app
        .send(
            "GET",
            &format!("/api/v1/orders/{}/simulation-status", order_id),
            Some(TOKEN),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["current_status"], "PENDING");
    assert_eq!(body["data"]["running"], true);
    assert_eq!(body["data"]["total_steps"], 5);

    let (status, _) = app.send("DELETE", &simulate_uri, Some(TOKEN), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .send("DELETE", "/api/v1/orders/missing/simulate", Some(TOKEN), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_assign_driver_and_movement() {
    let app = setup();
    let order_id = app.create_order().await;

    let (status, body) = app
        .send(
            "POST",
            &format!("/api/v1/orders/{}/assign-driver", order_id),
            Some(TOKEN),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["simulated"], true);

    let (status, _) = app
        .send(
            "POST",
            &format!("/api/v1/orders/{}/simulate-movement", order_id),
            Some(TOKEN),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, _) = app
        .send(
            "POST",
            "/api/v1/orders/missing/simulate-movement",
            Some(TOKEN),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
