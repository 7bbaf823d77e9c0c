use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracking_core::config::TrackingConfig;
use tracking_core::lifecycle::TrackingSystem;
use tracking_core::model::{OrderCreate, OrderId};
use tracking_server::{app, middleware::StaticIdentityProvider, AppState};

async fn serve() -> (SocketAddr, TrackingSystem) {
    let system = TrackingSystem::new(TrackingConfig::default());
    let identity = Arc::new(StaticIdentityProvider::default().with_token("secret", "user_1"));
    let router = app(AppState::new(&system, identity));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (addr, system)
}

async fn wait_for_subscribers(system: &TrackingSystem, order_id: &OrderId, expected: usize) {
    for _ in 0..200 {
        if system.hub.subscriber_count(order_id.clone()).await.unwrap() == expected {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {} subscribers for {}", expected, order_id);
}

async fn wait_for_connections(system: &TrackingSystem, expected: usize) {
    for _ in 0..200 {
        if system.hub.stats().await.unwrap().connections == expected {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {} connections", expected);
}

#[tokio::test]
async fn test_status_change_is_pushed_to_subscriber() {
    let (addr, system) = serve().await;
    let order = system
        .orders
        .create_order(OrderCreate {
            company_id: "company_1".into(),
            company_name: "Acme Logistics".into(),
            delivery_deadline: None,
        })
        .await
        .unwrap();

    let url = format!("ws://{}/api/v1/tracking/ws?token=secret", addr);
    let (mut ws, _) = connect_async(url).await.expect("failed to connect");

    let subscribe = json!({ "type": "SUBSCRIBE", "order_id": order.id.as_str() });
    ws.send(Message::Text(subscribe.to_string().into()))
        .await
        .unwrap();
    wait_for_subscribers(&system, &order.id, 1).await;

    system
        .orders
        .change_status(&order.id, "ACCEPTED")
        .await
        .unwrap();

    let update = loop {
        let message = timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("no update pushed")
            .expect("socket closed")
            .unwrap();
        if let Message::Text(text) = message {
            break serde_json::from_str::<Value>(text.as_str()).unwrap();
        }
    };
    assert_eq!(update["type"], "ORDER_UPDATE");
    assert_eq!(update["order_id"], order.id.as_str());
    assert_eq!(update["data"]["status"], "ACCEPTED");
    assert_eq!(update["data"]["order"]["tracking_number"], order.tracking_number.as_str());

    ws.close(None).await.unwrap();
    wait_for_connections(&system, 0).await;
    assert_eq!(system.hub.subscriber_count(order.id.clone()).await.unwrap(), 0);
}

#[tokio::test]
async fn test_unauthenticated_upgrade_is_refused() {
    let (addr, system) = serve().await;

    let result = connect_async(format!("ws://{}/api/v1/tracking/ws", addr)).await;
    assert!(result.is_err(), "upgrade without a token must fail");

    let result = connect_async(format!("ws://{}/api/v1/tracking/ws?token=forged", addr)).await;
    assert!(result.is_err());

    assert_eq!(system.hub.stats().await.unwrap().connections, 0);
}

#[tokio::test]
async fn test_junk_frames_do_not_close_the_socket() {
    let (addr, system) = serve().await;
    let url = format!("ws://{}/api/v1/tracking/ws?token=secret", addr);
    let (mut ws, _) = connect_async(url).await.expect("failed to connect");

    ws.send(Message::Text("{ not json".into())).await.unwrap();
    ws.send(Message::Binary(vec![0u8, 1, 2].into())).await.unwrap();
    ws.send(Message::Text(
        json!({ "type": "SUBSCRIBE", "order_id": "order_9" })
            .to_string()
            .into(),
    ))
    .await
    .unwrap();

    wait_for_subscribers(&system, &OrderId::from("order_9"), 1).await;
    assert_eq!(system.hub.stats().await.unwrap().connections, 1);
}
