//! # Wire Messages
//!
//! Every frame on a tracking connection is a JSON envelope:
//!
//! ```json
//! { "type": "ORDER_UPDATE", "order_id": "…", "timestamp": "2024-01-01T00:00:00Z", "data": { … } }
//! ```
//!
//! Outbound payloads are the closed set [`ServerPayload`]. The hub encodes each
//! broadcast once into a [`ServerMessage`] and hands the same `Arc` to every
//! subscriber queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::model::{Order, OrderId};
use crate::status::OrderStatus;

/// Summary of an order embedded in `ORDER_UPDATE` payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderInfo {
    pub id: OrderId,
    pub tracking_number: String,
    pub status: OrderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_name: Option<String>,
    /// Minutes until the delivery deadline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time: Option<i64>,
    pub company_name: String,
    pub progress: f64,
}

impl OrderInfo {
    pub fn from_order(order: &Order, now: DateTime<Utc>) -> Self {
        Self {
            id: order.id.clone(),
            tracking_number: order.tracking_number.clone(),
            status: order.status,
            driver_name: order.driver.as_ref().map(|d| d.full_name.clone()),
            estimated_time: order.minutes_to_deadline(now),
            company_name: order.company_name.clone(),
            progress: order.status.progress(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderUpdateData {
    pub status: OrderStatus,
    pub description: String,
    pub updated_at: DateTime<Utc>,
    pub order: OrderInfo,
}

impl OrderUpdateData {
    /// Notification payload for an order that has just entered its current status.
    pub fn for_order(order: &Order) -> Self {
        let now = Utc::now();
        Self {
            status: order.status,
            description: order.status.description().to_string(),
            updated_at: order.updated_at,
            order: OrderInfo::from_order(order, now),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationUpdateData {
    pub latitude: f64,
    pub longitude: f64,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl LocationUpdateData {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            updated_at: Utc::now(),
            address: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorData {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server → client payloads, tagged with the envelope's `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerPayload {
    OrderUpdate(OrderUpdateData),
    Location(LocationUpdateData),
    Error(ErrorData),
}

impl ServerPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            ServerPayload::OrderUpdate(_) => "ORDER_UPDATE",
            ServerPayload::Location(_) => "LOCATION",
            ServerPayload::Error(_) => "ERROR",
        }
    }
}

/// The full envelope as it goes over the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(flatten)]
    pub payload: ServerPayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<OrderId>,
    pub timestamp: DateTime<Utc>,
}

/// An envelope together with its JSON encoding.
///
/// Built once per broadcast and shared between subscriber queues.
#[derive(Debug)]
pub struct ServerMessage {
    envelope: Envelope,
    encoded: String,
}

impl ServerMessage {
    pub fn encode(
        order_id: Option<OrderId>,
        payload: ServerPayload,
    ) -> Result<Arc<Self>, serde_json::Error> {
        let envelope = Envelope {
            payload,
            order_id,
            timestamp: Utc::now(),
        };
        let encoded = serde_json::to_string(&envelope)?;
        Ok(Arc::new(Self { envelope, encoded }))
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    pub fn payload(&self) -> &ServerPayload {
        &self.envelope.payload
    }

    pub fn encoded(&self) -> &str {
        &self.encoded
    }
}

/// The `type` values a client may send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum ClientMessageType {
    Subscribe,
    Unsubscribe,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct ClientEnvelope {
    #[serde(rename = "type")]
    kind: ClientMessageType,
    #[serde(default)]
    order_id: Option<String>,
}

/// A parsed client → server message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    Subscribe(OrderId),
    Unsubscribe(OrderId),
    /// Well-formed JSON whose `type` is not something a client may send,
    /// or a subscription request without an order id.
    Unknown,
}

impl ClientMessage {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let envelope: ClientEnvelope = serde_json::from_str(text)?;
        let order_id = envelope
            .order_id
            .filter(|id| !id.trim().is_empty())
            .map(OrderId::from);
        Ok(match (envelope.kind, order_id) {
            (ClientMessageType::Subscribe, Some(id)) => ClientMessage::Subscribe(id),
            (ClientMessageType::Unsubscribe, Some(id)) => ClientMessage::Unsubscribe(id),
            _ => ClientMessage::Unknown,
        })
    }
}
