/// The order aggregate and its audit trail.
///
/// An [`Order`] owns its [`StatusHistory`] rows. The store appends to the
/// history; nothing ever edits or removes a row once written.
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use uuid::Uuid;

use crate::status::OrderStatus;

/// Type-safe identifier for orders.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl OrderId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for OrderId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for OrderId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    pub id: String,
    pub company_id: String,
    pub full_name: String,
    pub active: bool,
}

/// One immutable row of an order's audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusHistory {
    pub id: String,
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl StatusHistory {
    /// Builds the row recorded when `order_id` enters `status`.
    pub fn record(order_id: OrderId, status: OrderStatus) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            order_id,
            status,
            description: status.description().to_string(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub tracking_number: String,
    pub company_id: String,
    pub company_name: String,
    pub status: OrderStatus,
    pub driver: Option<Driver>,
    pub delivery_deadline: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub history: Vec<StatusHistory>,
}

/// Payload for creating a new order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCreate {
    pub company_id: String,
    pub company_name: String,
    #[serde(default)]
    pub delivery_deadline: Option<DateTime<Utc>>,
}

impl Order {
    /// Creates a `PENDING` order with a fresh tracking number and its first history row.
    pub fn new(id: OrderId, params: OrderCreate) -> Self {
        let now = Utc::now();
        let history = vec![StatusHistory::record(id.clone(), OrderStatus::Pending)];
        Self {
            id,
            tracking_number: generate_tracking_number(now),
            company_id: params.company_id,
            company_name: params.company_name,
            status: OrderStatus::Pending,
            driver: None,
            delivery_deadline: params.delivery_deadline,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            history,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Whole minutes left until the delivery deadline, if it lies in the future.
    pub fn minutes_to_deadline(&self, now: DateTime<Utc>) -> Option<i64> {
        let deadline = self.delivery_deadline?;
        let minutes = (deadline - now).num_minutes();
        (minutes > 0).then_some(minutes)
    }
}

/// `DEL-YYMMDD-NNNN`
fn generate_tracking_number(now: DateTime<Utc>) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..10_000);
    format!("DEL-{}-{:04}", now.format("%y%m%d"), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn params() -> OrderCreate {
        OrderCreate {
            company_id: "company_1".into(),
            company_name: "Acme Logistics".into(),
            delivery_deadline: None,
        }
    }

    #[test]
    fn test_new_order_starts_pending_with_one_history_row() {
        let order = Order::new(OrderId::from("order_1"), params());
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.history.len(), 1);
        assert_eq!(order.history[0].status, OrderStatus::Pending);
        assert!(!order.is_deleted());
    }

    #[test]
    fn test_tracking_number_has_expected_shape() {
        let order = Order::new(OrderId::from("order_1"), params());
        let parts: Vec<&str> = order.tracking_number.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "DEL");
        assert_eq!(parts[1].len(), 6);
        assert_eq!(parts[2].len(), 4);
    }

    #[test]
    fn test_minutes_to_deadline_ignores_past_deadlines() {
        let now = Utc::now();
        let mut order = Order::new(OrderId::from("order_1"), params());
        assert_eq!(order.minutes_to_deadline(now), None);

        order.delivery_deadline = Some(now + Duration::minutes(90));
        assert_eq!(order.minutes_to_deadline(now), Some(90));

        order.delivery_deadline = Some(now - Duration::minutes(5));
        assert_eq!(order.minutes_to_deadline(now), None);
    }
}
