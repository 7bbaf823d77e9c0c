//! # Order Lifecycle States
//!
//! [`OrderStatus`] enumerates every state an order can be in and owns the
//! legal-transition graph. Every status change in the system goes through
//! [`OrderStatus::can_transition_to`] before anything is persisted.
//!
//! ```text
//! PENDING ──► ACCEPTED ──► PICKED_UP ──► IN_TRANSIT ──► DELIVERED ──► RETURNED
//!    │           │            │    ▲          │
//!    │           │            ▼    │          └──► RETURNED
//!    │           │        IN_WAREHOUSE
//!    └───────────┴────────────┴────────► CANCELLED (from any non-terminal state)
//! ```
//!
//! `DELETED` and `RESTORED` are audit pseudo-states. They appear in the status
//! history when an order is soft-deleted or restored but are not nodes of the
//! graph: nothing transitions into or out of them.

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

use crate::error::OrderError;

/// Lifecycle state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Accepted,
    PickedUp,
    InWarehouse,
    InTransit,
    Delivered,
    Returned,
    Cancelled,
    /// Audit only. Recorded when an order is soft-deleted.
    Deleted,
    /// Audit only. Recorded when a soft-deleted order is restored.
    Restored,
}

impl OrderStatus {
    /// Every status, graph states first.
    pub const ALL: [OrderStatus; 10] = [
        OrderStatus::Pending,
        OrderStatus::Accepted,
        OrderStatus::PickedUp,
        OrderStatus::InWarehouse,
        OrderStatus::InTransit,
        OrderStatus::Delivered,
        OrderStatus::Returned,
        OrderStatus::Cancelled,
        OrderStatus::Deleted,
        OrderStatus::Restored,
    ];

    /// The states an automated run walks through, in order.
    pub const HAPPY_PATH: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Accepted,
        OrderStatus::PickedUp,
        OrderStatus::InTransit,
        OrderStatus::Delivered,
    ];

    /// Outgoing edges of the transition graph.
    pub fn next_states(self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            Pending => &[Accepted, Cancelled],
            Accepted => &[PickedUp, Cancelled],
            PickedUp => &[InTransit, InWarehouse, Cancelled],
            InWarehouse => &[InTransit, Cancelled],
            InTransit => &[Delivered, Returned, Cancelled],
            Delivered => &[Returned],
            Returned | Cancelled => &[],
            Deleted | Restored => &[],
        }
    }

    /// Returns `true` iff `next` is one of this state's outgoing edges.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        self.next_states().contains(&next)
    }

    /// Terminal states have no outgoing edges.
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Returned | OrderStatus::Cancelled)
    }

    /// Audit pseudo-states never take part in transitions.
    pub fn is_audit_only(self) -> bool {
        matches!(self, OrderStatus::Deleted | OrderStatus::Restored)
    }

    /// Whether a soft delete is permitted while the order sits in this state.
    pub fn allows_soft_delete(self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Accepted => "ACCEPTED",
            OrderStatus::PickedUp => "PICKED_UP",
            OrderStatus::InWarehouse => "IN_WAREHOUSE",
            OrderStatus::InTransit => "IN_TRANSIT",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Returned => "RETURNED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Deleted => "DELETED",
            OrderStatus::Restored => "RESTORED",
        }
    }

    /// Human-readable text sent to observers alongside a status change.
    pub fn description(self) -> &'static str {
        match self {
            OrderStatus::Pending => "Order created and waiting to be accepted",
            OrderStatus::Accepted => "Order accepted by the delivery company",
            OrderStatus::PickedUp => "Package picked up by the driver",
            OrderStatus::InWarehouse => "Package stored at the warehouse",
            OrderStatus::InTransit => "Package on its way to the destination",
            OrderStatus::Delivered => "Order delivered successfully",
            OrderStatus::Returned => "Order returned to the sender",
            OrderStatus::Cancelled => "Order cancelled",
            OrderStatus::Deleted => "Order deleted",
            OrderStatus::Restored => "Order restored",
        }
    }

    /// Delivery progress shown to observers, 0-100.
    pub fn progress(self) -> f64 {
        match self {
            OrderStatus::Pending => 10.0,
            OrderStatus::Accepted => 25.0,
            OrderStatus::PickedUp => 50.0,
            OrderStatus::InWarehouse => 60.0,
            OrderStatus::InTransit => 75.0,
            OrderStatus::Delivered => 100.0,
            _ => 0.0,
        }
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = OrderError;

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == wanted)
            .ok_or_else(|| OrderError::InvalidStatus(s.to_string()))
    }
}
