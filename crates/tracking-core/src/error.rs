//! # Error Types
//!
//! One enum per concern:
//!
//! - [`OrderError`]: domain errors surfaced to callers of the order and simulation services.
//! - [`RepositoryError`]: failures reported by the persistence collaborator.
//! - [`HubError`]: the hub actor is no longer reachable.
//!
//! Domain errors carry plain strings so they stay `Clone + PartialEq`, which keeps
//! assertions in tests short.

use thiserror::Error;

use crate::status::OrderStatus;

/// Errors surfaced by [`OrderService`](crate::service::OrderService) and
/// [`SimulationService`](crate::service::SimulationService).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum OrderError {
    /// The requested order does not exist.
    #[error("Order not found: {0}")]
    NotFound(String),

    /// The order has been soft-deleted and no longer accepts changes.
    #[error("Order {0} is deleted")]
    Deleted(String),

    /// The order is not soft-deleted, so there is nothing to restore.
    #[error("Order {0} is not deleted")]
    NotDeleted(String),

    /// The requested status is not one of the known values.
    #[error("Invalid order status: {0}")]
    InvalidStatus(String),

    /// The status graph has no edge between the two states.
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// The operation is not permitted while the order is in its current state.
    #[error("Order {order_id} cannot be {action} while {status}")]
    InvalidState {
        order_id: String,
        action: &'static str,
        status: OrderStatus,
    },

    /// A simulation for this order is already running.
    #[error("Simulation already running for order {0}")]
    SimulationRunning(String),

    /// The underlying repository failed.
    #[error("Order repository error: {0}")]
    Repository(String),

    /// The event could not be handed to the hub.
    #[error("Notification error: {0}")]
    Notification(String),
}

impl From<RepositoryError> for OrderError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound(id) => OrderError::NotFound(id),
            other => OrderError::Repository(other.to_string()),
        }
    }
}

impl From<HubError> for OrderError {
    fn from(e: HubError) -> Self {
        OrderError::Notification(e.to_string())
    }
}

/// Errors reported by an [`OrderRepository`](crate::store::OrderRepository) or
/// [`DriverDirectory`](crate::store::DriverDirectory).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RepositoryError {
    #[error("Record not found: {0}")]
    NotFound(String),
    #[error("Store closed")]
    StoreClosed,
    #[error("Store dropped response channel")]
    StoreDropped,
    #[error("Storage failure: {0}")]
    Storage(String),
    /// The record changed after the caller read it; nothing was written.
    #[error("Record changed concurrently: {0}")]
    Conflict(String),
}

/// Errors returned by [`HubClient`](crate::hub::HubClient).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum HubError {
    #[error("Hub closed")]
    Closed,
    #[error("Hub dropped response channel")]
    Dropped,
}
