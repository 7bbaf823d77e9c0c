//! # Order Persistence
//!
//! The tracking core never talks to a database directly. It reaches orders and
//! drivers through two narrow traits:
//!
//! - [`OrderRepository`]: read an order, move it along the status graph, assign a driver.
//! - [`DriverDirectory`]: list a company's active drivers.
//!
//! [`OrderStore`] is an in-memory implementation built as an actor: one task
//! owns the tables and processes [`StoreRequest`]s sequentially, and the
//! cloneable [`OrderStoreClient`] implements both traits on top of it.
//! [`mock::MockOrderRepository`] replays scripted responses for tests that need
//! a collaborator to fail.

pub mod actor;
pub mod client;
pub mod message;
pub mod mock;

pub use actor::OrderStore;
pub use client::OrderStoreClient;
pub use message::{Response, StoreRequest};

use async_trait::async_trait;

use crate::error::RepositoryError;
use crate::model::{Driver, Order, OrderCreate, OrderId, StatusHistory};
use crate::status::OrderStatus;

/// Order persistence as seen by the tracking core.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn create_order(&self, params: OrderCreate) -> Result<Order, RepositoryError>;

    async fn get_order_by_id(&self, id: &OrderId) -> Result<Order, RepositoryError>;

    /// Compare-and-set of the order status: stores `entry.status` and appends
    /// `entry` only if the order is live and still in `from`.
    ///
    /// Returns the stored order, or [`RepositoryError::Conflict`] with nothing
    /// written.
    async fn transition_status(
        &self,
        id: &OrderId,
        from: OrderStatus,
        entry: StatusHistory,
    ) -> Result<Order, RepositoryError>;

    async fn assign_driver_to_order(
        &self,
        id: &OrderId,
        driver_id: &str,
    ) -> Result<(), RepositoryError>;

    /// Sets or clears the order's `deleted_at` flag and appends `entry`.
    ///
    /// Returns [`RepositoryError::Conflict`] with nothing written if the flag
    /// already equals `deleted` or the status is no longer `status`.
    async fn set_deleted(
        &self,
        id: &OrderId,
        deleted: bool,
        status: OrderStatus,
        entry: StatusHistory,
    ) -> Result<Order, RepositoryError>;
}

/// Lookup of drivers by company.
#[async_trait]
pub trait DriverDirectory: Send + Sync {
    async fn active_drivers(&self, company_id: &str) -> Result<Vec<Driver>, RepositoryError>;
}
