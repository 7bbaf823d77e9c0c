use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::error::{OrderError, RepositoryError};
use crate::hub::HubClient;
use crate::model::{
    LocationUpdateData, Order, OrderCreate, OrderId, OrderUpdateData, StatusHistory,
};
use crate::status::OrderStatus;
use crate::store::OrderRepository;

/// Tries at a conditional write before a concurrent change is reported as an error.
const MAX_WRITE_ATTEMPTS: u32 = 3;

/// Applies lifecycle changes to orders and tells the hub about them.
///
/// Persistence is authoritative: once a status change is stored, a failed
/// broadcast is only logged. Location updates have nothing to persist, so
/// their broadcast failures are returned.
#[derive(Clone)]
pub struct OrderService {
    repository: Arc<dyn OrderRepository>,
    hub: HubClient,
}

impl OrderService {
    pub fn new(repository: Arc<dyn OrderRepository>, hub: HubClient) -> Self {
        Self { repository, hub }
    }

    #[instrument(skip(self, params), fields(company_id = %params.company_id))]
    pub async fn create_order(&self, params: OrderCreate) -> Result<Order, OrderError> {
        debug!(?params, "create_order called");
        let order = self.repository.create_order(params).await?;
        info!(order_id = %order.id, tracking_number = %order.tracking_number, "Order created");
        Ok(order)
    }

    pub async fn get_order(&self, order_id: &OrderId) -> Result<Order, OrderError> {
        Ok(self.repository.get_order_by_id(order_id).await?)
    }

    /// The order's audit trail, oldest first.
    pub async fn status_history(&self, order_id: &OrderId) -> Result<Vec<StatusHistory>, OrderError> {
        let mut history = self.get_order(order_id).await?.history;
        history.sort_by_key(|entry| entry.created_at);
        Ok(history)
    }

    /// Moves an order to `target` if the transition graph allows it.
    ///
    /// Checks run in this order: the order exists, it is not soft-deleted,
    /// `target` names a known status, and the current status has an edge to
    /// it. The store then writes the new status and its history row in one
    /// step, provided the order is still in the status that was checked. If
    /// another writer got there first, the checks are repeated against the
    /// fresh order. On success an `ORDER_UPDATE` goes out to subscribers.
    #[instrument(skip(self, order_id), fields(order_id = %order_id))]
    pub async fn change_status(&self, order_id: &OrderId, target: &str) -> Result<Order, OrderError> {
        let mut attempt = 1;
        loop {
            let order = self.repository.get_order_by_id(order_id).await?;
            if order.is_deleted() {
                warn!("Status change on deleted order rejected");
                return Err(OrderError::Deleted(order_id.to_string()));
            }

            let target: OrderStatus = target.parse()?;
            if !order.status.can_transition_to(target) {
                warn!(from = %order.status, to = %target, "Illegal transition rejected");
                return Err(OrderError::InvalidTransition {
                    from: order.status,
                    to: target,
                });
            }

            let entry = StatusHistory::record(order_id.clone(), target);
            match self
                .repository
                .transition_status(order_id, order.status, entry)
                .await
            {
                Ok(updated) => {
                    info!(from = %order.status, to = %target, "Status changed");
                    self.notify(&updated).await;
                    return Ok(updated);
                }
                Err(RepositoryError::Conflict(reason)) if attempt < MAX_WRITE_ATTEMPTS => {
                    debug!(attempt, %reason, "Order changed underneath, re-checking");
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Broadcasts a driver position for an existing order.
    #[instrument(skip(self, order_id), fields(order_id = %order_id))]
    pub async fn update_driver_location(
        &self,
        order_id: &OrderId,
        latitude: f64,
        longitude: f64,
    ) -> Result<usize, OrderError> {
        self.repository.get_order_by_id(order_id).await?;
        let delivered = self
            .hub
            .publish_location_update(order_id.clone(), LocationUpdateData::new(latitude, longitude))
            .await?;
        debug!(delivered, "Location published");
        Ok(delivered)
    }

    #[instrument(skip(self, order_id), fields(order_id = %order_id))]
    pub async fn assign_driver(&self, order_id: &OrderId, driver_id: &str) -> Result<Order, OrderError> {
        let order = self.repository.get_order_by_id(order_id).await?;
        if order.is_deleted() {
            return Err(OrderError::Deleted(order_id.to_string()));
        }
        self.repository.assign_driver_to_order(order_id, driver_id).await?;
        info!(%driver_id, "Driver assigned");

        let updated = self.repository.get_order_by_id(order_id).await?;
        self.notify(&updated).await;
        Ok(updated)
    }

    /// Flags the order as deleted and records a `DELETED` audit row.
    ///
    /// Only orders that have not started moving (or were cancelled) may be
    /// deleted. The lifecycle status itself is left untouched.
    #[instrument(skip(self, order_id), fields(order_id = %order_id))]
    pub async fn soft_delete(&self, order_id: &OrderId) -> Result<Order, OrderError> {
        let mut attempt = 1;
        loop {
            let order = self.repository.get_order_by_id(order_id).await?;
            if order.is_deleted() {
                return Err(OrderError::Deleted(order_id.to_string()));
            }
            if !order.status.allows_soft_delete() {
                return Err(OrderError::InvalidState {
                    order_id: order_id.to_string(),
                    action: "deleted",
                    status: order.status,
                });
            }

            let entry = StatusHistory::record(order_id.clone(), OrderStatus::Deleted);
            match self
                .repository
                .set_deleted(order_id, true, order.status, entry)
                .await
            {
                Ok(deleted) => {
                    info!("Order soft-deleted");
                    return Ok(deleted);
                }
                Err(RepositoryError::Conflict(reason)) if attempt < MAX_WRITE_ATTEMPTS => {
                    debug!(attempt, %reason, "Order changed underneath, re-checking");
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Clears the deletion flag and records a `RESTORED` audit row.
    #[instrument(skip(self, order_id), fields(order_id = %order_id))]
    pub async fn restore(&self, order_id: &OrderId) -> Result<Order, OrderError> {
        let mut attempt = 1;
        loop {
            let order = self.repository.get_order_by_id(order_id).await?;
            if !order.is_deleted() {
                return Err(OrderError::NotDeleted(order_id.to_string()));
            }

            let entry = StatusHistory::record(order_id.clone(), OrderStatus::Restored);
            match self
                .repository
                .set_deleted(order_id, false, order.status, entry)
                .await
            {
                Ok(restored) => {
                    info!("Order restored");
                    return Ok(restored);
                }
                Err(RepositoryError::Conflict(reason)) if attempt < MAX_WRITE_ATTEMPTS => {
                    debug!(attempt, %reason, "Order changed underneath, re-checking");
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn notify(&self, order: &Order) {
        match self
            .hub
            .publish_order_update(order.id.clone(), OrderUpdateData::for_order(order))
            .await
        {
            Ok(delivered) => debug!(order_id = %order.id, delivered, "Order update published"),
            Err(e) => warn!(order_id = %order.id, error = %e, "Order update not published"),
        }
    }
}
