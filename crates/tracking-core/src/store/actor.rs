//! # In-Memory Order Store
//!
//! The "server" half of the store: it owns the order and driver tables and the
//! receiving end of the request channel. Requests are handled one at a time,
//! so the tables need no locks.

use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::RepositoryError;
use crate::model::{Driver, Order, OrderId, StatusHistory};
use crate::status::OrderStatus;
use crate::store::client::OrderStoreClient;
use crate::store::message::StoreRequest;

/// Actor owning every order and driver record.
///
/// # Usage Pattern
///
/// 1. **Create**: [`OrderStore::new`] returns the actor and its client.
/// 2. **Run**: spawn [`OrderStore::run`] on the runtime.
/// 3. **Use**: clone the client into whatever needs persistence.
///
/// ```rust
/// use tracking_core::model::OrderCreate;
/// use tracking_core::store::{OrderRepository, OrderStore};
///
/// #[tokio::main]
/// async fn main() {
///     let (store, client) = OrderStore::new(16);
///     tokio::spawn(store.run());
///
///     let order = client
///         .create_order(OrderCreate {
///             company_id: "company_1".into(),
///             company_name: "Acme".into(),
///             delivery_deadline: None,
///         })
///         .await
///         .unwrap();
///     assert_eq!(client.get_order_by_id(&order.id).await.unwrap().id, order.id);
/// }
/// ```
pub struct OrderStore {
    receiver: mpsc::Receiver<StoreRequest>,
    orders: HashMap<OrderId, Order>,
    drivers: HashMap<String, Driver>,
}

impl OrderStore {
    /// Creates the store and its client.
    ///
    /// `buffer_size` is the capacity of the request channel; when it is full,
    /// client calls wait for room.
    pub fn new(buffer_size: usize) -> (Self, OrderStoreClient) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let store = Self {
            receiver,
            orders: HashMap::new(),
            drivers: HashMap::new(),
        };
        (store, OrderStoreClient::new(sender))
    }

    /// Processes requests until every client is dropped or a shutdown request arrives.
    pub async fn run(mut self) {
        info!("Order store started");

        while let Some(msg) = self.receiver.recv().await {
            match msg {
                StoreRequest::Create { params, respond_to } => {
                    debug!(?params, "Create");
                    let order = Order::new(OrderId::generate(), params);
                    self.orders.insert(order.id.clone(), order.clone());
                    info!(order_id = %order.id, tracking_number = %order.tracking_number, size = self.orders.len(), "Created");
                    let _ = respond_to.send(Ok(order));
                }
                StoreRequest::Get { id, respond_to } => {
                    let result = self
                        .orders
                        .get(&id)
                        .cloned()
                        .ok_or_else(|| RepositoryError::NotFound(id.to_string()));
                    debug!(order_id = %id, found = result.is_ok(), "Get");
                    let _ = respond_to.send(result);
                }
                StoreRequest::Transition {
                    id,
                    from,
                    entry,
                    respond_to,
                } => {
                    let to = entry.status;
                    let result = self.transition(&id, from, entry);
                    match &result {
                        Ok(_) => info!(order_id = %id, %from, %to, "Status updated"),
                        Err(e) => warn!(order_id = %id, %from, %to, error = %e, "Transition refused"),
                    }
                    let _ = respond_to.send(result);
                }
                StoreRequest::AssignDriver {
                    id,
                    driver_id,
                    respond_to,
                } => {
                    let result = match self.drivers.get(&driver_id).cloned() {
                        Some(driver) if driver.active => self.order_mut(&id).map(|order| {
                            order.driver = Some(driver);
                            order.updated_at = Utc::now();
                        }),
                        Some(_) => Err(RepositoryError::Storage(format!(
                            "driver {} is inactive",
                            driver_id
                        ))),
                        None => Err(RepositoryError::NotFound(driver_id.clone())),
                    };
                    match &result {
                        Ok(()) => info!(order_id = %id, %driver_id, "Driver assigned"),
                        Err(e) => warn!(order_id = %id, %driver_id, error = %e, "Driver assignment failed"),
                    }
                    let _ = respond_to.send(result);
                }
                StoreRequest::SetDeleted {
                    id,
                    deleted,
                    status,
                    entry,
                    respond_to,
                } => {
                    let result = self.set_deleted(&id, deleted, status, entry);
                    match &result {
                        Ok(_) => info!(order_id = %id, deleted, "Deletion flag updated"),
                        Err(e) => warn!(order_id = %id, deleted, error = %e, "Deletion flag refused"),
                    }
                    let _ = respond_to.send(result);
                }
                StoreRequest::AddDriver { driver, respond_to } => {
                    info!(driver_id = %driver.id, company_id = %driver.company_id, "Driver added");
                    self.drivers.insert(driver.id.clone(), driver);
                    let _ = respond_to.send(Ok(()));
                }
                StoreRequest::ActiveDrivers {
                    company_id,
                    respond_to,
                } => {
                    let mut drivers: Vec<Driver> = self
                        .drivers
                        .values()
                        .filter(|d| d.active && d.company_id == company_id)
                        .cloned()
                        .collect();
                    drivers.sort_by(|a, b| a.id.cmp(&b.id));
                    debug!(%company_id, count = drivers.len(), "Active drivers");
                    let _ = respond_to.send(Ok(drivers));
                }
                StoreRequest::Shutdown => break,
            }
        }

        info!(size = self.orders.len(), "Order store shutdown");
    }

    fn transition(
        &mut self,
        id: &OrderId,
        from: OrderStatus,
        entry: StatusHistory,
    ) -> Result<Order, RepositoryError> {
        let order = self.order_mut(id)?;
        if order.is_deleted() {
            return Err(RepositoryError::Conflict(format!("order {} is deleted", id)));
        }
        if order.status != from {
            return Err(RepositoryError::Conflict(format!(
                "order {} is {}, expected {}",
                id, order.status, from
            )));
        }
        order.status = entry.status;
        order.updated_at = entry.created_at;
        order.history.push(entry);
        Ok(order.clone())
    }

    fn set_deleted(
        &mut self,
        id: &OrderId,
        deleted: bool,
        status: OrderStatus,
        entry: StatusHistory,
    ) -> Result<Order, RepositoryError> {
        let order = self.order_mut(id)?;
        if order.is_deleted() == deleted {
            return Err(RepositoryError::Conflict(format!(
                "order {} deletion flag is already {}",
                id, deleted
            )));
        }
        if order.status != status {
            return Err(RepositoryError::Conflict(format!(
                "order {} is {}, expected {}",
                id, order.status, status
            )));
        }
        order.deleted_at = deleted.then_some(entry.created_at);
        order.updated_at = entry.created_at;
        order.history.push(entry);
        Ok(order.clone())
    }

    fn order_mut(&mut self, id: &OrderId) -> Result<&mut Order, RepositoryError> {
        self.orders.get_mut(id).ok_or_else(|| {
            warn!(order_id = %id, "Not found");
            RepositoryError::NotFound(id.to_string())
        })
    }
}
