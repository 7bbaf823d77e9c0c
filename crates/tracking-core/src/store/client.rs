//! # Store Client
//!
//! Cloneable handle to the [`OrderStore`](super::OrderStore) actor. Each call
//! sends a [`StoreRequest`] carrying a oneshot sender and awaits the reply.

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::error::RepositoryError;
use crate::model::{Driver, Order, OrderCreate, OrderId, StatusHistory};
use crate::status::OrderStatus;
use crate::store::message::{Response, StoreRequest};
use crate::store::{DriverDirectory, OrderRepository};

#[derive(Clone)]
pub struct OrderStoreClient {
    sender: mpsc::Sender<StoreRequest>,
}

impl OrderStoreClient {
    pub fn new(sender: mpsc::Sender<StoreRequest>) -> Self {
        Self { sender }
    }

    async fn call<T>(
        &self,
        request: impl FnOnce(Response<T>) -> StoreRequest,
    ) -> Result<T, RepositoryError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(request(respond_to))
            .await
            .map_err(|_| RepositoryError::StoreClosed)?;
        response.await.map_err(|_| RepositoryError::StoreDropped)?
    }

    /// Registers a driver so it can be listed and assigned.
    pub async fn add_driver(&self, driver: Driver) -> Result<(), RepositoryError> {
        self.call(|respond_to| StoreRequest::AddDriver { driver, respond_to })
            .await
    }

    /// Asks the actor to stop. Pending requests queued behind this one are dropped.
    pub async fn shutdown(&self) -> Result<(), RepositoryError> {
        self.sender
            .send(StoreRequest::Shutdown)
            .await
            .map_err(|_| RepositoryError::StoreClosed)
    }
}

#[async_trait]
impl OrderRepository for OrderStoreClient {
    async fn create_order(&self, params: OrderCreate) -> Result<Order, RepositoryError> {
        self.call(|respond_to| StoreRequest::Create { params, respond_to })
            .await
    }

    async fn get_order_by_id(&self, id: &OrderId) -> Result<Order, RepositoryError> {
        let id = id.clone();
        self.call(|respond_to| StoreRequest::Get { id, respond_to })
            .await
    }

    async fn transition_status(
        &self,
        id: &OrderId,
        from: OrderStatus,
        entry: StatusHistory,
    ) -> Result<Order, RepositoryError> {
        let id = id.clone();
        self.call(|respond_to| StoreRequest::Transition {
            id,
            from,
            entry,
            respond_to,
        })
        .await
    }

    async fn assign_driver_to_order(
        &self,
        id: &OrderId,
        driver_id: &str,
    ) -> Result<(), RepositoryError> {
        let id = id.clone();
        let driver_id = driver_id.to_string();
        self.call(|respond_to| StoreRequest::AssignDriver {
            id,
            driver_id,
            respond_to,
        })
        .await
    }

    async fn set_deleted(
        &self,
        id: &OrderId,
        deleted: bool,
        status: OrderStatus,
        entry: StatusHistory,
    ) -> Result<Order, RepositoryError> {
        let id = id.clone();
        self.call(|respond_to| StoreRequest::SetDeleted {
            id,
            deleted,
            status,
            entry,
            respond_to,
        })
        .await
    }
}

#[async_trait]
impl DriverDirectory for OrderStoreClient {
    async fn active_drivers(&self, company_id: &str) -> Result<Vec<Driver>, RepositoryError> {
        let company_id = company_id.to_string();
        self.call(|respond_to| StoreRequest::ActiveDrivers {
            company_id,
            respond_to,
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::OrderStore;

    fn params() -> OrderCreate {
        OrderCreate {
            company_id: "company_1".into(),
            company_name: "Acme".into(),
            delivery_deadline: None,
        }
    }

    fn driver(id: &str, company_id: &str, active: bool) -> Driver {
        Driver {
            id: id.into(),
            company_id: company_id.into(),
            full_name: format!("Driver {}", id),
            active,
        }
    }

    fn entry(id: &OrderId, status: OrderStatus) -> StatusHistory {
        StatusHistory::record(id.clone(), status)
    }

    #[tokio::test]
    async fn test_transition_writes_status_and_history_together() {
        let (store, client) = OrderStore::new(8);
        let handle = tokio::spawn(store.run());

        let order = client.create_order(params()).await.unwrap();
        let returned = client
            .transition_status(&order.id, OrderStatus::Pending, entry(&order.id, OrderStatus::Accepted))
            .await
            .unwrap();
        assert_eq!(returned.status, OrderStatus::Accepted);

        let stored = client.get_order_by_id(&order.id).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Accepted);
        assert_eq!(stored.history.len(), 2);
        assert_eq!(stored.history[1].status, OrderStatus::Accepted);

        drop(client);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_stale_transition_writes_nothing() {
        let (store, client) = OrderStore::new(8);
        tokio::spawn(store.run());

        let order = client.create_order(params()).await.unwrap();
        client
            .transition_status(&order.id, OrderStatus::Pending, entry(&order.id, OrderStatus::Cancelled))
            .await
            .unwrap();

        let err = client
            .transition_status(&order.id, OrderStatus::Pending, entry(&order.id, OrderStatus::Accepted))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));

        let stored = client.get_order_by_id(&order.id).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Cancelled);
        let statuses: Vec<OrderStatus> = stored.history.iter().map(|h| h.status).collect();
        assert_eq!(statuses, vec![OrderStatus::Pending, OrderStatus::Cancelled]);
    }

    #[tokio::test]
    async fn test_deleted_order_refuses_transition() {
        let (store, client) = OrderStore::new(8);
        tokio::spawn(store.run());

        let order = client.create_order(params()).await.unwrap();
        let deleted = client
            .set_deleted(&order.id, true, OrderStatus::Pending, entry(&order.id, OrderStatus::Deleted))
            .await
            .unwrap();
        assert!(deleted.is_deleted());

        assert!(matches!(
            client
                .transition_status(&order.id, OrderStatus::Pending, entry(&order.id, OrderStatus::Accepted))
                .await,
            Err(RepositoryError::Conflict(_))
        ));
        assert!(matches!(
            client
                .set_deleted(&order.id, true, OrderStatus::Pending, entry(&order.id, OrderStatus::Deleted))
                .await,
            Err(RepositoryError::Conflict(_))
        ));

        let stored = client.get_order_by_id(&order.id).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Pending);
        assert_eq!(stored.history.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_order_is_not_found() {
        let (store, client) = OrderStore::new(8);
        tokio::spawn(store.run());

        let err = client
            .get_order_by_id(&OrderId::from("nope"))
            .await
            .unwrap_err();
        assert_eq!(err, RepositoryError::NotFound("nope".into()));
    }

    #[tokio::test]
    async fn test_active_drivers_filters_by_company_and_flag() {
        let (store, client) = OrderStore::new(8);
        tokio::spawn(store.run());

        client.add_driver(driver("d1", "company_1", true)).await.unwrap();
        client.add_driver(driver("d2", "company_1", false)).await.unwrap();
        client.add_driver(driver("d3", "company_2", true)).await.unwrap();

        let drivers = client.active_drivers("company_1").await.unwrap();
        assert_eq!(drivers.len(), 1);
        assert_eq!(drivers[0].id, "d1");
    }

    #[tokio::test]
    async fn test_inactive_or_unknown_driver_cannot_be_assigned() {
        let (store, client) = OrderStore::new(8);
        tokio::spawn(store.run());

        let order = client.create_order(params()).await.unwrap();
        client.add_driver(driver("d2", "company_1", false)).await.unwrap();

        assert!(client.assign_driver_to_order(&order.id, "d2").await.is_err());
        assert_eq!(
            client.assign_driver_to_order(&order.id, "ghost").await,
            Err(RepositoryError::NotFound("ghost".into()))
        );
    }

    #[tokio::test]
    async fn test_shutdown_stops_actor_while_clients_live() {
        let (store, client) = OrderStore::new(8);
        let handle = tokio::spawn(store.run());

        client.shutdown().await.unwrap();
        handle.await.unwrap();

        assert_eq!(
            client.create_order(params()).await.unwrap_err(),
            RepositoryError::StoreClosed
        );
    }
}
