use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::error::HubError;
use crate::hub::connection::{ConnectionHandle, ConnectionId};
use crate::hub::message::{HubRequest, HubStats};
use crate::model::{
    ErrorData, LocationUpdateData, OrderId, OrderUpdateData, ServerMessage, ServerPayload,
};

/// Cloneable handle to the [`Hub`](super::Hub).
///
/// Every call waits for the hub to apply the request, so once a publish
/// returns the message is already sitting in each subscriber's queue.
#[derive(Clone)]
pub struct HubClient {
    sender: mpsc::Sender<HubRequest>,
}

impl HubClient {
    pub fn new(sender: mpsc::Sender<HubRequest>) -> Self {
        Self { sender }
    }

    async fn call<T>(
        &self,
        request: impl FnOnce(oneshot::Sender<T>) -> HubRequest,
    ) -> Result<T, HubError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(request(respond_to))
            .await
            .map_err(|_| HubError::Closed)?;
        response.await.map_err(|_| HubError::Dropped)
    }

    /// Adds a connection to the live set. `outbound` must be the only sender
    /// of the connection's queue.
    pub async fn register(
        &self,
        connection: Arc<ConnectionHandle>,
        outbound: mpsc::Sender<Arc<ServerMessage>>,
    ) -> Result<(), HubError> {
        self.call(|respond_to| HubRequest::Register {
            connection,
            outbound,
            respond_to,
        })
        .await
    }

    /// Removes the connection and all of its subscriptions. Safe to repeat.
    pub async fn unregister(&self, id: ConnectionId) -> Result<(), HubError> {
        self.call(|respond_to| HubRequest::Unregister { id, respond_to })
            .await
    }

    /// Returns `false` when the pairing already existed or the connection is unknown.
    pub async fn subscribe(&self, id: ConnectionId, order_id: OrderId) -> Result<bool, HubError> {
        self.call(|respond_to| HubRequest::Subscribe {
            id,
            order_id,
            respond_to,
        })
        .await
    }

    /// Returns `false` when there was nothing to remove.
    pub async fn unsubscribe(
        &self,
        id: ConnectionId,
        order_id: OrderId,
    ) -> Result<bool, HubError> {
        self.call(|respond_to| HubRequest::Unsubscribe {
            id,
            order_id,
            respond_to,
        })
        .await
    }

    /// Broadcasts an `ORDER_UPDATE`. Returns how many subscribers it reached.
    pub async fn publish_order_update(
        &self,
        order_id: OrderId,
        data: OrderUpdateData,
    ) -> Result<usize, HubError> {
        self.publish(order_id, ServerPayload::OrderUpdate(data))
            .await
    }

    /// Broadcasts a `LOCATION`. Returns how many subscribers it reached.
    pub async fn publish_location_update(
        &self,
        order_id: OrderId,
        data: LocationUpdateData,
    ) -> Result<usize, HubError> {
        self.publish(order_id, ServerPayload::Location(data)).await
    }

    pub async fn publish_error(
        &self,
        order_id: OrderId,
        data: ErrorData,
    ) -> Result<usize, HubError> {
        self.publish(order_id, ServerPayload::Error(data)).await
    }

    async fn publish(&self, order_id: OrderId, payload: ServerPayload) -> Result<usize, HubError> {
        debug!(%order_id, kind = payload.kind(), "Sending publish to hub");
        self.call(|respond_to| HubRequest::Publish {
            order_id,
            payload,
            respond_to,
        })
        .await
    }

    pub async fn stats(&self) -> Result<HubStats, HubError> {
        self.call(|respond_to| HubRequest::Stats { respond_to })
            .await
    }

    pub async fn subscriber_count(&self, order_id: OrderId) -> Result<usize, HubError> {
        self.call(|respond_to| HubRequest::SubscriberCount {
            order_id,
            respond_to,
        })
        .await
    }

    /// Cancels every connection and stops the hub.
    pub async fn shutdown(&self) -> Result<(), HubError> {
        self.call(|respond_to| HubRequest::Shutdown { respond_to })
            .await
    }
}
