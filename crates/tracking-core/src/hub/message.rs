//! Requests understood by the [`Hub`](super::Hub) actor.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use crate::hub::connection::{ConnectionHandle, ConnectionId};
use crate::model::{OrderId, ServerMessage, ServerPayload};

/// Registry counters reported by [`HubClient::stats`](super::HubClient::stats).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HubStats {
    pub connections: usize,
    /// Orders with at least one subscriber.
    pub orders: usize,
    /// Total `(order, connection)` pairings.
    pub subscriptions: usize,
}

#[derive(Debug)]
pub enum HubRequest {
    Register {
        connection: Arc<ConnectionHandle>,
        outbound: mpsc::Sender<Arc<ServerMessage>>,
        respond_to: oneshot::Sender<()>,
    },
    Unregister {
        id: ConnectionId,
        respond_to: oneshot::Sender<()>,
    },
    Subscribe {
        id: ConnectionId,
        order_id: OrderId,
        respond_to: oneshot::Sender<bool>,
    },
    Unsubscribe {
        id: ConnectionId,
        order_id: OrderId,
        respond_to: oneshot::Sender<bool>,
    },
    /// Replies with the number of queues the message was placed on.
    Publish {
        order_id: OrderId,
        payload: ServerPayload,
        respond_to: oneshot::Sender<usize>,
    },
    Stats {
        respond_to: oneshot::Sender<HubStats>,
    },
    SubscriberCount {
        order_id: OrderId,
        respond_to: oneshot::Sender<usize>,
    },
    /// Cancels every connection and stops the loop.
    Shutdown {
        respond_to: oneshot::Sender<()>,
    },
}
