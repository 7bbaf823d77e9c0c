use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, info, warn};

use crate::hub::client::HubClient;
use crate::hub::connection::{ConnectionHandle, ConnectionId, Subscriber};
use crate::hub::message::{HubRequest, HubStats};
use crate::model::{OrderId, ServerMessage, ServerPayload};

/// The subscription registry.
///
/// A single task owns both maps; every mutation arrives as a [`HubRequest`]
/// and is applied in arrival order. The loop never awaits anything except its
/// own input queue: deliveries use `try_send`, and a subscriber whose queue is
/// full is unregistered on the spot.
pub struct Hub {
    receiver: mpsc::Receiver<HubRequest>,
    connections: HashMap<ConnectionId, Subscriber>,
    orders: HashMap<OrderId, HashSet<ConnectionId>>,
}

impl Hub {
    pub fn new(buffer_size: usize) -> (Self, HubClient) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let hub = Self {
            receiver,
            connections: HashMap::new(),
            orders: HashMap::new(),
        };
        (hub, HubClient::new(sender))
    }

    pub async fn run(mut self) {
        info!("Hub started");

        while let Some(msg) = self.receiver.recv().await {
            match msg {
                HubRequest::Register {
                    connection,
                    outbound,
                    respond_to,
                } => {
                    self.register(connection, outbound);
                    let _ = respond_to.send(());
                }
                HubRequest::Unregister { id, respond_to } => {
                    self.unregister(id);
                    let _ = respond_to.send(());
                }
                HubRequest::Subscribe {
                    id,
                    order_id,
                    respond_to,
                } => {
                    let added = self.subscribe(id, order_id);
                    let _ = respond_to.send(added);
                }
                HubRequest::Unsubscribe {
                    id,
                    order_id,
                    respond_to,
                } => {
                    let removed = self.unsubscribe(id, &order_id);
                    let _ = respond_to.send(removed);
                }
                HubRequest::Publish {
                    order_id,
                    payload,
                    respond_to,
                } => {
                    let delivered = self.publish(order_id, payload);
                    let _ = respond_to.send(delivered);
                }
                HubRequest::Stats { respond_to } => {
                    let _ = respond_to.send(self.stats());
                }
                HubRequest::SubscriberCount {
                    order_id,
                    respond_to,
                } => {
                    let count = self.orders.get(&order_id).map_or(0, HashSet::len);
                    let _ = respond_to.send(count);
                }
                HubRequest::Shutdown { respond_to } => {
                    self.close_all();
                    let _ = respond_to.send(());
                    break;
                }
            }
        }

        // Every client dropped: release whatever is still registered.
        self.close_all();
        info!("Hub shutdown");
    }

    fn register(
        &mut self,
        handle: Arc<ConnectionHandle>,
        outbound: mpsc::Sender<Arc<ServerMessage>>,
    ) {
        let id = handle.id();
        info!(connection_id = %id, user_id = %handle.user_id(), "Connection registered");
        self.connections.insert(id, Subscriber { handle, outbound });
        debug!(clients = self.connections.len(), "Registry size");
    }

    fn unregister(&mut self, id: ConnectionId) {
        let Some(subscriber) = self.connections.remove(&id) else {
            debug!(connection_id = %id, "Unregister for unknown connection");
            return;
        };

        subscriber.handle.cancel();
        for order_id in subscriber.handle.take_subscriptions() {
            self.detach(&order_id, id);
        }
        info!(
            connection_id = %id,
            user_id = %subscriber.handle.user_id(),
            clients = self.connections.len(),
            "Connection unregistered"
        );
        // Dropping the subscriber drops the last sender and closes the queue.
    }

    fn subscribe(&mut self, id: ConnectionId, order_id: OrderId) -> bool {
        let Some(subscriber) = self.connections.get(&id) else {
            warn!(connection_id = %id, %order_id, "Subscribe from unregistered connection");
            return false;
        };
        if !subscriber.handle.add_subscription(order_id.clone()) {
            debug!(connection_id = %id, %order_id, "Already subscribed");
            return false;
        }
        let subscribers = self.orders.entry(order_id.clone()).or_default();
        subscribers.insert(id);
        info!(connection_id = %id, %order_id, clients = subscribers.len(), "Subscribed");
        true
    }

    fn unsubscribe(&mut self, id: ConnectionId, order_id: &OrderId) -> bool {
        let removed = self
            .connections
            .get(&id)
            .is_some_and(|s| s.handle.remove_subscription(order_id));
        if removed {
            self.detach(order_id, id);
            info!(connection_id = %id, %order_id, "Unsubscribed");
        } else {
            debug!(connection_id = %id, %order_id, "Unsubscribe without subscription");
        }
        removed
    }

    fn detach(&mut self, order_id: &OrderId, id: ConnectionId) {
        if let Some(subscribers) = self.orders.get_mut(order_id) {
            subscribers.remove(&id);
            if subscribers.is_empty() {
                self.orders.remove(order_id);
            }
        }
    }

    fn publish(&mut self, order_id: OrderId, payload: ServerPayload) -> usize {
        let targets: Vec<ConnectionId> = match self.orders.get(&order_id) {
            Some(subscribers) => subscribers.iter().copied().collect(),
            None => {
                debug!(%order_id, kind = payload.kind(), "No subscribers");
                return 0;
            }
        };

        let kind = payload.kind();
        let message = match ServerMessage::encode(Some(order_id.clone()), payload) {
            Ok(message) => message,
            Err(e) => {
                error!(%order_id, kind, error = %e, "Failed to encode message");
                return 0;
            }
        };

        let mut delivered = 0;
        let mut dropped = Vec::new();
        for id in targets {
            let Some(subscriber) = self.connections.get(&id) else {
                continue;
            };
            match subscriber.outbound.try_send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(connection_id = %id, %order_id, "Outbound queue full, dropping connection");
                    dropped.push(id);
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(connection_id = %id, %order_id, "Outbound queue closed");
                    dropped.push(id);
                }
            }
        }
        for id in dropped {
            self.unregister(id);
        }

        debug!(%order_id, kind, delivered, "Published");
        delivered
    }

    fn stats(&self) -> HubStats {
        HubStats {
            connections: self.connections.len(),
            orders: self.orders.len(),
            subscriptions: self.orders.values().map(HashSet::len).sum(),
        }
    }

    fn close_all(&mut self) {
        for (_, subscriber) in self.connections.drain() {
            subscriber.handle.cancel();
            subscriber.handle.take_subscriptions();
        }
        self.orders.clear();
    }
}
