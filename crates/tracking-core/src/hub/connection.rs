//! State a connection shares with the hub.

use serde::Serialize;
use std::collections::HashSet;
use std::fmt::Display;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use crate::model::{OrderId, ServerMessage};

/// Type-safe identifier for a live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Identity, subscriptions and cancellation signal of one connection.
///
/// Held in an `Arc` by both the connection's own loops and the hub. The
/// subscription set is guarded by a plain mutex: it is only ever held for a
/// single insert, remove or lookup, never across an await.
#[derive(Debug)]
pub struct ConnectionHandle {
    id: ConnectionId,
    user_id: String,
    subscriptions: Mutex<HashSet<OrderId>>,
    cancel: watch::Sender<bool>,
}

impl ConnectionHandle {
    pub fn new(user_id: impl Into<String>) -> Arc<Self> {
        let (cancel, _) = watch::channel(false);
        Arc::new(Self {
            id: ConnectionId::new(),
            user_id: user_id.into(),
            subscriptions: Mutex::new(HashSet::new()),
            cancel,
        })
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn is_subscribed(&self, order_id: &OrderId) -> bool {
        self.lock().contains(order_id)
    }

    /// Snapshot of the subscribed order ids, sorted.
    pub fn subscriptions(&self) -> Vec<OrderId> {
        let mut ids: Vec<OrderId> = self.lock().iter().cloned().collect();
        ids.sort();
        ids
    }

    /// Signals both connection loops to stop. Idempotent.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.cancel.subscribe();
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    pub(crate) fn add_subscription(&self, order_id: OrderId) -> bool {
        self.lock().insert(order_id)
    }

    pub(crate) fn remove_subscription(&self, order_id: &OrderId) -> bool {
        self.lock().remove(order_id)
    }

    pub(crate) fn take_subscriptions(&self) -> Vec<OrderId> {
        self.lock().drain().collect()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<OrderId>> {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// A registered connection as the hub stores it.
///
/// The hub keeps the only sender of the outbound queue, so dropping a
/// `Subscriber` closes the queue and ends the connection's writer loop.
pub(crate) struct Subscriber {
    pub(crate) handle: Arc<ConnectionHandle>,
    pub(crate) outbound: mpsc::Sender<Arc<ServerMessage>>,
}
