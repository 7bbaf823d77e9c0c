//! # Subscription Hub
//!
//! The hub is the only owner of "which connection watches which order". It
//! runs as an actor:
//!
//! ```text
//! ConnectionActor ──subscribe/unsubscribe──┐
//!                                          ▼
//! OrderService ──────publish────────► [ Hub loop ] ──try_send──► outbound queue ──► writer loop
//!                                          │
//!                      full queue ◄────────┘ unregister + cancel
//! ```
//!
//! - [`Hub`] owns the registry and processes [`HubRequest`]s one at a time.
//! - [`HubClient`] is the cloneable front door; every call awaits the hub's reply.
//! - [`ConnectionHandle`] is the state a connection shares with the hub: its
//!   id, user, subscription set and cancellation signal.
//!
//! Delivery is at-most-once. A publish to an order nobody watches is a no-op,
//! and a subscriber that cannot keep up is disconnected instead of slowing
//! everyone else down.

pub mod actor;
pub mod client;
pub mod connection;
pub mod message;

pub use actor::Hub;
pub use client::HubClient;
pub use connection::{ConnectionHandle, ConnectionId};
pub use message::{HubRequest, HubStats};
