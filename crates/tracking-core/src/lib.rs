//! # Real-Time Order Tracking
//!
//! Pushes order-status and driver-location events to connected observers, and
//! gates every status change through the order lifecycle graph.
//!
//! ## Core Components
//!
//! - **[status]**: [`OrderStatus`](status::OrderStatus) and its transition graph.
//! - **[model]**: orders, history rows and the JSON wire envelope.
//! - **[store]**: persistence traits plus an in-memory store actor and a scripted mock.
//! - **[hub]**: the subscription registry actor and its client.
//! - **[connection]**: the per-connection actor (reader + writer loops).
//! - **[service]**: [`OrderService`](service::OrderService) and
//!   [`SimulationService`](service::SimulationService).
//! - **[lifecycle]**: [`TrackingSystem`](lifecycle::TrackingSystem) wiring and tracing setup.
//!
//! ## Flow
//!
//! ```text
//! change_status ─► transition check ─► store ─► Hub ─► outbound queues ─► writer loops
//! ```
//!
//! ## Testing
//!
//! See [`store::mock`] for injecting repository failures without a running store.

pub mod config;
pub mod connection;
pub mod error;
pub mod hub;
pub mod lifecycle;
pub mod model;
pub mod service;
pub mod status;
pub mod store;
