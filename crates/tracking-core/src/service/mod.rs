//! Order lifecycle services.
//!
//! [`OrderService`] is the only path that mutates orders. [`SimulationService`]
//! drives orders through it automatically.

pub mod order_service;
pub mod simulation;

pub use order_service::OrderService;
pub use simulation::{
    DriverAssignment, SimulationHandle, SimulationOutcome, SimulationService, SimulationStatus,
};
