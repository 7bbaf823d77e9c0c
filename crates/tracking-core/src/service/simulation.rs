//! # Automated Order Runs
//!
//! [`SimulationService`] walks a `PENDING` order through the happy path on its
//! own, for demos and manual testing:
//!
//! ```text
//! assign driver ─► wait ─► ACCEPTED ─► wait ─► PICKED_UP ─► wait ─► IN_TRANSIT ─► wait ─► DELIVERED
//!                                                                      │
//!                                                                      └─► driver movement (N location pings)
//! ```
//!
//! Every status change goes through [`OrderService`], so the run obeys the
//! transition graph and produces the same broadcasts as a manual change. A
//! step that fails ends the run; nothing is retried. Runs can be cancelled
//! through their [`SimulationHandle`] or by order id. The movement pings
//! belong to the run: it waits for them before finishing, and cancelling the
//! run stops them.

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{Coordinate, DelayRange, SimulationConfig};
use crate::error::OrderError;
use crate::model::{Driver, OrderId};
use crate::service::OrderService;
use crate::status::OrderStatus;
use crate::store::DriverDirectory;

type Registry = Arc<Mutex<HashMap<OrderId, Arc<watch::Sender<bool>>>>>;

/// Result of the driver-assignment step.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverAssignment {
    Assigned(Driver),
    /// No usable driver: the run continues with a stand-in.
    Simulated,
}

/// How a background run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SimulationOutcome {
    Completed,
    Cancelled,
    Failed(OrderError),
    /// The task itself died.
    Aborted(String),
}

/// Progress report for an order along the happy path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationStatus {
    pub order_id: OrderId,
    pub tracking_number: String,
    pub current_status: OrderStatus,
    pub has_driver: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver_id: Option<String>,
    /// 1-based position on the happy path, 0 when off it.
    pub current_step: usize,
    pub total_steps: usize,
    pub remaining_steps: Vec<OrderStatus>,
    pub completed: bool,
    pub running: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Control over one background run.
///
/// Dropping the handle leaves the run going.
#[derive(Debug)]
pub struct SimulationHandle {
    order_id: OrderId,
    signal: Arc<watch::Sender<bool>>,
    task: JoinHandle<SimulationOutcome>,
}

impl SimulationHandle {
    pub fn order_id(&self) -> &OrderId {
        &self.order_id
    }

    /// Stops the run at its next wait.
    pub fn cancel(&self) {
        self.signal.send_replace(true);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub async fn wait(self) -> SimulationOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => SimulationOutcome::Aborted(e.to_string()),
        }
    }
}

/// Removes a run from the registry when its task ends, however it ends.
struct Registration {
    running: Registry,
    order_id: OrderId,
    signal: Arc<watch::Sender<bool>>,
}

impl Drop for Registration {
    fn drop(&mut self) {
        let mut running = lock(&self.running);
        if running
            .get(&self.order_id)
            .is_some_and(|current| Arc::ptr_eq(current, &self.signal))
        {
            running.remove(&self.order_id);
        }
    }
}

fn lock(
    running: &Mutex<HashMap<OrderId, Arc<watch::Sender<bool>>>>,
) -> MutexGuard<'_, HashMap<OrderId, Arc<watch::Sender<bool>>>> {
    running.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone)]
pub struct SimulationService {
    orders: OrderService,
    drivers: Arc<dyn DriverDirectory>,
    config: Arc<SimulationConfig>,
    running: Registry,
}

impl SimulationService {
    pub fn new(
        orders: OrderService,
        drivers: Arc<dyn DriverDirectory>,
        config: SimulationConfig,
    ) -> Self {
        Self {
            orders,
            drivers,
            config: Arc::new(config),
            running: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Starts a full run for a `PENDING` order and returns immediately.
    #[instrument(skip(self, order_id), fields(order_id = %order_id))]
    pub async fn simulate_order_flow(
        &self,
        order_id: &OrderId,
    ) -> Result<SimulationHandle, OrderError> {
        let order = self.orders.get_order(order_id).await?;
        if order.is_deleted() {
            return Err(OrderError::Deleted(order_id.to_string()));
        }
        if order.status != OrderStatus::Pending {
            return Err(OrderError::InvalidState {
                order_id: order_id.to_string(),
                action: "simulated",
                status: order.status,
            });
        }

        let (signal, cancel) = watch::channel(false);
        let signal = Arc::new(signal);
        {
            let mut running = lock(&self.running);
            if running.contains_key(order_id) {
                return Err(OrderError::SimulationRunning(order_id.to_string()));
            }
            running.insert(order_id.clone(), signal.clone());
        }

        let registration = Registration {
            running: self.running.clone(),
            order_id: order_id.clone(),
            signal: signal.clone(),
        };
        let service = self.clone();
        let id = order_id.clone();
        let company_id = order.company_id;
        let task = tokio::spawn(async move {
            let _registration = registration;
            service.run_flow(id, company_id, cancel).await
        });

        info!("Simulation started");
        Ok(SimulationHandle {
            order_id: order_id.clone(),
            signal,
            task,
        })
    }

    /// Cancels the running simulation for `order_id`. Returns `false` if none is running.
    pub fn cancel_simulation(&self, order_id: &OrderId) -> bool {
        match lock(&self.running).get(order_id) {
            Some(signal) => {
                signal.send_replace(true);
                info!(%order_id, "Simulation cancelled");
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self, order_id: &OrderId) -> bool {
        lock(&self.running).contains_key(order_id)
    }

    /// Runs only the driver-assignment step.
    #[instrument(skip(self, order_id), fields(order_id = %order_id))]
    pub async fn simulate_random_driver(
        &self,
        order_id: &OrderId,
    ) -> Result<DriverAssignment, OrderError> {
        let order = self.orders.get_order(order_id).await?;
        if order.is_deleted() {
            return Err(OrderError::Deleted(order_id.to_string()));
        }
        Ok(self.assign_random_driver(order_id, &order.company_id).await)
    }

    /// Starts only the movement pings for an existing order.
    #[instrument(skip(self, order_id), fields(order_id = %order_id))]
    pub async fn simulate_driver_movement(
        &self,
        order_id: &OrderId,
    ) -> Result<SimulationHandle, OrderError> {
        self.orders.get_order(order_id).await?;

        let (signal, cancel) = watch::channel(false);
        let service = self.clone();
        let id = order_id.clone();
        let task = tokio::spawn(async move { service.run_movement(id, cancel).await });

        Ok(SimulationHandle {
            order_id: order_id.clone(),
            signal: Arc::new(signal),
            task,
        })
    }

    pub async fn simulation_status(
        &self,
        order_id: &OrderId,
    ) -> Result<SimulationStatus, OrderError> {
        let order = self.orders.get_order(order_id).await?;
        let path = OrderStatus::HAPPY_PATH;
        let index = path.iter().position(|s| *s == order.status);
        let remaining_steps = match index {
            Some(i) => path[i + 1..].to_vec(),
            None => Vec::new(),
        };

        Ok(SimulationStatus {
            order_id: order.id.clone(),
            tracking_number: order.tracking_number.clone(),
            current_status: order.status,
            has_driver: order.driver.is_some(),
            driver_id: order.driver.as_ref().map(|d| d.id.clone()),
            current_step: index.map_or(0, |i| i + 1),
            total_steps: path.len(),
            remaining_steps,
            completed: order.status == OrderStatus::Delivered,
            running: self.is_running(order_id),
            created_at: order.created_at,
            updated_at: order.updated_at,
        })
    }

    /// The run stays registered until its movement pings have stopped too.
    async fn run_flow(
        &self,
        order_id: OrderId,
        company_id: String,
        mut cancel: watch::Receiver<bool>,
    ) -> SimulationOutcome {
        let mut movement = None;
        let outcome = self
            .run_steps(&order_id, &company_id, &mut cancel, &mut movement)
            .await;

        if let Some(task) = movement {
            if matches!(outcome, SimulationOutcome::Failed(_)) {
                task.abort();
            }
            match task.await {
                Ok(moved) => debug!(%order_id, ?moved, "Driver movement joined"),
                Err(e) if e.is_cancelled() => debug!(%order_id, "Driver movement aborted"),
                Err(e) => warn!(%order_id, error = %e, "Driver movement task died"),
            }
        }
        outcome
    }

    async fn run_steps(
        &self,
        order_id: &OrderId,
        company_id: &str,
        cancel: &mut watch::Receiver<bool>,
        movement: &mut Option<JoinHandle<SimulationOutcome>>,
    ) -> SimulationOutcome {
        match self.assign_random_driver(order_id, company_id).await {
            DriverAssignment::Assigned(driver) => {
                info!(%order_id, driver_id = %driver.id, "Run using real driver")
            }
            DriverAssignment::Simulated => info!(%order_id, "Run using simulated driver"),
        }

        let steps = [
            (self.config.accept_delay, OrderStatus::Accepted),
            (self.config.pickup_delay, OrderStatus::PickedUp),
            (self.config.transit_delay, OrderStatus::InTransit),
            (self.config.delivery_delay, OrderStatus::Delivered),
        ];

        for (step, (delay, target)) in steps.into_iter().enumerate() {
            let wait = random_delay(delay);
            debug!(%order_id, step = step + 1, %target, wait_ms = wait.as_millis() as u64, "Waiting");
            if !pause(wait, cancel).await {
                info!(%order_id, %target, "Run cancelled");
                return SimulationOutcome::Cancelled;
            }

            if let Err(e) = self.orders.change_status(order_id, target.as_str()).await {
                error!(%order_id, %target, error = %e, "Run halted");
                return SimulationOutcome::Failed(e);
            }

            if target == OrderStatus::InTransit {
                let service = self.clone();
                let id = order_id.clone();
                let cancel = cancel.clone();
                *movement = Some(tokio::spawn(async move { service.run_movement(id, cancel).await }));
            }
        }

        info!(%order_id, "Run completed");
        SimulationOutcome::Completed
    }

    async fn run_movement(
        &self,
        order_id: OrderId,
        mut cancel: watch::Receiver<bool>,
    ) -> SimulationOutcome {
        let steps = self.config.movement_steps;
        info!(%order_id, steps, "Driver movement started");

        for step in 0..steps {
            let point = jittered(
                waypoint(self.config.route_start, self.config.route_end, step, steps),
                self.config.jitter,
            );
            if let Err(e) = self
                .orders
                .update_driver_location(&order_id, point.latitude, point.longitude)
                .await
            {
                warn!(%order_id, step = step + 1, error = %e, "Location update failed");
            }

            if step + 1 < steps && !pause(self.config.movement_interval(), &mut cancel).await {
                info!(%order_id, step = step + 1, "Driver movement cancelled");
                return SimulationOutcome::Cancelled;
            }
        }

        info!(%order_id, "Driver movement finished");
        SimulationOutcome::Completed
    }

    async fn assign_random_driver(&self, order_id: &OrderId, company_id: &str) -> DriverAssignment {
        let drivers = match self.drivers.active_drivers(company_id).await {
            Ok(drivers) => drivers,
            Err(e) => {
                warn!(%order_id, %company_id, error = %e, "Driver lookup failed");
                return DriverAssignment::Simulated;
            }
        };

        let Some(driver) = drivers.choose(&mut rand::thread_rng()).cloned() else {
            info!(%order_id, %company_id, "No active drivers");
            return DriverAssignment::Simulated;
        };

        match self.orders.assign_driver(order_id, &driver.id).await {
            Ok(_) => DriverAssignment::Assigned(driver),
            Err(e) => {
                warn!(%order_id, driver_id = %driver.id, error = %e, "Driver assignment failed");
                DriverAssignment::Simulated
            }
        }
    }
}

fn random_delay(range: DelayRange) -> Duration {
    let ms = if range.max_ms <= range.min_ms {
        range.min_ms
    } else {
        rand::thread_rng().gen_range(range.min_ms..=range.max_ms)
    };
    Duration::from_millis(ms)
}

/// Point `step` of `steps` equal segments from `start` towards `end`.
fn waypoint(start: Coordinate, end: Coordinate, step: u32, steps: u32) -> Coordinate {
    let fraction = if steps == 0 {
        0.0
    } else {
        f64::from(step) / f64::from(steps)
    };
    Coordinate {
        latitude: start.latitude + (end.latitude - start.latitude) * fraction,
        longitude: start.longitude + (end.longitude - start.longitude) * fraction,
    }
}

fn jittered(point: Coordinate, jitter: f64) -> Coordinate {
    if jitter <= 0.0 {
        return point;
    }
    let mut rng = rand::thread_rng();
    Coordinate {
        latitude: point.latitude + rng.gen_range(-jitter..=jitter),
        longitude: point.longitude + rng.gen_range(-jitter..=jitter),
    }
}

/// Sleeps for `duration`. Returns `false` if cancelled first.
async fn pause(duration: Duration, cancel: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        _ = cancelled(cancel) => false,
    }
}

/// Resolves once the signal is raised. A dropped sender never raises it.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    if cancel.wait_for(|cancelled| *cancelled).await.is_err() {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start() -> Coordinate {
        Coordinate {
            latitude: 13.0,
            longitude: -89.0,
        }
    }

    fn end() -> Coordinate {
        Coordinate {
            latitude: 14.0,
            longitude: -88.0,
        }
    }

    #[test]
    fn test_waypoints_interpolate_linearly() {
        assert_eq!(waypoint(start(), end(), 0, 4), start());
        assert_eq!(waypoint(start(), end(), 4, 4), end());
        let mid = waypoint(start(), end(), 2, 4);
        assert!((mid.latitude - 13.5).abs() < 1e-9);
        assert!((mid.longitude + 88.5).abs() < 1e-9);
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        for _ in 0..100 {
            let p = jittered(start(), 0.0005);
            assert!((p.latitude - 13.0).abs() <= 0.0005);
            assert!((p.longitude + 89.0).abs() <= 0.0005);
        }
        assert_eq!(jittered(start(), 0.0), start());
    }

    #[test]
    fn test_random_delay_respects_range() {
        assert_eq!(random_delay(DelayRange::fixed(7)), Duration::from_millis(7));
        for _ in 0..100 {
            let d = random_delay(DelayRange::between(5, 10));
            assert!(d >= Duration::from_millis(5) && d <= Duration::from_millis(10));
        }
    }

    #[tokio::test]
    async fn test_pause_returns_false_when_cancelled() {
        let (signal, mut cancel) = watch::channel(false);
        signal.send_replace(true);
        assert!(!pause(Duration::from_secs(60), &mut cancel).await);
    }

    #[tokio::test]
    async fn test_pause_ignores_dropped_sender() {
        let (signal, mut cancel) = watch::channel(false);
        drop(signal);
        assert!(pause(Duration::from_millis(5), &mut cancel).await);
    }
}
