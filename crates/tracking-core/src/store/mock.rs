//! # Scripted Repository for Tests
//!
//! [`MockOrderRepository`] hands out a real [`OrderStoreClient`], but the task
//! behind it answers from a queue of expectations instead of a table. That
//! makes it easy to inject a failure at exactly one step of a service call:
//!
//! ```rust
//! use tracking_core::error::RepositoryError;
//! use tracking_core::store::mock::MockOrderRepository;
//! use tracking_core::store::OrderRepository;
//! use tracking_core::model::OrderId;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mock = MockOrderRepository::new();
//!     mock.expect_get()
//!         .return_err(RepositoryError::Storage("connection reset".into()));
//!
//!     let client = mock.client();
//!     assert!(client.get_order_by_id(&OrderId::from("o1")).await.is_err());
//!     mock.verify();
//! }
//! ```
//!
//! Expectations are consumed in order. A request that does not match the next
//! expectation is answered with [`RepositoryError::Storage`] and recorded, and
//! [`MockOrderRepository::verify`] panics on it.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

use crate::error::RepositoryError;
use crate::model::{Driver, Order};
use crate::store::client::OrderStoreClient;
use crate::store::message::StoreRequest;

type Reply<T> = Result<T, RepositoryError>;

enum Expectation {
    Create(Reply<Order>),
    Get(Reply<Order>),
    Transition(Reply<Order>),
    AssignDriver(Reply<()>),
    SetDeleted(Reply<Order>),
    ActiveDrivers(Reply<Vec<Driver>>),
}

#[derive(Default)]
struct Script {
    expectations: VecDeque<Expectation>,
    mismatches: Vec<String>,
}

fn lock(script: &Mutex<Script>) -> MutexGuard<'_, Script> {
    script.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct MockOrderRepository {
    client: OrderStoreClient,
    script: Arc<Mutex<Script>>,
    _handle: tokio::task::JoinHandle<()>,
}

impl MockOrderRepository {
    /// Creates a mock with no expectations. Must be called inside a Tokio runtime.
    pub fn new() -> Self {
        let (sender, mut receiver) = mpsc::channel::<StoreRequest>(100);
        let script = Arc::new(Mutex::new(Script::default()));
        let script_clone = script.clone();

        let handle = tokio::spawn(async move {
            while let Some(request) = receiver.recv().await {
                let expectation = lock(&script_clone).expectations.pop_front();

                match (request, expectation) {
                    (StoreRequest::Create { respond_to, .. }, Some(Expectation::Create(r))) => {
                        let _ = respond_to.send(r);
                    }
                    (StoreRequest::Get { respond_to, .. }, Some(Expectation::Get(r))) => {
                        let _ = respond_to.send(r);
                    }
                    (
                        StoreRequest::Transition { respond_to, .. },
                        Some(Expectation::Transition(r)),
                    ) => {
                        let _ = respond_to.send(r);
                    }
                    (
                        StoreRequest::AssignDriver { respond_to, .. },
                        Some(Expectation::AssignDriver(r)),
                    ) => {
                        let _ = respond_to.send(r);
                    }
                    (
                        StoreRequest::SetDeleted { respond_to, .. },
                        Some(Expectation::SetDeleted(r)),
                    ) => {
                        let _ = respond_to.send(r);
                    }
                    (
                        StoreRequest::ActiveDrivers { respond_to, .. },
                        Some(Expectation::ActiveDrivers(r)),
                    ) => {
                        let _ = respond_to.send(r);
                    }
                    (StoreRequest::Shutdown, _) => break,
                    (request, _) => {
                        let description = format!("{:?}", request);
                        let error = RepositoryError::Storage(format!(
                            "unexpected request: {}",
                            description
                        ));
                        lock(&script_clone).mismatches.push(description);
                        reject(request, error);
                    }
                }
            }
        });

        Self {
            client: OrderStoreClient::new(sender),
            script,
            _handle: handle,
        }
    }

    /// Returns a client wired to this mock.
    pub fn client(&self) -> OrderStoreClient {
        self.client.clone()
    }

    pub fn expect_create(&self) -> ExpectationBuilder<Order> {
        self.builder(Expectation::Create)
    }

    pub fn expect_get(&self) -> ExpectationBuilder<Order> {
        self.builder(Expectation::Get)
    }

    pub fn expect_transition(&self) -> ExpectationBuilder<Order> {
        self.builder(Expectation::Transition)
    }

    pub fn expect_assign_driver(&self) -> ExpectationBuilder<()> {
        self.builder(Expectation::AssignDriver)
    }

    pub fn expect_set_deleted(&self) -> ExpectationBuilder<Order> {
        self.builder(Expectation::SetDeleted)
    }

    pub fn expect_active_drivers(&self) -> ExpectationBuilder<Vec<Driver>> {
        self.builder(Expectation::ActiveDrivers)
    }

    /// Panics if an expectation was not consumed or a request matched none.
    pub fn verify(&self) {
        let script = lock(&self.script);
        if !script.mismatches.is_empty() {
            panic!("Unexpected requests: {:?}", script.mismatches);
        }
        if !script.expectations.is_empty() {
            panic!(
                "Not all expectations were met. {} remaining",
                script.expectations.len()
            );
        }
    }

    fn builder<T>(&self, wrap: fn(Reply<T>) -> Expectation) -> ExpectationBuilder<T> {
        ExpectationBuilder {
            script: self.script.clone(),
            wrap,
        }
    }
}

impl Default for MockOrderRepository {
    fn default() -> Self {
        Self::new()
    }
}

fn reject(request: StoreRequest, error: RepositoryError) {
    match request {
        StoreRequest::Create { respond_to, .. }
        | StoreRequest::Get { respond_to, .. }
        | StoreRequest::Transition { respond_to, .. }
        | StoreRequest::SetDeleted { respond_to, .. } => {
            let _ = respond_to.send(Err(error));
        }
        StoreRequest::AssignDriver { respond_to, .. } | StoreRequest::AddDriver { respond_to, .. } => {
            let _ = respond_to.send(Err(error));
        }
        StoreRequest::ActiveDrivers { respond_to, .. } => {
            let _ = respond_to.send(Err(error));
        }
        StoreRequest::Shutdown => {}
    }
}

/// Queues the reply for one expected request.
pub struct ExpectationBuilder<T> {
    script: Arc<Mutex<Script>>,
    wrap: fn(Reply<T>) -> Expectation,
}

impl<T> ExpectationBuilder<T> {
    pub fn return_ok(self, value: T) {
        lock(&self.script).expectations.push_back((self.wrap)(Ok(value)));
    }

    pub fn return_err(self, error: RepositoryError) {
        lock(&self.script)
            .expectations
            .push_back((self.wrap)(Err(error)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{OrderCreate, OrderId, StatusHistory};
    use crate::status::OrderStatus;
    use crate::store::OrderRepository;

    #[tokio::test]
    async fn test_replies_follow_the_script() {
        let mock = MockOrderRepository::new();
        let order = Order::new(
            OrderId::from("o1"),
            OrderCreate {
                company_id: "c1".into(),
                company_name: "Acme".into(),
                delivery_deadline: None,
            },
        );
        mock.expect_get().return_ok(order.clone());
        mock.expect_transition()
            .return_err(RepositoryError::Storage("disk full".into()));

        let client = mock.client();
        assert_eq!(client.get_order_by_id(&order.id).await.unwrap().id, order.id);
        let entry = StatusHistory::record(order.id.clone(), OrderStatus::Accepted);
        assert_eq!(
            client
                .transition_status(&order.id, OrderStatus::Pending, entry)
                .await
                .unwrap_err(),
            RepositoryError::Storage("disk full".into())
        );
        mock.verify();
    }

    #[tokio::test]
    #[should_panic(expected = "Unexpected requests")]
    async fn test_unexpected_request_fails_verification() {
        let mock = MockOrderRepository::new();
        mock.expect_get()
            .return_err(RepositoryError::NotFound("o1".into()));

        let client = mock.client();
        let id = OrderId::from("o1");
        let entry = StatusHistory::record(id.clone(), OrderStatus::Accepted);
        let result = client
            .transition_status(&id, OrderStatus::Pending, entry)
            .await;
        assert!(result.is_err());
        mock.verify();
    }
}
