//! Requests understood by the [`OrderStore`](super::OrderStore) actor.

use tokio::sync::oneshot;

use crate::error::RepositoryError;
use crate::model::{Driver, Order, OrderCreate, OrderId, StatusHistory};
use crate::status::OrderStatus;

/// One-shot reply channel used by every store request.
pub type Response<T> = oneshot::Sender<Result<T, RepositoryError>>;

#[derive(Debug)]
pub enum StoreRequest {
    Create {
        params: OrderCreate,
        respond_to: Response<Order>,
    },
    Get {
        id: OrderId,
        respond_to: Response<Order>,
    },
    /// Moves the order from `from` to `entry.status` and appends `entry`, as
    /// one write. Answers `Conflict` without writing if the order is deleted
    /// or no longer in `from`.
    Transition {
        id: OrderId,
        from: OrderStatus,
        entry: StatusHistory,
        respond_to: Response<Order>,
    },
    AssignDriver {
        id: OrderId,
        driver_id: String,
        respond_to: Response<()>,
    },
    /// Sets or clears `deleted_at` and appends `entry`, as one write.
    /// Answers `Conflict` if the flag already has that value or the status
    /// is no longer `status`.
    SetDeleted {
        id: OrderId,
        deleted: bool,
        status: OrderStatus,
        entry: StatusHistory,
        respond_to: Response<Order>,
    },
    AddDriver {
        driver: Driver,
        respond_to: Response<()>,
    },
    ActiveDrivers {
        company_id: String,
        respond_to: Response<Vec<Driver>>,
    },
    /// Stops the actor even while clients are still alive.
    Shutdown,
}
