use std::sync::Arc;
use tracing::{error, info};

use crate::config::TrackingConfig;
use crate::connection::ConnectionActor;
use crate::hub::{Hub, HubClient};
use crate::service::{OrderService, SimulationService};
use crate::store::{OrderStore, OrderStoreClient};

/// Owns the running actors and the services wired on top of them.
///
/// # Architecture
///
/// - **Order store actor**: in-memory orders and drivers, reached through
///   [`OrderStoreClient`].
/// - **Hub actor**: subscription registry, reached through [`HubClient`].
/// - **Services**: [`OrderService`] and [`SimulationService`] hold clients of
///   both actors.
///
/// ```rust
/// use tracking_core::config::TrackingConfig;
/// use tracking_core::lifecycle::TrackingSystem;
///
/// #[tokio::main]
/// async fn main() {
///     let system = TrackingSystem::new(TrackingConfig::default());
///     // hand `system.orders`, `system.hub`, ... to the transport layer
///     system.shutdown().await.unwrap();
/// }
/// ```
pub struct TrackingSystem {
    pub config: TrackingConfig,
    pub store: OrderStoreClient,
    pub hub: HubClient,
    pub orders: OrderService,
    pub simulation: SimulationService,
    handles: Vec<tokio::task::JoinHandle<()>>,
}

impl TrackingSystem {
    /// Spawns the store and hub actors and builds the services.
    ///
    /// Must be called inside a Tokio runtime, with a configuration that
    /// passes [`TrackingConfig::validate`].
    pub fn new(config: TrackingConfig) -> Self {
        let (store_actor, store) = OrderStore::new(config.hub.store_buffer);
        let (hub_actor, hub) = Hub::new(config.hub.request_buffer);

        let store_handle = tokio::spawn(store_actor.run());
        let hub_handle = tokio::spawn(hub_actor.run());

        let orders = OrderService::new(Arc::new(store.clone()), hub.clone());
        let simulation = SimulationService::new(
            orders.clone(),
            Arc::new(store.clone()),
            config.simulation.clone(),
        );

        info!("Tracking system started");
        Self {
            config,
            store,
            hub,
            orders,
            simulation,
            handles: vec![store_handle, hub_handle],
        }
    }

    /// A new connection actor for `user_id`, configured from this system.
    pub fn connection(&self, user_id: impl Into<String>) -> ConnectionActor {
        ConnectionActor::new(self.hub.clone(), user_id, self.config.connection.clone())
    }

    /// Stops both actors and waits for them.
    ///
    /// Clones of the clients may still be alive (running simulations, open
    /// connections), so the actors are told to stop explicitly rather than
    /// waiting for every sender to drop. The hub cancels all connections on
    /// its way out.
    pub async fn shutdown(self) -> Result<(), String> {
        info!("Shutting down tracking system...");

        if let Err(e) = self.hub.shutdown().await {
            error!(error = %e, "Hub shutdown request failed");
        }
        if let Err(e) = self.store.shutdown().await {
            error!(error = %e, "Store shutdown request failed");
        }

        for handle in self.handles {
            if let Err(e) = handle.await {
                error!("Actor task failed: {:?}", e);
                return Err(format!("Actor task failed: {:?}", e));
            }
        }

        info!("Tracking system shutdown complete.");
        Ok(())
    }
}
