pub mod tracing;
pub mod tracking_system;

pub use self::tracing::setup_tracing;
pub use self::tracking_system::TrackingSystem;
