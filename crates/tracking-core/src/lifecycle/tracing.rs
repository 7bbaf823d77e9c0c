//! # Observability & Tracing
//!
//! [`setup_tracing`] installs the process-wide subscriber. Output is compact
//! and hides module paths (`with_target(false)`); the structured fields carry
//! the context instead:
//!
//! ```text
//! INFO Connection registered connection_id=5f0c… user_id="user_1"
//! INFO Subscribed connection_id=5f0c… order_id="8a1e…" clients=1
//! INFO change_status{order_id=8a1e…}: Status changed from=PENDING to=ACCEPTED
//! ```
//!
//! The filter string follows `EnvFilter` syntax, e.g. `info` or
//! `tracking_core=debug,tracking_server=info`. `RUST_LOG`, when set, wins over the
//! configured filter. With `json = true` every event is one JSON object per
//! line, suitable for log shippers.

use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. Later calls are ignored, so tests may call
/// it freely.
pub fn setup_tracing(filter: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let result = if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .try_init()
    };

    if result.is_err() {
        tracing::debug!("Tracing already initialised");
    }
}
