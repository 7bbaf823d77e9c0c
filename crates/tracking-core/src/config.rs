//! Tuning knobs for the hub, connection actors and the simulator.
//!
//! Every field has a default, so an empty `[tracking]` table (or none at all)
//! yields a working configuration.

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// A setting that would make the runtime panic or never make progress.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidConfig {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrackingConfig {
    #[serde(default)]
    pub hub: HubConfig,
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

impl TrackingConfig {
    /// Rejects queue sizes, intervals and deadlines of zero.
    ///
    /// Channel capacities and the heartbeat period must be non-zero for
    /// tokio; a zero deadline or frame limit would drop every connection or
    /// frame.
    pub fn validate(&self) -> Result<(), InvalidConfig> {
        let sizes = [
            ("tracking.hub.request_buffer", self.hub.request_buffer),
            ("tracking.hub.store_buffer", self.hub.store_buffer),
            ("tracking.connection.outbound_capacity", self.connection.outbound_capacity),
            ("tracking.connection.max_frame_bytes", self.connection.max_frame_bytes),
        ];
        let intervals = [
            ("tracking.connection.heartbeat_interval_ms", self.connection.heartbeat_interval_ms),
            ("tracking.connection.read_timeout_ms", self.connection.read_timeout_ms),
            ("tracking.connection.write_timeout_ms", self.connection.write_timeout_ms),
        ];

        if let Some((name, _)) = sizes.into_iter().find(|(_, value)| *value == 0) {
            return Err(InvalidConfig::Zero(name));
        }
        if let Some((name, _)) = intervals.into_iter().find(|(_, value)| *value == 0) {
            return Err(InvalidConfig::Zero(name));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HubConfig {
    /// Capacity of the hub's input queue.
    #[serde(default = "default_request_buffer")]
    pub request_buffer: usize,
    /// Capacity of the order store's input queue.
    #[serde(default = "default_request_buffer")]
    pub store_buffer: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    /// Outbound messages a connection may have queued before it is dropped.
    #[serde(default = "default_outbound_capacity")]
    pub outbound_capacity: usize,
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    /// A connection with no inbound traffic for this long is considered dead.
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

/// Inclusive range of milliseconds a simulation step waits before acting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    pub const fn fixed(ms: u64) -> Self {
        Self {
            min_ms: ms,
            max_ms: ms,
        }
    }

    pub const fn between(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_accept_delay")]
    pub accept_delay: DelayRange,
    #[serde(default = "default_pickup_delay")]
    pub pickup_delay: DelayRange,
    #[serde(default = "default_transit_delay")]
    pub transit_delay: DelayRange,
    #[serde(default = "default_delivery_delay")]
    pub delivery_delay: DelayRange,
    #[serde(default = "default_movement_steps")]
    pub movement_steps: u32,
    #[serde(default = "default_movement_interval_ms")]
    pub movement_interval_ms: u64,
    #[serde(default = "default_route_start")]
    pub route_start: Coordinate,
    #[serde(default = "default_route_end")]
    pub route_end: Coordinate,
    /// Maximum random offset added to each interpolated point, in degrees.
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

fn default_request_buffer() -> usize {
    1024
}

fn default_outbound_capacity() -> usize {
    256
}

fn default_heartbeat_interval_ms() -> u64 {
    30_000
}

fn default_read_timeout_ms() -> u64 {
    60_000
}

fn default_write_timeout_ms() -> u64 {
    10_000
}

fn default_max_frame_bytes() -> usize {
    4096
}

fn default_accept_delay() -> DelayRange {
    DelayRange::fixed(3_000)
}

fn default_pickup_delay() -> DelayRange {
    DelayRange::between(5_000, 14_000)
}

fn default_transit_delay() -> DelayRange {
    DelayRange::between(3_000, 9_000)
}

fn default_delivery_delay() -> DelayRange {
    DelayRange::between(15_000, 44_000)
}

fn default_movement_steps() -> u32 {
    20
}

fn default_movement_interval_ms() -> u64 {
    1_000
}

// San Salvador city centre to the northern outskirts.
fn default_route_start() -> Coordinate {
    Coordinate {
        latitude: 13.6929,
        longitude: -89.2182,
    }
}

fn default_route_end() -> Coordinate {
    Coordinate {
        latitude: 13.7942,
        longitude: -89.1956,
    }
}

fn default_jitter() -> f64 {
    0.0005
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            request_buffer: default_request_buffer(),
            store_buffer: default_request_buffer(),
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            outbound_capacity: default_outbound_capacity(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            read_timeout_ms: default_read_timeout_ms(),
            write_timeout_ms: default_write_timeout_ms(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

impl ConnectionConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            accept_delay: default_accept_delay(),
            pickup_delay: default_pickup_delay(),
            transit_delay: default_transit_delay(),
            delivery_delay: default_delivery_delay(),
            movement_steps: default_movement_steps(),
            movement_interval_ms: default_movement_interval_ms(),
            route_start: default_route_start(),
            route_end: default_route_end(),
            jitter: default_jitter(),
        }
    }
}

impl SimulationConfig {
    pub fn movement_interval(&self) -> Duration {
        Duration::from_millis(self.movement_interval_ms)
    }
}
