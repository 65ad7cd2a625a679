//! # Runtime configuration.
//!
//! Provides [`Config`], the settings consumed by
//! [`EventRouter::builder`](crate::EventRouter::builder).
//!
//! ## Sentinel values
//! - `bus_capacity = 0` and `channel_capacity = 0` are clamped to 1.
//! - `grace = 0s` aborts every subscriber worker still busy when shutdown starts.

use std::time::Duration;

/// Configuration for the event router and the registries it owns.
///
/// ## Field semantics
/// - `bus_capacity`: lifecycle event ring buffer size. A router that falls further
///   behind than this skips events and resyncs barriers through the task store.
/// - `channel_capacity`: events buffered per push channel before `publish` starts
///   reporting `false`.
/// - `grace`: how long shutdown waits for subscriber workers to drain their queues.
#[derive(Clone, Debug)]
pub struct Config {
    /// Capacity of the lifecycle event bus.
    pub bus_capacity: usize,

    /// Buffer size of each push channel created by the channel registry.
    pub channel_capacity: usize,

    /// Maximum time to wait for subscriber workers at shutdown before aborting them.
    pub grace: Duration,
}

impl Config {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns a push channel capacity clamped to a minimum of 1.
    #[inline]
    pub fn channel_capacity_clamped(&self) -> usize {
        self.channel_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `bus_capacity = 1024`
    /// - `channel_capacity = 256`
    /// - `grace = 5s`
    fn default() -> Self {
        Self {
            bus_capacity: 1024,
            channel_capacity: 256,
            grace: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_capacities_are_clamped() {
        let cfg = Config {
            bus_capacity: 0,
            channel_capacity: 0,
            ..Config::default()
        };
        assert_eq!(cfg.bus_capacity_clamped(), 1);
        assert_eq!(cfg.channel_capacity_clamped(), 1);
    }
}
