//! # Supervisor configuration.
//!
//! Provides [`SupervisorConfig`], the settings of one supervised actor group.
//!
//! ## Sentinel values
//! - `stop_deadline = 0s` → actors get no time to stop; stragglers are aborted right away.
//! - `bus_capacity = 0` → clamped to 1 by the bus.

use std::time::Duration;

/// Default time each actor gets to stop once shutdown begins.
pub const DEFAULT_STOP_DEADLINE: Duration = Duration::from_secs(5);

/// Settings of a supervised actor group.
///
/// ## Field semantics
/// - `stop_deadline`: bound on the whole stop phase; every `stop` call and the wait for
///   the remaining `start` calls share one deadline computed when shutdown begins
/// - `bus_capacity`: lifecycle event bus ring buffer size (min 1)
#[derive(Clone, Debug)]
pub struct SupervisorConfig {
    /// Maximum time the stop phase may take.
    pub stop_deadline: Duration,

    /// Capacity of the lifecycle event bus.
    ///
    /// Slow subscribers that lag behind more than `bus_capacity` events skip older items.
    pub bus_capacity: usize,
}

impl SupervisorConfig {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns a copy with a different stop deadline.
    pub fn with_stop_deadline(mut self, stop_deadline: Duration) -> Self {
        self.stop_deadline = stop_deadline;
        self
    }
}

impl Default for SupervisorConfig {
    /// Default configuration:
    ///
    /// - `stop_deadline = 5s`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            stop_deadline: DEFAULT_STOP_DEADLINE,
            bus_capacity: 1024,
        }
    }
}
