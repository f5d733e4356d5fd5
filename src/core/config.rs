//! # Dispatcher configuration.
//!
//! Provides [`DispatcherConfig`], the centralized settings of the dispatcher runtime.
//!
//! ## Sentinel values
//! - `leaf_workers = 0` / `orchestrator_workers = 0` → clamped to 1 (a class
//!   without workers would never drain its queue)
//! - `keep_alive = 0s` → clamped to 1ms

use std::time::Duration;

use crate::tasks::TaskClass;

/// Global configuration for the dispatcher runtime.
///
/// ## Field semantics
/// - `leaf_workers`: capacity bound of the leaf worker class
/// - `orchestrator_workers`: capacity bound of the orchestrator worker class
/// - `keep_alive`: how long an idle worker waits for work before retiring
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by Bus)
/// - `thread_name`: prefix of worker thread names
///
/// ## Notes
/// All fields are public for flexibility. Prefer the helper accessors to avoid
/// sprinkling sentinel checks across the codebase.
#[derive(Clone, Debug)]
pub struct DispatcherConfig {
    /// Maximum number of concurrently alive leaf-class workers.
    ///
    /// This is the binding constraint for everyday work.
    pub leaf_workers: usize,

    /// Maximum number of concurrently alive orchestrator-class workers.
    ///
    /// Bounds how many coordinating sequences may run at the same time.
    pub orchestrator_workers: usize,

    /// Idle time after which a worker thread retires.
    pub keep_alive: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    pub bus_capacity: usize,

    /// Prefix for worker thread names (`{thread_name}-{class}-{id}`).
    pub thread_name: String,
}

impl DispatcherConfig {
    /// Returns the capacity bound of a worker class (at least 1).
    #[inline]
    pub fn capacity(&self, class: TaskClass) -> usize {
        match class {
            TaskClass::Leaf => self.leaf_workers.max(1),
            TaskClass::Orchestrator => self.orchestrator_workers.max(1),
        }
    }

    /// Returns the keep-alive window clamped to a minimum of 1ms.
    #[inline]
    pub fn keep_alive_clamped(&self) -> Duration {
        self.keep_alive.max(Duration::from_millis(1))
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for DispatcherConfig {
    /// Default configuration:
    ///
    /// - `leaf_workers = 8`
    /// - `orchestrator_workers = 4`
    /// - `keep_alive = 10s`
    /// - `bus_capacity = 1024`
    /// - `thread_name = "topicvisor-worker"`
    fn default() -> Self {
        Self {
            leaf_workers: 8,
            orchestrator_workers: 4,
            keep_alive: Duration::from_secs(10),
            bus_capacity: 1024,
            thread_name: "topicvisor-worker".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_values_are_clamped() {
        let cfg = DispatcherConfig {
            leaf_workers: 0,
            orchestrator_workers: 0,
            keep_alive: Duration::ZERO,
            bus_capacity: 0,
            ..DispatcherConfig::default()
        };
        assert_eq!(cfg.capacity(TaskClass::Leaf), 1);
        assert_eq!(cfg.capacity(TaskClass::Orchestrator), 1);
        assert_eq!(cfg.keep_alive_clamped(), Duration::from_millis(1));
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }

    #[test]
    fn capacities_are_independent() {
        let cfg = DispatcherConfig {
            leaf_workers: 3,
            orchestrator_workers: 1,
            ..DispatcherConfig::default()
        };
        assert_eq!(cfg.capacity(TaskClass::Leaf), 3);
        assert_eq!(cfg.capacity(TaskClass::Orchestrator), 1);
    }
}
