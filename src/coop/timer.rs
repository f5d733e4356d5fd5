//! # Segment timer handed to resumed cooperative computations.

use std::time::{Duration, Instant};

/// Time budget a segment may hold the UI thread before it should yield.
pub const UI_BLOCK_TIME: Duration = Duration::from_millis(17);

/// Measures the time since a continuation segment started.
///
/// Purely advisory: nothing is interrupted when a budget is exceeded.
///
/// ```rust
/// use std::time::Duration;
/// use topicvisor::coop::Timer;
///
/// let mut timer = Timer::start();
/// assert!(!timer.exceeded(Duration::from_secs(60)));
/// timer.reset();
/// assert!(timer.elapsed() < Duration::from_secs(60));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    started: Instant,
}

impl Timer {
    /// Starts a new timer.
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    /// Time since the timer started (or was last reset).
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// True if strictly more than `limit` has elapsed.
    pub fn exceeded(&self, limit: Duration) -> bool {
        self.elapsed() > limit
    }

    /// True if the segment used up [`UI_BLOCK_TIME`].
    pub fn exhausted_ui_budget(&self) -> bool {
        self.exceeded(UI_BLOCK_TIME)
    }

    /// Restarts the measurement from now.
    pub fn reset(&mut self) {
        self.started = Instant::now();
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::start()
    }
}
