//! # Event subscriber trait.
//!
//! [`Subscribe`] is the extension point for observing the dispatcher: queueing
//! decisions, task bodies starting and ending, cancellation sweeps, worker
//! spawn and retirement.
//!
//! Each subscriber is driven by its own Tokio task fed by a bounded queue owned
//! by the [`SubscriberSet`](crate::subscribers::SubscriberSet):
//! ```text
//! SubscriberSet ──► [bounded queue] ──► worker task ──► subscriber.on_event()
//!                                    └─► panic caught → EventKind::SubscriberPanicked
//! ```
//!
//! ## Rules
//! - A slow subscriber only delays its own queue; the dispatcher never waits.
//! - On overflow the event is dropped for this subscriber only and
//!   `EventKind::SubscriberOverflow` is published.
//! - Events arrive in publication order per subscriber.

use async_trait::async_trait;

use crate::events::Event;

/// Observer of runtime events.
///
/// Implementations should use async I/O and handle their own errors; a panic is
/// caught and reported, but the event that caused it is lost.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Processes a single event.
    async fn on_event(&self, event: &Event);

    /// Name used in overflow/panic events. Override the verbose default.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred queue capacity (clamped to at least 1). Default: 1024.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
