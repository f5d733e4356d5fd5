//! Runtime events: types and broadcast bus.
//!
//! Every scheduling decision of the dispatcher is published as an [`Event`]:
//! queueing, replacement, start and end of a task body, cancellation sweeps and
//! worker spawn/retirement.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: the dispatcher actor, worker threads (via the runner),
//!   `SubscriberSet` workers (panics).
//! - **Consumers**: the subscriber listener (fans out to `SubscriberSet`) and
//!   anyone holding a receiver from [`Dispatcher::subscribe`](crate::Dispatcher::subscribe).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
