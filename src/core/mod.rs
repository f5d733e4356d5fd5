//! Runtime core: the dispatcher and its worker pool.
//!
//! The public surface of this module is [`Dispatcher`], [`DispatcherBuilder`],
//! [`DispatcherConfig`] and the read-only [`Snapshot`] types.
//!
//! Internal modules:
//! - [`actor`]: single-writer owner of the queue, running topics and pool;
//! - [`pool`]: worker registry with per-class capacity bounds;
//! - [`worker`]: OS-thread loop with keep-alive;
//! - [`runner`]: executes one task body and publishes its events.

mod actor;
mod builder;
mod config;
mod dispatcher;
mod pool;
mod runner;
mod worker;

pub use actor::{QueuedTask, Snapshot};
pub use builder::DispatcherBuilder;
pub use config::DispatcherConfig;
pub use dispatcher::Dispatcher;
pub use pool::WorkerInfo;
