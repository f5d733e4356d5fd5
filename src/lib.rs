//! # topicvisor
//!
//! **Topicvisor** serializes related blocking operations by a *topic* while
//! running unrelated ones in parallel on a bounded, lazily grown pool of worker
//! threads. A companion cooperative scheduler lets one computation hop between
//! a UI-confined thread and a worker context without blocking either.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!  add_task("git", f)   replace_or_add_task("index", g)   topic("net").submit(h)
//!          │                        │                             │
//!          └────────────────────────┼─────────────────────────────┘
//!                                   ▼  Command (mpsc, any thread)
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Dispatcher actor (single writer)                                 │
//! │  - queue: pending tasks in submission order                       │
//! │  - running_topics: one entry per busy topic                       │
//! │  - WorkerPool: leaf / orchestrator classes, own capacity each     │
//! └──────┬──────────────────┬──────────────────┬───────────────▲──────┘
//!        ▼ bounded(1)       ▼                  ▼               │ Finished /
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   │ IdleTimeout /
//!     │ leaf worker  │   │ leaf worker  │   │ orch. worker │   │ Exited
//!     │ (OS thread)  │   │ (OS thread)  │   │ (OS thread)  │───┘
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            └─ publish ────────┴──────────────────┴──► Bus ──► SubscriberSet
//! ```
//!
//! ### Task lifecycle
//! ```text
//! submit ─► Pending ──claim──► Running ──► Done(Ok | Err)
//!              │                              │
//!              ├─ cancel()            ────────┴─► Err: queued tasks of the
//!              ├─ replaced (follows the newer task)  same topic are cancelled
//!              └─ shutdown ─► Cancelled
//! ```
//!
//! ## Features
//! | Area              | Description                                                    | Key types / traits                          |
//! |-------------------|----------------------------------------------------------------|---------------------------------------------|
//! | **Dispatching**   | Topic-exclusive execution, replace-pending, fail-fast backlog. | [`Dispatcher`], [`Topic`], [`TopicTask`]    |
//! | **Results**       | One-shot futures: block, `.await`, or callbacks.               | [`TaskFuture`], [`gather`]                  |
//! | **Cooperative**   | Hop between UI and worker roles inside one `async` block.       | [`coop::CoopScheduler`], [`coop::Co`]       |
//! | **Subscriber API**| Observe queueing, execution and worker churn.                  | [`Subscribe`], [`LogWriter`]                |
//! | **Errors**        | Typed outcomes and runtime errors.                             | [`TaskError`], [`RuntimeError`]             |
//! | **Configuration** | Worker capacities, keep-alive, bus size.                       | [`DispatcherConfig`]                        |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use topicvisor::{Dispatcher, DispatcherConfig, LogWriter, Subscribe, TaskError};
//!
//! #[tokio::main(flavor = "multi_thread")]
//! async fn main() -> Result<(), TaskError> {
//!     let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
//!     let dispatcher = Dispatcher::builder(DispatcherConfig::default())
//!         .with_subscribers(subs)
//!         .build();
//!
//!     // same topic: runs one after the other
//!     let clone = dispatcher.add_task("repo", || Ok("cloned"));
//!     let checkout = dispatcher.add_task("repo", || Ok("checked out"));
//!
//!     // only the newest pending refresh runs; earlier callers get its result
//!     let refresh = dispatcher.topic("index").reduce_pending(true);
//!     let r1 = refresh.submit(|| Ok(1));
//!     let r2 = refresh.submit(|| Ok(2));
//!
//!     assert_eq!(clone.await?, "cloned");
//!     assert_eq!(checkout.await?, "checked out");
//!     assert!(r1.await.is_ok());
//!     assert_eq!(r2.await?, 2);
//!
//!     dispatcher.shutdown();
//!     Ok(())
//! }
//! ```

pub mod coop;
mod core;
mod error;
mod events;
mod subscribers;
mod tasks;

// ---- Public re-exports ----

pub use crate::core::{Dispatcher, DispatcherBuilder, DispatcherConfig, QueuedTask, Snapshot, WorkerInfo};
pub use error::{RuntimeError, TaskError};
pub use events::{Bus, Event, EventKind};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
pub use tasks::{TaskClass, TaskFuture, TaskStatus, Topic, TopicTask, gather};
