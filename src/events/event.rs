//! # Runtime events emitted by the dispatcher and its workers.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Task events**: queueing, replacement, execution and cancellation
//! - **Worker events**: spawn and retirement of pool threads
//! - **Runtime events**: dispatcher stop, subscriber failures
//!
//! The [`Event`] struct carries metadata such as topic, task name, worker id,
//! worker class, reasons and durations.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. Use `seq` to restore the exact order when events are
//! delivered out of order.
//!
//! ## Example
//! ```rust
//! use topicvisor::{Event, EventKind, TaskClass};
//!
//! let ev = Event::new(EventKind::TaskFailed)
//!     .with_topic("git")
//!     .with_task("git-3")
//!     .with_class(TaskClass::Leaf)
//!     .with_reason("ref not found");
//!
//! assert_eq!(ev.kind, EventKind::TaskFailed);
//! assert_eq!(ev.topic.as_deref(), Some("git"));
//! assert_eq!(ev.reason.as_deref(), Some("ref not found"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::tasks::TaskClass;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Task events ===
    /// Task entered the pending queue.
    ///
    /// Sets: `topic`, `task`, `class`.
    TaskQueued,

    /// A queued task was displaced by a newer task of the same topic; its
    /// future now follows the newer one.
    ///
    /// Sets: `topic`, `task` (the displaced task), `reason` (the newer task).
    TaskReplaced,

    /// A worker started executing the task body.
    ///
    /// Sets: `topic`, `task`, `class`, `worker`.
    TaskStarting,

    /// Task body returned successfully.
    ///
    /// Sets: `topic`, `task`, `worker`, `elapsed_ms`.
    TaskCompleted,

    /// Task body returned an error or panicked.
    ///
    /// Sets: `topic`, `task`, `worker`, `elapsed_ms`, `reason`.
    TaskFailed,

    /// Task was dropped from the queue without running.
    ///
    /// Sets: `topic`, `task`, `reason` (`cancelled`, `topic_failed`,
    /// `type_mismatch` or `shutdown`).
    TaskCancelled,

    // === Worker events ===
    /// A worker thread was spawned.
    ///
    /// Sets: `worker`, `class`.
    WorkerSpawned,

    /// A worker thread retired after its keep-alive window.
    ///
    /// Sets: `worker`, `class`.
    WorkerRetired,

    // === Runtime events ===
    /// The dispatcher actor stopped; queued tasks were cancelled.
    DispatcherStopped,

    /// Subscriber panicked during event processing.
    ///
    /// Sets: `task` (subscriber name), `reason` (panic message).
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `task` (subscriber name), `reason` (`full` or `closed`).
    SubscriberOverflow,
}

/// Runtime event with optional metadata.
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Topic of the task, if applicable.
    pub topic: Option<Arc<str>>,
    /// Diagnostic task name (or subscriber name), if applicable.
    pub task: Option<Arc<str>>,
    /// Worker id, if applicable.
    pub worker: Option<u64>,
    /// Worker class, if applicable.
    pub class: Option<TaskClass>,
    /// Human-readable reason (errors, cancellation cause, etc.).
    pub reason: Option<Arc<str>>,
    /// Duration of the task body in milliseconds (compact).
    pub elapsed_ms: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            topic: None,
            task: None,
            worker: None,
            class: None,
            reason: None,
            elapsed_ms: None,
        }
    }

    /// Attaches a topic.
    #[inline]
    pub fn with_topic(mut self, topic: impl Into<Arc<str>>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Attaches a task (or subscriber) name.
    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Attaches a worker id.
    #[inline]
    pub fn with_worker(mut self, worker: u64) -> Self {
        self.worker = Some(worker);
        self
    }

    /// Attaches a worker class.
    #[inline]
    pub fn with_class(mut self, class: TaskClass) -> Self {
        self.class = Some(class);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a duration (stored as milliseconds).
    #[inline]
    pub fn with_elapsed(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.elapsed_ms = Some(ms);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_task(subscriber)
            .with_reason(reason)
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_task(subscriber)
            .with_reason(info)
    }
}
