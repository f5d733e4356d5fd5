//! # Topic-bound unit of work.
//!
//! A [`TopicTask`] wraps a zero-argument closure, the topic it is serialized
//! under, a diagnostic name, the worker class it needs, and the [`TaskFuture`]
//! its outcome is delivered through.
//!
//! Inside the runtime tasks travel type-erased as [`BoxJob`], so a single queue
//! can hold tasks with different output types.
//!
//! ## Example
//! ```rust
//! use topicvisor::{TaskClass, TopicTask};
//!
//! let task = TopicTask::new("registry", || Ok::<_, topicvisor::TaskError>(42))
//!     .with_name("fetch-registry");
//! assert_eq!(task.topic(), "registry");
//! assert_eq!(task.name(), "fetch-registry");
//! assert_eq!(task.class(), TaskClass::Leaf);
//! ```

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{TaskError, panic_message};
use crate::tasks::future::{TaskFuture, TaskStatus};

/// Process-wide counter used for default task names.
static TASK_SEQ: AtomicU64 = AtomicU64::new(0);

/// Worker class a task runs on.
///
/// Each class has its own capacity bound, so coordinating tasks that wait on
/// other tasks cannot starve the leaf work they depend on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TaskClass {
    /// Everyday work: network, git, file operations.
    #[default]
    Leaf,
    /// Long-lived coordinating task that submits and waits on other tasks.
    Orchestrator,
}

impl TaskClass {
    /// Topic suffix conventionally used for orchestrator topics.
    pub const ORCHESTRATOR_SUFFIX: &'static str = ":orchestrator";

    /// Returns a short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskClass::Leaf => "leaf",
            TaskClass::Orchestrator => "orchestrator",
        }
    }
}

type Work<T> = Box<dyn FnOnce() -> Result<T, TaskError> + Send>;

/// A unit of work bound to a topic.
pub struct TopicTask<T> {
    topic: Arc<str>,
    name: Arc<str>,
    class: TaskClass,
    work: Work<T>,
    future: TaskFuture<T>,
}

impl<T: Clone + Send + 'static> TopicTask<T> {
    /// Creates a leaf-class task with a generated name (`"{topic}-{n}"`).
    pub fn new<F>(topic: impl Into<Arc<str>>, work: F) -> Self
    where
        F: FnOnce() -> Result<T, TaskError> + Send + 'static,
    {
        let topic = topic.into();
        let seq = TASK_SEQ.fetch_add(1, Ordering::Relaxed);
        let name: Arc<str> = format!("{topic}-{seq}").into();
        Self {
            topic,
            name,
            class: TaskClass::Leaf,
            work: Box::new(work),
            future: TaskFuture::new(),
        }
    }

    /// Overrides the diagnostic name.
    pub fn with_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the worker class explicitly.
    pub fn with_class(mut self, class: TaskClass) -> Self {
        self.class = class;
        self
    }

    /// Shorthand for `with_class(TaskClass::Orchestrator)`.
    pub fn orchestrator(self) -> Self {
        self.with_class(TaskClass::Orchestrator)
    }

    /// Returns the topic.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Returns the diagnostic name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the worker class.
    pub fn class(&self) -> TaskClass {
        self.class
    }

    /// Returns the current status (derived from the future).
    pub fn status(&self) -> TaskStatus {
        self.future.status()
    }

    /// Returns a handle to the task's outcome.
    pub fn future(&self) -> TaskFuture<T> {
        self.future.clone()
    }

    pub(crate) fn into_job(self) -> BoxJob {
        Box::new(self)
    }
}

impl<T> fmt::Debug for TopicTask<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TopicTask")
            .field("topic", &self.topic)
            .field("name", &self.name)
            .field("class", &self.class)
            .field("status", &self.future.status())
            .finish()
    }
}

/// Type-erased task as held by the dispatcher queue and worker slots.
pub(crate) trait Job: Send + 'static {
    fn topic(&self) -> &Arc<str>;
    fn name(&self) -> &Arc<str>;
    fn class(&self) -> TaskClass;
    fn status(&self) -> TaskStatus;

    /// Claims the future (`Pending -> Running`); see [`TaskFuture::claim_running`].
    fn claim(&self) -> bool;
    fn cancel(&self) -> bool;

    /// Makes the future of `older` follow this task's future.
    ///
    /// Returns `false` when the output types differ.
    fn adopt(&self, older: &dyn Job) -> bool;

    /// Runs the body of a claimed task and resolves its future.
    ///
    /// Panics are caught and stored as [`TaskError::Panicked`].
    fn execute(self: Box<Self>) -> Result<(), TaskError>;

    /// Resolves a claimed task with `err` without running it.
    fn abort(self: Box<Self>, err: TaskError);

    fn future_any(&self) -> &dyn Any;
}

pub(crate) type BoxJob = Box<dyn Job>;

impl<T: Clone + Send + 'static> Job for TopicTask<T> {
    fn topic(&self) -> &Arc<str> {
        &self.topic
    }

    fn name(&self) -> &Arc<str> {
        &self.name
    }

    fn class(&self) -> TaskClass {
        self.class
    }

    fn status(&self) -> TaskStatus {
        self.future.status()
    }

    fn claim(&self) -> bool {
        self.future.claim_running()
    }

    fn cancel(&self) -> bool {
        self.future.cancel()
    }

    fn adopt(&self, older: &dyn Job) -> bool {
        match older.future_any().downcast_ref::<TaskFuture<T>>() {
            Some(prev) => {
                prev.follow(&self.future);
                true
            }
            None => false,
        }
    }

    fn execute(self: Box<Self>) -> Result<(), TaskError> {
        let TopicTask { work, future, .. } = *self;
        debug_assert_eq!(future.status(), TaskStatus::Running);

        let outcome = match panic::catch_unwind(AssertUnwindSafe(work)) {
            Ok(res) => res,
            Err(payload) => Err(TaskError::Panicked {
                message: panic_message(payload.as_ref()),
            }),
        };
        let report = outcome.as_ref().map(|_| ()).map_err(Clone::clone);
        future.resolve(outcome);
        report
    }

    fn abort(self: Box<Self>, err: TaskError) {
        self.future.resolve(Err(err));
    }

    fn future_any(&self) -> &dyn Any {
        &self.future
    }
}
