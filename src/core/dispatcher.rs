//! # Dispatcher: public handle to the topic-serialized task runtime.
//!
//! A [`Dispatcher`] is a cheap, cloneable handle. Every call is turned into a
//! command for the dispatcher actor (see `core::actor`), so it can be used from
//! any thread: async code, worker threads running other task bodies, or plain
//! OS threads.
//!
//! ## Guarantees
//! - Tasks of one topic run one at a time, in submission order.
//! - Tasks of different topics run in parallel, bounded by the worker capacity
//!   of their class.
//! - A failed task cancels the tasks still queued under its topic.
//!
//! ## Example
//! ```rust
//! use topicvisor::{Dispatcher, DispatcherConfig, TaskError};
//!
//! #[tokio::main(flavor = "multi_thread")]
//! async fn main() -> Result<(), TaskError> {
//!     let dispatcher = Dispatcher::new(DispatcherConfig::default());
//!
//!     let a = dispatcher.add_task("git", || Ok(1));
//!     let b = dispatcher.add_task("git", || Ok(2));
//!     assert_eq!(a.await?, 1);
//!     assert_eq!(b.await?, 2);
//!
//!     dispatcher.shutdown();
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::core::actor::{Command, Snapshot};
use crate::core::builder::DispatcherBuilder;
use crate::core::config::DispatcherConfig;
use crate::error::{RuntimeError, TaskError};
use crate::events::{Bus, Event};
use crate::tasks::{TaskClass, TaskFuture, Topic, TopicTask};

struct Inner {
    tx: mpsc::UnboundedSender<Command>,
    token: CancellationToken,
    bus: Bus,
}

impl Drop for Inner {
    fn drop(&mut self) {
        // last handle gone: stop the actor (workers hold their own senders)
        self.token.cancel();
    }
}

/// Handle to a running dispatcher.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Dispatcher {
    /// Starts a dispatcher without subscribers.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime.
    pub fn new(cfg: DispatcherConfig) -> Self {
        DispatcherBuilder::new(cfg).build()
    }

    /// Returns a builder for a dispatcher with subscribers.
    pub fn builder(cfg: DispatcherConfig) -> DispatcherBuilder {
        DispatcherBuilder::new(cfg)
    }

    pub(crate) fn from_parts(
        tx: mpsc::UnboundedSender<Command>,
        token: CancellationToken,
        bus: Bus,
    ) -> Self {
        Self {
            inner: Arc::new(Inner { tx, token, bus }),
        }
    }

    /// Queues `f` under `topic` on a leaf worker.
    ///
    /// The closure runs after every earlier task of the same topic has finished.
    pub fn add_task<T, F>(&self, topic: impl Into<Arc<str>>, f: F) -> TaskFuture<T>
    where
        T: Clone + Send + 'static,
        F: FnOnce() -> Result<T, TaskError> + Send + 'static,
    {
        self.submit(TopicTask::new(topic, f))
    }

    /// Queues `f` under `topic`, displacing every task of that topic that has
    /// not started yet.
    ///
    /// Futures of displaced tasks resolve with this task's outcome.
    pub fn replace_or_add_task<T, F>(&self, topic: impl Into<Arc<str>>, f: F) -> TaskFuture<T>
    where
        T: Clone + Send + 'static,
        F: FnOnce() -> Result<T, TaskError> + Send + 'static,
    {
        self.submit_replacing(TopicTask::new(topic, f))
    }

    /// Queues a prepared task (explicit name or class).
    pub fn submit<T: Clone + Send + 'static>(&self, task: TopicTask<T>) -> TaskFuture<T> {
        let fut = task.future();
        self.send(Command::Submit(task.into_job()), &fut);
        fut
    }

    /// Queues a prepared task with replace semantics.
    pub fn submit_replacing<T: Clone + Send + 'static>(&self, task: TopicTask<T>) -> TaskFuture<T> {
        let fut = task.future();
        self.send(Command::SubmitReplacing(task.into_job()), &fut);
        fut
    }

    fn send<T: Clone + Send + 'static>(&self, cmd: Command, fut: &TaskFuture<T>) {
        if self.inner.token.is_cancelled() || self.inner.tx.send(cmd).is_err() {
            tracing::warn!("dispatcher closed; task cancelled on submit");
            fut.cancel();
        }
    }

    /// Returns a handle for submitting leaf tasks under `name`.
    pub fn topic(&self, name: impl Into<Arc<str>>) -> Topic {
        Topic::new(self.clone(), name.into(), TaskClass::Leaf)
    }

    /// Returns a handle for submitting orchestrator tasks.
    ///
    /// The topic name gets the `:orchestrator` suffix unless it already has it.
    pub fn orchestrator(&self, name: impl Into<Arc<str>>) -> Topic {
        let name: Arc<str> = name.into();
        let name = if name.ends_with(TaskClass::ORCHESTRATOR_SUFFIX) {
            name
        } else {
            format!("{name}{}", TaskClass::ORCHESTRATOR_SUFFIX).into()
        };
        Topic::new(self.clone(), name, TaskClass::Orchestrator)
    }

    /// Returns a read-only view of the queue, running topics and workers.
    pub async fn snapshot(&self) -> Result<Snapshot, RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.inner
            .tx
            .send(Command::Snapshot(reply))
            .map_err(|_| RuntimeError::DispatcherClosed)?;
        rx.await.map_err(|_| RuntimeError::DispatcherClosed)
    }

    /// Subscribes to the raw event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.inner.bus.subscribe()
    }

    /// Stops the actor: queued tasks are cancelled, idle workers exit, busy
    /// workers exit after their current task.
    pub fn shutdown(&self) {
        self.inner.token.cancel();
    }

    /// True once [`shutdown`](Self::shutdown) was called or the actor stopped.
    pub fn is_closed(&self) -> bool {
        self.inner.token.is_cancelled() || self.inner.tx.is_closed()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("closed", &self.is_closed())
            .finish()
    }
}
