//! # Topic handle.
//!
//! A [`Topic`] binds a topic name, a worker class and a submission policy to a
//! [`Dispatcher`], so call sites submit closures without repeating them.
//!
//! With `reduce_pending(true)`, [`Topic::submit`] displaces tasks of the topic
//! that have not started yet: only the newest pending request runs, and every
//! displaced caller receives its outcome. This suits "refresh"-style work
//! where intermediate requests are redundant.
//!
//! ## Example
//! ```rust
//! # use topicvisor::{Dispatcher, DispatcherConfig};
//! # #[tokio::main(flavor = "multi_thread")]
//! # async fn main() {
//! let d = Dispatcher::new(DispatcherConfig::default());
//! let refresh = d.topic("refresh-index").reduce_pending(true);
//!
//! let first = refresh.submit(|| Ok("index v1"));
//! let second = refresh.submit(|| Ok("index v2"));
//! assert!(first.await.is_ok());
//! assert_eq!(second.await, Ok("index v2"));
//! # d.shutdown();
//! # }
//! ```

use std::sync::Arc;

use crate::core::Dispatcher;
use crate::error::TaskError;
use crate::tasks::{TaskClass, TaskFuture, TopicTask};

/// Submission handle for one topic.
#[derive(Clone, Debug)]
pub struct Topic {
    name: Arc<str>,
    class: TaskClass,
    reduce_pending: bool,
    dispatcher: Dispatcher,
}

impl Topic {
    pub(crate) fn new(dispatcher: Dispatcher, name: Arc<str>, class: TaskClass) -> Self {
        Self {
            name,
            class,
            reduce_pending: false,
            dispatcher,
        }
    }

    /// Makes [`submit`](Self::submit) use replace semantics.
    pub fn reduce_pending(mut self, on: bool) -> Self {
        self.reduce_pending = on;
        self
    }

    /// Returns the topic name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the worker class used for submitted tasks.
    pub fn class(&self) -> TaskClass {
        self.class
    }

    /// Appends `f` behind every queued task of this topic.
    pub fn enqueue<T, F>(&self, f: F) -> TaskFuture<T>
    where
        T: Clone + Send + 'static,
        F: FnOnce() -> Result<T, TaskError> + Send + 'static,
    {
        self.dispatcher.submit(self.task(f))
    }

    /// Displaces every pending task of this topic with `f`.
    pub fn replace<T, F>(&self, f: F) -> TaskFuture<T>
    where
        T: Clone + Send + 'static,
        F: FnOnce() -> Result<T, TaskError> + Send + 'static,
    {
        self.dispatcher.submit_replacing(self.task(f))
    }

    /// Enqueues or replaces, depending on [`reduce_pending`](Self::reduce_pending).
    pub fn submit<T, F>(&self, f: F) -> TaskFuture<T>
    where
        T: Clone + Send + 'static,
        F: FnOnce() -> Result<T, TaskError> + Send + 'static,
    {
        if self.reduce_pending {
            self.replace(f)
        } else {
            self.enqueue(f)
        }
    }

    fn task<T, F>(&self, f: F) -> TopicTask<T>
    where
        T: Clone + Send + 'static,
        F: FnOnce() -> Result<T, TaskError> + Send + 'static,
    {
        TopicTask::new(Arc::clone(&self.name), f).with_class(self.class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DispatcherConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;

    #[tokio::test(flavor = "multi_thread")]
    async fn orchestrator_topic_carries_suffix_and_class() {
        let d = Dispatcher::new(DispatcherConfig::default());
        let t = d.orchestrator("publish");
        assert_eq!(t.name(), "publish:orchestrator");
        assert_eq!(t.class(), TaskClass::Orchestrator);
        assert_eq!(d.orchestrator("publish:orchestrator").name(), "publish:orchestrator");
        let owned = format!("repo-{}", 2);
        assert_eq!(d.orchestrator(owned).name(), "repo-2:orchestrator");
        assert_eq!(d.topic("git").class(), TaskClass::Leaf);
        d.shutdown();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn reduce_pending_runs_only_newest_request() {
        let d = Dispatcher::new(DispatcherConfig::default());
        let topic = d.topic("refresh").reduce_pending(true);
        let runs = Arc::new(AtomicUsize::new(0));

        let (open, wait) = mpsc::channel::<()>();
        let busy = topic.enqueue(move || {
            let _ = wait.recv();
            Ok(0)
        });
        let pending: Vec<_> = (1..=5)
            .map(|i| {
                let runs = runs.clone();
                topic.submit(move || {
                    runs.fetch_add(1, Ordering::SeqCst);
                    Ok(i)
                })
            })
            .collect();

        drop(open);
        assert_eq!(busy.await, Ok(0));
        for f in pending {
            assert_eq!(f.await, Ok(5));
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        d.shutdown();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn enqueue_keeps_every_request() {
        let d = Dispatcher::new(DispatcherConfig::default());
        let topic = d.topic("log");
        let futs: Vec<_> = (0..4).map(|i| topic.submit(move || Ok(i))).collect();
        for (i, f) in futs.into_iter().enumerate() {
            assert_eq!(f.await, Ok(i));
        }
        d.shutdown();
    }
}
