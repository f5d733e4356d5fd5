//! # Run a single task body on a worker thread.
//!
//! Executes one claimed [`BoxJob`], resolves its future and publishes
//! lifecycle events to [`Bus`].
//!
//! ## Event flow
//! ```text
//! Success:  publish TaskStarting → job.execute() → Ok  → publish TaskCompleted
//! Failure:  publish TaskStarting → job.execute() → Err → publish TaskFailed
//! ```
//!
//! ## Rules
//! - Always publishes **exactly one** terminal event: `TaskCompleted` or `TaskFailed`
//! - Panics inside the body are failures (caught by the job itself)
//! - The future is resolved **before** the dispatcher learns about completion,
//!   so a waiter never observes a freed topic with an unresolved future

use std::sync::Arc;
use std::time::Instant;

use crate::core::pool::WorkerId;
use crate::events::{Bus, Event, EventKind};
use crate::tasks::BoxJob;

/// What the dispatcher needs to know once a task body finished.
#[derive(Debug)]
pub(crate) struct Completion {
    pub topic: Arc<str>,
    pub failed: bool,
}

/// Executes `job` (already claimed) and reports the outcome.
pub(crate) fn run_once(job: BoxJob, worker: WorkerId, bus: &Bus) -> Completion {
    let topic = Arc::clone(job.topic());
    let name = Arc::clone(job.name());

    bus.publish(
        Event::new(EventKind::TaskStarting)
            .with_topic(Arc::clone(&topic))
            .with_task(Arc::clone(&name))
            .with_class(job.class())
            .with_worker(worker.get()),
    );

    let started = Instant::now();
    let res = job.execute();
    let elapsed = started.elapsed();

    match res {
        Ok(()) => {
            bus.publish(
                Event::new(EventKind::TaskCompleted)
                    .with_topic(Arc::clone(&topic))
                    .with_task(name)
                    .with_worker(worker.get())
                    .with_elapsed(elapsed),
            );
            Completion {
                topic,
                failed: false,
            }
        }
        Err(e) => {
            tracing::warn!(topic = %topic, task = %name, error = %e, "task failed");
            bus.publish(
                Event::new(EventKind::TaskFailed)
                    .with_topic(Arc::clone(&topic))
                    .with_task(name)
                    .with_worker(worker.get())
                    .with_elapsed(elapsed)
                    .with_reason(e.to_string()),
            );
            Completion {
                topic,
                failed: true,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskError;
    use crate::tasks::TopicTask;

    #[tokio::test]
    async fn publishes_starting_then_completed() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();

        let task = TopicTask::new("files", || Ok(1u8)).with_name("copy");
        let fut = task.future();
        let job = task.into_job();
        assert!(job.claim());

        let done = run_once(job, WorkerId::new(7), &bus);
        assert_eq!(&*done.topic, "files");
        assert!(!done.failed);
        assert_eq!(fut.wait(), Ok(1));

        let first = rx.recv().await.unwrap();
        assert_eq!(first.kind, EventKind::TaskStarting);
        assert_eq!(first.worker, Some(7));
        let second = rx.recv().await.unwrap();
        assert_eq!(second.kind, EventKind::TaskCompleted);
        assert_eq!(second.task.as_deref(), Some("copy"));
    }

    #[tokio::test]
    async fn failure_is_reported_with_reason() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();

        let task = TopicTask::<()>::new("git", || Err(TaskError::fail("no such ref")));
        let job = task.into_job();
        job.claim();

        let done = run_once(job, WorkerId::new(1), &bus);
        assert!(done.failed);

        let _starting = rx.recv().await.unwrap();
        let failed = rx.recv().await.unwrap();
        assert_eq!(failed.kind, EventKind::TaskFailed);
        assert_eq!(
            failed.reason.as_deref(),
            Some("execution failed: no such ref")
        );
    }
}
