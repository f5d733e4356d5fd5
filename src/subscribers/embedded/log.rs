//! # LogWriter: events rendered through `tracing`
//!
//! Task failures and subscriber problems are logged at `warn`/`error`, the
//! task lifecycle at `info`, worker churn at `debug`. Install any `tracing`
//! subscriber (e.g. `tracing-subscriber`'s `fmt`) to see the output.
//!
//! ## Example output (fmt layer)
//! ```text
//! INFO  topicvisor: queued topic="git" task="git-4" class="leaf"
//! INFO  topicvisor: starting topic="git" task="git-4" worker=2
//! WARN  topicvisor: failed topic="git" task="git-4" worker=2 elapsed_ms=12 reason="execution failed: no such ref"
//! INFO  topicvisor: cancelled topic="git" task="git-5" reason="topic_failed"
//! DEBUG topicvisor: worker retired worker=2 class="leaf"
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

const TARGET: &str = "topicvisor";

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let topic = e.topic.as_deref().unwrap_or("-");
        let task = e.task.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");
        let class = e.class.map(|c| c.as_label()).unwrap_or("-");

        match e.kind {
            EventKind::TaskQueued => {
                tracing::info!(target: TARGET, topic, task, class, "queued");
            }
            EventKind::TaskReplaced => {
                tracing::info!(target: TARGET, topic, task, by = reason, "replaced");
            }
            EventKind::TaskStarting => {
                tracing::info!(target: TARGET, topic, task, worker = e.worker, "starting");
            }
            EventKind::TaskCompleted => {
                tracing::info!(target: TARGET, topic, task, worker = e.worker, elapsed_ms = e.elapsed_ms, "completed");
            }
            EventKind::TaskFailed => {
                tracing::warn!(target: TARGET, topic, task, worker = e.worker, elapsed_ms = e.elapsed_ms, reason, "failed");
            }
            EventKind::TaskCancelled => {
                tracing::info!(target: TARGET, topic, task, reason, "cancelled");
            }
            EventKind::WorkerSpawned => {
                tracing::debug!(target: TARGET, worker = e.worker, class, "worker spawned");
            }
            EventKind::WorkerRetired => {
                tracing::debug!(target: TARGET, worker = e.worker, class, "worker retired");
            }
            EventKind::DispatcherStopped => {
                tracing::info!(target: TARGET, "dispatcher stopped");
            }
            EventKind::SubscriberOverflow => {
                tracing::warn!(target: TARGET, subscriber = task, reason, "subscriber overflow");
            }
            EventKind::SubscriberPanicked => {
                tracing::error!(target: TARGET, subscriber = task, info = reason, "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
