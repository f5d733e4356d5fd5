//! # Dispatcher actor: the single writer of scheduling state.
//!
//! The actor owns the pending queue, the set of running topics and the worker
//! pool. Nothing else can reach them: every request (from callers on any
//! thread, or from worker threads reporting back) arrives as a [`Command`] on
//! one unbounded channel and is applied in arrival order.
//!
//! ## Architecture
//! ```text
//! Dispatcher::add_task ──────────┐
//! Dispatcher::replace_or_add ────┤
//! worker: Finished/IdleTimeout ──┼──► mpsc ──► DispatchActor::handle()
//! worker: Exited ────────────────┤                 ├─► queue (VecDeque<BoxJob>)
//! Dispatcher::snapshot ──────────┘                 ├─► running_topics (HashSet)
//!                                                  └─► WorkerPool
//! ```
//!
//! ## Rules
//! - A topic is in `running_topics` at most once; two bodies of one topic never overlap.
//! - The queue is scanned front-to-back, so within a topic tasks start in submission order.
//! - A task is either in the queue or in a worker slot, never both.
//! - A failed body cancels the still-queued backlog of **its own topic** only.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::config::DispatcherConfig;
use crate::core::pool::{WorkerId, WorkerInfo, WorkerPool};
use crate::error::TaskError;
use crate::events::{Bus, Event, EventKind};
use crate::tasks::{BoxJob, Job, TaskClass, TaskStatus};

/// Messages accepted by the dispatcher actor.
pub(crate) enum Command {
    /// Append a task to the queue.
    Submit(BoxJob),
    /// Displace queued tasks of the same topic, then append.
    SubmitReplacing(BoxJob),
    /// A worker finished a task body.
    Finished {
        worker: WorkerId,
        topic: Arc<str>,
        failed: bool,
    },
    /// A worker waited a full keep-alive window without work.
    IdleTimeout(WorkerId),
    /// A worker thread left its loop.
    Exited(WorkerId),
    /// Read-only state dump.
    Snapshot(oneshot::Sender<Snapshot>),
}

/// Read-only view of the dispatcher state.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Queued tasks in submission order.
    pub queued: Vec<QueuedTask>,
    /// Topics owned by a busy worker (sorted).
    pub running_topics: Vec<String>,
    /// Registered workers.
    pub workers: Vec<WorkerInfo>,
    /// Number of worker threads spawned since start.
    pub spawned_total: u64,
}

impl Snapshot {
    /// Number of registered workers of `class`.
    pub fn workers_of(&self, class: TaskClass) -> usize {
        self.workers.iter().filter(|w| w.class == class).count()
    }
}

/// One entry of [`Snapshot::queued`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedTask {
    /// Topic of the task.
    pub topic: String,
    /// Diagnostic name.
    pub name: String,
    /// Worker class.
    pub class: TaskClass,
    /// Derived status.
    pub status: TaskStatus,
}

pub(crate) struct DispatchActor {
    queue: VecDeque<BoxJob>,
    running_topics: HashSet<Arc<str>>,
    pool: WorkerPool,
    bus: Bus,
}

impl DispatchActor {
    pub(crate) fn new(cfg: DispatcherConfig, notify: mpsc::UnboundedSender<Command>, bus: Bus) -> Self {
        Self {
            queue: VecDeque::new(),
            running_topics: HashSet::new(),
            pool: WorkerPool::new(cfg, notify, bus.clone()),
            bus,
        }
    }

    /// Spawns the actor loop on the current Tokio runtime.
    pub(crate) fn spawn(
        mut self,
        mut rx: mpsc::UnboundedReceiver<Command>,
        token: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    cmd = rx.recv() => match cmd {
                        Some(cmd) => self.handle(cmd),
                        None => break,
                    }
                }
            }
            rx.close();
            while let Ok(cmd) = rx.try_recv() {
                self.handle_closing(cmd);
            }
            self.shutdown();
        })
    }

    /// Applies a command that was still in the mailbox when the loop stopped.
    ///
    /// Submissions join the backlog without being dispatched, so `shutdown`
    /// cancels them with the rest.
    fn handle_closing(&mut self, cmd: Command) {
        match cmd {
            Command::Submit(job) | Command::SubmitReplacing(job) => self.queue.push_back(job),
            Command::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
            Command::Finished { .. } | Command::IdleTimeout(_) | Command::Exited(_) => {}
        }
    }

    pub(crate) fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Submit(job) => self.add_task(job),
            Command::SubmitReplacing(job) => self.replace_or_add_task(job),
            Command::Finished {
                worker,
                topic,
                failed,
            } => self.on_finished(worker, topic, failed),
            Command::IdleTimeout(worker) => {
                if self.pool.retire_if_idle(worker) {
                    tracing::debug!(worker = %worker, "worker retired after keep-alive");
                }
            }
            Command::Exited(worker) => {
                self.pool.remove(worker);
                // a worker that disappeared unexpectedly frees capacity
                self.pump();
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    fn add_task(&mut self, job: BoxJob) {
        self.bus.publish(
            Event::new(EventKind::TaskQueued)
                .with_topic(Arc::clone(job.topic()))
                .with_task(Arc::clone(job.name()))
                .with_class(job.class()),
        );
        self.queue.push_back(job);
        self.pump();
    }

    fn replace_or_add_task(&mut self, job: BoxJob) {
        let mut i = 0;
        while i < self.queue.len() {
            if self.queue[i].topic() != job.topic() {
                i += 1;
                continue;
            }
            let Some(older) = self.queue.remove(i) else {
                break;
            };
            if job.adopt(older.as_ref()) {
                self.bus.publish(
                    Event::new(EventKind::TaskReplaced)
                        .with_topic(Arc::clone(older.topic()))
                        .with_task(Arc::clone(older.name()))
                        .with_reason(Arc::clone(job.name())),
                );
            } else {
                older.cancel();
                self.publish_cancelled(older.as_ref(), "type_mismatch");
            }
        }
        self.add_task(job);
    }

    fn on_finished(&mut self, worker: WorkerId, topic: Arc<str>, failed: bool) {
        self.running_topics.remove(&topic);
        if failed {
            self.cancel_topic(&topic);
        }
        self.pool.mark_idle(worker);
        self.pump();
    }

    /// Cancels every queued task of `topic`; their bodies never run.
    fn cancel_topic(&mut self, topic: &Arc<str>) {
        let (doomed, kept): (VecDeque<BoxJob>, VecDeque<BoxJob>) =
            self.queue.drain(..).partition(|job| job.topic() == topic);
        self.queue = kept;
        for job in doomed {
            job.cancel();
            self.publish_cancelled(job.as_ref(), "topic_failed");
        }
    }

    /// Hands every eligible queued task to a worker of its class.
    ///
    /// A topic skipped once in a scan stays skipped for the rest of that scan,
    /// so a later task can never overtake an earlier one of the same topic.
    fn pump(&mut self) {
        let mut skipped: HashSet<Arc<str>> = HashSet::new();
        let mut i = 0;

        while i < self.queue.len() {
            let job = &self.queue[i];
            if job.status() == TaskStatus::Cancelled {
                if let Some(job) = self.queue.remove(i) {
                    self.publish_cancelled(job.as_ref(), "cancelled");
                }
                continue;
            }

            let topic = Arc::clone(job.topic());
            if self.running_topics.contains(&topic) || skipped.contains(&topic) {
                i += 1;
                continue;
            }
            let Some(worker) = self.pool.get_idle_worker(job.class()) else {
                skipped.insert(topic);
                i += 1;
                continue;
            };

            let Some(job) = self.queue.remove(i) else {
                break;
            };
            if !job.claim() {
                self.publish_cancelled(job.as_ref(), "cancelled");
                continue;
            }

            let inserted = self.running_topics.insert(Arc::clone(&topic));
            debug_assert!(inserted, "topic {topic} already running");

            if let Err(job) = self.pool.dispatch(worker, job) {
                tracing::error!(worker = %worker, topic = %topic, "worker rejected task");
                self.running_topics.remove(&topic);
                job.abort(TaskError::fail("worker exited before accepting the task"));
                self.cancel_topic(&topic);
            }
        }
    }

    fn publish_cancelled(&self, job: &dyn Job, reason: &'static str) {
        self.bus.publish(
            Event::new(EventKind::TaskCancelled)
                .with_topic(Arc::clone(job.topic()))
                .with_task(Arc::clone(job.name()))
                .with_reason(reason),
        );
    }

    fn snapshot(&self) -> Snapshot {
        let mut running_topics: Vec<String> =
            self.running_topics.iter().map(|t| t.to_string()).collect();
        running_topics.sort_unstable();

        Snapshot {
            queued: self
                .queue
                .iter()
                .map(|job| QueuedTask {
                    topic: job.topic().to_string(),
                    name: job.name().to_string(),
                    class: job.class(),
                    status: job.status(),
                })
                .collect(),
            running_topics,
            workers: self.pool.snapshot(),
            spawned_total: self.pool.spawned_total(),
        }
    }

    /// Cancels the backlog and releases every worker.
    fn shutdown(&mut self) {
        for job in self.queue.drain(..).collect::<Vec<_>>() {
            job.cancel();
            self.publish_cancelled(job.as_ref(), "shutdown");
        }
        self.pool.close();
        self.bus.publish(Event::new(EventKind::DispatcherStopped));
    }
}
