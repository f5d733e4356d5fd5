//! # Worker registry with per-class capacity bounds.
//!
//! [`WorkerPool`] is owned by the dispatcher actor and mutated only there.
//! Workers are spawned lazily, reused while idle and retired once their
//! keep-alive window elapses without new work.
//!
//! ## Rules
//! - A worker is `idle` iff its inbound slot is empty and it is not executing.
//! - At most `capacity(class)` workers of a class are registered at once.
//! - Removing a worker that is already gone is a silent no-op.

use std::fmt;

use crossbeam_channel::{Sender, TrySendError};
use tokio::sync::mpsc;

use crate::core::actor::Command;
use crate::core::config::DispatcherConfig;
use crate::core::worker::{WorkerParams, spawn_worker};
use crate::events::{Bus, Event, EventKind};
use crate::tasks::{BoxJob, TaskClass};

/// Identifier of a worker thread, unique per dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct WorkerId(u64);

impl WorkerId {
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    pub(crate) fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Read-only view of one registered worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerInfo {
    /// Worker id.
    pub id: u64,
    /// Worker class.
    pub class: TaskClass,
    /// True if waiting for work.
    pub idle: bool,
}

struct WorkerSlot {
    id: WorkerId,
    class: TaskClass,
    idle: bool,
    tx: Sender<BoxJob>,
}

/// Registry of live worker threads.
pub(crate) struct WorkerPool {
    cfg: DispatcherConfig,
    workers: Vec<WorkerSlot>,
    next_id: u64,
    spawned_total: u64,
    notify: mpsc::UnboundedSender<Command>,
    bus: Bus,
}

impl WorkerPool {
    pub(crate) fn new(
        cfg: DispatcherConfig,
        notify: mpsc::UnboundedSender<Command>,
        bus: Bus,
    ) -> Self {
        Self {
            cfg,
            workers: Vec::new(),
            next_id: 0,
            spawned_total: 0,
            notify,
            bus,
        }
    }

    /// Returns an idle worker of `class`, spawning one if the class is below capacity.
    ///
    /// `None` means the caller's task has to stay queued.
    pub(crate) fn get_idle_worker(&mut self, class: TaskClass) -> Option<WorkerId> {
        if let Some(w) = self.workers.iter().find(|w| w.idle && w.class == class) {
            return Some(w.id);
        }
        if self.active(class) < self.cfg.capacity(class) {
            return self.spawn(class);
        }
        None
    }

    fn spawn(&mut self, class: TaskClass) -> Option<WorkerId> {
        self.next_id += 1;
        let id = WorkerId::new(self.next_id);
        let (tx, rx) = crossbeam_channel::bounded::<BoxJob>(1);

        let params = WorkerParams {
            id,
            class,
            inbox: rx,
            keep_alive: self.cfg.keep_alive_clamped(),
            notify: self.notify.clone(),
            bus: self.bus.clone(),
        };
        if let Err(e) = spawn_worker(params, &self.cfg.thread_name) {
            tracing::error!(worker = %id, class = class.as_label(), error = %e, "failed to spawn worker thread");
            return None;
        }

        self.spawned_total += 1;
        self.workers.push(WorkerSlot {
            id,
            class,
            idle: true,
            tx,
        });
        self.bus.publish(
            Event::new(EventKind::WorkerSpawned)
                .with_worker(id.get())
                .with_class(class),
        );
        Some(id)
    }

    /// Hands a claimed job to an idle worker and marks it busy.
    ///
    /// On failure the job is given back (the worker is unknown, busy or gone).
    pub(crate) fn dispatch(&mut self, id: WorkerId, job: BoxJob) -> Result<(), BoxJob> {
        let Some(pos) = self.workers.iter().position(|w| w.id == id && w.idle) else {
            return Err(job);
        };
        match self.workers[pos].tx.try_send(job) {
            Ok(()) => {
                self.workers[pos].idle = false;
                Ok(())
            }
            Err(TrySendError::Full(job)) => Err(job),
            Err(TrySendError::Disconnected(job)) => {
                self.workers.swap_remove(pos);
                Err(job)
            }
        }
    }

    /// Marks a worker as waiting for work again.
    pub(crate) fn mark_idle(&mut self, id: WorkerId) {
        if let Some(w) = self.workers.iter_mut().find(|w| w.id == id) {
            w.idle = true;
        }
    }

    /// Retires the worker if it is still idle; returns true if it was removed.
    ///
    /// Dropping the sender makes the thread observe a disconnected inbox and exit.
    pub(crate) fn retire_if_idle(&mut self, id: WorkerId) -> bool {
        let Some(pos) = self.workers.iter().position(|w| w.id == id && w.idle) else {
            return false;
        };
        let slot = self.workers.swap_remove(pos);
        self.bus.publish(
            Event::new(EventKind::WorkerRetired)
                .with_worker(slot.id.get())
                .with_class(slot.class),
        );
        true
    }

    /// Forgets a worker whose thread has exited. Idempotent.
    pub(crate) fn remove(&mut self, id: WorkerId) {
        self.workers.retain(|w| w.id != id);
    }

    /// Number of registered workers of `class`.
    pub(crate) fn active(&self, class: TaskClass) -> usize {
        self.workers.iter().filter(|w| w.class == class).count()
    }

    pub(crate) fn spawned_total(&self) -> u64 {
        self.spawned_total
    }

    pub(crate) fn snapshot(&self) -> Vec<WorkerInfo> {
        self.workers
            .iter()
            .map(|w| WorkerInfo {
                id: w.id.get(),
                class: w.class,
                idle: w.idle,
            })
            .collect()
    }

    /// Drops every worker sender; idle threads exit at once, busy ones after their task.
    pub(crate) fn close(&mut self) {
        self.workers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_pool(leaf: usize, orchestrator: usize) -> (WorkerPool, mpsc::UnboundedReceiver<Command>) {
        let cfg = DispatcherConfig {
            leaf_workers: leaf,
            orchestrator_workers: orchestrator,
            keep_alive: Duration::from_secs(30),
            ..DispatcherConfig::default()
        };
        let (tx, rx) = mpsc::unbounded_channel();
        (WorkerPool::new(cfg, tx, Bus::new(64)), rx)
    }

    #[test]
    fn reuses_idle_worker_before_spawning() {
        let (mut pool, _rx) = test_pool(2, 1);
        let a = pool.get_idle_worker(TaskClass::Leaf).unwrap();
        let again = pool.get_idle_worker(TaskClass::Leaf).unwrap();
        assert_eq!(a, again);
        assert_eq!(pool.spawned_total(), 1);
        pool.close();
    }

    #[test]
    fn class_capacities_are_independent() {
        let (mut pool, _rx) = test_pool(1, 1);
        let leaf = pool.get_idle_worker(TaskClass::Leaf).unwrap();
        pool.workers.iter_mut().for_each(|w| w.idle = false);
        assert!(pool.get_idle_worker(TaskClass::Leaf).is_none());

        let orch = pool.get_idle_worker(TaskClass::Orchestrator).unwrap();
        assert_ne!(leaf, orch);
        assert_eq!(pool.active(TaskClass::Leaf), 1);
        assert_eq!(pool.active(TaskClass::Orchestrator), 1);
        pool.close();
    }

    #[test]
    fn retire_only_when_idle_and_remove_is_idempotent() {
        let (mut pool, _rx) = test_pool(1, 1);
        let id = pool.get_idle_worker(TaskClass::Leaf).unwrap();
        pool.workers[0].idle = false;
        assert!(!pool.retire_if_idle(id));

        pool.mark_idle(id);
        assert!(pool.retire_if_idle(id));
        assert!(!pool.retire_if_idle(id));
        pool.remove(id);
        pool.remove(id);
        assert_eq!(pool.active(TaskClass::Leaf), 0);
    }

    #[test]
    fn dispatch_rejects_busy_worker() {
        let (mut pool, _rx) = test_pool(1, 1);
        let id = pool.get_idle_worker(TaskClass::Leaf).unwrap();
        pool.workers[0].idle = false;

        let job = crate::tasks::TopicTask::new("t", || Ok(())).into_job();
        assert!(pool.dispatch(id, job).is_err());
        pool.close();
    }
}
