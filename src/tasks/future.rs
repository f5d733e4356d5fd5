//! # One-shot result cell shared by producer and consumers.
//!
//! [`TaskFuture`] carries the outcome of one [`TopicTask`](crate::TopicTask):
//! a value, a [`TaskError`], or cancellation (reported as [`TaskError::Canceled`]).
//!
//! ## State machine
//! ```text
//! Pending ──claim──► Running ──resolve──► Done (Ok | Err)
//!    │                                      ▲
//!    ├──cancel──► Cancelled                 │
//!    └──resolve (chained future) ───────────┘
//! ```
//!
//! ## Rules
//! - Every transition is a compare-and-swap on one atomic state word, so a
//!   `cancel` and a `claim` racing each other have exactly one winner.
//! - `cancel` after `claim` has no effect; in-flight work is never interrupted.
//! - The status is derived from the state word only, never stored separately.
//! - Callbacks registered with [`TaskFuture::on_done`] run exactly once, on the
//!   resolving thread (or immediately when the future is already resolved).

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};

use crate::error::TaskError;

const PENDING: u8 = 0;
const RUNNING: u8 = 1;
const CANCELLED: u8 = 2;
const DONE: u8 = 3;

/// Observable status of a task, derived from its future.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    /// Queued, not claimed by a worker yet.
    Pending,
    /// Claimed by a worker; the body is executing.
    Running,
    /// Resolved with a value or an error.
    Done,
    /// Cancelled before it was claimed.
    Cancelled,
}

impl TaskStatus {
    /// Returns a short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Done => "done",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}

type Callback<T> = Box<dyn FnOnce(&Result<T, TaskError>) + Send>;

struct Slot<T> {
    outcome: Option<Result<T, TaskError>>,
    callbacks: Vec<Callback<T>>,
    wakers: Vec<Waker>,
}

struct Shared<T> {
    state: AtomicU8,
    slot: Mutex<Slot<T>>,
    ready: Condvar,
}

/// Handle to the eventual outcome of a task.
///
/// Cheap to clone; all clones observe the same outcome. Consumers can block
/// ([`wait`](TaskFuture::wait)), `.await` it, or attach callbacks.
pub struct TaskFuture<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for TaskFuture<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for TaskFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskFuture")
            .field("status", &self.status())
            .finish()
    }
}

impl<T> TaskFuture<T> {
    /// Returns the derived status.
    pub fn status(&self) -> TaskStatus {
        match self.shared.state.load(Ordering::Acquire) {
            PENDING => TaskStatus::Pending,
            RUNNING => TaskStatus::Running,
            CANCELLED => TaskStatus::Cancelled,
            _ => TaskStatus::Done,
        }
    }

    /// True once the future is resolved or cancelled.
    pub fn is_done(&self) -> bool {
        matches!(self.status(), TaskStatus::Done | TaskStatus::Cancelled)
    }

    /// True if cancellation won.
    pub fn is_cancelled(&self) -> bool {
        self.status() == TaskStatus::Cancelled
    }

    /// Atomically moves `Pending -> Running`.
    ///
    /// Returns `false` if cancellation (or resolution) got there first; the
    /// task body must then not be invoked.
    pub(crate) fn claim_running(&self) -> bool {
        self.shared
            .state
            .compare_exchange(PENDING, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn lock_slot(&self) -> MutexGuard<'_, Slot<T>> {
        self.shared
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone + Send + 'static> TaskFuture<T> {
    pub(crate) fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: AtomicU8::new(PENDING),
                slot: Mutex::new(Slot {
                    outcome: None,
                    callbacks: Vec::new(),
                    wakers: Vec::new(),
                }),
                ready: Condvar::new(),
            }),
        }
    }

    /// Requests cancellation.
    ///
    /// Returns `true` if the future is cancelled after the call, `false` if a
    /// worker already claimed it or it is already resolved.
    pub fn cancel(&self) -> bool {
        match self.shared.state.compare_exchange(
            PENDING,
            CANCELLED,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                self.publish(Err(TaskError::Canceled));
                true
            }
            Err(CANCELLED) => true,
            Err(_) => false,
        }
    }

    /// Resolves a claimed (or never-claimed, chained) future.
    ///
    /// Returns `false` if the future was already cancelled or resolved.
    pub(crate) fn resolve(&self, outcome: Result<T, TaskError>) -> bool {
        let mut current = self.shared.state.load(Ordering::Acquire);
        loop {
            if current != PENDING && current != RUNNING {
                return false;
            }
            match self.shared.state.compare_exchange(
                current,
                DONE,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
        self.publish(outcome);
        true
    }

    fn publish(&self, outcome: Result<T, TaskError>) {
        let (callbacks, wakers) = {
            let mut slot = self.lock_slot();
            slot.outcome = Some(outcome.clone());
            (
                std::mem::take(&mut slot.callbacks),
                std::mem::take(&mut slot.wakers),
            )
        };
        self.shared.ready.notify_all();
        for waker in wakers {
            waker.wake();
        }
        for cb in callbacks {
            cb(&outcome);
        }
    }

    /// Registers a callback invoked with the outcome.
    ///
    /// Runs on the thread that resolves the future, or right away on the
    /// calling thread if the outcome is already known.
    pub fn on_done<F>(&self, f: F)
    where
        F: FnOnce(&Result<T, TaskError>) + Send + 'static,
    {
        let mut slot = self.lock_slot();
        match slot.outcome.clone() {
            Some(outcome) => {
                drop(slot);
                f(&outcome);
            }
            None => slot.callbacks.push(Box::new(f)),
        }
    }

    /// Makes `self` settle the same way as `target`.
    ///
    /// Success and failure are copied; cancellation of `target` cancels `self`.
    /// Nothing happens if `self` is no longer pending by then.
    pub(crate) fn follow(&self, target: &TaskFuture<T>) {
        let me = self.clone();
        target.on_done(move |outcome| match outcome {
            Err(TaskError::Canceled) => {
                me.cancel();
            }
            other => {
                if me.status() == TaskStatus::Pending {
                    me.resolve(other.clone());
                }
            }
        });
    }

    /// Returns the outcome if already known, without waiting for the task.
    ///
    /// Once [`is_done`](Self::is_done) reports true this always returns `Some`.
    pub fn try_outcome(&self) -> Option<Result<T, TaskError>> {
        if self.is_done() {
            // the state word flips just before the outcome lands in the slot
            return Some(self.wait());
        }
        self.lock_slot().outcome.clone()
    }

    /// Blocks the calling thread until the outcome is known.
    ///
    /// Do not call this from inside an async runtime worker; `.await` the
    /// future there instead.
    pub fn wait(&self) -> Result<T, TaskError> {
        let mut slot = self.lock_slot();
        loop {
            if let Some(outcome) = slot.outcome.as_ref() {
                return outcome.clone();
            }
            slot = self
                .shared
                .ready
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Blocks for at most `timeout`; `None` if the outcome is still unknown.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<T, TaskError>> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.lock_slot();
        loop {
            if let Some(outcome) = slot.outcome.as_ref() {
                return Some(outcome.clone());
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            slot = self
                .shared
                .ready
                .wait_timeout(slot, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

impl<T: Clone + Send + 'static> Future for TaskFuture<T> {
    type Output = Result<T, TaskError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slot = self.lock_slot();
        if let Some(outcome) = slot.outcome.as_ref() {
            return Poll::Ready(outcome.clone());
        }
        if !slot.wakers.iter().any(|w| w.will_wake(cx.waker())) {
            slot.wakers.push(cx.waker().clone());
        }
        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    #[test]
    fn status_is_derived_from_transitions() {
        let fut = TaskFuture::<u32>::new();
        assert_eq!(fut.status(), TaskStatus::Pending);
        assert!(fut.claim_running());
        assert_eq!(fut.status(), TaskStatus::Running);
        assert!(fut.resolve(Ok(7)));
        assert_eq!(fut.status(), TaskStatus::Done);
        assert_eq!(fut.wait(), Ok(7));
        assert!(!fut.resolve(Ok(8)), "second resolution must be rejected");
        assert_eq!(fut.wait(), Ok(7));
    }

    #[test]
    fn cancel_before_claim_wins() {
        let fut = TaskFuture::<u32>::new();
        assert!(fut.cancel());
        assert!(!fut.claim_running());
        assert_eq!(fut.status(), TaskStatus::Cancelled);
        assert_eq!(fut.wait(), Err(TaskError::Canceled));
        assert!(fut.cancel(), "cancelling twice still reports cancelled");
    }

    #[test]
    fn cancel_after_claim_is_ignored() {
        let fut = TaskFuture::<u32>::new();
        assert!(fut.claim_running());
        assert!(!fut.cancel());
        assert_eq!(fut.status(), TaskStatus::Running);
        fut.resolve(Err(TaskError::fail("boom")));
        assert_eq!(fut.wait(), Err(TaskError::fail("boom")));
    }

    #[test]
    fn claim_and_cancel_race_has_one_winner() {
        for _ in 0..200 {
            let fut = TaskFuture::<()>::new();
            let other = fut.clone();
            let canceller = thread::spawn(move || other.cancel());
            let claimed = fut.claim_running();
            let cancelled = canceller.join().unwrap();
            assert_ne!(claimed, cancelled);
        }
    }

    #[test]
    fn callbacks_run_once_before_and_after_resolution() {
        let fut = TaskFuture::<&'static str>::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let h = hits.clone();
        fut.on_done(move |res| {
            assert_eq!(res, &Ok("ok"));
            h.fetch_add(1, Ordering::SeqCst);
        });
        fut.claim_running();
        fut.resolve(Ok("ok"));

        let h = hits.clone();
        fut.on_done(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn follower_copies_value_error_and_cancellation() {
        let target = TaskFuture::<u32>::new();
        let follower = TaskFuture::<u32>::new();
        follower.follow(&target);
        target.claim_running();
        target.resolve(Ok(42));
        assert_eq!(follower.wait(), Ok(42));

        let target = TaskFuture::<u32>::new();
        let follower = TaskFuture::<u32>::new();
        follower.follow(&target);
        target.claim_running();
        target.resolve(Err(TaskError::fail("nope")));
        assert_eq!(follower.wait(), Err(TaskError::fail("nope")));

        let target = TaskFuture::<u32>::new();
        let follower = TaskFuture::<u32>::new();
        follower.follow(&target);
        target.cancel();
        assert!(follower.is_cancelled());
    }

    #[test]
    fn cancelled_follower_stays_cancelled() {
        let target = TaskFuture::<u32>::new();
        let follower = TaskFuture::<u32>::new();
        follower.follow(&target);
        follower.cancel();
        target.claim_running();
        target.resolve(Ok(1));
        assert_eq!(follower.wait(), Err(TaskError::Canceled));
    }

    #[test]
    fn wait_blocks_until_other_thread_resolves() {
        let fut = TaskFuture::<String>::new();
        assert!(fut.wait_timeout(Duration::from_millis(10)).is_none());

        let producer = fut.clone();
        let handle = thread::spawn(move || {
            producer.claim_running();
            thread::sleep(Duration::from_millis(20));
            producer.resolve(Ok("late".to_string()));
        });
        assert_eq!(fut.wait(), Ok("late".to_string()));
        handle.join().unwrap();
    }

    #[test]
    fn terminal_status_always_has_an_outcome() {
        for round in 0..200u32 {
            let fut = TaskFuture::<u32>::new();
            let producer = fut.clone();
            let handle = thread::spawn(move || {
                if round % 2 == 0 {
                    producer.claim_running();
                    producer.resolve(Ok(round));
                } else {
                    producer.cancel();
                }
            });
            while !fut.is_done() {
                std::hint::spin_loop();
            }
            let expected = if round % 2 == 0 {
                Ok(round)
            } else {
                Err(TaskError::Canceled)
            };
            assert_eq!(fut.try_outcome(), Some(expected));
            handle.join().unwrap();
        }
    }

    #[tokio::test]
    async fn await_resolves_from_another_thread() {
        let fut = TaskFuture::<u8>::new();
        let producer = fut.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            producer.claim_running();
            producer.resolve(Ok(3));
        });
        assert_eq!(fut.await, Ok(3));
    }
}
