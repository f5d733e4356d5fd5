//! # Cooperative computations that hop between thread roles.
//!
//! A cooperative computation is an `async` block that receives a [`Co`]
//! handle. Awaiting one of the handle's markers suspends the block and tells
//! the driver where the rest of it should run:
//!
//! | marker                  | on the target role already | elsewhere         |
//! |-------------------------|----------------------------|-------------------|
//! | `co.await_ui()`         | queued behind pending work | queued on UI      |
//! | `co.await_worker()`     | queued behind pending work | queued on worker  |
//! | `co.ensure_on_ui()`     | continues inline           | queued on UI      |
//! | `co.ensure_on_worker()` | continues inline           | queued on worker  |
//!
//! Every marker resolves to a fresh [`Timer`], so a segment can check its UI
//! budget and yield again:
//!
//! ```rust
//! use std::sync::Arc;
//! use topicvisor::coop::{CoopScheduler, Host, ThreadHost};
//!
//! let host: Arc<dyn Host> = Arc::new(ThreadHost::new().unwrap());
//! let coop = CoopScheduler::new(host);
//!
//! let render = coop.cooperative(|co, rows: Vec<u32>| async move {
//!     let mut timer = co.await_ui().await;
//!     for _row in rows {
//!         // draw the row ...
//!         if timer.exhausted_ui_budget() {
//!             timer = co.await_ui().await;
//!         }
//!     }
//! });
//! render(vec![1, 2, 3]);
//! ```
//!
//! ## Driver
//! ```text
//! run(f) ── tick ──► poll on the calling thread
//!                      ├─ Ready                         → done
//!                      ├─ Pending, marker requested:
//!                      │     Ensure* and already on role → poll again (trampoline)
//!                      │     otherwise                   → host.enqueue(role, tick)
//!                      └─ Pending, no marker (awaiting another future):
//!                            its waker enqueues tick on the role that polled last
//! ```
//!
//! ## Rules
//! - The first segment runs synchronously inside `run`; control returns to the
//!   caller at the first real suspension.
//! - A segment queued on another role never runs inline in the suspending call.
//! - A marker only completes when the driver resumes it; stray wake-ups of the
//!   computation cannot skip a hop.
//! - Panics are not captured: in the first segment they unwind into the
//!   caller, later they surface on the host loop that resumed the segment.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use futures::task::{ArcWake, waker_ref};

use crate::coop::host::{Host, Role};
use crate::coop::timer::Timer;

/// Where and how a suspended computation continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Continuation {
    /// Queue behind the work already pending on the UI thread.
    AwaitUi,
    /// Queue behind the work already pending on the worker context.
    AwaitWorker,
    /// Continue inline if on the UI thread, else queue there.
    EnsureOnUi,
    /// Continue inline if on the worker context, else queue there.
    EnsureOnWorker,
}

impl Continuation {
    /// Role the computation continues on.
    pub fn role(self) -> Role {
        match self {
            Continuation::AwaitUi | Continuation::EnsureOnUi => Role::Ui,
            Continuation::AwaitWorker | Continuation::EnsureOnWorker => Role::Worker,
        }
    }

    /// True for the `Ensure*` markers.
    pub fn may_inline(self) -> bool {
        matches!(
            self,
            Continuation::EnsureOnUi | Continuation::EnsureOnWorker
        )
    }

    /// Returns a short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            Continuation::AwaitUi => "await_ui",
            Continuation::AwaitWorker => "await_worker",
            Continuation::EnsureOnUi => "ensure_on_ui",
            Continuation::EnsureOnWorker => "ensure_on_worker",
        }
    }

    fn encode(self) -> u8 {
        match self {
            Continuation::AwaitUi => 1,
            Continuation::AwaitWorker => 2,
            Continuation::EnsureOnUi => 3,
            Continuation::EnsureOnWorker => 4,
        }
    }

    fn decode(v: u8) -> Option<Self> {
        match v {
            1 => Some(Continuation::AwaitUi),
            2 => Some(Continuation::AwaitWorker),
            3 => Some(Continuation::EnsureOnUi),
            4 => Some(Continuation::EnsureOnWorker),
            _ => None,
        }
    }
}

const NO_REQUEST: u8 = 0;

/// Flags shared between a computation's markers and its driver.
#[derive(Default)]
struct Signal {
    requested: AtomicU8,
    resumed: AtomicBool,
}

impl Signal {
    fn request(&self, marker: Continuation) {
        self.requested.store(marker.encode(), Ordering::Release);
    }

    fn take_request(&self) -> Option<Continuation> {
        Continuation::decode(self.requested.swap(NO_REQUEST, Ordering::AcqRel))
    }
}

/// Handle passed into a cooperative computation.
#[derive(Clone)]
pub struct Co {
    signal: Arc<Signal>,
}

impl Co {
    /// Suspends with an explicit marker.
    pub fn hop(&self, marker: Continuation) -> Hop {
        Hop {
            signal: Arc::clone(&self.signal),
            marker,
            requested: false,
        }
    }

    /// Continues on the UI thread, behind work already queued there.
    pub fn await_ui(&self) -> Hop {
        self.hop(Continuation::AwaitUi)
    }

    /// Continues on the worker context, behind work already queued there.
    pub fn await_worker(&self) -> Hop {
        self.hop(Continuation::AwaitWorker)
    }

    /// Continues on the UI thread, inline if already there.
    pub fn ensure_on_ui(&self) -> Hop {
        self.hop(Continuation::EnsureOnUi)
    }

    /// Continues on the worker context, inline if already there.
    pub fn ensure_on_worker(&self) -> Hop {
        self.hop(Continuation::EnsureOnWorker)
    }
}

/// Future returned by the [`Co`] markers; resolves to the new segment's timer.
#[must_use = "a marker does nothing unless awaited"]
pub struct Hop {
    signal: Arc<Signal>,
    marker: Continuation,
    requested: bool,
}

impl Future for Hop {
    type Output = Timer;

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Timer> {
        if !self.requested {
            self.requested = true;
            self.signal.request(self.marker);
            return Poll::Pending;
        }
        if self.signal.resumed.swap(false, Ordering::AcqRel) {
            Poll::Ready(Timer::start())
        } else {
            Poll::Pending
        }
    }
}

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

const ROLE_UI: u8 = 0;
const ROLE_WORKER: u8 = 1;

struct Driver {
    host: Arc<dyn Host>,
    fut: Mutex<Option<BoxFuture>>,
    signal: Arc<Signal>,
    last_role: AtomicU8,
}

impl Driver {
    /// Polls the computation until it completes or leaves the current role.
    ///
    /// `resume` is true when this tick continues a marker.
    fn tick(self: &Arc<Self>, mut resume: bool) {
        loop {
            let current = self.host.current_role();
            let marker = {
                // poisoned: an earlier segment panicked, the computation is dead
                let Ok(mut slot) = self.fut.lock() else {
                    return;
                };
                let Some(fut) = slot.as_mut() else {
                    return;
                };
                self.last_role.store(
                    match current {
                        Some(Role::Ui) => ROLE_UI,
                        _ => ROLE_WORKER,
                    },
                    Ordering::Release,
                );
                if resume {
                    self.signal.resumed.store(true, Ordering::Release);
                }

                let waker = waker_ref(self);
                let mut cx = Context::from_waker(&waker);
                let polled = fut.as_mut().poll(&mut cx);
                self.signal.resumed.store(false, Ordering::Release);

                if polled.is_ready() {
                    *slot = None;
                    self.signal.take_request();
                    return;
                }
                self.signal.take_request()
            };

            let Some(marker) = marker else {
                // parked on another future; its waker reschedules us
                return;
            };
            if marker.may_inline() && current == Some(marker.role()) {
                resume = true;
                continue;
            }
            self.schedule(marker.role(), true);
            return;
        }
    }

    fn schedule(self: &Arc<Self>, role: Role, resume: bool) {
        let me = Arc::clone(self);
        if let Err(e) = self.host.enqueue(role, Box::new(move || me.tick(resume))) {
            tracing::warn!(role = %role, error = %e, "cooperative computation dropped");
        }
    }
}

impl ArcWake for Driver {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        let role = match arc_self.last_role.load(Ordering::Acquire) {
            ROLE_UI => Role::Ui,
            _ => Role::Worker,
        };
        arc_self.schedule(role, false);
    }
}

/// Starts cooperative computations on a [`Host`].
#[derive(Clone)]
pub struct CoopScheduler {
    host: Arc<dyn Host>,
}

impl CoopScheduler {
    /// Creates a scheduler over `host`.
    pub fn new(host: Arc<dyn Host>) -> Self {
        Self { host }
    }

    /// Returns the host.
    pub fn host(&self) -> &Arc<dyn Host> {
        &self.host
    }

    /// Runs the computation built by `f`.
    ///
    /// Returns once the computation completed or first left the calling thread.
    pub fn run<F, Fut>(&self, f: F)
    where
        F: FnOnce(Co) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let signal = Arc::new(Signal::default());
        let fut = f(Co {
            signal: Arc::clone(&signal),
        });
        let driver = Arc::new(Driver {
            host: Arc::clone(&self.host),
            fut: Mutex::new(Some(Box::pin(fut))),
            signal,
            last_role: AtomicU8::new(ROLE_WORKER),
        });
        driver.tick(false);
    }

    /// Turns `f` into a plain function; every call starts a new computation.
    pub fn cooperative<A, F, Fut>(&self, f: F) -> impl Fn(A) + Send + Sync + Clone + use<A, F, Fut>
    where
        A: 'static,
        F: Fn(Co, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let sched = self.clone();
        let f = Arc::new(f);
        move |arg: A| {
            let f = Arc::clone(&f);
            sched.run(move |co| f(co, arg));
        }
    }
}

impl std::fmt::Debug for CoopScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoopScheduler").finish_non_exhaustive()
    }
}

/// Shorthand for [`CoopScheduler::cooperative`].
pub fn cooperative<A, F, Fut>(host: Arc<dyn Host>, f: F) -> impl Fn(A) + Send + Sync + Clone + 'static
where
    A: 'static,
    F: Fn(Co, A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    CoopScheduler::new(host).cooperative(f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coop::host::{HostExt, ThreadHost};
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    type Log = Arc<StdMutex<Vec<String>>>;

    fn setup() -> (Arc<ThreadHost>, CoopScheduler, Log) {
        let host = Arc::new(ThreadHost::new().unwrap());
        let sched = CoopScheduler::new(host.clone());
        (host, sched, Arc::new(StdMutex::new(Vec::new())))
    }

    fn push(log: &Log, host: &Arc<ThreadHost>, what: &str) {
        let role = host.current_role().map(|r| r.as_label()).unwrap_or("main");
        log.lock().unwrap().push(format!("{what}@{role}"));
    }

    fn entries(log: &Log) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    #[test]
    fn first_segment_is_synchronous_and_rest_waits_its_turn() {
        let (host, sched, log) = setup();
        let (open, gate) = crossbeam_channel::bounded::<()>(0);

        // occupy the UI loop, then queue work behind the blocker
        host.enqueue_on_ui(move || {
            let _ = gate.recv();
        })
        .unwrap();
        let (l, h) = (log.clone(), host.clone());
        host.enqueue_on_ui(move || push(&l, &h, "pending")).unwrap();

        let (l, h) = (log.clone(), host.clone());
        let returned_with = host
            .run_blocking(Role::Worker, move || {
                let (l2, h2) = (l.clone(), h.clone());
                sched.run(move |co| async move {
                    push(&l2, &h2, "step1");
                    co.await_ui().await;
                    push(&l2, &h2, "step2");
                });
                entries(&l)
            })
            .unwrap();
        assert_eq!(returned_with, vec!["step1@worker"]);

        drop(open);
        host.flush(Role::Ui).unwrap();
        assert_eq!(
            entries(&log),
            vec!["step1@worker", "pending@ui", "step2@ui"]
        );
    }

    #[test]
    fn ensure_on_current_role_continues_inline() {
        let (host, sched, log) = setup();
        let (l, h) = (log.clone(), host.clone());
        let seen = host
            .run_blocking(Role::Ui, move || {
                let (l2, h2) = (l.clone(), h.clone());
                sched.run(move |co| async move {
                    push(&l2, &h2, "a");
                    co.ensure_on_ui().await;
                    push(&l2, &h2, "b");
                });
                entries(&l)
            })
            .unwrap();
        assert_eq!(seen, vec!["a@ui", "b@ui"]);
    }

    #[test]
    fn await_on_current_role_still_yields() {
        let (host, sched, log) = setup();
        let (l, h) = (log.clone(), host.clone());
        let seen = host
            .run_blocking(Role::Ui, move || {
                let (l2, h2) = (l.clone(), h.clone());
                sched.run(move |co| async move {
                    push(&l2, &h2, "a");
                    co.await_ui().await;
                    push(&l2, &h2, "b");
                });
                entries(&l)
            })
            .unwrap();
        assert_eq!(seen, vec!["a@ui"]);
        host.flush(Role::Ui).unwrap();
        assert_eq!(entries(&log), vec!["a@ui", "b@ui"]);
    }

    #[test]
    fn computation_hops_between_roles() {
        let (host, sched, log) = setup();
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        let (l, h) = (log.clone(), host.clone());

        sched.run(move |co| async move {
            push(&l, &h, "start");
            co.ensure_on_worker().await;
            push(&l, &h, "fetch");
            co.ensure_on_ui().await;
            push(&l, &h, "render");
            co.await_worker().await;
            push(&l, &h, "persist");
            let _ = done_tx.send(());
        });

        done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(
            entries(&log),
            vec!["start@main", "fetch@worker", "render@ui", "persist@worker"]
        );
    }

    #[test]
    fn markers_yield_fresh_timers() {
        let (host, sched, _log) = setup();
        let (tx, rx) = crossbeam_channel::bounded(1);
        sched.run(move |co| async move {
            let before = co.await_worker().await;
            std::thread::sleep(Duration::from_millis(25));
            assert!(before.exhausted_ui_budget());
            let after = co.await_worker().await;
            let _ = tx.send(after.elapsed());
        });
        let elapsed = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(elapsed < Duration::from_millis(25));
        drop(host);
    }

    #[test]
    fn decorated_function_starts_independent_computations() {
        let (host, sched, _log) = setup();
        let (tx, rx) = crossbeam_channel::unbounded();
        let h = host.clone();
        let f = sched.cooperative(move |co, n: u32| {
            let tx = tx.clone();
            let h = h.clone();
            async move {
                co.await_ui().await;
                let _ = tx.send((n, h.runs_on_ui()));
            }
        });
        f(1);
        f(2);
        host.flush(Role::Ui).unwrap();
        let got: Vec<_> = rx.try_iter().collect();
        assert_eq!(got, vec![(1, true), (2, true)]);
    }

    #[test]
    fn free_cooperative_outlives_its_scheduler() {
        let host = Arc::new(ThreadHost::new().unwrap());
        let (tx, rx) = crossbeam_channel::unbounded();
        let h = host.clone();
        let notify = cooperative(host.clone(), move |co, n: u32| {
            let tx = tx.clone();
            let h = h.clone();
            async move {
                co.ensure_on_worker().await;
                let _ = tx.send((n, h.runs_on_worker()));
            }
        });
        let handle = std::thread::spawn(move || notify(3));
        handle.join().unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), (3, true));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn awaits_task_futures_between_hops() {
        let d = crate::Dispatcher::new(crate::DispatcherConfig::default());
        let (host, sched, _log) = setup();
        let (tx, rx) = tokio::sync::oneshot::channel();
        let h = host.clone();
        let dispatcher = d.clone();

        sched.run(move |co| async move {
            co.await_worker().await;
            let value = dispatcher.add_task("registry", || Ok(41)).await;
            let after_task = h.current_role();
            co.await_ui().await;
            let _ = tx.send((value, after_task, h.current_role()));
        });

        let (value, after_task, last) = tokio::time::timeout(Duration::from_secs(5), rx)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(value, Ok(41));
        assert_eq!(after_task, Some(Role::Worker));
        assert_eq!(last, Some(Role::Ui));
        d.shutdown();
    }
}
