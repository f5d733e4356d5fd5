//! # Thread roles and the host event loops behind them.
//!
//! Cooperative code distinguishes two roles: the UI-confined thread and the
//! worker context. A [`Host`] supplies the two primitives everything else is
//! built on: "run this callback soon on role R" (FIFO per role) and "which role
//! is the calling thread".
//!
//! [`ThreadHost`] is the built-in host: two dedicated OS threads, each draining
//! its own FIFO channel. Embedders with their own loops implement [`Host`].
//!
//! ```text
//! enqueue(Ui, cb) ─────► [ui queue] ─────► "topicvisor-ui" thread     ─► cb()
//! enqueue(Worker, cb) ─► [worker queue] ─► "topicvisor-coop" thread   ─► cb()
//! ```
//!
//! ## Rules
//! - Callbacks enqueued on one role run in enqueue order, one at a time.
//! - `ensure_*` runs inline when the caller already is on the role.
//! - A panicking callback is logged; the loop keeps serving the queue.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};

use crossbeam_channel::{Receiver, Sender};

use crate::error::{RuntimeError, TaskError, panic_message};
use crate::tasks::TaskFuture;

/// Thread role a callback or continuation runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// The UI-confined thread.
    Ui,
    /// The background worker context.
    Worker,
}

impl Role {
    /// Returns a short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            Role::Ui => "ui",
            Role::Worker => "worker",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// A fire-and-forget callback.
pub type Callback = Box<dyn FnOnce() + Send + 'static>;

/// Event loops the cooperative runtime schedules onto.
pub trait Host: Send + Sync + 'static {
    /// Schedules `cb` to run soon on `role`, after callbacks already queued there.
    fn enqueue(&self, role: Role, cb: Callback) -> Result<(), RuntimeError>;

    /// Role of the calling thread, if it is one of the host's threads.
    fn current_role(&self) -> Option<Role>;
}

/// Convenience helpers over any [`Host`].
pub trait HostExt: Host {
    /// Queues `f` on the UI thread.
    fn enqueue_on_ui<F: FnOnce() + Send + 'static>(&self, f: F) -> Result<(), RuntimeError> {
        self.enqueue(Role::Ui, Box::new(f))
    }

    /// Queues `f` on the worker context.
    fn enqueue_on_worker<F: FnOnce() + Send + 'static>(&self, f: F) -> Result<(), RuntimeError> {
        self.enqueue(Role::Worker, Box::new(f))
    }

    /// Runs `f` right away if the caller is on `role`, else queues it there.
    fn ensure_on<F: FnOnce() + Send + 'static>(&self, role: Role, f: F) -> Result<(), RuntimeError> {
        if self.current_role() == Some(role) {
            f();
            Ok(())
        } else {
            self.enqueue(role, Box::new(f))
        }
    }

    /// [`ensure_on`](Self::ensure_on) for the UI thread.
    fn ensure_on_ui<F: FnOnce() + Send + 'static>(&self, f: F) -> Result<(), RuntimeError> {
        self.ensure_on(Role::Ui, f)
    }

    /// [`ensure_on`](Self::ensure_on) for the worker context.
    fn ensure_on_worker<F: FnOnce() + Send + 'static>(&self, f: F) -> Result<(), RuntimeError> {
        self.ensure_on(Role::Worker, f)
    }

    /// Queues `f` on `role` and returns a future of its result.
    ///
    /// Cancelling the future before the callback runs skips `f`. A panic in
    /// `f` resolves the future with [`TaskError::Panicked`]. On a closed host
    /// the future comes back already cancelled.
    fn submit_on<R, F>(&self, role: Role, f: F) -> TaskFuture<R>
    where
        R: Clone + Send + 'static,
        F: FnOnce() -> Result<R, TaskError> + Send + 'static,
    {
        let fut = TaskFuture::new();
        let done = fut.clone();
        let queued = self.enqueue(
            role,
            Box::new(move || {
                if !done.claim_running() {
                    return;
                }
                let outcome = panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
                    Err(TaskError::Panicked {
                        message: panic_message(payload.as_ref()),
                    })
                });
                done.resolve(outcome);
            }),
        );
        if let Err(e) = queued {
            tracing::warn!(role = %role, error = %e, "submission dropped");
            fut.cancel();
        }
        fut
    }

    /// [`submit_on`](Self::submit_on) for the worker context.
    fn submit_on_worker<R, F>(&self, f: F) -> TaskFuture<R>
    where
        R: Clone + Send + 'static,
        F: FnOnce() -> Result<R, TaskError> + Send + 'static,
    {
        self.submit_on(Role::Worker, f)
    }

    /// True on the UI thread.
    fn runs_on_ui(&self) -> bool {
        self.current_role() == Some(Role::Ui)
    }

    /// True on the worker context.
    fn runs_on_worker(&self) -> bool {
        self.current_role() == Some(Role::Worker)
    }

    /// Returns [`RuntimeError::WrongRole`] unless the caller is on `role`.
    fn check_role(&self, role: Role) -> Result<(), RuntimeError> {
        if self.current_role() == Some(role) {
            Ok(())
        } else {
            Err(RuntimeError::WrongRole { expected: role })
        }
    }

    /// Panics unless called on the UI thread.
    ///
    /// # Panics
    /// Calling UI-confined code from another thread is a programming error.
    #[track_caller]
    fn assert_on_ui(&self) {
        if let Err(e) = self.check_role(Role::Ui) {
            panic!("{e}");
        }
    }

    /// Panics unless called on the worker context.
    ///
    /// # Panics
    /// Calling worker-confined code from another thread is a programming error.
    #[track_caller]
    fn assert_on_worker(&self) {
        if let Err(e) = self.check_role(Role::Worker) {
            panic!("{e}");
        }
    }
}

impl<H: Host + ?Sized> HostExt for H {}

/// Wraps `f` so that every call runs on `role` (inline when already there).
///
/// Errors from a closed host are logged and the call is dropped.
pub fn on_role<A, F>(host: Arc<dyn Host>, role: Role, f: F) -> impl Fn(A) + Send + Sync + Clone + 'static
where
    A: Send + 'static,
    F: Fn(A) + Send + Sync + 'static,
{
    let f = Arc::new(f);
    move |arg: A| {
        let f = Arc::clone(&f);
        if let Err(e) = host.ensure_on(role, move || f(arg)) {
            tracing::warn!(role = %role, error = %e, "call dropped");
        }
    }
}

/// [`on_role`] for the UI thread.
pub fn on_ui<A, F>(host: Arc<dyn Host>, f: F) -> impl Fn(A) + Send + Sync + Clone + 'static
where
    A: Send + 'static,
    F: Fn(A) + Send + Sync + 'static,
{
    on_role(host, Role::Ui, f)
}

/// [`on_role`] for the worker context.
pub fn on_worker<A, F>(host: Arc<dyn Host>, f: F) -> impl Fn(A) + Send + Sync + Clone + 'static
where
    A: Send + 'static,
    F: Fn(A) + Send + Sync + 'static,
{
    on_role(host, Role::Worker, f)
}

enum Msg {
    Run(Callback),
    Stop,
}

struct Lane {
    role: Role,
    tx: Sender<Msg>,
    thread: ThreadId,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Lane {
    fn spawn(role: Role, name: String) -> std::io::Result<Self> {
        let (tx, rx) = crossbeam_channel::unbounded::<Msg>();
        let handle = thread::Builder::new()
            .name(name)
            .spawn(move || event_loop(role, rx))?;
        Ok(Self {
            role,
            tx,
            thread: handle.thread().id(),
            handle: Mutex::new(Some(handle)),
        })
    }

    fn send(&self, cb: Callback) -> Result<(), RuntimeError> {
        self.tx
            .send(Msg::Run(cb))
            .map_err(|_| RuntimeError::HostClosed { role: self.role })
    }

    fn stop(&self) {
        let _ = self.tx.send(Msg::Stop);
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        // a loop stopping itself cannot join its own thread
        if thread::current().id() == self.thread {
            return;
        }
        if let Some(h) = handle {
            let _ = h.join();
        }
    }
}

fn event_loop(role: Role, rx: Receiver<Msg>) {
    while let Ok(msg) = rx.recv() {
        match msg {
            Msg::Run(cb) => {
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(cb)) {
                    tracing::error!(
                        role = %role,
                        panic = %panic_message(payload.as_ref()),
                        "callback panicked"
                    );
                }
            }
            Msg::Stop => break,
        }
    }
    tracing::debug!(role = %role, "host loop stopped");
}

/// Built-in [`Host`]: one dedicated thread per role.
pub struct ThreadHost {
    ui: Lane,
    worker: Lane,
}

impl ThreadHost {
    /// Starts both loops with the default thread names.
    pub fn new() -> std::io::Result<Self> {
        Self::with_prefix("topicvisor")
    }

    /// Starts both loops; threads are named `{prefix}-ui` and `{prefix}-coop`.
    pub fn with_prefix(prefix: &str) -> std::io::Result<Self> {
        Ok(Self {
            ui: Lane::spawn(Role::Ui, format!("{prefix}-ui"))?,
            worker: Lane::spawn(Role::Worker, format!("{prefix}-coop"))?,
        })
    }

    fn lane(&self, role: Role) -> &Lane {
        match role {
            Role::Ui => &self.ui,
            Role::Worker => &self.worker,
        }
    }

    /// Runs `f` on `role` and blocks until it returns.
    ///
    /// Runs inline when already on `role`. A panic inside `f` is resumed on the
    /// calling thread.
    pub fn run_blocking<R, F>(&self, role: Role, f: F) -> Result<R, RuntimeError>
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        if self.current_role() == Some(role) {
            return Ok(f());
        }
        let (tx, rx) = crossbeam_channel::bounded(1);
        self.enqueue(
            role,
            Box::new(move || {
                let _ = tx.send(panic::catch_unwind(AssertUnwindSafe(f)));
            }),
        )?;
        match rx.recv() {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(payload)) => panic::resume_unwind(payload),
            Err(_) => Err(RuntimeError::HostClosed { role }),
        }
    }

    /// Blocks until every callback queued on `role` so far has run.
    pub fn flush(&self, role: Role) -> Result<(), RuntimeError> {
        self.run_blocking(role, || ())
    }

    /// Stops both loops after the callbacks already queued.
    ///
    /// Later `enqueue` calls fail with [`RuntimeError::HostClosed`].
    pub fn shutdown(&self) {
        self.ui.stop();
        self.worker.stop();
    }
}

impl Host for ThreadHost {
    fn enqueue(&self, role: Role, cb: Callback) -> Result<(), RuntimeError> {
        self.lane(role).send(cb)
    }

    fn current_role(&self) -> Option<Role> {
        let me = thread::current().id();
        [&self.ui, &self.worker]
            .into_iter()
            .find(|lane| lane.thread == me)
            .map(|lane| lane.role)
    }
}

impl Drop for ThreadHost {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for ThreadHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadHost").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[test]
    fn callbacks_run_in_fifo_order_on_their_role() {
        let host = ThreadHost::new().unwrap();
        let log = Arc::new(StdMutex::new(Vec::new()));
        for i in 0..5 {
            let log = log.clone();
            host.enqueue_on_ui(move || log.lock().unwrap().push(i)).unwrap();
        }
        host.flush(Role::Ui).unwrap();
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, 3, 4]);

        assert_eq!(host.run_blocking(Role::Ui, || 1 + 1).unwrap(), 2);
    }

    #[test]
    fn roles_are_detected_per_thread() {
        let host = Arc::new(ThreadHost::new().unwrap());
        assert_eq!(host.current_role(), None);
        assert!(host.check_role(Role::Ui).is_err());

        let h = host.clone();
        let seen = host
            .run_blocking(Role::Worker, move || (h.runs_on_worker(), h.runs_on_ui()))
            .unwrap();
        assert_eq!(seen, (true, false));
        drop(host);
    }

    #[test]
    fn ensure_runs_inline_only_on_matching_role() {
        let host = Arc::new(ThreadHost::new().unwrap());
        let h = host.clone();
        let order = host
            .run_blocking(Role::Ui, move || {
                let log = Arc::new(StdMutex::new(Vec::new()));
                let l = log.clone();
                h.ensure_on_ui(move || l.lock().unwrap().push("inline")).unwrap();
                let l = log.clone();
                h.enqueue_on_ui(move || l.lock().unwrap().push("queued")).unwrap();
                log.lock().unwrap().push("after");
                log
            })
            .unwrap();
        host.flush(Role::Ui).unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["inline", "after", "queued"]);
    }

    #[test]
    fn panicking_callback_does_not_kill_loop() {
        let host = ThreadHost::new().unwrap();
        host.enqueue_on_worker(|| panic!("callback bug")).unwrap();
        assert_eq!(host.run_blocking(Role::Worker, || 7).unwrap(), 7);
    }

    #[test]
    #[should_panic(expected = "must run on the Ui thread")]
    fn assert_on_ui_panics_elsewhere() {
        let host = ThreadHost::new().unwrap();
        host.assert_on_ui();
    }

    #[test]
    fn wrapped_function_always_runs_on_role() {
        let host = Arc::new(ThreadHost::new().unwrap());
        let (tx, rx) = crossbeam_channel::unbounded();
        let h = host.clone();
        let record = on_ui(host.clone(), move |n: u32| {
            let _ = tx.send((n, h.runs_on_ui()));
        });
        record(1);
        record(2);
        assert_eq!(rx.recv().unwrap(), (1, true));
        assert_eq!(rx.recv().unwrap(), (2, true));
    }

    #[test]
    fn closed_host_rejects_work() {
        let host = ThreadHost::new().unwrap();
        host.shutdown();
        assert_eq!(
            host.enqueue_on_ui(|| {}),
            Err(RuntimeError::HostClosed { role: Role::Ui })
        );
        let late = host.submit_on_worker(|| Ok(1));
        assert!(late.is_cancelled());
    }

    #[test]
    fn submitted_work_resolves_a_future() {
        let host = Arc::new(ThreadHost::new().unwrap());
        let h = host.clone();
        let on_worker = host.submit_on_worker(move || Ok(h.runs_on_worker()));
        assert_eq!(on_worker.wait(), Ok(true));

        let broken = host.submit_on::<(), _>(Role::Ui, || panic!("render bug"));
        assert_eq!(
            broken.wait(),
            Err(TaskError::Panicked {
                message: "render bug".into()
            })
        );
    }

    #[test]
    fn cancelled_submission_never_runs() {
        let host = ThreadHost::new().unwrap();
        let (open, gate) = crossbeam_channel::bounded::<()>(0);
        host.enqueue_on_worker(move || {
            let _ = gate.recv();
        })
        .unwrap();

        let ran = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = ran.clone();
        let skipped = host.submit_on_worker(move || {
            flag.store(true, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        });
        assert!(skipped.cancel());
        drop(open);
        host.flush(Role::Worker).unwrap();
        assert!(!ran.load(std::sync::atomic::Ordering::SeqCst));
        assert_eq!(skipped.wait(), Err(TaskError::Canceled));
    }
}
