//! # Worker thread loop.
//!
//! Each worker is a plain OS thread owning the receiving end of a single-slot
//! channel. Task bodies are synchronous and may block on real I/O.
//!
//! ## Loop
//! ```text
//! loop {
//!   recv_timeout(keep_alive)
//!     ├─ Ok(job)        → run_once(job) → Command::Finished { worker, topic, failed }
//!     ├─ Timeout        → Command::IdleTimeout(worker)   (actor decides whether to retire)
//!     └─ Disconnected   → exit (actor dropped our sender: retired or shut down)
//! }
//! on exit → Command::Exited(worker)
//! ```
//!
//! ## Rules
//! - A worker never decides on its own to retire; it only reports the idle
//!   timeout. The actor retires it only if it is still idle, which rules out a
//!   task being handed to a thread that is already leaving.
//! - If the actor is gone, the worker exits after its current task.

use std::io;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use tokio::sync::mpsc;

use crate::core::actor::Command;
use crate::core::pool::WorkerId;
use crate::core::runner::run_once;
use crate::events::Bus;
use crate::tasks::{BoxJob, TaskClass};

/// Everything a worker thread needs, moved into the thread on spawn.
pub(crate) struct WorkerParams {
    pub id: WorkerId,
    pub class: TaskClass,
    pub inbox: Receiver<BoxJob>,
    pub keep_alive: Duration,
    pub notify: mpsc::UnboundedSender<Command>,
    pub bus: Bus,
}

/// Sends `Exited` when the thread leaves its loop, however it leaves it.
struct ExitNotice {
    id: WorkerId,
    notify: mpsc::UnboundedSender<Command>,
}

impl Drop for ExitNotice {
    fn drop(&mut self) {
        let _ = self.notify.send(Command::Exited(self.id));
    }
}

/// Spawns the worker thread.
pub(crate) fn spawn_worker(params: WorkerParams, thread_name: &str) -> io::Result<()> {
    let name = format!(
        "{thread_name}-{}-{}",
        params.class.as_label(),
        params.id.get()
    );
    thread::Builder::new()
        .name(name)
        .spawn(move || worker_loop(params))
        .map(|_detached| ())
}

fn worker_loop(params: WorkerParams) {
    let WorkerParams {
        id,
        class: _,
        inbox,
        keep_alive,
        notify,
        bus,
    } = params;
    let _exit = ExitNotice {
        id,
        notify: notify.clone(),
    };

    loop {
        let msg = match inbox.recv_timeout(keep_alive) {
            Ok(job) => {
                let done = run_once(job, id, &bus);
                Command::Finished {
                    worker: id,
                    topic: done.topic,
                    failed: done.failed,
                }
            }
            Err(RecvTimeoutError::Timeout) => Command::IdleTimeout(id),
            Err(RecvTimeoutError::Disconnected) => break,
        };
        if notify.send(msg).is_err() {
            tracing::debug!(worker = %id, "dispatcher gone; worker exiting");
            break;
        }
    }
}
