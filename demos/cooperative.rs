//! # Example: cooperative
//!
//! Demonstrates a computation that hops between the UI thread and the worker
//! context while staying within the UI time budget.
//!
//! Shows how to:
//! - Start the built-in [`ThreadHost`] and wrap it in a [`CoopScheduler`].
//! - Use `ensure_on_worker` / `await_ui` markers inside one `async` block.
//! - Await a [`TaskFuture`](topicvisor::TaskFuture) from the dispatcher between hops.
//! - Yield back to the UI queue when [`Timer::exhausted_ui_budget`] says so.
//!
//! ## Flow
//! ```text
//! main ──► render(rows)            (first segment runs on main)
//!   ├─► ensure_on_worker           → worker: submit "load-rows" task, await it
//!   ├─► await_ui                   → ui: paint rows, re-yield every ~17ms
//!   └─► await_worker               → worker: persist the view state
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=info cargo run --example cooperative
//! ```

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use topicvisor::coop::{CoopScheduler, Host, HostExt, Role, ThreadHost, Timer};
use topicvisor::{Dispatcher, DispatcherConfig};

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let host = Arc::new(ThreadHost::new()?);
    let coop = CoopScheduler::new(host.clone());
    let dispatcher = Dispatcher::new(DispatcherConfig::default());
    let (done_tx, done_rx) = tokio::sync::oneshot::channel::<usize>();
    let done_tx = Arc::new(std::sync::Mutex::new(Some(done_tx)));

    let h = host.clone();
    let d = dispatcher.clone();
    let render = coop.cooperative(move |co, rows: usize| {
        let (h, d, done_tx) = (h.clone(), d.clone(), done_tx.clone());
        async move {
            println!("[main]   render({rows}) called on {:?}", h.current_role());

            co.ensure_on_worker().await;
            let data = d
                .add_task("load-rows", move || {
                    thread::sleep(Duration::from_millis(50));
                    Ok((0..rows).collect::<Vec<_>>())
                })
                .await;
            let data = match data {
                Ok(data) => data,
                Err(e) => {
                    println!("[worker] loading failed: {e}");
                    return;
                }
            };
            println!("[worker] loaded {} rows", data.len());

            let mut timer: Timer = co.await_ui().await;
            let mut slices = 1;
            for _row in &data {
                h.assert_on_ui();
                thread::sleep(Duration::from_micros(300));
                if timer.exhausted_ui_budget() {
                    slices += 1;
                    timer = co.await_ui().await;
                }
            }
            println!("[ui]     painted {} rows in {slices} slices", data.len());

            co.await_worker().await;
            println!("[worker] persisted view state on {:?}", h.current_role());
            if let Some(tx) = done_tx.lock().ok().and_then(|mut g| g.take()) {
                let _ = tx.send(slices);
            }
        }
    });

    render(200);
    println!("[main]   render() returned; the rest continues on the host loops");

    // UI stays responsive between slices
    host.enqueue_on_ui(|| println!("[ui]     unrelated UI work got a turn"))?;

    let slices = tokio::time::timeout(Duration::from_secs(10), done_rx).await??;
    println!("[main]   done after {slices} UI slices");

    host.flush(Role::Ui)?;
    dispatcher.shutdown();
    Ok(())
}
