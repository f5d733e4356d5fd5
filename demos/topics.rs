//! # Example: topics
//!
//! Demonstrates topic-serialized dispatching.
//!
//! Shows how to:
//! - Attach the built-in [`LogWriter`] and a custom [`Subscribe`] implementation.
//! - Serialize work per topic while distinct topics run in parallel.
//! - Collapse redundant requests with `reduce_pending(true)`.
//! - Fan out leaf work from an orchestrator task and [`gather`] the results.
//! - Observe the fail-fast sweep of a topic's backlog.
//!
//! ## Flow
//! ```text
//! main ──► Dispatcher::builder(cfg).with_subscribers(..).build()
//!   ├─► add_task("repo", ..) x3             (serial, in order)
//!   ├─► topic("index").reduce_pending(true) (only the newest pending refresh runs)
//!   ├─► orchestrator("sync").submit(..)     (submits leaf tasks, gathers them)
//!   └─► add_task("disk", fail) + add_task("disk", ..) (second one is cancelled)
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=topicvisor=info cargo run --example topics
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use topicvisor::{
    Dispatcher, DispatcherConfig, Event, EventKind, LogWriter, Subscribe, TaskError, gather,
};

/// Counts task outcomes; in real life this would export metrics.
#[derive(Default)]
struct Outcomes {
    completed: AtomicUsize,
    failed: AtomicUsize,
    cancelled: AtomicUsize,
}

#[async_trait::async_trait]
impl Subscribe for Outcomes {
    async fn on_event(&self, ev: &Event) {
        let counter = match ev.kind {
            EventKind::TaskCompleted => &self.completed,
            EventKind::TaskFailed => &self.failed,
            EventKind::TaskCancelled => &self.cancelled,
            _ => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn name(&self) -> &'static str {
        "outcomes"
    }
}

fn slow<T>(ms: u64, value: T) -> impl FnOnce() -> Result<T, TaskError> + Send + 'static
where
    T: Send + 'static,
{
    move || {
        thread::sleep(Duration::from_millis(ms));
        Ok(value)
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let outcomes = Arc::new(Outcomes::default());
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new()), outcomes.clone()];
    let cfg = DispatcherConfig {
        leaf_workers: 3,
        orchestrator_workers: 1,
        ..DispatcherConfig::default()
    };
    let d = Dispatcher::builder(cfg).with_subscribers(subs).build();

    // one topic, three dependent steps
    let steps: Vec<_> = ["clone", "fetch", "checkout"]
        .into_iter()
        .map(|step| d.add_task("repo", slow(30, step)))
        .collect();
    for f in steps {
        println!("[repo] {}", f.await?);
    }

    // a burst of refresh requests; only the newest pending one does the work
    let index = d.topic("index").reduce_pending(true);
    let refreshes: Vec<_> = (1..=5).map(|n| index.submit(slow(20, n))).collect();
    for (i, f) in refreshes.into_iter().enumerate() {
        println!("[index] request #{} saw generation {}", i + 1, f.await?);
    }

    // orchestrator fans out leaf work on other topics and waits for it
    let inner = d.clone();
    let sync = d.orchestrator("sync").submit(move || {
        let parts: Vec<_> = ["registry-a", "registry-b", "registry-c"]
            .into_iter()
            .map(|topic| inner.add_task(topic, slow(40, topic.len())))
            .collect();
        let sizes = gather(&parts, Some(Duration::from_secs(5)))?;
        Ok(sizes.into_iter().sum::<usize>())
    });
    println!("[sync] total = {}", sync.await?);

    // a failure voids the rest of its topic's backlog
    let write = d.add_task::<(), _>("disk", || Err(TaskError::fail("read-only filesystem")));
    let verify = d.add_task("disk", slow(1, ()));
    println!("[disk] write  -> {:?}", write.await);
    println!("[disk] verify -> {:?}", verify.await);

    let snap = d.snapshot().await?;
    println!(
        "[pool] workers={} spawned_total={} queued={}",
        snap.workers.len(),
        snap.spawned_total,
        snap.queued.len()
    );

    d.shutdown();
    tokio::time::sleep(Duration::from_millis(50)).await;
    println!(
        "[outcomes] completed={} failed={} cancelled={}",
        outcomes.completed.load(Ordering::Relaxed),
        outcomes.failed.load(Ordering::Relaxed),
        outcomes.cancelled.load(Ordering::Relaxed)
    );
    Ok(())
}
