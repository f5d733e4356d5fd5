//! # Waiting on a group of futures.

use std::time::{Duration, Instant};

use crate::error::TaskError;
use crate::tasks::future::TaskFuture;

/// Blocks until every future is resolved and returns their values in order.
///
/// With `timeout = Some(d)` the whole group shares one deadline; if it passes
/// before all outcomes are known, [`TaskError::Timeout`] is returned. The first
/// failed or cancelled future (in slice order) determines the error.
///
/// Meant for orchestrator task bodies, which run on worker threads and are
/// allowed to block.
///
/// ## Example
/// ```rust,no_run
/// # use topicvisor::{Dispatcher, TaskError, gather};
/// # fn body(d: Dispatcher) -> Result<Vec<u32>, TaskError> {
/// let futures = vec![
///     d.add_task("registry-a", || Ok(1u32)),
///     d.add_task("registry-b", || Ok(2u32)),
/// ];
/// gather(&futures, None)
/// # }
/// ```
pub fn gather<T>(futures: &[TaskFuture<T>], timeout: Option<Duration>) -> Result<Vec<T>, TaskError>
where
    T: Clone + Send + 'static,
{
    let deadline = timeout.map(|d| (d, Instant::now() + d));
    let mut values = Vec::with_capacity(futures.len());

    for fut in futures {
        let outcome = match deadline {
            None => fut.wait(),
            Some((total, at)) => {
                let left = at.saturating_duration_since(Instant::now());
                fut.wait_timeout(left)
                    .ok_or(TaskError::Timeout { timeout: total })?
            }
        };
        values.push(outcome?);
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn resolved(v: u32) -> TaskFuture<u32> {
        let fut = TaskFuture::new();
        fut.claim_running();
        fut.resolve(Ok(v));
        fut
    }

    #[test]
    fn collects_values_in_order() {
        let futs = vec![resolved(3), resolved(1), resolved(2)];
        assert_eq!(gather(&futs, None), Ok(vec![3, 1, 2]));
    }

    #[test]
    fn first_error_wins() {
        let cancelled = TaskFuture::<u32>::new();
        cancelled.cancel();
        let failed = TaskFuture::<u32>::new();
        failed.claim_running();
        failed.resolve(Err(TaskError::fail("bad ref")));

        let futs = vec![resolved(1), cancelled, failed];
        assert_eq!(gather(&futs, None), Err(TaskError::Canceled));
    }

    #[test]
    fn shared_deadline_times_out() {
        let never = TaskFuture::<u32>::new();
        let futs = vec![resolved(1), never];
        let res = gather(&futs, Some(Duration::from_millis(20)));
        assert_eq!(
            res,
            Err(TaskError::Timeout {
                timeout: Duration::from_millis(20)
            })
        );
    }

    #[test]
    fn waits_for_late_results() {
        let late = TaskFuture::<u32>::new();
        let producer = late.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(15));
            producer.claim_running();
            producer.resolve(Ok(9));
        });
        let futs = vec![resolved(1), late];
        assert_eq!(gather(&futs, Some(Duration::from_secs(5))), Ok(vec![1, 9]));
        handle.join().unwrap();
    }
}
