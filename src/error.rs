//! Error types used by the topicvisor runtime and tasks.
//!
//! This module defines two main error enums:
//!
//! - [`RuntimeError`] — errors raised by the dispatcher or the host event loops.
//! - [`TaskError`] — outcomes of individual task bodies (stored in their [`TaskFuture`](crate::TaskFuture)).
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logging/metrics.

use std::time::Duration;
use thiserror::Error;

use crate::coop::Role;

/// # Errors produced by the topicvisor runtime.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// The dispatcher actor has stopped; no further commands are accepted.
    #[error("dispatcher closed")]
    DispatcherClosed,

    /// A host event loop is gone (its thread exited or was shut down).
    #[error("host event loop for {role:?} closed")]
    HostClosed {
        /// Role whose loop is unavailable.
        role: Role,
    },

    /// Code that must run on a specific thread role was called elsewhere.
    #[error("must run on the {expected:?} thread")]
    WrongRole {
        /// Role the caller was required to be on.
        expected: Role,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use topicvisor::RuntimeError;
    ///
    /// assert_eq!(RuntimeError::DispatcherClosed.as_label(), "runtime_dispatcher_closed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::DispatcherClosed => "runtime_dispatcher_closed",
            RuntimeError::HostClosed { .. } => "runtime_host_closed",
            RuntimeError::WrongRole { .. } => "runtime_wrong_role",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::DispatcherClosed => "dispatcher actor stopped".to_string(),
            RuntimeError::HostClosed { role } => format!("host loop closed: {role:?}"),
            RuntimeError::WrongRole { expected } => format!("expected role: {expected:?}"),
        }
    }
}

/// # Outcome errors of task bodies.
///
/// Every [`TaskFuture`](crate::TaskFuture) resolves to `Result<T, TaskError>`.
/// Cancellation is reported as [`TaskError::Canceled`], so a waiter sees exactly
/// one of success, failure or cancellation.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// Task body returned an error.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Task body panicked; the panic was caught on the worker thread.
    #[error("task panicked: {message}")]
    Panicked {
        /// Panic payload rendered as text.
        message: String,
    },

    /// Waiting for the outcome exceeded the caller's deadline.
    ///
    /// Only produced by waiters (e.g. [`gather`](crate::gather)); the task itself keeps running.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// Task was cancelled before a worker claimed it.
    #[error("task cancelled")]
    Canceled,
}

impl TaskError {
    /// Builds a [`TaskError::Fail`] from anything printable.
    pub fn fail(error: impl std::fmt::Display) -> Self {
        TaskError::Fail {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use topicvisor::TaskError;
    ///
    /// assert_eq!(TaskError::Canceled.as_label(), "task_canceled");
    /// assert_eq!(TaskError::fail("boom").as_label(), "task_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Fail { .. } => "task_failed",
            TaskError::Panicked { .. } => "task_panicked",
            TaskError::Timeout { .. } => "task_timeout",
            TaskError::Canceled => "task_canceled",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            TaskError::Fail { error } => format!("error: {error}"),
            TaskError::Panicked { message } => format!("panic: {message}"),
            TaskError::Timeout { timeout } => format!("timeout: {timeout:?}"),
            TaskError::Canceled => "task cancelled".to_string(),
        }
    }

    /// True for [`TaskError::Canceled`].
    pub fn is_canceled(&self) -> bool {
        matches!(self, TaskError::Canceled)
    }
}

impl From<anyhow::Error> for TaskError {
    fn from(err: anyhow::Error) -> Self {
        TaskError::Fail {
            error: format!("{err:#}"),
        }
    }
}

impl From<std::io::Error> for TaskError {
    fn from(err: std::io::Error) -> Self {
        TaskError::fail(err)
    }
}

/// Renders a caught panic payload as text.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anyhow_context_is_kept() {
        let err = anyhow::anyhow!("disk full").context("writing settings");
        let task_err = TaskError::from(err);
        assert_eq!(
            task_err,
            TaskError::Fail {
                error: "writing settings: disk full".into()
            }
        );
    }

    #[test]
    fn labels_are_stable() {
        let panicked = TaskError::Panicked {
            message: "oops".into(),
        };
        assert_eq!(panicked.as_label(), "task_panicked");
        assert_eq!(panicked.as_message(), "panic: oops");
        assert!(TaskError::Canceled.is_canceled());
        assert!(!panicked.is_canceled());

        let wrong = RuntimeError::WrongRole { expected: Role::Ui };
        assert_eq!(wrong.as_label(), "runtime_wrong_role");
        assert_eq!(wrong.to_string(), "must run on the Ui thread");
    }
}
