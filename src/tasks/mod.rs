//! # Task abstractions.
//!
//! This module provides the task-related types:
//! - [`TopicTask`] - a closure bound to a topic, a name and a [`TaskClass`]
//! - [`TaskFuture`] - shared handle to the outcome of a task
//! - [`Topic`] - submission handle for one topic
//! - [`gather`] - wait for a group of futures with one deadline

mod future;
mod gather;
mod task;
mod topic;

pub use future::{TaskFuture, TaskStatus};
pub use gather::gather;
pub use task::{TaskClass, TopicTask};
pub use topic::Topic;

pub(crate) use task::{BoxJob, Job};
