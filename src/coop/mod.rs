//! # Cooperative UI/worker continuations.
//!
//! - [`host`]: thread roles, the [`Host`] trait and the built-in [`ThreadHost`];
//! - [`timer`]: the per-segment [`Timer`];
//! - [`scheduler`]: [`Co`] markers and the [`CoopScheduler`] driver.

pub mod host;
pub mod scheduler;
pub mod timer;

pub use host::{Callback, Host, HostExt, Role, ThreadHost, on_role, on_ui, on_worker};
pub use scheduler::{Co, CoopScheduler, Continuation, Hop, cooperative};
pub use timer::{Timer, UI_BLOCK_TIME};
