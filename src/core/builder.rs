use std::sync::Arc;

use tokio::sync::{broadcast::error::RecvError, mpsc};
use tokio_util::sync::CancellationToken;

use super::{actor::DispatchActor, dispatcher::Dispatcher};
use crate::{
    core::DispatcherConfig,
    events::{Bus, EventKind},
    subscribers::{Subscribe, SubscriberSet},
};

/// Builder for constructing a [`Dispatcher`] with optional features.
pub struct DispatcherBuilder {
    cfg: DispatcherConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl DispatcherBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: DispatcherConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events (queueing, task lifecycle, worker
    /// churn) through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the dispatcher and starts its actor.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime.
    pub fn build(self) -> Dispatcher {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let token = CancellationToken::new();
        let (tx, rx) = mpsc::unbounded_channel();

        if !self.subscribers.is_empty() {
            let subs = SubscriberSet::new(self.subscribers, bus.clone());
            subscriber_listener(&bus, subs);
        }

        tracing::debug!(
            leaf = self.cfg.capacity(crate::TaskClass::Leaf),
            orchestrator = self.cfg.capacity(crate::TaskClass::Orchestrator),
            keep_alive = ?self.cfg.keep_alive_clamped(),
            "dispatcher starting"
        );
        DispatchActor::new(self.cfg, tx.clone(), bus.clone()).spawn(rx, token.clone());
        Dispatcher::from_parts(tx, token, bus)
    }
}

/// Forwards bus events to the subscriber set until the dispatcher stops.
fn subscriber_listener(bus: &Bus, set: SubscriberSet) {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ev) => {
                    let last = ev.kind == EventKind::DispatcherStopped;
                    set.emit(&ev);
                    if last {
                        break;
                    }
                }
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "subscriber listener lagged behind the bus");
                }
                Err(RecvError::Closed) => break,
            }
        }
        set.shutdown().await;
    });
}
