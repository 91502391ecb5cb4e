use std::sync::Arc;

use crate::{
    core::{config::SupervisorConfig, supervisor::Supervisor},
    events::Bus,
    subscribers::{Subscribe, SubscriberSet},
};

/// Builder for constructing a [`Supervisor`].
pub struct SupervisorBuilder {
    cfg: SupervisorConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl SupervisorBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: SupervisorConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers.
    ///
    /// Subscribers receive lifecycle events (actor start/exit/failure, shutdown progress)
    /// through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the supervisor, spawning one worker per subscriber.
    ///
    /// Must be called from within a tokio runtime.
    pub fn build(self) -> Supervisor {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = Arc::new(SubscriberSet::new(self.subscribers, bus.clone()));
        Supervisor::new_internal(self.cfg, bus, subs)
    }
}
