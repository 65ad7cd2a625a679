use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::router::EventRouter;
use crate::{
    barrier::BarrierRegistry,
    channels::ChannelRegistry,
    config::Config,
    events::Bus,
    lookup::TaskLookup,
    subscribers::{Subscribe, SubscriberSet},
};

/// Builder for constructing an [`EventRouter`].
pub struct EventRouterBuilder {
    cfg: Config,
    lookup: Arc<dyn TaskLookup>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl EventRouterBuilder {
    /// Creates a new builder with the given configuration and task lookup.
    pub fn new(cfg: Config, lookup: Arc<dyn TaskLookup>) -> Self {
        Self {
            cfg,
            lookup,
            subscribers: Vec::new(),
        }
    }

    /// Sets lifecycle event subscribers.
    ///
    /// Subscribers receive every event the router reads from the bus, through
    /// dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the router.
    ///
    /// Spawns subscriber workers, so it must run inside a tokio runtime. The listener
    /// is not started; call [`EventRouter::spawn_listener`].
    pub fn build(self) -> Arc<EventRouter> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = Arc::new(SubscriberSet::new(self.subscribers));
        let barriers = BarrierRegistry::new(self.lookup);
        let channels = ChannelRegistry::new(self.cfg.channel_capacity_clamped());

        Arc::new(EventRouter::new_internal(
            self.cfg,
            bus,
            barriers,
            channels,
            subs,
            CancellationToken::new(),
        ))
    }
}
