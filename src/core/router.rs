//! # EventRouter: wires the lifecycle feed to barriers, subscribers and push channels.
//!
//! The [`EventRouter`] owns the event [`Bus`], the [`BarrierRegistry`], the
//! [`ChannelRegistry`] and the [`SubscriberSet`]. It is the single consumer of the
//! lifecycle feed and the shutdown point for pending waits, live push connections
//! and subscriber workers.
//!
//! ## High-level architecture
//! ```text
//! Task executors ── publish_lifecycle(ev) ──► Bus
//!                                              │
//!                                  spawn_listener() task
//!                                   ├─ Ok(ev)        ─► BarrierRegistry::handle_event(&ev)
//!                                   │                 └► SubscriberSet::emit(&ev)
//!                                   ├─ Lagged(n)     ─► spawn BarrierRegistry::resync()
//!                                   │                   (one pass at a time, coalesced)
//!                                   └─ cancelled     ─► exit
//!
//! Orchestration code ─► barriers().wait_for_children(parent, children, timeout)
//! Application code   ─► channels().publish(owner, event)
//!
//! Shutdown path:
//!   shutdown::wait_for_shutdown_signal()
//!         └─► shutdown(reason)
//!               ├─► runtime_token.cancel()           (listener and resync exit)
//!               ├─► BarrierRegistry::cancel_all()    (waiters get Canceled)
//!               ├─► ChannelRegistry::close_all(reason)
//!               └─► SubscriberSet::shutdown(grace)   (drain, then abort)
//! ```
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use taskrelay::{Config, EventRouter, InMemoryTaskLookup, TaskLifecycleEvent};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let router = EventRouter::builder(Config::default(), Arc::new(InMemoryTaskLookup::new())).build();
//!     router.spawn_listener();
//!
//!     let feed = Arc::clone(&router);
//!     tokio::spawn(async move {
//!         tokio::time::sleep(Duration::from_millis(10)).await;
//!         feed.publish_lifecycle(TaskLifecycleEvent::completed("chapter-1").with_parent("import"));
//!     });
//!
//!     let results = router
//!         .barriers()
//!         .wait_for_children("import", ["chapter-1"], Duration::from_secs(5))
//!         .await?;
//!     assert_eq!(results.len(), 1);
//!     router.shutdown("demo finished").await;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::builder::EventRouterBuilder;
use super::shutdown;
use crate::barrier::BarrierRegistry;
use crate::channels::ChannelRegistry;
use crate::config::Config;
use crate::events::{Bus, TaskLifecycleEvent};
use crate::lookup::TaskLookup;
use crate::subscribers::SubscriberSet;

/// Reason sent to connected clients when the process is stopping.
pub const SHUTDOWN_REASON: &str = "server_shutdown";

/// Routes lifecycle events and owns the barrier and channel registries.
pub struct EventRouter {
    cfg: Config,
    bus: Bus,
    barriers: Arc<BarrierRegistry>,
    channels: Arc<ChannelRegistry>,
    subs: Arc<SubscriberSet>,
    runtime_token: CancellationToken,
    resync_running: AtomicBool,
    resync_requested: AtomicBool,
}

impl EventRouter {
    /// Starts building a router that pre-checks children through `lookup`.
    pub fn builder(cfg: Config, lookup: Arc<dyn TaskLookup>) -> EventRouterBuilder {
        EventRouterBuilder::new(cfg, lookup)
    }

    pub(crate) fn new_internal(
        cfg: Config,
        bus: Bus,
        barriers: Arc<BarrierRegistry>,
        channels: Arc<ChannelRegistry>,
        subs: Arc<SubscriberSet>,
        runtime_token: CancellationToken,
    ) -> Self {
        Self {
            cfg,
            bus,
            barriers,
            channels,
            subs,
            runtime_token,
            resync_running: AtomicBool::new(false),
            resync_requested: AtomicBool::new(false),
        }
    }

    /// Spawns the task that consumes the lifecycle feed.
    ///
    /// The bus subscription is taken before this returns, so every event published
    /// afterwards is observed. Call once.
    ///
    /// Lost events (`Lagged`) schedule a resync in its own task; the listener keeps
    /// routing live events while the task store is queried.
    pub fn spawn_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let mut rx = self.bus.subscribe();
        let token = self.runtime_token.clone();
        let me = Arc::clone(self);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    msg = rx.recv() => match msg {
                        Ok(ev) => me.dispatch(&ev),
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "lifecycle feed lagged; resyncing barriers from the task store");
                            me.schedule_resync();
                        }
                    }
                }
            }
            debug!("event router listener stopped");
        })
    }

    /// Publishes a terminal task event onto the lifecycle feed.
    ///
    /// Returns the number of consumers that received it.
    pub fn publish_lifecycle(&self, ev: TaskLifecycleEvent) -> usize {
        self.bus.publish(ev)
    }

    pub fn barriers(&self) -> &Arc<BarrierRegistry> {
        &self.barriers
    }

    pub fn channels(&self) -> &Arc<ChannelRegistry> {
        &self.channels
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Stops the router.
    ///
    /// Cancels the listener, fails every pending wait with
    /// [`WaitError::Canceled`](crate::WaitError::Canceled), force-closes every push
    /// channel with `reason`, then gives subscriber workers up to [`Config::grace`] to
    /// drain. Returns the number of channels closed.
    pub async fn shutdown(&self, reason: &str) -> usize {
        self.runtime_token.cancel();
        let canceled_waits = self.barriers.cancel_all();
        let closed = self.channels.close_all(reason);
        let aborted_subscribers = self.subs.shutdown(self.cfg.grace).await;
        info!(
            reason,
            closed_channels = closed,
            canceled_waits,
            aborted_subscribers,
            "event router shut down"
        );
        closed
    }

    /// True once [`shutdown`](Self::shutdown) was called.
    pub fn is_shut_down(&self) -> bool {
        self.runtime_token.is_cancelled()
    }

    /// Waits for an OS termination signal, then shuts down with [`SHUTDOWN_REASON`].
    pub async fn run_until_signal(&self) -> std::io::Result<()> {
        tokio::select! {
            res = shutdown::wait_for_shutdown_signal() => {
                let signal = res?;
                info!(signal, "termination signal received");
                self.shutdown(SHUTDOWN_REASON).await;
            }
            _ = self.runtime_token.cancelled() => {}
        }
        Ok(())
    }

    fn dispatch(&self, ev: &TaskLifecycleEvent) {
        self.barriers.handle_event(ev);
        self.subs.emit(ev);
    }

    /// Runs [`BarrierRegistry::resync`] off the listener.
    ///
    /// At most one pass runs at a time. Requests arriving during a pass trigger exactly
    /// one more pass once it ends, since that pass may have checked a barrier before
    /// the newly lost events were stored.
    pub(crate) fn schedule_resync(self: &Arc<Self>) {
        self.resync_requested.store(true, Ordering::Release);
        if self.resync_running.swap(true, Ordering::AcqRel) {
            debug!("resync already running; queued another pass");
            return;
        }

        let me = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                me.resync_requested.store(false, Ordering::Release);
                tokio::select! {
                    _ = me.runtime_token.cancelled() => return,
                    resolved = me.barriers.resync() => debug!(resolved, "resync pass finished"),
                }
                if me.resync_requested.load(Ordering::Acquire) {
                    continue;
                }
                me.resync_running.store(false, Ordering::Release);
                // A request that saw `running` still set must not be lost.
                if !me.resync_requested.load(Ordering::Acquire)
                    || me.resync_running.swap(true, Ordering::AcqRel)
                {
                    return;
                }
            }
        });
    }
}
