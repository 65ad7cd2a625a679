//! # Lifecycle event bus.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`] that stands in for the
//! external event-bus subscription feed. Task executors publish terminal events; the
//! [`EventRouter`](crate::EventRouter) is the consumer.
//!
//! ## Architecture
//! ```text
//! Publishers (many):                 Consumer (one):
//!   Executor 1 ──┐
//!   Executor 2 ──┼──────► Bus ───────► EventRouter listener ──► BarrierRegistry
//!   Executor N ──┘  (broadcast chan)                        └──► SubscriberSet
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never blocks.
//! - **Bounded capacity**: a single ring buffer stores recent events for all receivers.
//! - **Lag handling**: slow receivers get `RecvError::Lagged(n)` and skip `n` oldest
//!   items. The router answers a lag with a barrier resync through `TaskLookup`.
//! - **No persistence**: events are lost if there are no receivers at send time.

use tokio::sync::broadcast;

use super::event::TaskLifecycleEvent;

/// Broadcast channel for task lifecycle events.
///
/// ### Properties
/// - **Non-blocking**: `publish()` returns immediately.
/// - **Fire-and-forget**: no delivery or durability guarantees.
/// - **Cloneable**: cheap to clone (internally holds an `Arc`-backed sender).
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<TaskLifecycleEvent>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity (clamped to at least 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<TaskLifecycleEvent>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all active receivers.
    ///
    /// Returns the number of receivers the event was handed to (0 if none).
    pub fn publish(&self, ev: TaskLifecycleEvent) -> usize {
        self.tx.send(ev).unwrap_or(0)
    }

    /// Creates a new receiver that will observe subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<TaskLifecycleEvent> {
        self.tx.subscribe()
    }

    /// Number of live receivers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_without_receivers_is_dropped() {
        let bus = Bus::new(4);
        assert_eq!(bus.publish(TaskLifecycleEvent::completed("a")), 0);
    }

    #[tokio::test]
    async fn receivers_only_see_later_events() {
        let bus = Bus::new(4);
        bus.publish(TaskLifecycleEvent::completed("early"));
        let mut rx = bus.subscribe();
        assert_eq!(bus.publish(TaskLifecycleEvent::completed("late")), 1);

        let ev = rx.recv().await.expect("event");
        assert_eq!(&*ev.task_id, "late");
    }

    #[tokio::test]
    async fn lagging_receiver_is_told_how_many_it_missed() {
        let bus = Bus::new(1);
        let mut rx = bus.subscribe();
        bus.publish(TaskLifecycleEvent::completed("a"));
        bus.publish(TaskLifecycleEvent::completed("b"));

        match rx.recv().await {
            Err(broadcast::error::RecvError::Lagged(n)) => assert_eq!(n, 1),
            other => panic!("expected lag, got {other:?}"),
        }
    }
}
