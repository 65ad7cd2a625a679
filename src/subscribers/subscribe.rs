//! # Lifecycle subscriber trait
//!
//! `Subscribe` is the extension point for observing task lifecycle events routed by
//! the [`EventRouter`](crate::EventRouter) (audit trails, metrics, progress feeds).
//! Each subscriber is driven by a dedicated worker fed by a bounded queue owned by
//! the [`SubscriberSet`](crate::SubscriberSet).
//!
//! ## Contract
//! - Implementations may be slow; they block neither the router nor other subscribers.
//! - On queue overflow, events for that subscriber are **dropped** (warn).

use async_trait::async_trait;

use crate::events::TaskLifecycleEvent;

/// Contract for lifecycle event subscribers.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handle a single event for this subscriber.
    async fn on_event(&self, event: &TaskLifecycleEvent);

    /// Human-readable name (for logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred capacity of this subscriber's queue.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
