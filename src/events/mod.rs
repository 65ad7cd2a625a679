//! Task lifecycle events: data model and broadcast bus.
//!
//! ## Contents
//! - [`TaskLifecycleEvent`], [`TaskOutcome`] terminal-state notifications
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: task executors (outside this crate), via
//!   [`EventRouter::publish_lifecycle`](crate::EventRouter::publish_lifecycle).
//! - **Consumers**: the router listener, which feeds the
//!   [`BarrierRegistry`](crate::BarrierRegistry) and fans out to subscribers.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{CANCELLED_CODE, TaskLifecycleEvent, TaskOutcome};
pub(crate) use event::{cancelled_marker, is_cancelled_marker};
