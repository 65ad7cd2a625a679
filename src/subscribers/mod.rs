//! # Lifecycle event subscribers.
//!
//! This module provides the [`Subscribe`] trait and the [`SubscriberSet`] fan-out for
//! observing task lifecycle events that pass through the
//! [`EventRouter`](crate::EventRouter).
//!
//! ## Architecture
//! ```text
//! Bus ──► EventRouter listener ──► BarrierRegistry::handle_event(&ev)
//!                              └──► SubscriberSet::emit(&ev)
//!                                        ├──► [queue] ─► LogWriter
//!                                        └──► [queue] ─► custom subscriber
//! ```
//!
//! ## Implementing custom subscribers
//! ```no_run
//! use taskrelay::{Subscribe, TaskLifecycleEvent, TaskOutcome};
//! use async_trait::async_trait;
//!
//! struct FailureCounter;
//!
//! #[async_trait]
//! impl Subscribe for FailureCounter {
//!     async fn on_event(&self, event: &TaskLifecycleEvent) {
//!         if event.outcome == TaskOutcome::Failed {
//!             // increment failure counter
//!         }
//!     }
//! }
//! ```

#[cfg(feature = "logging")]
mod log;
mod set;
mod subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
