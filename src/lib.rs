//! # taskrelay
//!
//! **Taskrelay** coordinates asynchronous work with the people waiting on it.
//!
//! It provides two primitives that share one lifecycle feed:
//! - a **join barrier**: a parent task suspends until every one of its child tasks
//!   reaches a terminal state, then receives all child results at once;
//! - a **push multiplexer**: at most one live server-push channel per user, with
//!   reconnect takeover, forced logout and fire-and-forget publishing.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │ task worker  │   │ task worker  │   │ task worker  │
//!     │  (child A)   │   │  (child B)   │   │  (child C)   │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            │ TaskLifecycleEvent{ task_id, parent_task_id, outcome, ... }
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                    │
//! │                   (capacity: Config::bus_capacity)                │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                       ┌────────────────────────┐
//!                       │  EventRouter listener  │
//!                       └───┬────────────────┬───┘
//!                           ▼                ▼
//!                  BarrierRegistry      SubscriberSet
//!                  (one barrier per     (per-sub queues)
//!                   waiting parent)
//!                           │
//!                           ▼
//!     parent: wait_for_children(parent, {A, B, C}, timeout) ─► Vec<SubTaskResult>
//!
//!
//!     application ─► ChannelRegistry::publish(owner, PushEvent)
//!                          │ (one PushChannel per owner)
//!                          ▼
//!                    PushReceiver ─► transport (SSE, websocket, ...)
//! ```
//!
//! ### Barrier lifecycle
//! ```text
//! wait_for_children(parent, children, timeout)
//!   ├─► empty parent id     ─► Err(InvalidParent)
//!   ├─► empty set           ─► Ok([])
//!   ├─► zero timeout        ─► Err(InvalidTimeout)
//!   ├─► parent already waits─► Err(AlreadyWaiting)
//!   ├─► register barrier (events may resolve children from here on)
//!   ├─► pre-check every child through TaskLookup
//!   │       └─ terminal snapshot ─► resolve child
//!   └─► await signal or deadline
//!           ├─ all children resolved ─► Ok(results, arrival order)
//!           ├─ deadline               ─► Err(Timeout{ pending })
//!           └─ router shutdown        ─► Err(Canceled)
//!
//! On exit (any path, including a dropped waiter): barrier removed from the registry.
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                              |
//! |-------------------|---------------------------------------------------------------|-------------------------------------------------|
//! | **Join barrier**  | Wait for a set of child tasks with a deadline.                | [`BarrierRegistry`], [`SubTaskResult`]          |
//! | **Task store**    | Pre-check children that finished before the wait began.       | [`TaskLookup`], [`InMemoryTaskLookup`]          |
//! | **Push channels** | One live channel per user, reconnect takeover, forced logout. | [`ChannelRegistry`], [`PushChannel`], [`PushEvent`] |
//! | **Routing**       | Feed lifecycle events to barriers and subscribers.            | [`EventRouter`], [`Bus`], [`TaskLifecycleEvent`] |
//! | **Subscriber API**| Observe lifecycle events (audit, metrics).                    | [`Subscribe`]                                   |
//! | **Errors**        | Typed errors for waits, lookups and channel emits.            | [`WaitError`], [`LookupError`], [`EmitError`]   |
//! | **Configuration** | Queue capacities and the shutdown grace period.               | [`Config`]                                      |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use taskrelay::{Config, EventRouter, InMemoryTaskLookup, PushEvent, TaskLifecycleEvent};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(InMemoryTaskLookup::new());
//!     let router = EventRouter::builder(Config::default(), store).build();
//!     router.spawn_listener();
//!
//!     // A user connects and gets a push stream.
//!     let mut stream = router.channels().open("user-1");
//!
//!     // Two child tasks finish a little later.
//!     let feed = Arc::clone(&router);
//!     tokio::spawn(async move {
//!         tokio::time::sleep(Duration::from_millis(10)).await;
//!         feed.publish_lifecycle(TaskLifecycleEvent::completed("ch-1").with_parent("import"));
//!         feed.publish_lifecycle(TaskLifecycleEvent::completed("ch-2").with_parent("import"));
//!     });
//!
//!     let results = router
//!         .barriers()
//!         .wait_for_children("import", ["ch-1", "ch-2"], Duration::from_secs(5))
//!         .await?;
//!     assert_eq!(results.len(), 2);
//!
//!     router
//!         .channels()
//!         .publish("user-1", PushEvent::message(serde_json::json!({"import": "done"})));
//!     assert!(stream.recv().await.is_some());
//!
//!     router.shutdown("demo finished").await;
//!     Ok(())
//! }
//! ```
mod barrier;
mod channels;
mod config;
mod core;
mod error;
mod events;
mod lookup;
mod subscribers;

// ---- Public re-exports ----

pub use barrier::{BarrierRegistry, SubTaskResult};
pub use channels::{ChannelRegistry, DONE_MARKER, PushChannel, PushEvent, PushEventKind, PushReceiver};
pub use config::Config;
pub use core::{EventRouter, EventRouterBuilder, SHUTDOWN_REASON};
pub use error::{EmitError, LookupError, WaitError};
pub use events::{Bus, CANCELLED_CODE, TaskLifecycleEvent, TaskOutcome};
pub use lookup::{InMemoryTaskLookup, TaskLookup, TaskSnapshot, TaskStatus};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
