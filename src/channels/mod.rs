//! Best-effort push delivery to connected users.
//!
//! ## Contents
//! - [`PushChannel`] / [`PushReceiver`]: producer and consumer halves of one connection
//! - [`PushEvent`], [`PushEventKind`]: what travels over a channel
//! - [`ChannelRegistry`]: owner → channel map with replace-on-reconnect
//!
//! Delivery is unbuffered across connections: an owner that is not connected right
//! now does not receive the event later. Clients needing guarantees re-read task state.

mod channel;
mod registry;

pub use channel::{DONE_MARKER, PushChannel, PushEvent, PushEventKind, PushReceiver};
pub use registry::ChannelRegistry;
