//! Runtime core: event routing and shutdown.
//!
//! The only public API from this module is [`EventRouter`] and its builder. It owns the
//! lifecycle [`Bus`](crate::Bus), feeds the barrier registry and subscribers from it,
//! and closes push channels on shutdown.
//!
//! Internal modules:
//! - [`router`]: the listener loop and shutdown path;
//! - [`builder`]: assembles the router from a [`Config`](crate::Config) and a lookup;
//! - [`shutdown`]: cross-platform termination signal handling.

mod builder;
mod router;
mod shutdown;

pub use builder::EventRouterBuilder;
pub use router::{EventRouter, SHUTDOWN_REASON};
