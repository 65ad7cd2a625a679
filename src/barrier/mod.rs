//! Join barriers over asynchronously completing child tasks.
//!
//! A parent that spawned N children calls
//! [`BarrierRegistry::wait_for_children`] and is released once every child reached a
//! terminal outcome, or fails with [`WaitError::Timeout`](crate::WaitError::Timeout).
//!
//! - [`completion`]: per-parent pending set, results and single-fire signal;
//! - [`registry`]: active barriers keyed by parent, event routing, lookup pre-check;
//! - [`SubTaskResult`]: what the parent receives per child.

mod completion;
mod registry;
mod result;

pub use registry::BarrierRegistry;
pub use result::SubTaskResult;
