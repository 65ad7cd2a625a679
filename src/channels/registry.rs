//! # Channel registry - one live push channel per owner.
//!
//! ## Architecture
//! ```text
//! transport connect ──► register_channel(owner, c2)
//!                          └─ shard lock { c1.complete(); map[owner] = c2 }
//!
//! app code ──► publish(owner, ev) ──► map[owner].try_emit(ev) ──► true / false
//!
//! transport disconnect ──► unregister_channel_if(owner, c.id)
//! admin / auth         ──► force_logout(owner, reason)
//! ```
//!
//! ## Rules
//! - At most one channel per owner; a replaced channel is completed before the new
//!   one becomes visible.
//! - Delivery is best-effort: no queue for absent owners, no retry on failure.
//! - Operations on different owners never contend on a global lock.

use std::sync::Arc;
use std::time::SystemTime;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, info, warn};

use super::channel::{PushChannel, PushEvent, PushReceiver};
use crate::error::EmitError;

/// Registered channel with its connection time.
struct ChannelEntry {
    channel: PushChannel,
    connected_at: SystemTime,
}

/// Concurrent owner → push channel map.
pub struct ChannelRegistry {
    channels: DashMap<Arc<str>, ChannelEntry>,
    capacity: usize,
}

impl ChannelRegistry {
    /// Creates a registry whose [`open`](Self::open) channels buffer `capacity` events.
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            channels: DashMap::new(),
            capacity: capacity.max(1),
        })
    }

    /// Creates a channel for `owner_id`, registers it and returns the consumer half.
    pub fn open(&self, owner_id: &str) -> PushReceiver {
        let (channel, rx) = PushChannel::new(owner_id, self.capacity);
        self.register_channel(owner_id, channel);
        rx
    }

    /// Installs `channel` as the only channel of `owner_id`.
    ///
    /// A previously registered channel is completed first; failing to complete it is
    /// logged and otherwise ignored.
    pub fn register_channel(&self, owner_id: &str, channel: PushChannel) {
        let channel_id = channel.id();
        let entry = ChannelEntry {
            channel,
            connected_at: SystemTime::now(),
        };

        match self.channels.entry(Arc::from(owner_id)) {
            Entry::Occupied(mut slot) => {
                let stale = &slot.get().channel;
                info!(
                    owner_id,
                    stale_channel = stale.id(),
                    "owner already connected; closing previous channel"
                );
                if let Err(err) = stale.complete() {
                    warn!(owner_id, error = %err, "failed to close previous channel");
                }
                slot.insert(entry);
            }
            Entry::Vacant(slot) => {
                slot.insert(entry);
            }
        }

        info!(
            owner_id,
            channel_id,
            active = self.channels.len(),
            "push channel registered"
        );
    }

    /// Removes the channel of `owner_id`. Returns `false` if there was none.
    pub fn unregister_channel(&self, owner_id: &str) -> bool {
        let removed = self.channels.remove(owner_id);
        self.finish_unregister(owner_id, removed.map(|(_, e)| e))
    }

    /// Removes the channel of `owner_id` only if it is still `channel_id`.
    ///
    /// Transports call this when their stream ends, so a stream that was already
    /// replaced cannot unregister its successor.
    pub fn unregister_channel_if(&self, owner_id: &str, channel_id: u64) -> bool {
        let removed = self
            .channels
            .remove_if(owner_id, |_, e| e.channel.id() == channel_id);
        self.finish_unregister(owner_id, removed.map(|(_, e)| e))
    }

    /// Sends a terminal logout event to `owner_id`, then closes and removes its channel.
    ///
    /// Returns `false` (and does nothing) if the owner is not connected.
    pub fn force_logout(&self, owner_id: &str, reason: &str) -> bool {
        let Some((_, entry)) = self.channels.remove(owner_id) else {
            debug!(owner_id, "force logout requested but owner has no channel");
            return false;
        };

        info!(owner_id, reason, "forcing logout");
        if let Err(err) = entry.channel.try_emit(PushEvent::forced_logout(reason)) {
            warn!(owner_id, error = %err, "failed to send logout event");
        }
        let _ = entry.channel.complete();
        true
    }

    /// Delivers `event` to the live channel of `owner_id`, if any.
    ///
    /// Returns `true` only if the event was handed to the consumer. Nothing is queued
    /// for absent owners and failed deliveries are not retried.
    pub fn publish(&self, owner_id: &str, event: PushEvent) -> bool {
        let outcome = match self.channels.get(owner_id) {
            Some(entry) => entry.channel.try_emit(event).map_err(|e| (e, entry.channel.id())),
            None => return false,
        };

        match outcome {
            Ok(()) => true,
            Err((EmitError::Closed, channel_id)) => {
                debug!(owner_id, channel_id, "consumer gone; dropping channel");
                self.channels
                    .remove_if(owner_id, |_, e| e.channel.id() == channel_id);
                false
            }
            Err((err, channel_id)) => {
                warn!(owner_id, channel_id, error = %err, "push event dropped");
                false
            }
        }
    }

    /// Force-logs-out every connected owner. Returns how many channels were closed.
    pub fn close_all(&self, reason: &str) -> usize {
        let owners: Vec<Arc<str>> = self.channels.iter().map(|e| Arc::clone(e.key())).collect();
        owners
            .iter()
            .filter(|owner| self.force_logout(owner, reason))
            .count()
    }

    pub fn has_active_connection(&self, owner_id: &str) -> bool {
        self.channels.contains_key(owner_id)
    }

    pub fn active_connection_count(&self) -> usize {
        self.channels.len()
    }

    /// When the current channel of `owner_id` was registered.
    pub fn connection_timestamp(&self, owner_id: &str) -> Option<SystemTime> {
        self.channels.get(owner_id).map(|e| e.connected_at)
    }

    /// Id of the current channel of `owner_id`.
    pub fn channel_id(&self, owner_id: &str) -> Option<u64> {
        self.channels.get(owner_id).map(|e| e.channel.id())
    }

    fn finish_unregister(&self, owner_id: &str, removed: Option<ChannelEntry>) -> bool {
        let Some(entry) = removed else {
            return false;
        };
        let _ = entry.channel.complete();
        info!(
            owner_id,
            channel_id = entry.channel.id(),
            active = self.channels.len(),
            "push channel unregistered"
        );
        true
    }
}
