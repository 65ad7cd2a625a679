//! # Push channel: one owner, one consumer.
//!
//! A [`PushChannel`] is the producer half held by the [`ChannelRegistry`](crate::ChannelRegistry);
//! the matching [`PushReceiver`] is held by the transport (SSE/WebSocket stream) that
//! writes events to the client.
//!
//! ## Rules
//! - `try_emit` never blocks: a full buffer or a gone consumer is reported as
//!   [`EmitError`] and the event is dropped.
//! - `complete` ends the stream. Events already buffered are still delivered to the
//!   consumer before it observes end-of-stream.
//!
//! ```text
//! publish ─► PushChannel::try_emit ─► [bounded queue] ─► PushReceiver::recv ─► client
//!            PushChannel::complete ─► (sender dropped) ─► recv() == None
//! ```

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::task::{Context, Poll};
use std::time::SystemTime;

use futures::Stream;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;

use crate::error::EmitError;

/// Source of unique channel ids.
static CHANNEL_SEQ: AtomicU64 = AtomicU64::new(1);

/// Payload marker sent with a forced logout.
pub const DONE_MARKER: &str = "[DONE]";

/// Event name on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PushEventKind {
    /// Ordinary application notification.
    Message,
    /// Terminal event; the server is closing the stream.
    Complete,
}

impl PushEventKind {
    /// Event name as written by an SSE transport.
    pub fn as_str(&self) -> &'static str {
        match self {
            PushEventKind::Message => "message",
            PushEventKind::Complete => "complete",
        }
    }
}

/// Server-originated event for one recipient.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushEvent {
    pub kind: PushEventKind,
    pub data: Value,
}

impl PushEvent {
    /// Ordinary notification carrying `data`.
    pub fn message(data: Value) -> Self {
        Self {
            kind: PushEventKind::Message,
            data,
        }
    }

    /// Terminal event telling the client it was logged out.
    pub fn forced_logout(reason: &str) -> Self {
        Self {
            kind: PushEventKind::Complete,
            data: json!({
                "data": DONE_MARKER,
                "reason": reason,
                "forceLogout": true,
            }),
        }
    }

    /// True for the terminal `complete` event.
    pub fn is_complete(&self) -> bool {
        self.kind == PushEventKind::Complete
    }
}

/// Producer half of a push connection.
#[derive(Debug)]
pub struct PushChannel {
    id: u64,
    owner_id: Arc<str>,
    created_at: SystemTime,
    tx: Mutex<Option<mpsc::Sender<PushEvent>>>,
}

impl PushChannel {
    /// Creates a channel for `owner_id` buffering at most `capacity` events (min 1).
    pub fn new(owner_id: impl Into<Arc<str>>, capacity: usize) -> (Self, PushReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let id = CHANNEL_SEQ.fetch_add(1, AtomicOrdering::Relaxed);
        let channel = Self {
            id,
            owner_id: owner_id.into(),
            created_at: SystemTime::now(),
            tx: Mutex::new(Some(tx)),
        };
        (channel, PushReceiver { channel_id: id, rx })
    }

    /// Process-unique channel id.
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    #[inline]
    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// Hands `event` to the consumer without waiting.
    pub fn try_emit(&self, event: PushEvent) -> Result<(), EmitError> {
        let tx = self.tx.lock();
        let Some(tx) = tx.as_ref() else {
            return Err(EmitError::Closed);
        };
        tx.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => EmitError::Full,
            mpsc::error::TrySendError::Closed(_) => EmitError::Closed,
        })
    }

    /// Signals end-of-stream to the consumer.
    ///
    /// Fails with [`EmitError::Closed`] if the channel was already completed.
    pub fn complete(&self) -> Result<(), EmitError> {
        match self.tx.lock().take() {
            Some(_) => Ok(()),
            None => Err(EmitError::Closed),
        }
    }

    /// True until `complete` is called or the consumer goes away.
    pub fn is_live(&self) -> bool {
        self.tx.lock().as_ref().is_some_and(|tx| !tx.is_closed())
    }
}

/// Consumer half of a push connection.
#[derive(Debug)]
pub struct PushReceiver {
    channel_id: u64,
    rx: mpsc::Receiver<PushEvent>,
}

impl PushReceiver {
    /// Id of the [`PushChannel`] feeding this receiver.
    #[inline]
    pub fn channel_id(&self) -> u64 {
        self.channel_id
    }

    /// Next event, or `None` once the channel completed and the buffer drained.
    pub async fn recv(&mut self) -> Option<PushEvent> {
        self.rx.recv().await
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Option<PushEvent> {
        self.rx.try_recv().ok()
    }
}

impl Stream for PushReceiver {
    type Item = PushEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn buffered_events_drain_before_end_of_stream() {
        let (channel, mut rx) = PushChannel::new("u1", 4);
        channel.try_emit(PushEvent::message(json!(1))).unwrap();
        channel.try_emit(PushEvent::message(json!(2))).unwrap();
        channel.complete().unwrap();

        let got: Vec<PushEvent> = (&mut rx).collect().await;
        assert_eq!(got.len(), 2);
        assert_eq!(got[1].data, json!(2));
        assert!(!channel.is_live());
    }

    #[test]
    fn full_buffer_rejects_without_blocking() {
        let (channel, _rx) = PushChannel::new("u1", 1);
        assert_eq!(channel.try_emit(PushEvent::message(json!(1))), Ok(()));
        assert_eq!(
            channel.try_emit(PushEvent::message(json!(2))),
            Err(EmitError::Full)
        );
    }

    #[test]
    fn gone_consumer_and_double_complete_report_closed() {
        let (channel, rx) = PushChannel::new("u1", 1);
        drop(rx);
        assert!(!channel.is_live());
        assert_eq!(
            channel.try_emit(PushEvent::message(json!(1))),
            Err(EmitError::Closed)
        );
        assert_eq!(channel.complete(), Ok(()));
        assert_eq!(channel.complete(), Err(EmitError::Closed));
    }

    #[test]
    fn forced_logout_matches_wire_shape() {
        let ev = PushEvent::forced_logout("session revoked");
        assert!(ev.is_complete());
        assert_eq!(ev.kind.as_str(), "complete");
        assert_eq!(
            serde_json::to_value(&ev).unwrap(),
            json!({
                "kind": "complete",
                "data": { "data": "[DONE]", "reason": "session revoked", "forceLogout": true },
            })
        );
    }

    #[test]
    fn receiver_knows_its_channel() {
        let (channel, rx) = PushChannel::new("u1", 1);
        assert_eq!(rx.channel_id(), channel.id());
        assert_eq!(channel.owner_id(), "u1");
    }
}
