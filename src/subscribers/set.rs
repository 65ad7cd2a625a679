//! # SubscriberSet: lifecycle fan-out owned by the router
//!
//! [`SubscriberSet`] hands each [`TaskLifecycleEvent`] the router reads from the bus
//! to every subscriber's bounded queue and returns without awaiting delivery. Each
//! queue is drained by one worker task.
//!
//! ## Guarantees
//! - `emit` never blocks the router listener; a full queue drops the event for that
//!   subscriber only, and the drop is counted.
//! - Per-subscriber FIFO. No ordering across subscribers.
//! - A panicking subscriber is logged and keeps receiving later events.
//! - `shutdown` closes all queues, lets workers drain until a deadline, then aborts
//!   the stragglers. It works through a shared reference, so the router can call it
//!   while the listener still holds the set.
//!
//! ```text
//!  router listener ─► emit(&ev) ─► Arc<ev> ─┬─► [queue S1] ─► worker S1 ─► on_event()
//!                                           └─► [queue S2] ─► worker S2 ─► on_event()
//!
//!  EventRouter::shutdown ─► shutdown(grace)
//!        ├─► drop every sender (workers see end of queue)
//!        └─► await workers until now + grace ─► abort the rest
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, error, warn};

use crate::events::TaskLifecycleEvent;

use super::Subscribe;

struct SubscriberQueue {
    name: &'static str,
    sender: mpsc::Sender<Arc<TaskLifecycleEvent>>,
    dropped: Arc<AtomicU64>,
}

struct Worker {
    name: &'static str,
    handle: JoinHandle<()>,
    dropped: Arc<AtomicU64>,
}

/// Per-subscriber bounded queues with one worker each.
pub struct SubscriberSet {
    queues: RwLock<Vec<SubscriberQueue>>,
    workers: Mutex<Vec<Worker>>,
}

impl SubscriberSet {
    /// Spawns one worker per subscriber.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>) -> Self {
        let mut queues = Vec::with_capacity(subs.len());
        let mut workers = Vec::with_capacity(subs.len());

        for sub in subs {
            let name = sub.name();
            let (tx, rx) = mpsc::channel(sub.queue_capacity().max(1));
            let dropped = Arc::new(AtomicU64::new(0));

            queues.push(SubscriberQueue {
                name,
                sender: tx,
                dropped: Arc::clone(&dropped),
            });
            workers.push(Worker {
                name,
                handle: tokio::spawn(drain_queue(sub, rx)),
                dropped,
            });
        }

        Self {
            queues: RwLock::new(queues),
            workers: Mutex::new(workers),
        }
    }

    /// Queues `event` for every subscriber. Returns how many queues accepted it.
    ///
    /// After [`shutdown`](Self::shutdown) this is a no-op returning 0.
    pub fn emit(&self, event: &TaskLifecycleEvent) -> usize {
        let queues = self.queues.read();
        if queues.is_empty() {
            return 0;
        }

        let ev = Arc::new(event.clone());
        let mut accepted = 0;
        for queue in queues.iter() {
            match queue.sender.try_send(Arc::clone(&ev)) {
                Ok(()) => accepted += 1,
                Err(TrySendError::Full(_)) => {
                    let dropped = queue.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                    warn!(
                        subscriber = queue.name,
                        task_id = %event.task_id,
                        dropped,
                        "subscriber queue full; event dropped"
                    );
                }
                Err(TrySendError::Closed(_)) => {
                    warn!(subscriber = queue.name, "subscriber worker gone; event dropped");
                }
            }
        }
        accepted
    }

    /// Closes every queue and waits up to `grace` for workers to finish what they hold.
    ///
    /// Workers still running at the deadline are aborted. Returns how many were
    /// aborted. Calling it again is a no-op.
    pub async fn shutdown(&self, grace: Duration) -> usize {
        drop(std::mem::take(&mut *self.queues.write()));
        let workers = std::mem::take(&mut *self.workers.lock());
        let deadline = Instant::now() + grace;

        let mut aborted = 0;
        for mut worker in workers {
            if time::timeout_at(deadline, &mut worker.handle).await.is_err() {
                warn!(
                    subscriber = worker.name,
                    grace_ms = grace.as_millis() as u64,
                    "subscriber did not drain in time; aborting"
                );
                worker.handle.abort();
                aborted += 1;
            } else {
                debug!(
                    subscriber = worker.name,
                    dropped = worker.dropped.load(Ordering::Relaxed),
                    "subscriber drained"
                );
            }
        }
        aborted
    }

    /// Events dropped so far for the subscriber called `name` (queue overflow).
    pub fn dropped(&self, name: &str) -> Option<u64> {
        self.queues
            .read()
            .iter()
            .find(|q| q.name == name)
            .map(|q| q.dropped.load(Ordering::Relaxed))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queues.read().is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queues.read().len()
    }
}

async fn drain_queue(sub: Arc<dyn Subscribe>, mut rx: mpsc::Receiver<Arc<TaskLifecycleEvent>>) {
    while let Some(ev) = rx.recv().await {
        let fut = sub.on_event(ev.as_ref());
        if let Err(panic) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
            error!(
                subscriber = sub.name(),
                task_id = %ev.task_id,
                panic = ?panic,
                "subscriber panicked"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, event: &TaskLifecycleEvent) {
            self.seen.lock().push(event.task_id.to_string());
        }

        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    struct Panicker;

    #[async_trait]
    impl Subscribe for Panicker {
        async fn on_event(&self, _event: &TaskLifecycleEvent) {
            panic!("boom");
        }
    }

    /// Takes `delay` per event and holds at most one queued event.
    struct Slow {
        delay: Duration,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Subscribe for Slow {
        async fn on_event(&self, event: &TaskLifecycleEvent) {
            time::sleep(self.delay).await;
            self.seen.lock().push(event.task_id.to_string());
        }

        fn name(&self) -> &'static str {
            "slow"
        }

        fn queue_capacity(&self) -> usize {
            1
        }
    }

    #[tokio::test]
    async fn every_subscriber_sees_events_in_order_despite_a_panicking_peer() {
        let recorder = Arc::new(Recorder::default());
        let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(Panicker), recorder.clone()];
        let set = SubscriberSet::new(subs);
        assert_eq!(set.len(), 2);

        assert_eq!(set.emit(&TaskLifecycleEvent::completed("a")), 2);
        assert_eq!(set.emit(&TaskLifecycleEvent::failed("b")), 2);
        assert_eq!(set.shutdown(Duration::from_secs(1)).await, 0);

        assert_eq!(*recorder.seen.lock(), vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn full_queue_drops_and_counts_for_that_subscriber_only() {
        let slow = Arc::new(Slow {
            delay: Duration::from_secs(1),
            seen: Mutex::new(Vec::new()),
        });
        let recorder = Arc::new(Recorder::default());
        let subs: Vec<Arc<dyn Subscribe>> = vec![slow.clone(), recorder.clone()];
        let set = SubscriberSet::new(subs);

        assert_eq!(set.emit(&TaskLifecycleEvent::completed("a")), 2);
        assert_eq!(set.emit(&TaskLifecycleEvent::completed("b")), 1);
        assert_eq!(set.dropped("slow"), Some(1));
        assert_eq!(set.dropped("recorder"), Some(0));

        assert_eq!(set.shutdown(Duration::from_secs(5)).await, 0);
        assert_eq!(*slow.seen.lock(), vec!["a".to_string()]);
        assert_eq!(recorder.seen.lock().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_aborts_workers_that_outlive_the_grace_period() {
        let slow = Arc::new(Slow {
            delay: Duration::from_secs(30),
            seen: Mutex::new(Vec::new()),
        });
        let set = SubscriberSet::new(vec![slow.clone() as Arc<dyn Subscribe>]);
        set.emit(&TaskLifecycleEvent::completed("a"));

        let started = Instant::now();
        assert_eq!(set.shutdown(Duration::from_secs(2)).await, 1);
        assert!(started.elapsed() < Duration::from_secs(3));
        assert!(slow.seen.lock().is_empty());

        assert!(set.is_empty());
        assert_eq!(set.emit(&TaskLifecycleEvent::completed("b")), 0);
        assert_eq!(set.shutdown(Duration::from_secs(2)).await, 0);
    }

    #[tokio::test]
    async fn empty_set_is_a_noop() {
        let set = SubscriberSet::new(Vec::new());
        assert!(set.is_empty());
        assert_eq!(set.emit(&TaskLifecycleEvent::completed("a")), 0);
        assert_eq!(set.shutdown(Duration::ZERO).await, 0);
    }
}
