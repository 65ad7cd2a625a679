//! # Per-parent join context.
//!
//! A [`CompletionBarrier`] tracks which children of one parent are still pending and
//! the results of those already resolved. All mutation happens under one lock per
//! barrier, so concurrent events for the same parent cannot race past the
//! check-and-remove step.
//!
//! ## Rules
//! - A child id resolves **at most once**; duplicates and unknown ids are ignored.
//! - Results keep **resolution order**, not the order children were listed in.
//! - The completion signal fires **exactly once**, when the pending set empties.
//!
//! ```text
//! on_child_resolved(r)
//!   lock ─► r.task_id ∉ pending ─► Ignored
//!        └► pending.remove, results.push
//!              ├─ pending non-empty ─► Pending(n)
//!              └─ pending empty     ─► signal.send(results) ─► Completed
//! ```

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::debug;

use super::result::SubTaskResult;

/// Source of unique barrier ids.
static BARRIER_SEQ: AtomicU64 = AtomicU64::new(1);

/// Effect of feeding one child result into a barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Resolution {
    /// Child was not pending (duplicate delivery or never tracked).
    Ignored,
    /// Child recorded; this many children are still pending.
    Pending(usize),
    /// Last pending child recorded; the completion signal has fired.
    Completed,
}

struct BarrierState {
    pending: HashSet<Arc<str>>,
    results: Vec<SubTaskResult>,
    signal: Option<oneshot::Sender<Vec<SubTaskResult>>>,
}

/// Join context for one waiting parent.
pub(crate) struct CompletionBarrier {
    id: u64,
    parent_id: Arc<str>,
    state: Mutex<BarrierState>,
}

impl CompletionBarrier {
    /// Creates a barrier over `children` and returns it with the receiving half of its
    /// completion signal.
    pub(crate) fn new(
        parent_id: Arc<str>,
        children: HashSet<Arc<str>>,
    ) -> (Arc<Self>, oneshot::Receiver<Vec<SubTaskResult>>) {
        let (tx, rx) = oneshot::channel();
        let capacity = children.len();
        let barrier = Arc::new(Self {
            id: BARRIER_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            parent_id,
            state: Mutex::new(BarrierState {
                pending: children,
                results: Vec::with_capacity(capacity),
                signal: Some(tx),
            }),
        });
        (barrier, rx)
    }

    #[inline]
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub(crate) fn parent_id(&self) -> &Arc<str> {
        &self.parent_id
    }

    /// Records a child result if the child is still pending.
    pub(crate) fn on_child_resolved(&self, result: SubTaskResult) -> Resolution {
        let mut state = self.state.lock();

        if !state.pending.remove(&result.task_id) {
            debug!(
                parent_id = %self.parent_id,
                task_id = %result.task_id,
                "ignoring result for child that is not pending"
            );
            return Resolution::Ignored;
        }

        debug!(
            parent_id = %self.parent_id,
            task_id = %result.task_id,
            outcome = result.outcome.as_label(),
            pending = state.pending.len(),
            "child resolved"
        );
        state.results.push(result);

        if !state.pending.is_empty() {
            return Resolution::Pending(state.pending.len());
        }

        if let Some(signal) = state.signal.take() {
            // The waiter may already be gone (timeout or drop); nothing to do then.
            let _ = signal.send(state.results.clone());
        }
        Resolution::Completed
    }

    /// Drops the completion signal without a value so the waiter wakes up with an error.
    ///
    /// Returns `false` if the signal had already fired or been dropped. Later child
    /// results are still recorded but reach nobody.
    pub(crate) fn abandon(&self) -> bool {
        self.state.lock().signal.take().is_some()
    }

    /// Sorted ids of children that have not resolved yet.
    pub(crate) fn pending_ids(&self) -> Vec<String> {
        let state = self.state.lock();
        let mut ids: Vec<String> = state.pending.iter().map(|id| id.to_string()).collect();
        ids.sort_unstable();
        ids
    }

    /// Number of children already resolved.
    pub(crate) fn resolved_count(&self) -> usize {
        self.state.lock().results.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::TaskLifecycleEvent;

    fn children(ids: &[&str]) -> HashSet<Arc<str>> {
        ids.iter().map(|id| Arc::<str>::from(*id)).collect()
    }

    fn done(id: &str) -> SubTaskResult {
        SubTaskResult::from_event(&TaskLifecycleEvent::completed(id))
    }

    #[tokio::test]
    async fn fires_once_all_children_resolve_in_arrival_order() {
        let (barrier, rx) = CompletionBarrier::new("p".into(), children(&["a", "b", "c"]));

        assert_eq!(barrier.on_child_resolved(done("c")), Resolution::Pending(2));
        assert_eq!(barrier.on_child_resolved(done("a")), Resolution::Pending(1));
        assert_eq!(barrier.on_child_resolved(done("b")), Resolution::Completed);

        let results = rx.await.expect("signal");
        let order: Vec<&str> = results.iter().map(|r| &*r.task_id).collect();
        assert_eq!(order, ["c", "a", "b"]);
    }

    #[test]
    fn duplicate_and_unknown_children_are_ignored() {
        let (barrier, _rx) = CompletionBarrier::new("p".into(), children(&["a", "b"]));

        assert_eq!(barrier.on_child_resolved(done("a")), Resolution::Pending(1));
        assert_eq!(barrier.on_child_resolved(done("a")), Resolution::Ignored);
        assert_eq!(barrier.on_child_resolved(done("zzz")), Resolution::Ignored);
        assert_eq!(barrier.resolved_count(), 1);
        assert_eq!(barrier.pending_ids(), vec!["b".to_string()]);
    }

    #[test]
    fn late_duplicate_after_completion_is_ignored() {
        let (barrier, _rx) = CompletionBarrier::new("p".into(), children(&["a"]));
        assert_eq!(barrier.on_child_resolved(done("a")), Resolution::Completed);
        assert_eq!(barrier.on_child_resolved(done("a")), Resolution::Ignored);
    }

    #[test]
    fn completing_without_a_waiter_does_not_panic() {
        let (barrier, rx) = CompletionBarrier::new("p".into(), children(&["a"]));
        drop(rx);
        assert_eq!(barrier.on_child_resolved(done("a")), Resolution::Completed);
    }

    #[tokio::test]
    async fn abandoned_barrier_wakes_the_waiter_without_results() {
        let (barrier, rx) = CompletionBarrier::new("p".into(), children(&["a", "b"]));
        assert!(barrier.abandon());
        assert!(!barrier.abandon());
        assert!(rx.await.is_err());
        assert_eq!(barrier.on_child_resolved(done("a")), Resolution::Pending(1));
        assert_eq!(barrier.on_child_resolved(done("b")), Resolution::Completed);
    }

    #[test]
    fn barrier_ids_are_unique() {
        let (a, _) = CompletionBarrier::new("p".into(), children(&["a"]));
        let (b, _) = CompletionBarrier::new("p".into(), children(&["a"]));
        assert_ne!(a.id(), b.id());
    }
}
