//! # Barrier registry - event-driven N-of-N joins.
//!
//! The registry owns every active [`CompletionBarrier`], keyed by parent task id, and
//! routes terminal lifecycle events to the barrier of the event's parent.
//!
//! ## Architecture
//! ```text
//! wait_for_children(parent, children, timeout)
//!   ├─► insert barrier into map          (live events accepted from here on)
//!   ├─► TaskLookup::get_task(child) × N  (children that finished before the wait)
//!   │        └─► on_child_resolved(..)   (same idempotent path as live events)
//!   └─► await signal | deadline
//!
//! Bus → EventRouter → handle_event(ev)
//!                       ├─► no parent / no barrier → dropped (debug)
//!                       └─► barrier.on_child_resolved(..)
//!                              └─ Completed → remove barrier
//! ```
//!
//! ## Rules
//! - The barrier is inserted **before** the lookup pre-check, so an event arriving
//!   concurrently with the check is never missed; duplicates are absorbed by the
//!   barrier's idempotence.
//! - A barrier is removed exactly once, by whichever of completion, error, timeout,
//!   waiter drop or [`BarrierRegistry::cancel_all`] comes first. Removal is id-checked and idempotent.
//! - Children are never cancelled by the registry.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use tokio::time;
use tracing::{debug, info, warn};

use super::completion::{CompletionBarrier, Resolution};
use super::result::SubTaskResult;
use crate::error::WaitError;
use crate::events::{TaskLifecycleEvent, TaskOutcome};
use crate::lookup::TaskLookup;

/// Concurrent registry of active join barriers.
pub struct BarrierRegistry {
    barriers: DashMap<Arc<str>, Arc<CompletionBarrier>>,
    lookup: Arc<dyn TaskLookup>,
}

impl BarrierRegistry {
    /// Creates a registry that pre-checks children through `lookup`.
    pub fn new(lookup: Arc<dyn TaskLookup>) -> Arc<Self> {
        Arc::new(Self {
            barriers: DashMap::new(),
            lookup,
        })
    }

    /// Waits until every child in `child_ids` reaches a terminal outcome.
    ///
    /// Resolves with one [`SubTaskResult`] per distinct child, in the order the
    /// children resolved. Callers needing another order must sort by `task_id`.
    ///
    /// ### Errors
    /// - [`WaitError::Timeout`] when `timeout` elapses first (the deadline covers the
    ///   pre-check too); never-resolved children are listed in `pending`.
    /// - [`WaitError::InvalidParent`] for an empty `parent_id`.
    /// - [`WaitError::InvalidTimeout`] for a zero timeout.
    /// - [`WaitError::AlreadyWaiting`] if `parent_id` already has an active barrier.
    /// - [`WaitError::Lookup`] if the task store reports a fatal error.
    /// - [`WaitError::Canceled`] if [`cancel_all`](Self::cancel_all) abandoned the wait.
    ///
    /// Dropping the returned future removes the barrier without touching the children.
    pub async fn wait_for_children<I, S>(
        &self,
        parent_id: &str,
        child_ids: I,
        timeout: Duration,
    ) -> Result<Vec<SubTaskResult>, WaitError>
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        if parent_id.is_empty() {
            return Err(WaitError::InvalidParent);
        }
        let children: HashSet<Arc<str>> = child_ids.into_iter().map(Into::into).collect();
        if children.is_empty() {
            return Ok(Vec::new());
        }
        if timeout.is_zero() {
            return Err(WaitError::InvalidTimeout);
        }

        let parent: Arc<str> = parent_id.into();
        let child_count = children.len();
        let (barrier, signal) = CompletionBarrier::new(Arc::clone(&parent), children);

        match self.barriers.entry(Arc::clone(&parent)) {
            Entry::Occupied(_) => {
                return Err(WaitError::AlreadyWaiting {
                    parent: parent.to_string(),
                });
            }
            Entry::Vacant(slot) => {
                slot.insert(Arc::clone(&barrier));
            }
        }
        let _guard = BarrierGuard {
            barriers: &self.barriers,
            parent: &parent,
            id: barrier.id(),
        };

        info!(
            parent_id = %parent,
            children = child_count,
            timeout_ms = timeout.as_millis() as u64,
            "waiting for child tasks"
        );

        let waited = time::timeout(timeout, async {
            self.precheck(&barrier).await?;
            signal.await.map_err(|_| WaitError::Canceled)
        })
        .await;

        match waited {
            Ok(Ok(results)) => {
                info!(
                    parent_id = %parent,
                    results = results.len(),
                    "all child tasks resolved"
                );
                Ok(results)
            }
            Ok(Err(err)) => {
                warn!(parent_id = %parent, error = %err, label = err.as_label(), "wait for child tasks failed");
                Err(err)
            }
            Err(_elapsed) => {
                let pending = barrier.pending_ids();
                warn!(
                    parent_id = %parent,
                    resolved = barrier.resolved_count(),
                    pending = ?pending,
                    "timed out waiting for child tasks"
                );
                Err(WaitError::Timeout {
                    parent: parent.to_string(),
                    timeout,
                    pending,
                })
            }
        }
    }

    /// Routes a terminal event to its parent's barrier according to its outcome.
    ///
    /// Returns `true` if the event resolved a pending child.
    pub fn handle_event(&self, ev: &TaskLifecycleEvent) -> bool {
        match ev.outcome {
            TaskOutcome::Completed => self.on_task_completed(ev),
            TaskOutcome::Failed => self.on_task_failed(ev),
        }
    }

    /// Entry point for a feed that only carries completion events.
    pub fn on_task_completed(&self, ev: &TaskLifecycleEvent) -> bool {
        self.route(ev, TaskOutcome::Completed)
    }

    /// Entry point for a feed that only carries failure (and cancellation) events.
    pub fn on_task_failed(&self, ev: &TaskLifecycleEvent) -> bool {
        self.route(ev, TaskOutcome::Failed)
    }

    /// Re-runs the lookup pre-check for every active barrier.
    ///
    /// Used after the event feed reported lost events. Returns the number of children
    /// resolved by the lookup.
    pub async fn resync(&self) -> usize {
        let active: Vec<Arc<CompletionBarrier>> = self
            .barriers
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let mut resolved = 0;
        for barrier in active {
            match self.precheck(&barrier).await {
                Ok(n) => resolved += n,
                Err(err) => warn!(
                    parent_id = %barrier.parent_id(),
                    error = %err,
                    "resync lookup failed; waiting for live events"
                ),
            }
        }
        if resolved > 0 {
            info!(resolved, "resync resolved child tasks from the task store");
        }
        resolved
    }

    /// Abandons every active wait; each waiter fails with [`WaitError::Canceled`].
    ///
    /// Children are not touched. Returns the number of waits abandoned.
    pub fn cancel_all(&self) -> usize {
        let active: Vec<Arc<CompletionBarrier>> = self
            .barriers
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let mut canceled = 0;
        for barrier in active {
            if barrier.abandon() {
                canceled += 1;
            }
            remove_barrier(&self.barriers, barrier.parent_id(), barrier.id());
        }
        if canceled > 0 {
            info!(canceled, "abandoned pending waits");
        }
        canceled
    }

    /// Number of parents currently waiting.
    pub fn active_barriers(&self) -> usize {
        self.barriers.len()
    }

    /// True if `parent_id` has an active barrier.
    pub fn is_waiting(&self, parent_id: &str) -> bool {
        self.barriers.contains_key(parent_id)
    }

    /// Sorted ids of the children `parent_id` is still waiting on.
    pub fn pending_children(&self, parent_id: &str) -> Option<Vec<String>> {
        self.barriers.get(parent_id).map(|b| b.pending_ids())
    }

    fn route(&self, ev: &TaskLifecycleEvent, outcome: TaskOutcome) -> bool {
        let Some(parent) = ev.parent_task_id.as_deref() else {
            return false;
        };
        let Some(barrier) = self.barriers.get(parent).map(|b| Arc::clone(b.value())) else {
            debug!(
                parent_id = parent,
                task_id = %ev.task_id,
                "child event without an active barrier; dropped"
            );
            return false;
        };

        info!(
            parent_id = parent,
            task_id = %ev.task_id,
            outcome = outcome.as_label(),
            "child event received"
        );
        self.resolve(&barrier, SubTaskResult::from_event_as(ev, outcome)) != Resolution::Ignored
    }

    /// Looks up every pending child and feeds terminal ones into the barrier.
    async fn precheck(&self, barrier: &CompletionBarrier) -> Result<usize, WaitError> {
        let mut lookups: FuturesUnordered<_> = barrier
            .pending_ids()
            .into_iter()
            .map(|task_id| async move {
                let found = self.lookup.get_task(&task_id).await;
                (task_id, found)
            })
            .collect();

        let mut resolved = 0;
        while let Some((task_id, found)) = lookups.next().await {
            match found {
                Ok(Some(snapshot)) => {
                    let Some(mut result) = SubTaskResult::from_snapshot(snapshot) else {
                        continue;
                    };
                    debug!(
                        parent_id = %barrier.parent_id(),
                        task_id = %task_id,
                        "child already terminal before the wait"
                    );
                    result.task_id = task_id.into();
                    if self.resolve(barrier, result) != Resolution::Ignored {
                        resolved += 1;
                    }
                }
                Ok(None) => {}
                Err(err) if err.is_retryable() => {
                    warn!(
                        parent_id = %barrier.parent_id(),
                        task_id = %task_id,
                        error = %err,
                        "child lookup failed; assuming not yet resolved"
                    );
                }
                Err(source) => {
                    return Err(WaitError::Lookup {
                        task: task_id,
                        source,
                    });
                }
            }
        }
        Ok(resolved)
    }

    fn resolve(&self, barrier: &CompletionBarrier, result: SubTaskResult) -> Resolution {
        let resolution = barrier.on_child_resolved(result);
        if resolution == Resolution::Completed {
            remove_barrier(&self.barriers, barrier.parent_id(), barrier.id());
        }
        resolution
    }
}

/// Removes the barrier for `parent` only if it is still the one identified by `id`.
fn remove_barrier(
    barriers: &DashMap<Arc<str>, Arc<CompletionBarrier>>,
    parent: &str,
    id: u64,
) -> bool {
    barriers.remove_if(parent, |_, b| b.id() == id).is_some()
}

/// Releases a barrier when its wait ends for any reason, including the waiter
/// dropping the future.
struct BarrierGuard<'a> {
    barriers: &'a DashMap<Arc<str>, Arc<CompletionBarrier>>,
    parent: &'a str,
    id: u64,
}

impl Drop for BarrierGuard<'_> {
    fn drop(&mut self) {
        if remove_barrier(self.barriers, self.parent, self.id) {
            debug!(parent_id = self.parent, "barrier released before completion");
        }
    }
}
