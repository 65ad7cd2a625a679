//! # In-memory task store.
//!
//! [`InMemoryTaskLookup`] keeps snapshots in a concurrent map. It is the reference
//! [`TaskLookup`] used by tests and demos, and is handy for embedding the crate in
//! a process that has no external task store.

use async_trait::async_trait;
use dashmap::DashMap;

use super::{TaskLookup, TaskSnapshot, TaskStatus};
use crate::error::LookupError;
use crate::events::{TaskLifecycleEvent, TaskOutcome, is_cancelled_marker};

/// Concurrent in-memory task store.
#[derive(Debug, Default)]
pub struct InMemoryTaskLookup {
    tasks: DashMap<String, TaskSnapshot>,
    errors: DashMap<String, LookupError>,
}

impl InMemoryTaskLookup {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a snapshot.
    pub fn upsert(&self, snapshot: TaskSnapshot) {
        self.tasks.insert(snapshot.task_id.clone(), snapshot);
    }

    /// Records the terminal state carried by a lifecycle event.
    pub fn apply(&self, ev: &TaskLifecycleEvent) {
        let status = match ev.outcome {
            TaskOutcome::Completed => TaskStatus::Completed,
            TaskOutcome::Failed if is_cancelled_marker(ev.error.as_ref()) => TaskStatus::Cancelled,
            TaskOutcome::Failed => TaskStatus::Failed,
        };
        self.upsert(TaskSnapshot {
            task_id: ev.task_id.to_string(),
            status,
            result: ev.result.clone(),
            error: ev.error.clone(),
        });
    }

    /// Makes every later lookup of `task_id` fail with `err`.
    pub fn fail_with(&self, task_id: impl Into<String>, err: LookupError) {
        self.errors.insert(task_id.into(), err);
    }

    /// Number of stored snapshots.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// True if the store holds no snapshots.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[async_trait]
impl TaskLookup for InMemoryTaskLookup {
    async fn get_task(&self, task_id: &str) -> Result<Option<TaskSnapshot>, LookupError> {
        if let Some(err) = self.errors.get(task_id) {
            return Err(err.value().clone());
        }
        Ok(self.tasks.get(task_id).map(|s| s.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn unknown_task_is_none() {
        let store = InMemoryTaskLookup::new();
        assert_eq!(store.get_task("nope").await, Ok(None));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn apply_maps_outcomes_to_statuses() {
        let store = InMemoryTaskLookup::new();
        store.apply(&TaskLifecycleEvent::completed("a").with_result(json!(1)));
        store.apply(&TaskLifecycleEvent::failed("b").with_error(json!("boom")));
        store.apply(&TaskLifecycleEvent::cancelled("c"));

        let a = store.get_task("a").await.unwrap().unwrap();
        assert_eq!(a.status, TaskStatus::Completed);
        assert_eq!(a.result, Some(json!(1)));
        let b = store.get_task("b").await.unwrap().unwrap();
        assert_eq!(b.status, TaskStatus::Failed);
        let c = store.get_task("c").await.unwrap().unwrap();
        assert_eq!(c.status, TaskStatus::Cancelled);
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn injected_errors_win_over_snapshots() {
        let store = InMemoryTaskLookup::new();
        store.upsert(TaskSnapshot::new("a", TaskStatus::Running));
        store.fail_with("a", LookupError::Fail { error: "busy".into() });

        assert!(matches!(
            store.get_task("a").await,
            Err(LookupError::Fail { .. })
        ));
    }
}
