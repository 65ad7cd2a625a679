use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::events::{TaskLifecycleEvent, TaskOutcome, cancelled_marker, is_cancelled_marker};
use crate::lookup::{TaskSnapshot, TaskStatus};

/// Resolved outcome of one child task, as delivered to the waiting parent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubTaskResult {
    pub task_id: Arc<str>,
    pub outcome: TaskOutcome,
    pub result: Option<Value>,
    pub error: Option<Value>,
}

impl SubTaskResult {
    /// Builds a result from a live lifecycle event.
    pub fn from_event(ev: &TaskLifecycleEvent) -> Self {
        Self::from_event_as(ev, ev.outcome)
    }

    /// Builds a result from a lifecycle event delivered on an outcome-specific feed.
    pub(crate) fn from_event_as(ev: &TaskLifecycleEvent, outcome: TaskOutcome) -> Self {
        let (result, error) = match outcome {
            TaskOutcome::Completed => (ev.result.clone(), None),
            TaskOutcome::Failed => (None, ev.error.clone()),
        };
        Self {
            task_id: Arc::clone(&ev.task_id),
            outcome,
            result,
            error,
        }
    }

    /// Builds a result from a stored snapshot; `None` unless the snapshot is terminal.
    pub fn from_snapshot(snapshot: TaskSnapshot) -> Option<Self> {
        if !snapshot.status.is_terminal() {
            return None;
        }
        let (outcome, result, error) = match snapshot.status {
            TaskStatus::Completed => (TaskOutcome::Completed, snapshot.result, None),
            TaskStatus::Cancelled => {
                let error = match snapshot.error {
                    Some(e) if is_cancelled_marker(Some(&e)) => e,
                    Some(detail) => {
                        let mut marker = cancelled_marker();
                        marker["detail"] = detail;
                        marker
                    }
                    None => cancelled_marker(),
                };
                (TaskOutcome::Failed, None, Some(error))
            }
            _ => (TaskOutcome::Failed, None, snapshot.error),
        };
        Some(Self {
            task_id: snapshot.task_id.into(),
            outcome,
            result,
            error,
        })
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        self.outcome == TaskOutcome::Completed
    }

    /// True if the child was cancelled rather than failing on its own.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.outcome == TaskOutcome::Failed && is_cancelled_marker(self.error.as_ref())
    }
}
