//! # Terminal task lifecycle events.
//!
//! A [`TaskLifecycleEvent`] is published once by the task executor at the moment a
//! task reaches a terminal state. It is immutable and carries an opaque result or
//! error payload.
//!
//! Cancellation is not a separate outcome: a cancelled task is reported as
//! [`TaskOutcome::Failed`] with the [`CANCELLED_CODE`] marker in its error payload.
//!
//! ## Ordering guarantees
//! Each event has a process-wide sequence number (`seq`) that increases monotonically.
//! Barriers order results by arrival, not by `seq`; `seq` exists for diagnostics.
//!
//! ## Example
//! ```rust
//! use serde_json::json;
//! use taskrelay::{TaskLifecycleEvent, TaskOutcome};
//!
//! let ev = TaskLifecycleEvent::completed("chapter-7")
//!     .with_parent("novel-import-1")
//!     .with_result(json!({ "words": 4210 }));
//!
//! assert_eq!(ev.outcome, TaskOutcome::Completed);
//! assert_eq!(ev.parent_task_id.as_deref(), Some("novel-import-1"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

use serde::Serialize;
use serde_json::{Value, json};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Error code stored in the error payload of cancelled tasks.
pub const CANCELLED_CODE: &str = "cancelled";

/// Terminal outcome of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskOutcome {
    /// Task finished successfully; `result` may carry a payload.
    Completed,
    /// Task failed or was cancelled; `error` may carry a payload.
    Failed,
}

impl TaskOutcome {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskOutcome::Completed => "completed",
            TaskOutcome::Failed => "failed",
        }
    }
}

/// Notification that a task reached a terminal state.
///
/// - `seq`: monotonic global sequence
/// - `at`: wall-clock timestamp (for logs)
/// - `parent_task_id`: `None` when the task has no owning operation; such events
///   are irrelevant to barriers
#[derive(Debug, Clone)]
pub struct TaskLifecycleEvent {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Task that reached a terminal state.
    pub task_id: Arc<str>,
    /// Owning operation, if any.
    pub parent_task_id: Option<Arc<str>>,
    /// Terminal outcome.
    pub outcome: TaskOutcome,
    /// Result payload (only meaningful when `outcome == Completed`).
    pub result: Option<Value>,
    /// Error payload (only meaningful when `outcome == Failed`).
    pub error: Option<Value>,
}

impl TaskLifecycleEvent {
    /// Creates a new event with the current timestamp and next sequence number.
    pub fn new(task_id: impl Into<Arc<str>>, outcome: TaskOutcome) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            task_id: task_id.into(),
            parent_task_id: None,
            outcome,
            result: None,
            error: None,
        }
    }

    /// Creates a `Completed` event.
    #[inline]
    pub fn completed(task_id: impl Into<Arc<str>>) -> Self {
        Self::new(task_id, TaskOutcome::Completed)
    }

    /// Creates a `Failed` event.
    #[inline]
    pub fn failed(task_id: impl Into<Arc<str>>) -> Self {
        Self::new(task_id, TaskOutcome::Failed)
    }

    /// Creates a `Failed` event carrying the cancellation marker.
    #[inline]
    pub fn cancelled(task_id: impl Into<Arc<str>>) -> Self {
        Self::failed(task_id).with_error(cancelled_marker())
    }

    /// Attaches the owning parent task. An empty id means "no parent".
    #[inline]
    pub fn with_parent(mut self, parent: impl Into<Arc<str>>) -> Self {
        let parent = parent.into();
        self.parent_task_id = if parent.is_empty() { None } else { Some(parent) };
        self
    }

    /// Attaches a result payload.
    #[inline]
    pub fn with_result(mut self, result: Value) -> Self {
        self.result = Some(result);
        self
    }

    /// Attaches an error payload.
    #[inline]
    pub fn with_error(mut self, error: Value) -> Self {
        self.error = Some(error);
        self
    }

    /// True if this event is relevant to the barrier subsystem.
    #[inline]
    pub fn has_parent(&self) -> bool {
        self.parent_task_id.is_some()
    }
}

/// Error payload used for cancelled tasks.
pub(crate) fn cancelled_marker() -> Value {
    json!({ "code": CANCELLED_CODE })
}

/// True if the error payload carries the cancellation marker.
pub(crate) fn is_cancelled_marker(error: Option<&Value>) -> bool {
    error
        .and_then(|e| e.get("code"))
        .and_then(Value::as_str)
        .is_some_and(|code| code == CANCELLED_CODE)
}
