//! # Point lookup of task state.
//!
//! [`TaskLookup`] is the seam to the persistent task store. Barriers call it once per
//! child at registration time to catch children that finished before the parent
//! started waiting.
//!
//! ## Contract
//! - `Ok(None)`: the task is unknown (treated as not yet resolved).
//! - `Ok(Some(snapshot))`: only terminal snapshots resolve a child.
//! - `Err(LookupError::Fail)`: child assumed unresolved; live events or the timeout decide.
//! - `Err(LookupError::Fatal)`: the wait is aborted.

mod memory;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::LookupError;

pub use memory::InMemoryTaskLookup;

/// Current status of a task as seen by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Queued,
    Running,
    Retrying,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    /// True for states a task cannot leave.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

/// Point-in-time view of a stored task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSnapshot {
    pub task_id: String,
    pub status: TaskStatus,
    pub result: Option<Value>,
    pub error: Option<Value>,
}

impl TaskSnapshot {
    /// Creates a snapshot without payloads.
    pub fn new(task_id: impl Into<String>, status: TaskStatus) -> Self {
        Self {
            task_id: task_id.into(),
            status,
            result: None,
            error: None,
        }
    }

    /// Attaches a result payload.
    pub fn with_result(mut self, result: Value) -> Self {
        self.result = Some(result);
        self
    }

    /// Attaches an error payload.
    pub fn with_error(mut self, error: Value) -> Self {
        self.error = Some(error);
        self
    }
}

/// Read access to the task store.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use taskrelay::{LookupError, TaskLookup, TaskSnapshot, TaskStatus};
///
/// struct AlwaysRunning;
///
/// #[async_trait]
/// impl TaskLookup for AlwaysRunning {
///     async fn get_task(&self, task_id: &str) -> Result<Option<TaskSnapshot>, LookupError> {
///         Ok(Some(TaskSnapshot::new(task_id, TaskStatus::Running)))
///     }
/// }
/// ```
#[async_trait]
pub trait TaskLookup: Send + Sync + 'static {
    /// Returns the current state of `task_id`, if the store knows it.
    async fn get_task(&self, task_id: &str) -> Result<Option<TaskSnapshot>, LookupError>;
}
