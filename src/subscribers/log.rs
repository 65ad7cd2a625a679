//! # LogWriter: lifecycle event logger
//!
//! A minimal subscriber that writes every [`TaskLifecycleEvent`] through `tracing`.
//! Use it for demos or when a process has no other lifecycle sink.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! INFO taskrelay::subscribers::log: task completed task_id=ch-1 parent_id=Some("import-7") seq=3
//! WARN taskrelay::subscribers::log: task failed task_id=ch-2 parent_id=Some("import-7") seq=4 error=Some(String("timeout"))
//! ```

use async_trait::async_trait;
use tracing::{info, warn};

use crate::events::{TaskLifecycleEvent, TaskOutcome};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &TaskLifecycleEvent) {
        match e.outcome {
            TaskOutcome::Completed => {
                info!(task_id = %e.task_id, parent_id = ?e.parent_task_id, seq = e.seq, "task completed");
            }
            TaskOutcome::Failed => {
                warn!(
                    task_id = %e.task_id,
                    parent_id = ?e.parent_task_id,
                    seq = e.seq,
                    error = ?e.error,
                    "task failed"
                );
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[tokio::test]
    #[traced_test]
    async fn writes_one_line_per_event() {
        let writer = LogWriter::new();
        writer
            .on_event(&TaskLifecycleEvent::completed("ch-1").with_parent("import-7"))
            .await;
        writer.on_event(&TaskLifecycleEvent::cancelled("ch-2")).await;

        assert!(logs_contain("task completed"));
        assert!(logs_contain("task failed"));
        assert!(logs_contain("cancelled"));
    }
}
