//! Error types used by barriers, task lookups and push channels.
//!
//! This module defines three error enums:
//!
//! - [`WaitError`]: the caller-visible failure of [`BarrierRegistry::wait_for_children`](crate::BarrierRegistry::wait_for_children).
//! - [`LookupError`]: errors raised by a [`TaskLookup`](crate::TaskLookup) implementation.
//! - [`EmitError`]: why a push event could not be handed to a channel consumer.
//!
//! All of them provide `as_label` for logging/metrics. Only [`WaitError`] ever
//! reaches application code; emit failures are reported as `delivered = false`.

use std::time::Duration;
use thiserror::Error;

/// # Errors returned by a join wait.
///
/// A timed-out wait does **not** mean the children failed: it only means they did
/// not all confirm within the deadline. Their state is indeterminate.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum WaitError {
    /// The deadline elapsed before every child reached a terminal outcome.
    #[error("timed out after {timeout:?} waiting on children of {parent}; pending: {pending:?}")]
    Timeout {
        /// Parent task that was waiting.
        parent: String,
        /// The timeout duration that was exceeded.
        timeout: Duration,
        /// Child ids that never resolved (sorted).
        pending: Vec<String>,
    },

    /// A zero timeout was supplied; unbounded or instant waits are not allowed.
    #[error("wait timeout must be positive")]
    InvalidTimeout,

    /// The parent id was empty; events without a parent can never reach such a barrier.
    #[error("parent task id must not be empty")]
    InvalidParent,

    /// Another wait is already active for the same parent.
    #[error("parent {parent} already has an active barrier")]
    AlreadyWaiting {
        /// Parent task id.
        parent: String,
    },

    /// The pre-registration lookup could not be completed.
    #[error("lookup of child {task} failed: {source}")]
    Lookup {
        /// Child task id whose lookup failed.
        task: String,
        /// Underlying lookup error.
        #[source]
        source: LookupError,
    },

    /// The wait was abandoned by a router shutdown before every child resolved.
    #[error("wait cancelled")]
    Canceled,
}

impl WaitError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use taskrelay::WaitError;
    ///
    /// assert_eq!(WaitError::InvalidTimeout.as_label(), "wait_invalid_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            WaitError::Timeout { .. } => "wait_timeout",
            WaitError::InvalidTimeout => "wait_invalid_timeout",
            WaitError::InvalidParent => "wait_invalid_parent",
            WaitError::AlreadyWaiting { .. } => "wait_already_waiting",
            WaitError::Lookup { .. } => "wait_lookup_failed",
            WaitError::Canceled => "wait_canceled",
        }
    }

    /// True if the wait failed because its deadline elapsed.
    pub fn is_timeout(&self) -> bool {
        matches!(self, WaitError::Timeout { .. })
    }
}

/// # Errors produced by a task lookup backend.
///
/// `Fail` is transient: the child is assumed unresolved and left to live events or
/// the timeout. `Fatal` means the lookup cannot be trusted at all and the wait is
/// aborted.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// Lookup failed but the task may still be observed later.
    #[error("lookup failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Lookup backend is unusable for this wait.
    #[error("fatal lookup error: {error}")]
    Fatal {
        /// The underlying error message.
        error: String,
    },
}

impl LookupError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            LookupError::Fail { .. } => "lookup_failed",
            LookupError::Fatal { .. } => "lookup_fatal",
        }
    }

    /// Indicates whether the failure can be absorbed by waiting for live events.
    ///
    /// # Example
    /// ```
    /// use taskrelay::LookupError;
    ///
    /// assert!(LookupError::Fail { error: "busy".into() }.is_retryable());
    /// assert!(!LookupError::Fatal { error: "gone".into() }.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(self, LookupError::Fail { .. })
    }
}

/// # Why a push event was not delivered.
#[non_exhaustive]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitError {
    /// The channel buffer is full (consumer is not keeping up).
    #[error("push channel full")]
    Full,

    /// The channel was completed or its consumer went away.
    #[error("push channel closed")]
    Closed,
}

impl EmitError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            EmitError::Full => "emit_full",
            EmitError::Closed => "emit_closed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_lists_pending_children() {
        let err = WaitError::Timeout {
            parent: "p1".into(),
            timeout: Duration::from_secs(1),
            pending: vec!["b".into()],
        };
        assert!(err.is_timeout());
        assert_eq!(err.as_label(), "wait_timeout");
        assert!(err.to_string().contains("[\"b\"]"));
    }

    #[test]
    fn lookup_error_is_carried_as_source() {
        let err = WaitError::Lookup {
            task: "a".into(),
            source: LookupError::Fatal {
                error: "store offline".into(),
            },
        };
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("fatal lookup error: store offline"));
        assert!(!err.is_timeout());
    }

    #[test]
    fn emit_labels_are_stable() {
        assert_eq!(EmitError::Full.as_label(), "emit_full");
        assert_eq!(EmitError::Closed.as_label(), "emit_closed");
    }
}
