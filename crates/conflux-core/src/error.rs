//! Error types for adapters and the orchestration engine.

use crate::hook::HookEvent;
use crate::state::WorkflowState;
use thiserror::Error;

/// Classification of an adapter failure, decided by the adapter itself.
///
/// The retry executor consults this to decide whether another attempt is
/// worthwhile. Classification never depends on the error's type hierarchy;
/// adapters tag each error explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Transient condition (timeout, connection refused). Eligible for retry.
    Transient,
    /// Permanent condition (bad configuration, invalid credentials).
    /// Remaining attempts are skipped.
    Terminal,
}

/// Errors that carry an [`ErrorKind`] classification.
pub trait Classify {
    /// Returns the adapter-supplied classification.
    fn kind(&self) -> ErrorKind;

    /// Returns `true` if the error is worth retrying.
    fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}

/// Failure reported by a [`Connector`](crate::Connector) operation.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct ConnectorError {
    kind: ErrorKind,
    message: String,
}

impl ConnectorError {
    /// A retryable failure (timeout, transient refusal).
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Transient,
            message: message.into(),
        }
    }

    /// A permanent failure (configuration, credentials).
    pub fn terminal(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Terminal,
            message: message.into(),
        }
    }
}

impl Classify for ConnectorError {
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// Failure reported by a [`Tool`](crate::Tool) operation.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct ToolError {
    kind: ErrorKind,
    message: String,
}

impl ToolError {
    /// A retryable failure.
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Transient,
            message: message.into(),
        }
    }

    /// A permanent failure.
    pub fn terminal(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Terminal,
            message: message.into(),
        }
    }
}

impl Classify for ToolError {
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// Failure raised by a registered lifecycle hook.
#[derive(Error, Debug, Clone)]
#[error("{0}")]
pub struct HookError(String);

impl HookError {
    /// Creates a hook error with the given detail message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Errors surfaced by the workflow engine.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum WorkflowError {
    /// A lifecycle operation was invoked from a state that does not allow it.
    /// Surfaced synchronously to the caller, never retried.
    #[error("cannot {operation} a workflow in state {from}")]
    InvalidStateTransition {
        /// State the workflow was in when the operation was attempted.
        from: WorkflowState,
        /// The offending operation (`run`, `pause`, `resume`, `cancel`, `reset`).
        operation: &'static str,
    },

    /// A connector exhausted its retries during connect/validate.
    #[error("connector '{connector}' unavailable in task '{task}': {details}")]
    ConnectorUnavailable {
        /// Name of the failing connector.
        connector: String,
        /// Task that required the connector.
        task: String,
        /// The last connect/validate error.
        details: String,
    },

    /// A tool exhausted its retries.
    #[error("tool '{tool}' failed in task '{task}': {details}")]
    ToolExecution {
        /// Name of the failing tool.
        tool: String,
        /// Task the tool belongs to.
        task: String,
        /// The last run error.
        details: String,
    },

    /// A registered hook failed, aborting the operation that fired it.
    #[error("hook failed during {event}: {details}")]
    Hook {
        /// The lifecycle event being dispatched.
        event: HookEvent,
        /// Hook name and underlying error.
        details: String,
    },

    /// The run was interrupted by `cancel()`.
    #[error("workflow run cancelled")]
    Cancelled,

    /// The workflow was constructed with an invalid configuration.
    #[error("invalid workflow configuration: {0}")]
    Configuration(String),
}
