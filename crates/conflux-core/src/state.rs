//! Workflow lifecycle states.

use serde::Serialize;
use std::fmt;

/// Lifecycle state of a workflow.
///
/// Transitions: `Ready -> Running -> {Paused, Completed, Failed}`,
/// `Paused -> Running` (resume), `Paused -> Failed` (cancel).
/// `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WorkflowState {
    /// Constructed, never run.
    Ready,
    /// A run is in progress.
    Running,
    /// A run is parked at a task boundary, waiting for resume or cancel.
    Paused,
    /// All tasks finished without an unrecovered critical failure.
    Completed,
    /// A critical failure, cancellation, or aborted run.
    Failed,
}

impl WorkflowState {
    /// Returns `true` for `Completed` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkflowState::Completed | WorkflowState::Failed)
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkflowState::Ready => "Ready",
            WorkflowState::Running => "Running",
            WorkflowState::Paused => "Paused",
            WorkflowState::Completed => "Completed",
            WorkflowState::Failed => "Failed",
        };
        write!(f, "{}", s)
    }
}
