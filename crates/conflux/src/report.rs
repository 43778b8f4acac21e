//! Run reports and workflow metrics.

use conflux_core::{TaskResult, WorkflowState};
use serde::Serialize;
use std::time::{Duration, SystemTime};

/// Metrics accumulated over a workflow run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkflowMetrics {
    /// When the run started.
    pub started_at: Option<SystemTime>,
    /// When the run reached a terminal state.
    pub finished_at: Option<SystemTime>,
    /// Wall-clock duration of each executed task, in execution order.
    pub task_durations: Vec<(String, Duration)>,
    /// Tasks that finished successfully.
    pub successful_tasks: u32,
    /// Tasks that failed.
    pub failed_tasks: u32,
    /// Total wall-clock time of the run, pauses included.
    pub total_duration: Duration,
}

impl WorkflowMetrics {
    /// Records an executed task's duration and outcome. Skipped tasks are
    /// not recorded here; they appear only in the report's task list.
    pub(crate) fn record_task(&mut self, task: &str, duration: Duration, succeeded: bool) {
        self.task_durations.push((task.to_string(), duration));
        if succeeded {
            self.successful_tasks += 1;
        } else {
            self.failed_tasks += 1;
        }
    }
}

/// Aggregate result of a workflow run.
///
/// Always complete: a failed or cancelled run still lists every task with
/// its status, so callers can inspect what succeeded, what failed, and why.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowReport {
    /// Workflow name.
    pub workflow: String,
    /// `true` when the workflow completed and every task succeeded.
    pub success: bool,
    /// Terminal state of the run (`Completed` or `Failed`).
    pub state: WorkflowState,
    /// One result per declared task, in declaration order.
    pub tasks: Vec<TaskResult>,
    /// The error that ended the run, if it did not complete.
    pub error: Option<String>,
    /// Total elapsed time of the run.
    pub total_duration: Duration,
    /// Metrics snapshot taken when the run ended.
    pub metrics: WorkflowMetrics,
}

impl WorkflowReport {
    /// Looks up a task's result by name.
    pub fn task(&self, name: &str) -> Option<&TaskResult> {
        self.tasks.iter().find(|r| r.task == name)
    }
}
