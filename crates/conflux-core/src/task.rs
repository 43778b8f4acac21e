//! Task definition and execution results.

use crate::adapter::{Connector, Tool};
use crate::context::Context;
use crate::error::HookError;
use crate::hook::{HookEvent, HookRegistry, HookScope};
use crate::retry::RetryPolicy;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// A named unit of work binding connectors and tools.
///
/// Connectors and tools run in the order they were added. A task executes
/// exactly once per workflow run; re-running requires a new workflow or an
/// explicit reset. Tasks marked [`critical`](TaskBuilder::critical) gate
/// the pipeline: their failure fails the whole workflow, while other
/// failures let the run continue.
///
/// # Examples
///
/// ```no_run
/// use conflux_core::{RetryPolicy, Task};
/// # fn adapters() -> (std::sync::Arc<dyn conflux_core::Connector>, std::sync::Arc<dyn conflux_core::Tool>) { unimplemented!() }
///
/// let (sheet, summarize) = adapters();
/// let task = Task::builder("weekly-report")
///     .description("Summarize the weekly sheet")
///     .connector(sheet)
///     .tool(summarize)
///     .retry_policy(RetryPolicy::default())
///     .critical(true)
///     .build();
/// ```
pub struct Task {
    name: String,
    description: String,
    connectors: Vec<Arc<dyn Connector>>,
    tools: Vec<Arc<dyn Tool>>,
    retry_policy: Option<RetryPolicy>,
    critical: bool,
    hooks: HookRegistry,
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field(
                "connectors",
                &self.connectors.iter().map(|c| c.name()).collect::<Vec<_>>(),
            )
            .field(
                "tools",
                &self.tools.iter().map(|t| t.name()).collect::<Vec<_>>(),
            )
            .field("critical", &self.critical)
            .finish()
    }
}

impl Task {
    /// Creates a builder for a task with the given name.
    pub fn builder(name: impl Into<String>) -> TaskBuilder {
        TaskBuilder {
            name: name.into(),
            description: String::new(),
            connectors: Vec::new(),
            tools: Vec::new(),
            retry_policy: None,
            critical: false,
            hooks: HookRegistry::new(),
        }
    }

    /// Task name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Task description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Connectors in declared order.
    pub fn connectors(&self) -> &[Arc<dyn Connector>] {
        &self.connectors
    }

    /// Tools in declared order.
    pub fn tools(&self) -> &[Arc<dyn Tool>] {
        &self.tools
    }

    /// Per-task retry policy override, if any.
    pub fn retry_policy(&self) -> Option<&RetryPolicy> {
        self.retry_policy.as_ref()
    }

    /// Whether failure of this task fails the whole workflow.
    pub fn is_critical(&self) -> bool {
        self.critical
    }

    /// Task-level hook registry.
    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }
}

/// Builder for [`Task`] instances.
pub struct TaskBuilder {
    name: String,
    description: String,
    connectors: Vec<Arc<dyn Connector>>,
    tools: Vec<Arc<dyn Tool>>,
    retry_policy: Option<RetryPolicy>,
    critical: bool,
    hooks: HookRegistry,
}

impl TaskBuilder {
    /// Sets the task description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Binds a connector; connectors run in the order they are added.
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connectors.push(connector);
        self
    }

    /// Binds a tool; tools run in the order they are added.
    pub fn tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    /// Overrides the workflow's default retry policy for this task.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Marks the task as critical: its failure fails the workflow.
    pub fn critical(mut self, critical: bool) -> Self {
        self.critical = critical;
        self
    }

    /// Registers a task-level hook. Task-level `pre_task` hooks run after
    /// the workflow-level ones; `post_task` hooks run before them.
    pub fn hook<F>(mut self, event: HookEvent, name: impl Into<String>, hook: F) -> Self
    where
        F: Fn(&HookScope, &mut Context) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.hooks.register(event, name, hook);
        self
    }

    /// Builds the task.
    pub fn build(self) -> Task {
        Task {
            name: self.name,
            description: self.description,
            connectors: self.connectors,
            tools: self.tools,
            retry_policy: self.retry_policy,
            critical: self.critical,
            hooks: self.hooks,
        }
    }
}

/// Outcome of a single task within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaskStatus {
    /// The pipeline finished without error.
    Success,
    /// A connector, tool, or hook failed past recovery.
    Failed,
    /// The task never ran because the workflow failed or was cancelled
    /// before reaching it.
    Skipped,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Success => "Success",
            TaskStatus::Failed => "Failed",
            TaskStatus::Skipped => "Skipped",
        };
        write!(f, "{}", s)
    }
}

/// Immutable record of a task's execution.
///
/// Produced once per task per run and never mutated afterwards; an explicit
/// workflow reset discards results wholesale rather than editing them.
#[derive(Debug, Clone, Serialize)]
pub struct TaskResult {
    /// Task name.
    pub task: String,
    /// Final status.
    pub status: TaskStatus,
    /// JSON object mapping each tool's name to its output.
    pub output: Value,
    /// Error detail when `status` is `Failed`.
    pub error: Option<String>,
    /// Highest attempt count consumed by any retried operation in the task
    /// (1 when everything succeeded first try, 0 for skipped tasks).
    pub attempts: u32,
    /// Wall-clock duration of the task's pipeline.
    pub duration: Duration,
}

impl TaskResult {
    /// Returns `true` if the task finished successfully.
    pub fn succeeded(&self) -> bool {
        self.status == TaskStatus::Success
    }

    /// A record for a task that never ran.
    pub fn skipped(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            status: TaskStatus::Skipped,
            output: Value::Null,
            error: None,
            attempts: 0,
            duration: Duration::ZERO,
        }
    }
}
