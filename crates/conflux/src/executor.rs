//! Per-task execution pipeline: hooks, connectors, tools, retries.

use crate::retry::RetrySchedule;
use crate::workflow::Control;
use conflux_core::{
    Classify, Connector, Context, HookEvent, HookRegistry, HookScope, RetryPolicy, Task,
    TaskResult, TaskStatus, Tool, WorkflowError,
};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Tracks which connectors established a connection during the current run.
///
/// Identity is `Arc` pointer identity, so a connector shared across tasks
/// connects once and its `connect()`/`validate()` sequence is never
/// re-entered within a run.
#[derive(Default)]
pub(crate) struct ConnectionTracker {
    connected: Vec<Arc<dyn Connector>>,
}

impl ConnectionTracker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn is_connected(&self, connector: &Arc<dyn Connector>) -> bool {
        self.connected.iter().any(|c| Arc::ptr_eq(c, connector))
    }

    fn mark(&mut self, connector: Arc<dyn Connector>) {
        self.connected.push(connector);
    }

    /// Releases every connection made during the run. Errors are logged,
    /// never escalated.
    pub(crate) async fn disconnect_all(&mut self) {
        for connector in self.connected.drain(..) {
            if let Err(e) = connector.disconnect().await {
                warn!(connector = connector.name(), error = %e, "disconnect failed");
            } else {
                debug!(connector = connector.name(), "disconnected");
            }
        }
    }
}

/// Runs a single task's pipeline on behalf of the workflow.
pub(crate) struct TaskRunner<'a> {
    pub(crate) workflow: &'a str,
    pub(crate) workflow_hooks: &'a HookRegistry,
    pub(crate) default_retry: &'a RetryPolicy,
    pub(crate) control: &'a Control,
}

impl TaskRunner<'_> {
    /// Executes the pipeline for `task`: pre-task hooks, connectors, tools,
    /// post-task hooks. Failures are converted into the returned
    /// [`TaskResult`]; the typed error rides alongside so the workflow can
    /// re-raise it unchanged when the task is critical.
    pub(crate) async fn run_task(
        &self,
        task: &Task,
        ctx: &mut Context,
        connected: &mut ConnectionTracker,
    ) -> (TaskResult, Option<WorkflowError>) {
        let started = Instant::now();
        let scope = HookScope::task(self.workflow, task.name());
        let policy = task.retry_policy().unwrap_or(self.default_retry);
        let mut attempts: u32 = 1;
        let mut outputs = Map::new();
        info!(task = task.name(), critical = task.is_critical(), "task started");

        let outcome = self
            .pipeline(task, policy, &scope, ctx, connected, &mut attempts, &mut outputs)
            .await;

        // Post-task hooks always fire, task-level then workflow-level, so
        // cleanup hooks observe failed pipelines too.
        let post = task
            .hooks()
            .dispatch(HookEvent::PostTask, &scope, ctx)
            .and_then(|()| self.workflow_hooks.dispatch(HookEvent::PostTask, &scope, ctx));

        let error = outcome.err().or_else(|| post.err());
        let duration = started.elapsed();
        let status = if error.is_none() {
            TaskStatus::Success
        } else {
            TaskStatus::Failed
        };
        info!(
            task = task.name(),
            status = %status,
            attempts,
            duration_ms = duration.as_millis() as u64,
            "task finished"
        );

        let result = TaskResult {
            task: task.name().to_string(),
            status,
            output: Value::Object(outputs),
            error: error.as_ref().map(ToString::to_string),
            attempts,
            duration,
        };
        (result, error)
    }

    #[allow(clippy::too_many_arguments)]
    async fn pipeline(
        &self,
        task: &Task,
        policy: &RetryPolicy,
        scope: &HookScope,
        ctx: &mut Context,
        connected: &mut ConnectionTracker,
        attempts: &mut u32,
        outputs: &mut Map<String, Value>,
    ) -> Result<(), WorkflowError> {
        // Pre-task hooks: workflow-level first, then task-level. A failing
        // hook prevents the task from running at all.
        self.workflow_hooks.dispatch(HookEvent::PreTask, scope, ctx)?;
        task.hooks().dispatch(HookEvent::PreTask, scope, ctx)?;

        for connector in task.connectors() {
            if connected.is_connected(connector) {
                debug!(connector = connector.name(), "already connected, skipping");
                continue;
            }
            self.establish(connector, policy, task.name(), attempts).await?;
            connected.mark(Arc::clone(connector));
        }

        for tool in task.tools() {
            let output = self.run_tool(tool, policy, task.name(), ctx, attempts).await?;
            ctx.merge_output(tool.name(), output.clone());
            outputs.insert(tool.name().to_string(), output);
        }
        Ok(())
    }

    /// Brings a connector up: `pre_connect_hook -> connect -> validate ->
    /// post_connect_hook`, the whole sequence wrapped by the retry policy.
    async fn establish(
        &self,
        connector: &Arc<dyn Connector>,
        policy: &RetryPolicy,
        task: &str,
        attempts: &mut u32,
    ) -> Result<(), WorkflowError> {
        let mut schedule = RetrySchedule::new(policy, self.control);
        loop {
            if self.control.is_cancelled() {
                return Err(WorkflowError::Cancelled);
            }
            let result = async {
                connector.pre_connect_hook().await?;
                connector.connect().await?;
                connector.validate().await?;
                connector.post_connect_hook().await
            }
            .await;
            match result {
                Ok(()) => {
                    *attempts = (*attempts).max(schedule.attempt());
                    info!(
                        connector = connector.name(),
                        attempts = schedule.attempt(),
                        "connector ready"
                    );
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        connector = connector.name(),
                        attempt = schedule.attempt(),
                        error = %e,
                        "connector attempt failed"
                    );
                    if e.is_transient() && schedule.backoff(connector.name()).await {
                        continue;
                    }
                    *attempts = (*attempts).max(schedule.attempt());
                    return Err(WorkflowError::ConnectorUnavailable {
                        connector: connector.name().to_string(),
                        task: task.to_string(),
                        details: e.to_string(),
                    });
                }
            }
        }
    }

    /// Runs a tool: `pre_run_hook` once, then `run` wrapped by the retry
    /// policy, then `post_run_hook` once on success.
    async fn run_tool(
        &self,
        tool: &Arc<dyn Tool>,
        policy: &RetryPolicy,
        task: &str,
        ctx: &mut Context,
        attempts: &mut u32,
    ) -> Result<Value, WorkflowError> {
        let fail = |details: String| WorkflowError::ToolExecution {
            tool: tool.name().to_string(),
            task: task.to_string(),
            details,
        };

        tool.pre_run_hook(ctx).await.map_err(|e| fail(e.to_string()))?;

        let mut schedule = RetrySchedule::new(policy, self.control);
        let output = loop {
            if self.control.is_cancelled() {
                return Err(WorkflowError::Cancelled);
            }
            match tool.run(ctx).await {
                Ok(output) => break output,
                Err(e) => {
                    warn!(
                        tool = tool.name(),
                        attempt = schedule.attempt(),
                        error = %e,
                        "tool attempt failed"
                    );
                    if e.is_transient() && schedule.backoff(tool.name()).await {
                        continue;
                    }
                    *attempts = (*attempts).max(schedule.attempt());
                    return Err(fail(e.to_string()));
                }
            }
        };
        *attempts = (*attempts).max(schedule.attempt());

        tool.post_run_hook(ctx, &output)
            .await
            .map_err(|e| fail(e.to_string()))?;
        debug!(tool = tool.name(), attempts = schedule.attempt(), "tool finished");
        Ok(output)
    }
}
