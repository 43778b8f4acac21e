//! Workflow state machine and run loop.

use crate::executor::{ConnectionTracker, TaskRunner};
use crate::report::{WorkflowMetrics, WorkflowReport};
use conflux_core::{
    Connector, Context, HookError, HookEvent, HookRegistry, HookScope, RetryPolicy, Task,
    TaskResult, WorkflowError, WorkflowState,
};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Instant, SystemTime};
use tokio::sync::Notify;
use tracing::{info, warn};

/// Shared control block behind a workflow and its handles.
///
/// Holds the lifecycle state and the cooperative pause/cancel flags. The
/// state mutex guarantees at most one transition is in effect at a time.
pub(crate) struct Control {
    state: Mutex<WorkflowState>,
    cancelled: AtomicBool,
    wake: Notify,
}

impl Control {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(WorkflowState::Ready),
            cancelled: AtomicBool::new(false),
            wake: Notify::new(),
        }
    }

    fn state(&self) -> WorkflowState {
        *self.lock()
    }

    pub(crate) fn set_state(&self, next: WorkflowState) {
        *self.lock() = next;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, WorkflowState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once cancellation has been requested. Used to interrupt
    /// retry backoff delays; resolves immediately if already cancelled.
    pub(crate) async fn cancelled(&self) {
        while !self.is_cancelled() {
            self.wake.notified().await;
        }
    }

    /// `pause`: Running -> Paused. Takes effect at the next task boundary.
    fn request_pause(&self) -> Result<(), WorkflowError> {
        let mut state = self.lock();
        match *state {
            WorkflowState::Running => {
                *state = WorkflowState::Paused;
                Ok(())
            }
            from => Err(WorkflowError::InvalidStateTransition {
                from,
                operation: "pause",
            }),
        }
    }

    /// `resume`: Paused -> Running. Wakes a parked run loop.
    fn request_resume(&self) -> Result<(), WorkflowError> {
        let mut state = self.lock();
        match *state {
            WorkflowState::Paused => {
                *state = WorkflowState::Running;
                drop(state);
                self.wake.notify_one();
                Ok(())
            }
            from => Err(WorkflowError::InvalidStateTransition {
                from,
                operation: "resume",
            }),
        }
    }

    /// `cancel`: Running | Paused -> Failed. The flag is observed at task
    /// and retry-delay boundaries; in-flight adapter calls are not
    /// interrupted.
    pub(crate) fn request_cancel(&self) -> Result<(), WorkflowError> {
        let mut state = self.lock();
        match *state {
            WorkflowState::Running | WorkflowState::Paused => {
                *state = WorkflowState::Failed;
                drop(state);
                self.cancelled.store(true, Ordering::SeqCst);
                self.wake.notify_one();
                Ok(())
            }
            from => Err(WorkflowError::InvalidStateTransition {
                from,
                operation: "cancel",
            }),
        }
    }

    fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
        self.set_state(WorkflowState::Ready);
    }
}

/// Cloneable handle for controlling a workflow while `run()` is in flight.
///
/// `run()` borrows the workflow exclusively, so pause/resume/cancel during
/// a run go through a handle obtained with [`Workflow::handle`].
#[derive(Clone)]
pub struct WorkflowHandle {
    name: Arc<str>,
    control: Arc<Control>,
}

impl fmt::Debug for WorkflowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowHandle")
            .field("workflow", &self.name)
            .field("state", &self.control.state())
            .finish()
    }
}

impl WorkflowHandle {
    /// Current lifecycle state.
    pub fn state(&self) -> WorkflowState {
        self.control.state()
    }

    /// Requests a pause. Valid only while `Running`; the run parks at the
    /// next task boundary, never mid-task.
    pub fn pause(&self) -> Result<(), WorkflowError> {
        self.control.request_pause()?;
        info!(workflow = %self.name, state = %WorkflowState::Paused, "state transition");
        Ok(())
    }

    /// Resumes a paused run with the next unexecuted task.
    pub fn resume(&self) -> Result<(), WorkflowError> {
        self.control.request_resume()?;
        info!(workflow = %self.name, state = %WorkflowState::Running, "state transition");
        Ok(())
    }

    /// Cancels the run. The workflow fails immediately; in-flight work is
    /// asked to stop at its next checkpoint rather than being interrupted.
    pub fn cancel(&self) -> Result<(), WorkflowError> {
        self.control.request_cancel()?;
        info!(workflow = %self.name, state = %WorkflowState::Failed, "cancellation requested");
        Ok(())
    }
}

/// The orchestration engine root: an ordered collection of tasks driven
/// through the `Ready -> Running -> {Paused, Completed, Failed}` lifecycle.
///
/// Tasks execute strictly in declaration order on a single logical thread
/// of control; suspension happens only at retry backoff delays and at
/// cooperative pause checkpoints between tasks. Independent workflow
/// instances share no mutable state and may run concurrently.
///
/// # Examples
///
/// ```no_run
/// use conflux::prelude::*;
/// # fn task() -> Task { unimplemented!() }
///
/// # async fn demo() -> Result<(), WorkflowError> {
/// let mut workflow = Workflow::builder("nightly-sync")
///     .description("Pull, transform, publish")
///     .task(task())
///     .retry_policy(RetryPolicy::default())
///     .build()?;
///
/// let report = workflow.run().await?;
/// println!("success: {}", report.success);
/// # Ok(())
/// # }
/// ```
pub struct Workflow {
    name: String,
    description: String,
    tasks: Vec<Task>,
    connectors: Vec<Arc<dyn Connector>>,
    default_retry: RetryPolicy,
    hooks: HookRegistry,
    control: Arc<Control>,
    metrics: WorkflowMetrics,
    results: Vec<TaskResult>,
    next_task: usize,
}

impl fmt::Debug for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workflow")
            .field("name", &self.name)
            .field("state", &self.control.state())
            .field(
                "tasks",
                &self.tasks.iter().map(Task::name).collect::<Vec<_>>(),
            )
            .field(
                "connectors",
                &self.connectors.iter().map(|c| c.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Workflow {
    /// Creates a new workflow builder.
    pub fn builder(name: impl Into<String>) -> WorkflowBuilder {
        WorkflowBuilder {
            name: name.into(),
            description: String::new(),
            tasks: Vec::new(),
            connectors: Vec::new(),
            default_retry: RetryPolicy::default(),
            hooks: HookRegistry::new(),
        }
    }

    /// Workflow name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Workflow description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Current lifecycle state.
    pub fn state(&self) -> WorkflowState {
        self.control.state()
    }

    /// Connectors referenced by this workflow, deduplicated by identity.
    pub fn connectors(&self) -> &[Arc<dyn Connector>] {
        &self.connectors
    }

    /// Number of declared tasks.
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Metrics accumulated so far.
    pub fn metrics(&self) -> &WorkflowMetrics {
        &self.metrics
    }

    /// Results recorded so far (complete after a finished run).
    pub fn results(&self) -> &[TaskResult] {
        &self.results
    }

    /// Returns a handle for pausing, resuming, or cancelling a run in
    /// flight.
    pub fn handle(&self) -> WorkflowHandle {
        WorkflowHandle {
            name: Arc::from(self.name.as_str()),
            control: Arc::clone(&self.control),
        }
    }

    /// Requests a pause; see [`WorkflowHandle::pause`].
    pub fn pause(&self) -> Result<(), WorkflowError> {
        self.handle().pause()
    }

    /// Resumes a paused run; see [`WorkflowHandle::resume`].
    pub fn resume(&self) -> Result<(), WorkflowError> {
        self.handle().resume()
    }

    /// Cancels the run; see [`WorkflowHandle::cancel`].
    pub fn cancel(&self) -> Result<(), WorkflowError> {
        self.handle().cancel()
    }

    /// Returns a terminal workflow to `Ready`, discarding results and
    /// metrics so it can run again.
    pub fn reset(&mut self) -> Result<(), WorkflowError> {
        let from = self.control.state();
        if !from.is_terminal() {
            return Err(WorkflowError::InvalidStateTransition {
                from,
                operation: "reset",
            });
        }
        self.control.reset();
        self.results.clear();
        self.metrics = WorkflowMetrics::default();
        self.next_task = 0;
        info!(workflow = %self.name, state = %WorkflowState::Ready, "workflow reset");
        Ok(())
    }

    /// Runs the workflow: tasks in declaration order, cooperative pause and
    /// cancellation at task boundaries, retries per policy.
    ///
    /// Returns the aggregate [`WorkflowReport`] — complete even when the
    /// run fails, so callers can inspect every task's outcome. The only
    /// `Err` is [`WorkflowError::InvalidStateTransition`], raised without
    /// side effects when the workflow is not in `Ready` (or `Paused`)
    /// state; metrics from a previous run are left untouched.
    pub async fn run(&mut self) -> Result<WorkflowReport, WorkflowError> {
        let from = self.control.state();
        if !matches!(from, WorkflowState::Ready | WorkflowState::Paused) {
            return Err(WorkflowError::InvalidStateTransition {
                from,
                operation: "run",
            });
        }
        if from == WorkflowState::Ready {
            self.results.clear();
            self.metrics = WorkflowMetrics::default();
            self.next_task = 0;
            self.metrics.started_at = Some(SystemTime::now());
        }
        self.control.set_state(WorkflowState::Running);
        info!(workflow = %self.name, state = %WorkflowState::Running, "state transition");
        let run_started = Instant::now();

        let mut ctx = Context::new();
        let scope = HookScope::workflow(self.name.as_str());
        let mut connected = ConnectionTracker::new();

        // Pre-run hooks fire once per run; picking a paused run back up
        // does not repeat them.
        let mut run_error = if from == WorkflowState::Ready {
            self.hooks
                .dispatch(HookEvent::PreRun, &scope, &mut ctx)
                .err()
        } else {
            None
        };

        if run_error.is_none() {
            run_error = self.run_tasks(&mut ctx, &mut connected).await;
        }

        if run_error.is_none() && self.control.is_cancelled() {
            run_error = Some(WorkflowError::Cancelled);
        }
        if run_error.is_none() {
            run_error = self
                .hooks
                .dispatch(HookEvent::PostRun, &scope, &mut ctx)
                .err();
        }

        // Tasks never reached are recorded as skipped so the report is
        // complete.
        while self.next_task < self.tasks.len() {
            let name = self.tasks[self.next_task].name().to_string();
            self.results.push(TaskResult::skipped(name));
            self.next_task += 1;
        }

        let state = if run_error.is_none() {
            WorkflowState::Completed
        } else {
            WorkflowState::Failed
        };
        self.control.set_state(state);
        info!(workflow = %self.name, state = %state, "state transition");
        if state == WorkflowState::Failed {
            if let Err(e) = self.hooks.dispatch(HookEvent::OnFailure, &scope, &mut ctx) {
                warn!(workflow = %self.name, error = %e, "on_failure hook failed");
            }
        }

        connected.disconnect_all().await;

        self.metrics.finished_at = Some(SystemTime::now());
        self.metrics.total_duration = run_started.elapsed();
        let success = state == WorkflowState::Completed
            && self.results.iter().all(TaskResult::succeeded);

        Ok(WorkflowReport {
            workflow: self.name.clone(),
            success,
            state,
            tasks: self.results.clone(),
            error: run_error.map(|e| e.to_string()),
            total_duration: self.metrics.total_duration,
            metrics: self.metrics.clone(),
        })
    }

    /// Drives the task loop. Returns the error that should fail the run,
    /// or `None` when every task was handled (non-critical failures
    /// included).
    async fn run_tasks(
        &mut self,
        ctx: &mut Context,
        connected: &mut ConnectionTracker,
    ) -> Option<WorkflowError> {
        while self.next_task < self.tasks.len() {
            // Cancellation checkpoint.
            if self.control.is_cancelled() {
                return Some(WorkflowError::Cancelled);
            }
            // Pause checkpoint: park until resumed or cancelled. Never
            // interrupts a task already in progress.
            while self.control.state() == WorkflowState::Paused {
                info!(workflow = %self.name, "run parked at task boundary");
                self.control.wake.notified().await;
                if self.control.is_cancelled() {
                    return Some(WorkflowError::Cancelled);
                }
            }

            let task = &self.tasks[self.next_task];
            let runner = TaskRunner {
                workflow: &self.name,
                workflow_hooks: &self.hooks,
                default_retry: &self.default_retry,
                control: self.control.as_ref(),
            };
            let (result, error) = runner.run_task(task, ctx, connected).await;
            self.metrics
                .record_task(task.name(), result.duration, result.succeeded());

            let critical = task.is_critical();
            self.results.push(result);
            self.next_task += 1;

            // A critical task's error is re-raised unchanged to fail the
            // workflow; any other failure lets the run continue.
            if let Some(error) = error {
                if critical {
                    let task_name = self.tasks[self.next_task - 1].name();
                    warn!(workflow = %self.name, task = task_name, "critical task failed");
                    return Some(error);
                }
            }
        }
        None
    }
}

/// Builder for [`Workflow`] instances.
pub struct WorkflowBuilder {
    name: String,
    description: String,
    tasks: Vec<Task>,
    connectors: Vec<Arc<dyn Connector>>,
    default_retry: RetryPolicy,
    hooks: HookRegistry,
}

impl WorkflowBuilder {
    /// Sets the workflow description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Appends a task; tasks run in the order they are added.
    pub fn task(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }

    /// Registers a connector at the workflow level. Connectors bound to
    /// tasks are collected automatically; registering is only needed for
    /// bookkeeping of connectors no task references yet.
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connectors.push(connector);
        self
    }

    /// Sets the default retry policy for tasks without their own override.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.default_retry = policy;
        self
    }

    /// Registers a workflow-level hook.
    pub fn hook<F>(mut self, event: HookEvent, name: impl Into<String>, hook: F) -> Self
    where
        F: Fn(&HookScope, &mut Context) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.hooks.register(event, name, hook);
        self
    }

    /// Builds the workflow, validating that task names are unique.
    pub fn build(self) -> Result<Workflow, WorkflowError> {
        let mut seen = std::collections::HashSet::new();
        for task in &self.tasks {
            if !seen.insert(task.name().to_string()) {
                return Err(WorkflowError::Configuration(format!(
                    "duplicate task name '{}'",
                    task.name()
                )));
            }
        }

        // Deduplicate connector references by identity: explicit
        // registrations first, then anything tasks bind.
        let mut connectors = Vec::new();
        let registered = self
            .connectors
            .into_iter()
            .chain(self.tasks.iter().flat_map(|t| t.connectors().iter().cloned()));
        for connector in registered {
            if !connectors.iter().any(|c| Arc::ptr_eq(c, &connector)) {
                connectors.push(connector);
            }
        }

        Ok(Workflow {
            name: self.name,
            description: self.description,
            tasks: self.tasks,
            connectors,
            default_retry: self.default_retry,
            hooks: self.hooks,
            control: Arc::new(Control::new()),
            metrics: WorkflowMetrics::default(),
            results: Vec::new(),
            next_task: 0,
        })
    }
}
