use async_trait::async_trait;
use conflux::prelude::*;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(
        max_attempts,
        Duration::from_millis(1),
        2,
        Duration::from_millis(8),
    )
    .expect("valid policy")
}

/// Connector whose `validate` fails a configured number of times before
/// succeeding.
#[derive(Debug)]
struct FlakyConnector {
    failures: u32,
    connect_calls: AtomicU32,
    validate_calls: AtomicU32,
    disconnect_calls: AtomicU32,
}

impl FlakyConnector {
    fn new(failures: u32) -> Self {
        Self {
            failures,
            connect_calls: AtomicU32::new(0),
            validate_calls: AtomicU32::new(0),
            disconnect_calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl Connector for FlakyConnector {
    fn name(&self) -> &str {
        "flaky-connector"
    }

    async fn connect(&self) -> Result<(), ConnectorError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn validate(&self) -> Result<(), ConnectorError> {
        let calls = self.validate_calls.fetch_add(1, Ordering::SeqCst);
        if calls < self.failures {
            Err(ConnectorError::transient("validation timed out"))
        } else {
            Ok(())
        }
    }

    async fn disconnect(&self) -> Result<(), ConnectorError> {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Connector that always fails with a non-retryable error.
#[derive(Debug, Default)]
struct MisconfiguredConnector {
    connect_calls: AtomicU32,
}

#[async_trait]
impl Connector for MisconfiguredConnector {
    fn name(&self) -> &str {
        "misconfigured"
    }

    async fn connect(&self) -> Result<(), ConnectorError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        Err(ConnectorError::terminal("missing credentials"))
    }

    async fn validate(&self) -> Result<(), ConnectorError> {
        Ok(())
    }
}

/// Tool that counts its invocations and succeeds.
#[derive(Debug)]
struct CountingTool {
    label: &'static str,
    runs: Arc<AtomicU32>,
}

#[async_trait]
impl Tool for CountingTool {
    fn name(&self) -> &str {
        self.label
    }

    async fn run(&self, _ctx: &mut Context) -> Result<Value, ToolError> {
        let run = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(json!({ "run": run }))
    }
}

/// Tool that fails every attempt with a transient error naming the attempt.
#[derive(Debug)]
struct AlwaysFailingTool {
    calls: Arc<AtomicU32>,
}

#[async_trait]
impl Tool for AlwaysFailingTool {
    fn name(&self) -> &str {
        "always-failing"
    }

    async fn run(&self, _ctx: &mut Context) -> Result<Value, ToolError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Err(ToolError::transient(format!("attempt {} failed", call)))
    }
}

/// Tool that fails transiently and signals each failed attempt.
#[derive(Debug)]
struct FailingSignalTool {
    failed: Arc<Notify>,
    calls: Arc<AtomicU32>,
}

#[async_trait]
impl Tool for FailingSignalTool {
    fn name(&self) -> &str {
        "failing-signal"
    }

    async fn run(&self, _ctx: &mut Context) -> Result<Value, ToolError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.failed.notify_one();
        Err(ToolError::transient(format!("attempt {} failed", call)))
    }
}

/// Tool that signals when it starts and blocks until released, so tests can
/// interleave pause/cancel with an in-flight task.
#[derive(Debug)]
struct GatedTool {
    started: Arc<Notify>,
    release: Arc<Notify>,
    runs: Arc<AtomicU32>,
}

#[async_trait]
impl Tool for GatedTool {
    fn name(&self) -> &str {
        "gated"
    }

    async fn run(&self, _ctx: &mut Context) -> Result<Value, ToolError> {
        self.started.notify_one();
        self.release.notified().await;
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(json!("released"))
    }
}

#[tokio::test]
async fn test_flaky_connector_recovers_and_hooks_fire_in_order() {
    let events: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let record = |events: &Arc<Mutex<Vec<String>>>, label: &'static str| {
        let events = Arc::clone(events);
        move |scope: &HookScope, _ctx: &mut Context| {
            let entry = match scope.task_name() {
                Some(task) => format!("{}({})", label, task),
                None => label.to_string(),
            };
            if let Ok(mut events) = events.lock() {
                events.push(entry);
            }
            Ok(())
        }
    };

    let connector = Arc::new(FlakyConnector::new(2));
    let b_runs = Arc::new(AtomicU32::new(0));

    let task_a = Task::builder("a")
        .connector(connector.clone())
        .retry_policy(fast_retry(3))
        .critical(true)
        .build();
    let task_b = Task::builder("b")
        .tool(Arc::new(CountingTool {
            label: "counter",
            runs: Arc::clone(&b_runs),
        }))
        .build();

    let mut workflow = Workflow::builder("scenario")
        .task(task_a)
        .task(task_b)
        .hook(HookEvent::PreRun, "rec", record(&events, "pre_run"))
        .hook(HookEvent::PostRun, "rec", record(&events, "post_run"))
        .hook(HookEvent::PreTask, "rec", record(&events, "pre_task"))
        .hook(HookEvent::PostTask, "rec", record(&events, "post_task"))
        .build()
        .expect("valid workflow");

    let report = workflow.run().await.expect("run succeeds");

    assert!(report.success);
    assert_eq!(report.state, WorkflowState::Completed);
    let a = report.task("a").expect("task a recorded");
    assert_eq!(a.status, TaskStatus::Success);
    assert_eq!(a.attempts, 3);
    assert_eq!(connector.validate_calls.load(Ordering::SeqCst), 3);
    let b = report.task("b").expect("task b recorded");
    assert_eq!(b.status, TaskStatus::Success);
    assert_eq!(b_runs.load(Ordering::SeqCst), 1);

    let events = events.lock().expect("events");
    assert_eq!(
        *events,
        vec![
            "pre_run".to_string(),
            "pre_task(a)".to_string(),
            "post_task(a)".to_string(),
            "pre_task(b)".to_string(),
            "post_task(b)".to_string(),
            "post_run".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_failing_tool_attempted_exactly_max_attempts_times() {
    let calls = Arc::new(AtomicU32::new(0));
    let task = Task::builder("t")
        .tool(Arc::new(AlwaysFailingTool {
            calls: Arc::clone(&calls),
        }))
        .retry_policy(fast_retry(3))
        .build();

    let mut workflow = Workflow::builder("wf")
        .task(task)
        .build()
        .expect("valid workflow");
    let report = workflow.run().await.expect("run returns a report");

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    let result = report.task("t").expect("task recorded");
    assert_eq!(result.status, TaskStatus::Failed);
    assert_eq!(result.attempts, 3);
    // The final error is the error from the last attempt, unchanged.
    let error = result.error.as_deref().expect("error detail");
    assert!(error.contains("attempt 3 failed"), "got: {error}");
}

#[tokio::test]
async fn test_terminal_error_bypasses_remaining_attempts() {
    let connector = Arc::new(MisconfiguredConnector::default());
    let task = Task::builder("t")
        .connector(connector.clone())
        .retry_policy(fast_retry(5))
        .build();

    let mut workflow = Workflow::builder("wf")
        .task(task)
        .build()
        .expect("valid workflow");
    let report = workflow.run().await.expect("run returns a report");

    assert_eq!(connector.connect_calls.load(Ordering::SeqCst), 1);
    let result = report.task("t").expect("task recorded");
    assert_eq!(result.status, TaskStatus::Failed);
    let error = result.error.as_deref().expect("error detail");
    assert!(error.contains("missing credentials"), "got: {error}");
    // Non-critical failure: the workflow still completes.
    assert_eq!(report.state, WorkflowState::Completed);
    assert!(!report.success);
}

#[tokio::test]
async fn test_non_critical_failure_does_not_fail_workflow() {
    let b_runs = Arc::new(AtomicU32::new(0));
    let mut workflow = Workflow::builder("wf")
        .task(
            Task::builder("fails")
                .tool(Arc::new(AlwaysFailingTool {
                    calls: Arc::new(AtomicU32::new(0)),
                }))
                .retry_policy(fast_retry(2))
                .build(),
        )
        .task(
            Task::builder("succeeds")
                .tool(Arc::new(CountingTool {
                    label: "counter",
                    runs: Arc::clone(&b_runs),
                }))
                .build(),
        )
        .build()
        .expect("valid workflow");

    let report = workflow.run().await.expect("run returns a report");

    assert_eq!(report.state, WorkflowState::Completed);
    assert!(!report.success);
    assert!(report.error.is_none());
    assert_eq!(b_runs.load(Ordering::SeqCst), 1);
    assert_eq!(report.metrics.failed_tasks, 1);
    assert_eq!(report.metrics.successful_tasks, 1);
}

#[tokio::test]
async fn test_critical_failure_fails_workflow_and_skips_rest() {
    let b_runs = Arc::new(AtomicU32::new(0));
    let mut workflow = Workflow::builder("wf")
        .task(
            Task::builder("gate")
                .tool(Arc::new(AlwaysFailingTool {
                    calls: Arc::new(AtomicU32::new(0)),
                }))
                .retry_policy(fast_retry(2))
                .critical(true)
                .build(),
        )
        .task(
            Task::builder("never-runs")
                .tool(Arc::new(CountingTool {
                    label: "counter",
                    runs: Arc::clone(&b_runs),
                }))
                .build(),
        )
        .build()
        .expect("valid workflow");

    let report = workflow.run().await.expect("run returns a report");

    assert_eq!(report.state, WorkflowState::Failed);
    assert!(!report.success);
    assert!(report.error.is_some());
    assert_eq!(b_runs.load(Ordering::SeqCst), 0);
    let skipped = report.task("never-runs").expect("skipped task recorded");
    assert_eq!(skipped.status, TaskStatus::Skipped);
}

#[tokio::test]
async fn test_pause_takes_effect_at_task_boundary() {
    let started = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let a_runs = Arc::new(AtomicU32::new(0));
    let b_runs = Arc::new(AtomicU32::new(0));

    let mut workflow = Workflow::builder("pausable")
        .task(
            Task::builder("a")
                .tool(Arc::new(GatedTool {
                    started: Arc::clone(&started),
                    release: Arc::clone(&release),
                    runs: Arc::clone(&a_runs),
                }))
                .build(),
        )
        .task(
            Task::builder("b")
                .tool(Arc::new(CountingTool {
                    label: "counter",
                    runs: Arc::clone(&b_runs),
                }))
                .build(),
        )
        .build()
        .expect("valid workflow");
    let handle = workflow.handle();

    let join = tokio::spawn(async move {
        let report = workflow.run().await;
        (report, workflow)
    });

    // Pause while task a is mid-flight, then let it finish.
    started.notified().await;
    handle.pause().expect("pause while running");
    assert_eq!(handle.state(), WorkflowState::Paused);
    release.notify_one();

    // Task a completes despite the pause; task b does not start.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(a_runs.load(Ordering::SeqCst), 1);
    assert_eq!(b_runs.load(Ordering::SeqCst), 0);
    assert_eq!(handle.state(), WorkflowState::Paused);

    handle.resume().expect("resume from paused");
    let (report, workflow) = join.await.expect("run task joins");
    let report = report.expect("run returns a report");

    assert!(report.success);
    assert_eq!(workflow.state(), WorkflowState::Completed);
    // Resuming executed task b next; task a was not re-run.
    assert_eq!(a_runs.load(Ordering::SeqCst), 1);
    assert_eq!(b_runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cancel_fails_workflow_without_interrupting_inflight_task() {
    let started = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let a_runs = Arc::new(AtomicU32::new(0));
    let b_runs = Arc::new(AtomicU32::new(0));

    let mut workflow = Workflow::builder("cancellable")
        .task(
            Task::builder("a")
                .tool(Arc::new(GatedTool {
                    started: Arc::clone(&started),
                    release: Arc::clone(&release),
                    runs: Arc::clone(&a_runs),
                }))
                .build(),
        )
        .task(
            Task::builder("b")
                .tool(Arc::new(CountingTool {
                    label: "counter",
                    runs: Arc::clone(&b_runs),
                }))
                .build(),
        )
        .build()
        .expect("valid workflow");
    let handle = workflow.handle();

    let join = tokio::spawn(async move {
        let report = workflow.run().await;
        (report, workflow)
    });

    started.notified().await;
    handle.cancel().expect("cancel while running");
    // The state flips immediately, before the in-flight task finishes.
    assert_eq!(handle.state(), WorkflowState::Failed);
    release.notify_one();

    let (report, _workflow) = join.await.expect("run task joins");
    let report = report.expect("run returns a report");

    assert_eq!(report.state, WorkflowState::Failed);
    assert!(!report.success);
    let error = report.error.as_deref().expect("cancellation recorded");
    assert!(error.contains("cancelled"), "got: {error}");
    // The in-flight task ran to completion; the rest were skipped.
    assert_eq!(a_runs.load(Ordering::SeqCst), 1);
    assert_eq!(report.task("a").map(|r| r.status), Some(TaskStatus::Success));
    assert_eq!(report.task("b").map(|r| r.status), Some(TaskStatus::Skipped));
    assert_eq!(b_runs.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_interrupts_retry_delay() {
    let failed = Arc::new(Notify::new());
    let calls = Arc::new(AtomicU32::new(0));
    let policy = RetryPolicy::new(3, Duration::from_secs(3600), 2, Duration::from_secs(3600))
        .expect("valid policy");

    let mut workflow = Workflow::builder("wf")
        .task(
            Task::builder("t")
                .tool(Arc::new(FailingSignalTool {
                    failed: Arc::clone(&failed),
                    calls: Arc::clone(&calls),
                }))
                .retry_policy(policy)
                .build(),
        )
        .build()
        .expect("valid workflow");
    let handle = workflow.handle();

    let join = tokio::spawn(async move { workflow.run().await });

    // Cancel while the run sits in the hour-long backoff delay.
    failed.notified().await;
    let cancelled_at = tokio::time::Instant::now();
    handle.cancel().expect("cancel while running");

    let report = join.await.expect("run task joins").expect("run returns a report");

    assert_eq!(report.state, WorkflowState::Failed);
    assert!(!report.success);
    let error = report.error.as_deref().expect("cancellation recorded");
    assert!(error.contains("cancelled"), "got: {error}");
    // The tool was attempted once; the second attempt never happened.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    // The backoff delay was interrupted rather than waited out.
    assert!(cancelled_at.elapsed() < Duration::from_secs(3600));
}

#[tokio::test]
async fn test_resumed_run_does_not_repeat_pre_run() {
    let pre_runs = Arc::new(AtomicU32::new(0));
    let started = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let a_runs = Arc::new(AtomicU32::new(0));
    let b_runs = Arc::new(AtomicU32::new(0));

    let counter = Arc::clone(&pre_runs);
    let mut workflow = Workflow::builder("wf")
        .task(
            Task::builder("a")
                .tool(Arc::new(GatedTool {
                    started: Arc::clone(&started),
                    release: Arc::clone(&release),
                    runs: Arc::clone(&a_runs),
                }))
                .build(),
        )
        .task(
            Task::builder("b")
                .tool(Arc::new(CountingTool {
                    label: "counter",
                    runs: Arc::clone(&b_runs),
                }))
                .build(),
        )
        .hook(HookEvent::PreRun, "count", move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .build()
        .expect("valid workflow");
    let handle = workflow.handle();

    // Drive a run up to the pause park, then drop its future mid-park.
    {
        let run = workflow.run();
        tokio::pin!(run);
        tokio::select! {
            _ = &mut run => panic!("run finished before pausing"),
            () = started.notified() => {}
        }
        handle.pause().expect("pause while running");
        release.notify_one();
        tokio::select! {
            _ = &mut run => panic!("run finished while paused"),
            () = tokio::time::sleep(Duration::from_millis(50)) => {}
        }
    }

    assert_eq!(workflow.state(), WorkflowState::Paused);
    assert_eq!(a_runs.load(Ordering::SeqCst), 1);
    let first_started_at = workflow.metrics().started_at;

    // Running again from Paused continues with task b, without repeating
    // pre-run hooks or restarting the clock.
    let report = workflow.run().await.expect("run resumes from paused");

    assert!(report.success);
    assert_eq!(b_runs.load(Ordering::SeqCst), 1);
    assert_eq!(pre_runs.load(Ordering::SeqCst), 1);
    assert_eq!(report.metrics.started_at, first_started_at);
}

#[tokio::test]
async fn test_failing_pre_task_hook_fails_only_that_task() {
    let b_runs = Arc::new(AtomicU32::new(0));
    let mut workflow = Workflow::builder("wf")
        .task(
            Task::builder("guarded")
                .tool(Arc::new(CountingTool {
                    label: "never",
                    runs: Arc::new(AtomicU32::new(0)),
                }))
                .hook(HookEvent::PreTask, "gate", |_, _| {
                    Err(HookError::new("precondition not met"))
                })
                .build(),
        )
        .task(
            Task::builder("unaffected")
                .tool(Arc::new(CountingTool {
                    label: "counter",
                    runs: Arc::clone(&b_runs),
                }))
                .build(),
        )
        .build()
        .expect("valid workflow");

    let report = workflow.run().await.expect("run returns a report");

    let guarded = report.task("guarded").expect("guarded recorded");
    assert_eq!(guarded.status, TaskStatus::Failed);
    let error = guarded.error.as_deref().expect("hook error recorded");
    assert!(error.contains("precondition not met"), "got: {error}");
    // The guarded task's tool never ran, the next task did.
    assert_eq!(guarded.output, json!({}));
    assert_eq!(b_runs.load(Ordering::SeqCst), 1);
    assert_eq!(report.state, WorkflowState::Completed);
}

#[tokio::test]
async fn test_shared_connector_connects_and_disconnects_once() {
    let connector = Arc::new(FlakyConnector::new(0));
    let shared: Arc<dyn Connector> = connector.clone();

    let mut workflow = Workflow::builder("wf")
        .task(Task::builder("a").connector(shared.clone()).build())
        .task(Task::builder("b").connector(shared.clone()).build())
        .build()
        .expect("valid workflow");

    let report = workflow.run().await.expect("run succeeds");

    assert!(report.success);
    assert_eq!(connector.connect_calls.load(Ordering::SeqCst), 1);
    assert_eq!(connector.validate_calls.load(Ordering::SeqCst), 1);
    assert_eq!(connector.disconnect_calls.load(Ordering::SeqCst), 1);
}

#[derive(Debug)]
struct ExtractTool;

#[async_trait]
impl Tool for ExtractTool {
    fn name(&self) -> &str {
        "extract"
    }

    async fn run(&self, _ctx: &mut Context) -> Result<Value, ToolError> {
        Ok(json!({ "rows": 2 }))
    }
}

#[derive(Debug)]
struct SummarizeTool;

#[async_trait]
impl Tool for SummarizeTool {
    fn name(&self) -> &str {
        "summarize"
    }

    async fn run(&self, ctx: &mut Context) -> Result<Value, ToolError> {
        let rows = ctx
            .output("extract")
            .and_then(|v| v.get("rows"))
            .and_then(Value::as_u64)
            .ok_or_else(|| ToolError::terminal("no upstream rows"))?;
        Ok(json!({ "summary": format!("{rows} rows") }))
    }
}

#[tokio::test]
async fn test_tool_outputs_flow_through_context() {
    let task = Task::builder("etl")
        .tool(Arc::new(ExtractTool))
        .tool(Arc::new(SummarizeTool))
        .build();

    let mut workflow = Workflow::builder("wf")
        .task(task)
        .build()
        .expect("valid workflow");
    let report = workflow.run().await.expect("run succeeds");

    assert!(report.success);
    let result = report.task("etl").expect("etl recorded");
    assert_eq!(result.output["extract"], json!({ "rows": 2 }));
    assert_eq!(result.output["summarize"], json!({ "summary": "2 rows" }));
}

#[tokio::test]
async fn test_report_serializes() {
    let mut workflow = Workflow::builder("wf")
        .task(Task::builder("etl").tool(Arc::new(ExtractTool)).build())
        .build()
        .expect("valid workflow");
    let report = workflow.run().await.expect("run succeeds");

    let snapshot = serde_json::to_value(&report).expect("report serializes");
    assert_eq!(snapshot["workflow"], json!("wf"));
    assert_eq!(snapshot["state"], json!("Completed"));
}
