//! Retry and failure-recovery example.
//!
//! Demonstrates:
//! 1. A flaky connector recovering under an exponential-backoff policy
//! 2. A non-critical task failing without failing the workflow
//! 3. Lifecycle hooks observing the run

use async_trait::async_trait;
use conflux::prelude::*;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Simulates a service that refuses the first two connection attempts.
#[derive(Debug, Default)]
struct FlakyServiceConnector {
    attempts: AtomicU32,
}

#[async_trait]
impl Connector for FlakyServiceConnector {
    fn name(&self) -> &str {
        "flaky-service"
    }

    async fn connect(&self) -> Result<(), ConnectorError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt < 3 {
            println!("connect attempt {} refused", attempt);
            return Err(ConnectorError::transient("connection refused"));
        }
        println!("connected on attempt {}", attempt);
        Ok(())
    }

    async fn validate(&self) -> Result<(), ConnectorError> {
        Ok(())
    }
}

#[derive(Debug)]
struct FetchMetrics;

#[async_trait]
impl Tool for FetchMetrics {
    fn name(&self) -> &str {
        "fetch-metrics"
    }

    async fn run(&self, _ctx: &mut Context) -> Result<Value, ToolError> {
        Ok(json!({ "cpu": 0.42, "memory": 0.81 }))
    }
}

/// A tool that is misconfigured and always fails terminally.
#[derive(Debug)]
struct BrokenExporter;

#[async_trait]
impl Tool for BrokenExporter {
    fn name(&self) -> &str {
        "broken-exporter"
    }

    async fn run(&self, _ctx: &mut Context) -> Result<Value, ToolError> {
        Err(ToolError::terminal("export endpoint not configured"))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let policy = RetryPolicy::new(
        4,
        Duration::from_millis(100),
        2,
        Duration::from_secs(1),
    )?
    .with_jitter();

    let fetch = Task::builder("fetch")
        .description("Pull metrics from the flaky service")
        .connector(Arc::new(FlakyServiceConnector::default()))
        .tool(Arc::new(FetchMetrics))
        .critical(true)
        .build();

    // Non-critical: its failure is recorded but does not fail the run.
    let export = Task::builder("export")
        .description("Push metrics to the exporter")
        .tool(Arc::new(BrokenExporter))
        .build();

    let mut workflow = Workflow::builder("metrics-pipeline")
        .retry_policy(policy)
        .task(fetch)
        .task(export)
        .hook(HookEvent::PostTask, "announce", |scope, _ctx| {
            println!("finished task {:?}", scope.task_name());
            Ok(())
        })
        .build()?;

    let report = workflow.run().await?;

    println!();
    println!("state: {}, success: {}", report.state, report.success);
    for result in &report.tasks {
        match &result.error {
            Some(error) => println!("  {}: {} ({})", result.task, result.status, error),
            None => println!(
                "  {}: {} after {} attempt(s)",
                result.task, result.status, result.attempts
            ),
        }
    }

    Ok(())
}
