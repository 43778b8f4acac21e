//! Cooperative pause/resume example.
//!
//! A handle obtained before the run pauses the workflow from another task;
//! the in-flight task finishes, the run parks at the next task boundary,
//! and resuming picks up with the next unexecuted task.

use async_trait::async_trait;
use conflux::prelude::*;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug)]
struct SlowStage {
    label: &'static str,
}

#[async_trait]
impl Tool for SlowStage {
    fn name(&self) -> &str {
        self.label
    }

    async fn run(&self, _ctx: &mut Context) -> Result<Value, ToolError> {
        println!("{} working...", self.label);
        tokio::time::sleep(Duration::from_millis(300)).await;
        Ok(json!({ "stage": self.label }))
    }
}

fn stage(name: &'static str) -> Task {
    Task::builder(name)
        .tool(Arc::new(SlowStage { label: name }))
        .build()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mut workflow = Workflow::builder("staged-pipeline")
        .task(stage("ingest"))
        .task(stage("transform"))
        .task(stage("publish"))
        .build()?;
    let handle = workflow.handle();

    let controller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        if handle.pause().is_ok() {
            println!("-- paused (takes effect at the next task boundary)");
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
        if handle.resume().is_ok() {
            println!("-- resumed");
        }
    });

    let report = workflow.run().await?;
    controller.await?;

    println!("state: {}, total: {:?}", report.state, report.total_duration);
    for result in &report.tasks {
        println!("  {}: {}", result.task, result.status);
    }

    Ok(())
}
