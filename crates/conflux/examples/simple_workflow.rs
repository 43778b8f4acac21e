//! Simple two-tool workflow example.

use async_trait::async_trait;
use conflux::prelude::*;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug)]
struct CsvConnector;

#[async_trait]
impl Connector for CsvConnector {
    fn name(&self) -> &str {
        "csv-file"
    }

    async fn connect(&self) -> Result<(), ConnectorError> {
        println!("Opening reports.csv...");
        Ok(())
    }

    async fn validate(&self) -> Result<(), ConnectorError> {
        Ok(())
    }
}

#[derive(Debug)]
struct LoadRows;

#[async_trait]
impl Tool for LoadRows {
    fn name(&self) -> &str {
        "load-rows"
    }

    async fn run(&self, _ctx: &mut Context) -> Result<Value, ToolError> {
        println!("Loading rows...");
        Ok(json!({ "rows": ["alpha", "beta", "gamma"] }))
    }
}

#[derive(Debug)]
struct CountRows;

#[async_trait]
impl Tool for CountRows {
    fn name(&self) -> &str {
        "count-rows"
    }

    async fn run(&self, ctx: &mut Context) -> Result<Value, ToolError> {
        let count = ctx
            .output("load-rows")
            .and_then(|v| v.get("rows"))
            .and_then(Value::as_array)
            .map(Vec::len)
            .ok_or_else(|| ToolError::terminal("no rows loaded"))?;
        Ok(json!({ "count": count }))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let task = Task::builder("count-report-rows")
        .description("Load the report and count its rows")
        .connector(Arc::new(CsvConnector))
        .tool(Arc::new(LoadRows))
        .tool(Arc::new(CountRows))
        .build();

    let mut workflow = Workflow::builder("daily-report")
        .description("A workflow that counts report rows")
        .task(task)
        .build()?;

    let report = workflow.run().await?;

    println!("Workflow finished: {} ({})", report.state, report.workflow);
    for result in &report.tasks {
        println!(
            "  task '{}': {} in {:?}",
            result.task, result.status, result.duration
        );
    }
    if let Some(result) = report.task("count-report-rows") {
        println!("Output: {}", result.output);
    }

    Ok(())
}
