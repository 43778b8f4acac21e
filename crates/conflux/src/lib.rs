//! A lightweight workflow orchestration engine for Rust.
//!
//! A [`Workflow`] owns an ordered list of [`Task`]s; each task binds
//! [`Connector`]s (external-resource adapters) and [`Tool`]s (reusable
//! processing units). The engine drives the
//! `Ready -> Running -> {Paused, Completed, Failed}` lifecycle, dispatches
//! lifecycle hooks, retries transient failures with exponential backoff,
//! and returns a complete [`WorkflowReport`] for every run.
//!
//! # Example
//!
//! ```rust,ignore
//! use conflux::prelude::*;
//! use async_trait::async_trait;
//! use serde_json::{json, Value};
//!
//! #[derive(Debug)]
//! struct Greet;
//!
//! #[async_trait]
//! impl Tool for Greet {
//!     fn name(&self) -> &str {
//!         "greet"
//!     }
//!
//!     async fn run(&self, _ctx: &mut Context) -> Result<Value, ToolError> {
//!         Ok(json!("hello"))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), WorkflowError> {
//!     let task = Task::builder("greet").tool(std::sync::Arc::new(Greet)).build();
//!     let mut workflow = Workflow::builder("demo").task(task).build()?;
//!     let report = workflow.run().await?;
//!     assert!(report.success);
//!     Ok(())
//! }
//! ```

mod executor;
mod report;
mod retry;
mod workflow;

// Re-export core types
pub use conflux_core::*;

pub use report::{WorkflowMetrics, WorkflowReport};
pub use workflow::{Workflow, WorkflowBuilder, WorkflowHandle};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        Classify, Connector, ConnectorError, Context, ErrorKind, HookError, HookEvent,
        HookRegistry, HookScope, RetryPolicy, RetryPolicyError, Task, TaskBuilder, TaskResult,
        TaskStatus, Tool, ToolError, Workflow, WorkflowBuilder, WorkflowError, WorkflowHandle,
        WorkflowMetrics, WorkflowReport, WorkflowState,
    };
}
