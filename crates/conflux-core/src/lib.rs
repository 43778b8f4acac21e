//! Core traits and types for the conflux orchestration engine.
//!
//! This crate provides runtime-free abstractions. Adapter authors depend on
//! it to implement custom connectors and tools; the `conflux` crate builds
//! the workflow engine on top.
//!
//! # Core Types
//!
//! - [`Connector`] - Contract for external-resource adapters
//!   (`connect`/`validate`/`disconnect`)
//! - [`Tool`] - Contract for reusable processing units (`run` over a context)
//! - [`Task`] - A named unit of work binding connectors and tools
//! - [`Context`] - Heterogeneous key-value bag shared across a run
//! - [`RetryPolicy`] - Exponential-backoff retry parameters
//! - [`HookRegistry`] - Ordered lifecycle hooks, owned per workflow or task
//! - [`WorkflowError`] - The engine's error taxonomy

mod adapter;
mod context;
mod error;
mod hook;
mod retry;
mod state;
mod task;

pub use adapter::{Connector, Tool};
pub use context::Context;
pub use error::{Classify, ConnectorError, ErrorKind, HookError, ToolError, WorkflowError};
pub use hook::{HookEvent, HookRegistry, HookScope};
pub use retry::{RetryPolicy, RetryPolicyError};
pub use state::WorkflowState;
pub use task::{Task, TaskBuilder, TaskResult, TaskStatus};
