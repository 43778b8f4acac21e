//! Adapter contracts consumed by the engine.
//!
//! The engine never embeds integration-specific logic; it drives anything
//! implementing [`Connector`] or [`Tool`] through these traits and holds
//! adapters as trait objects behind `Arc`.

use crate::context::Context;
use crate::error::{ConnectorError, ToolError};
use async_trait::async_trait;
use serde_json::Value;

/// Adapter to an external resource (a spreadsheet, a chat platform, a
/// cluster API).
///
/// `connect()` and `validate()` must both succeed before the engine uses
/// the connector inside a task; both are wrapped by the retry policy and
/// classified by the error the adapter returns. Configuration (credentials,
/// endpoints) lives inside the implementation and is opaque to the engine.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use conflux_core::{Connector, ConnectorError};
///
/// #[derive(Debug)]
/// struct QueueConnector {
///     endpoint: String,
/// }
///
/// #[async_trait]
/// impl Connector for QueueConnector {
///     fn name(&self) -> &str {
///         "queue"
///     }
///
///     async fn connect(&self) -> Result<(), ConnectorError> {
///         if self.endpoint.is_empty() {
///             return Err(ConnectorError::terminal("endpoint not configured"));
///         }
///         Ok(())
///     }
///
///     async fn validate(&self) -> Result<(), ConnectorError> {
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connector name, used in logs, errors, and result payloads.
    fn name(&self) -> &str;

    /// Establishes the connection to the external resource.
    async fn connect(&self) -> Result<(), ConnectorError>;

    /// Verifies the established connection is usable.
    async fn validate(&self) -> Result<(), ConnectorError>;

    /// Releases the connection. Called by the engine once a run reaches a
    /// terminal state; errors are logged, never escalated.
    async fn disconnect(&self) -> Result<(), ConnectorError> {
        Ok(())
    }

    /// Runs immediately before `connect()`.
    async fn pre_connect_hook(&self) -> Result<(), ConnectorError> {
        Ok(())
    }

    /// Runs immediately after a successful `validate()`.
    async fn post_connect_hook(&self) -> Result<(), ConnectorError> {
        Ok(())
    }
}

/// Reusable processing unit invoked by tasks.
///
/// `run` receives the task's accumulated [`Context`] (outputs of prior
/// tools are available via [`Context::output`]) and returns a JSON payload
/// the engine merges back into the context under the tool's name.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name, used in logs, errors, and as the output key.
    fn name(&self) -> &str;

    /// Executes the tool.
    async fn run(&self, ctx: &mut Context) -> Result<Value, ToolError>;

    /// Runs once before the (possibly retried) `run` invocations.
    async fn pre_run_hook(&self, _ctx: &mut Context) -> Result<(), ToolError> {
        Ok(())
    }

    /// Runs once after a successful `run`, receiving the produced output.
    async fn post_run_hook(&self, _ctx: &mut Context, _output: &Value) -> Result<(), ToolError> {
        Ok(())
    }
}
