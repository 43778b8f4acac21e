//! Lifecycle hook registry and dispatch.

use crate::context::Context;
use crate::error::{HookError, WorkflowError};
use std::collections::HashMap;
use std::fmt;

/// Lifecycle events a hook can be registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookEvent {
    /// Fired once when a run starts, before any task.
    PreRun,
    /// Fired once after all tasks completed without a critical failure.
    PostRun,
    /// Fired when the workflow transitions to `Failed`.
    OnFailure,
    /// Fired before each task's pipeline.
    PreTask,
    /// Fired after each task's pipeline, regardless of outcome.
    PostTask,
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HookEvent::PreRun => "pre_run",
            HookEvent::PostRun => "post_run",
            HookEvent::OnFailure => "on_failure",
            HookEvent::PreTask => "pre_task",
            HookEvent::PostTask => "post_task",
        };
        write!(f, "{}", s)
    }
}

/// Identifies what fired a hook: the workflow, and the task if the event is
/// task-scoped.
#[derive(Debug, Clone)]
pub struct HookScope {
    workflow: String,
    task: Option<String>,
}

impl HookScope {
    /// Scope for workflow-level events (`pre_run`, `post_run`, `on_failure`).
    pub fn workflow(workflow: impl Into<String>) -> Self {
        Self {
            workflow: workflow.into(),
            task: None,
        }
    }

    /// Scope for task-level events (`pre_task`, `post_task`).
    pub fn task(workflow: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            workflow: workflow.into(),
            task: Some(task.into()),
        }
    }

    /// Name of the owning workflow.
    pub fn workflow_name(&self) -> &str {
        &self.workflow
    }

    /// Name of the task, if the event is task-scoped.
    pub fn task_name(&self) -> Option<&str> {
        self.task.as_deref()
    }
}

type HookFn = Box<dyn Fn(&HookScope, &mut Context) -> Result<(), HookError> + Send + Sync>;

struct Registered {
    name: String,
    hook: HookFn,
}

/// Ordered collection of hooks, keyed by lifecycle event.
///
/// Registration order is invocation order. Each workflow and each task owns
/// its own registry; nothing is process-wide, so concurrent workflow runs
/// cannot interfere through hooks.
///
/// # Examples
///
/// ```
/// use conflux_core::{Context, HookEvent, HookRegistry, HookScope};
///
/// let mut hooks = HookRegistry::new();
/// hooks.register(HookEvent::PreTask, "audit", |scope, ctx| {
///     ctx.insert("audited", scope.task_name().unwrap_or("?").to_string());
///     Ok(())
/// });
///
/// let mut ctx = Context::new();
/// let scope = HookScope::task("etl", "extract");
/// hooks.dispatch(HookEvent::PreTask, &scope, &mut ctx).unwrap();
/// assert_eq!(ctx.get::<String>("audited").map(|s| s.as_str()), Some("extract"));
/// ```
#[derive(Default)]
pub struct HookRegistry {
    hooks: HashMap<HookEvent, Vec<Registered>>,
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut entries: Vec<(HookEvent, Vec<&str>)> = self
            .hooks
            .iter()
            .map(|(event, hooks)| (*event, hooks.iter().map(|h| h.name.as_str()).collect()))
            .collect();
        entries.sort_by_key(|(event, _)| format!("{event}"));
        f.debug_struct("HookRegistry").field("hooks", &entries).finish()
    }
}

impl HookRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a named hook for `event`, appended after any hooks already
    /// registered for that event.
    pub fn register<F>(&mut self, event: HookEvent, name: impl Into<String>, hook: F)
    where
        F: Fn(&HookScope, &mut Context) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.hooks.entry(event).or_default().push(Registered {
            name: name.into(),
            hook: Box::new(hook),
        });
    }

    /// Invokes every hook registered for `event`, in registration order.
    ///
    /// Stops at the first failing hook and returns its error; the registry
    /// itself is left untouched, so later dispatches still see every hook.
    pub fn dispatch(
        &self,
        event: HookEvent,
        scope: &HookScope,
        ctx: &mut Context,
    ) -> Result<(), WorkflowError> {
        let Some(hooks) = self.hooks.get(&event) else {
            return Ok(());
        };
        for registered in hooks {
            (registered.hook)(scope, ctx).map_err(|e| WorkflowError::Hook {
                event,
                details: format!("{}: {}", registered.name, e),
            })?;
        }
        Ok(())
    }

    /// Number of hooks registered for `event`.
    pub fn count(&self, event: HookEvent) -> usize {
        self.hooks.get(&event).map_or(0, Vec::len)
    }

    /// Returns `true` if no hooks are registered at all.
    pub fn is_empty(&self) -> bool {
        self.hooks.values().all(Vec::is_empty)
    }
}
