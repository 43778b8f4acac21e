//! Run context with heterogeneous type storage.

use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;

/// Shared key-value bag flowing through a workflow run.
///
/// Stores any `Send + Sync` type, retrieved by downcasting. Hooks use it to
/// communicate across lifecycle events; tools read what earlier tools
/// produced. Tool outputs are JSON values merged in under the tool's name
/// (see [`Context::merge_output`]).
///
/// # Examples
///
/// ```
/// use conflux_core::Context;
///
/// let mut ctx = Context::new();
/// ctx.insert("user_id", 123u64);
/// ctx.insert("name", "Alice".to_string());
///
/// assert_eq!(ctx.get::<u64>("user_id"), Some(&123));
/// // Wrong type returns None
/// assert_eq!(ctx.get::<String>("user_id"), None);
/// ```
#[derive(Default)]
pub struct Context {
    data: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("keys", &self.data.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Context {
    /// Creates a new empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value, replacing any previous value under the same key.
    pub fn insert<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.data.insert(key.into(), Box::new(value));
    }

    /// Returns a reference to the value for `key`, or `None` if the key is
    /// absent or the stored type is not `T`.
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.data.get(key).and_then(|v| v.downcast_ref::<T>())
    }

    /// Returns a mutable reference to the value for `key`.
    pub fn get_mut<T: Any>(&mut self, key: &str) -> Option<&mut T> {
        self.data.get_mut(key).and_then(|v| v.downcast_mut::<T>())
    }

    /// Removes and returns the value for `key`.
    pub fn remove<T: Any>(&mut self, key: &str) -> Option<T> {
        self.data
            .remove(key)
            .and_then(|v| v.downcast::<T>().ok())
            .map(|b| *b)
    }

    /// Merges a tool's JSON output into the context under the tool's name.
    pub fn merge_output(&mut self, tool: &str, output: Value) {
        self.insert(tool.to_string(), output);
    }

    /// Returns the JSON output a prior tool stored under its name.
    pub fn output(&self, tool: &str) -> Option<&Value> {
        self.get::<Value>(tool)
    }

    /// Returns `true` if the context contains a value for `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Returns an iterator over all keys.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.data.keys()
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the context is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Removes all entries.
    pub fn clear(&mut self) {
        self.data.clear();
    }
}
