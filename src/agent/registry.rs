use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::error::{AgentError, ToolError};

/// A capability executed in this process when the backend asks for it.
pub trait LocalTool: Send + Sync {
    fn name(&self) -> &str;

    /// Run the tool with the arguments sent by the backend.
    ///
    /// # Errors
    ///
    /// Any error aborts the turn.
    fn call(&self, arguments: &Value) -> Result<Value, ToolError>;
}

struct FnTool<F> {
    name: String,
    func: F,
}

impl<F> LocalTool for FnTool<F>
where
    F: Fn(&Value) -> Result<Value, ToolError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, arguments: &Value) -> Result<Value, ToolError> {
        (self.func)(arguments)
    }
}

/// Closed mapping from tool name to implementation.
///
/// Built once by the caller and passed by reference into each chat turn.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: FxHashMap<String, Arc<dyn LocalTool>>,
}

impl ToolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    ///
    /// Returns [`AgentError::DuplicateTool`] if the name is taken.
    pub fn register(&mut self, tool: Arc<dyn LocalTool>) -> Result<(), AgentError> {
        let name = tool.name().to_string();
        if self.contains(&name) {
            return Err(AgentError::DuplicateTool(name));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Register a closure under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::DuplicateTool`] if the name is taken.
    pub fn register_fn<F>(&mut self, name: impl Into<String>, func: F) -> Result<(), AgentError>
    where
        F: Fn(&Value) -> Result<Value, ToolError> + Send + Sync + 'static,
    {
        self.register(Arc::new(FnTool {
            name: name.into(),
            func,
        }))
    }

    /// # Errors
    ///
    /// Returns [`AgentError::UnknownTool`] for an unregistered name.
    pub fn get(&self, name: &str) -> Result<&dyn LocalTool, AgentError> {
        self.tools
            .get(name)
            .map(|tool| &**tool)
            .ok_or_else(|| AgentError::UnknownTool(name.to_string()))
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}
