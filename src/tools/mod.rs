//! Tool dispatch table
//!
//! Each tool declares its parameters to the model and is invoked with the
//! JSON arguments the model supplies.

mod device;
mod location;
mod reminder;
mod website;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

pub use device::{BatteryStatus, DeviceProbe, DeviceStatusTool, SystemProbe};
pub use location::{DEFAULT_GEO_URL, GeoLocator, LocationTool};
pub use reminder::{Reminder, ReminderTool};
pub use website::{OpenWebsiteTool, SystemOpener, UrlOpener};

use crate::chat::ToolCall;
use crate::llm::FunctionDeclaration;
use crate::{Error, Result};

/// A locally executed capability the model can call
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name and parameter schema advertised to the model
    fn declaration(&self) -> FunctionDeclaration;

    /// Run the tool with the model-supplied arguments
    async fn invoke(&self, args: &Value) -> Result<Value>;
}

/// Maps tool names to implementations
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ToolRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under its declared name, replacing any previous entry
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.declaration().name;
        if self.tools.insert(name.clone(), tool).is_some() {
            tracing::warn!(tool = %name, "replacing previously registered tool");
        }
    }

    /// Builder-style [`register`](Self::register)
    #[must_use]
    pub fn with(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    /// Declarations of every registered tool, sorted by name
    #[must_use]
    pub fn declarations(&self) -> Vec<FunctionDeclaration> {
        self.tools.values().map(|t| t.declaration()).collect()
    }

    /// Registered tool names
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Whether no tools are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a tool call
    ///
    /// # Errors
    ///
    /// Returns error if the tool is unknown or its execution fails
    pub async fn dispatch(&self, call: &ToolCall) -> Result<Value> {
        let tool = self
            .tools
            .get(&call.name)
            .ok_or_else(|| Error::Tool(format!("unknown tool: {}", call.name)))?;

        tracing::info!(tool = %call.name, "executing tool");
        let result = tool.invoke(&call.args).await;
        if let Err(e) = &result {
            tracing::warn!(tool = %call.name, error = %e, "tool failed");
        }
        result
    }
}

pub(crate) fn get_string_arg(args: &Value, name: &str) -> Result<String> {
    args.get(name)
        .and_then(Value::as_str)
        .map(String::from)
        .ok_or_else(|| Error::Tool(format!("missing or invalid string argument: {name}")))
}

pub(crate) fn get_number_arg(args: &Value, name: &str) -> Result<f64> {
    let value = args.get(name).ok_or_else(|| {
        Error::Tool(format!("missing or invalid number argument: {name}"))
    })?;
    // Models occasionally quote numbers
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
        .ok_or_else(|| Error::Tool(format!("missing or invalid number argument: {name}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn declaration(&self) -> FunctionDeclaration {
            FunctionDeclaration {
                name: "echo".to_string(),
                description: "Echo the arguments".to_string(),
                parameters: None,
            }
        }

        async fn invoke(&self, args: &Value) -> Result<Value> {
            Ok(args.clone())
        }
    }

    #[tokio::test]
    async fn dispatches_by_name() {
        let registry = ToolRegistry::new().with(Arc::new(Echo));
        let output = registry
            .dispatch(&ToolCall {
                name: "echo".to_string(),
                args: serde_json::json!({"a": 1}),
            })
            .await
            .unwrap();

        assert_eq!(output["a"], 1);
        assert_eq!(registry.names(), vec!["echo"]);
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error() {
        let registry = ToolRegistry::new();
        let err = registry
            .dispatch(&ToolCall {
                name: "launch_rocket".to_string(),
                args: Value::Null,
            })
            .await
            .unwrap_err();

        assert!(err.to_string().contains("unknown tool: launch_rocket"));
    }

    #[test]
    fn number_args_accept_quoted_values() {
        let args = serde_json::json!({"time": "12", "bad": "soon", "n": 3.5});
        assert!((get_number_arg(&args, "time").unwrap() - 12.0).abs() < f64::EPSILON);
        assert!((get_number_arg(&args, "n").unwrap() - 3.5).abs() < f64::EPSILON);
        assert!(get_number_arg(&args, "bad").is_err());
        assert!(get_number_arg(&args, "missing").is_err());
        assert!(get_string_arg(&args, "n").is_err());
    }
}
