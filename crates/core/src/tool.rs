//! Tool trait and registry.
//!
//! The tool set is closed: every tool is registered at startup and the
//! registry is never mutated while a conversation is running.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::debug;

use crate::alert::{AlertCallback, AlertSlot};
use crate::error::ToolError;
use crate::provider::{ToolDefinition, ToolParameter};

/// A request to execute a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the assistant message's tool call id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments by parameter name, in the order the model gave them
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// The outcome of one tool execution as the loop records it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// The call ID this result is for
    pub call_id: String,

    /// Whether the tool executed successfully
    pub success: bool,

    /// Result text, or a short diagnostic when `success` is false
    pub output: String,
}

/// The core Tool trait.
///
/// A tool is a function from arguments to result text. Recoverable problems
/// the model should fix (missing value, bad number) are reported as plain
/// result text; `Err` is reserved for genuine execution failures.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "calculator", "set_timer").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// Declared parameters, in order.
    fn parameters(&self) -> Vec<ToolParameter>;

    /// Execute the tool with the given arguments.
    async fn execute(&self, arguments: &Map<String, Value>) -> std::result::Result<String, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// A registry of available tools.
///
/// The agent loop uses this to:
/// 1. Get tool definitions to send to the LLM, in registration order
/// 2. Look up and execute tools when the LLM requests them
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
    index: HashMap<String, usize>,
    alert: AlertSlot,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::with_alert_slot(AlertSlot::new())
    }

    /// Create a registry whose alert callback is shared with other holders
    /// of `alert` (normally the scheduler).
    pub fn with_alert_slot(alert: AlertSlot) -> Self {
        Self {
            tools: Vec::new(),
            index: HashMap::new(),
            alert,
        }
    }

    /// Register a tool. Replaces any existing tool with the same name,
    /// keeping its original position.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        match self.index.get(&name) {
            Some(&pos) => self.tools[pos] = tool,
            None => {
                self.index.insert(name, self.tools.len());
                self.tools.push(tool);
            }
        }
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.index.get(name).map(|&pos| self.tools[pos].as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Get all tool definitions (for sending to the LLM).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.to_definition()).collect()
    }

    /// Execute a tool call.
    pub async fn execute(&self, call: &ToolCall) -> std::result::Result<String, ToolError> {
        let Some(tool) = self.get(&call.name) else {
            debug!(tool = %call.name, call_id = %call.id, "Unknown tool requested");
            return Err(ToolError::NotFound(call.name.clone()));
        };
        debug!(tool = %call.name, call_id = %call.id, "Executing tool");
        tool.execute(&call.arguments).await
    }

    /// List all registered tool names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Install the callback timers and reminders speak through when they fire.
    pub fn set_alert_callback(&self, callback: AlertCallback) {
        self.alert.set(callback);
    }

    pub fn clear_alert_callback(&self) {
        self.alert.clear();
    }

    /// The slot shared with the scheduler.
    pub fn alert_slot(&self) -> &AlertSlot {
        &self.alert
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    /// A simple test tool for unit tests.
    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes back the input"
        }
        fn parameters(&self) -> Vec<ToolParameter> {
            vec![ToolParameter::string("text", "Text to echo").required()]
        }
        async fn execute(&self, arguments: &Map<String, Value>) -> std::result::Result<String, ToolError> {
            Ok(arguments
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string())
        }
    }

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str {
            "explode"
        }
        fn description(&self) -> &str {
            "Always fails"
        }
        fn parameters(&self) -> Vec<ToolParameter> {
            vec![]
        }
        async fn execute(&self, _arguments: &Map<String, Value>) -> std::result::Result<String, ToolError> {
            Err(ToolError::execution("explode", "boom"))
        }
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn registry_register_and_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        assert!(registry.get("echo").is_some());
        assert!(registry.get("nonexistent").is_none());
        assert!(registry.contains("echo"));
    }

    #[test]
    fn definitions_follow_registration_order() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(FailingTool));
        registry.register(Box::new(EchoTool));
        registry.register(Box::new(FailingTool));

        let names: Vec<String> = registry.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, ["explode", "echo"]);
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn registry_execute_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));

        let call = ToolCall::new("call_1", "echo", args(json!({"text": "hello world"})));
        let output = registry.execute(&call).await.unwrap();
        assert_eq!(output, "hello world");
    }

    #[tokio::test]
    async fn registry_execute_missing_tool() {
        let registry = ToolRegistry::new();
        let call = ToolCall::new("call_1", "foo_bar", Map::new());
        let err = registry.execute(&call).await.unwrap_err();
        assert_eq!(err, ToolError::NotFound("foo_bar".into()));
    }

    #[tokio::test]
    async fn execution_failure_wraps_cause() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(FailingTool));
        let err = registry
            .execute(&ToolCall::new("c", "explode", Map::new()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("explode"));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn alert_callback_is_visible_through_shared_slot() {
        let registry = ToolRegistry::new();
        let slot = registry.alert_slot().clone();
        assert!(!slot.is_set());

        let heard = Arc::new(Mutex::new(String::new()));
        let sink = Arc::clone(&heard);
        registry.set_alert_callback(Arc::new(move |text: &str| {
            sink.lock().unwrap().push_str(text);
        }));

        (slot.get().unwrap())("ding");
        assert_eq!(heard.lock().unwrap().as_str(), "ding");

        registry.clear_alert_callback();
        assert!(!slot.is_set());
    }
}
