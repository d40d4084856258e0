//! Remembered user preferences, kept in the `memory` document.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use talkbot_core::error::ToolError;
use talkbot_core::provider::ToolParameter;
use talkbot_core::store::DocumentStore;
use talkbot_core::tool::Tool;

use crate::args;

const STORE: &str = "memory";

fn shown(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub struct RememberTool {
    store: Arc<dyn DocumentStore>,
}

impl RememberTool {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for RememberTool {
    fn name(&self) -> &str {
        "remember"
    }

    fn description(&self) -> &str {
        "Store a user preference or piece of information for later recall"
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::string(
                "key",
                "The name of the preference (e.g., 'favorite_music_service', 'name')",
            )
            .required(),
            ToolParameter::string("value", "The value to remember").required(),
        ]
    }

    async fn execute(&self, arguments: &Map<String, Value>) -> Result<String, ToolError> {
        let key = args::text(arguments.get("key"));
        if key.is_empty() {
            return Err(ToolError::InvalidArguments("Missing 'key' argument".into()));
        }
        let value = args::text(arguments.get("value"));

        self.store
            .put(STORE, &key, Value::String(value.clone()))
            .await
            .map_err(|e| ToolError::execution(self.name(), e))?;
        Ok(format!("Remembered: {key} = {value}"))
    }
}

pub struct RecallTool {
    store: Arc<dyn DocumentStore>,
}

impl RecallTool {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for RecallTool {
    fn name(&self) -> &str {
        "recall"
    }

    fn description(&self) -> &str {
        "Recall a previously stored preference or piece of information by key"
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![ToolParameter::string("key", "The name of the preference to look up").required()]
    }

    async fn execute(&self, arguments: &Map<String, Value>) -> Result<String, ToolError> {
        let key = args::text(arguments.get("key"));
        let found = self
            .store
            .get(STORE, &key)
            .await
            .map_err(|e| ToolError::execution(self.name(), e))?;
        Ok(match found {
            Some(value) => format!("{key}: {}", shown(&value)),
            None => format!("No memory found for '{key}'."),
        })
    }
}

pub struct RecallAllTool {
    store: Arc<dyn DocumentStore>,
}

impl RecallAllTool {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for RecallAllTool {
    fn name(&self) -> &str {
        "recall_all"
    }

    fn description(&self) -> &str {
        "Recall all stored user preferences and memories"
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![]
    }

    async fn execute(&self, _arguments: &Map<String, Value>) -> Result<String, ToolError> {
        let memories = self
            .store
            .load(STORE)
            .await
            .map_err(|e| ToolError::execution(self.name(), e))?;
        if memories.is_empty() {
            return Ok("No memories stored yet.".into());
        }
        let lines: Vec<String> = memories
            .iter()
            .map(|(k, v)| format!("- {k}: {}", shown(v)))
            .collect();
        Ok(format!("All memories:\n{}", lines.join("\n")))
    }
}
