//! The orchestration loop implementation.

use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use talkbot_core::error::Error;
use talkbot_core::event::{DomainEvent, EventBus};
use talkbot_core::message::{Conversation, Message, MessageToolCall};
use talkbot_core::provider::{Provider, ProviderRequest};
use talkbot_core::tool::{ToolCall, ToolRegistry};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::extract::{self, ExtractedCall, strip_thinking};

/// Metadata key recording which encoding the calls of an assistant message
/// were found in.
pub const CALL_FORMAT_KEY: &str = "tool_call_format";

/// Drives request → extract → execute → append until the model answers
/// in plain text or the iteration cap is hit.
pub struct AgentLoop {
    /// The backend transport
    provider: Arc<dyn Provider>,

    /// The model to request
    model: String,

    temperature: f32,

    max_tokens: Option<u32>,

    /// The closed tool set
    tools: Arc<ToolRegistry>,

    /// Backend round-trips allowed per run
    max_iterations: u32,

    /// Dialog messages sent with each request; `None` sends everything
    history_limit: Option<usize>,

    event_bus: Option<Arc<EventBus>>,
}

impl AgentLoop {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
            tools,
            max_iterations: 10,
            history_limit: None,
            event_bus: None,
        }
    }

    /// Set the maximum number of backend round-trips per run.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the default max tokens per LLM response.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Send at most this many recent dialog messages with each request.
    /// The conversation itself is never shortened.
    pub fn with_history_limit(mut self, max: usize) -> Self {
        self.history_limit = Some(max);
        self
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    fn request_messages(&self, conversation: &Conversation) -> Vec<Message> {
        match self.history_limit {
            Some(max) => {
                let mut window = conversation.clone();
                window.trim_history(max);
                window.messages
            }
            None => conversation.messages.clone(),
        }
    }

    fn publish(&self, event: DomainEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event);
        }
    }

    /// Run one user turn to completion.
    ///
    /// Returns the final assistant message, which is also the last message
    /// of `conversation`. Tool failures and malformed calls become
    /// tool-role diagnostics and the loop carries on; only transport errors
    /// and [`Error::MaxIterationsExceeded`] end the run early, leaving
    /// everything appended so far in place.
    pub async fn run(&self, conversation: &mut Conversation) -> Result<Message, Error> {
        info!(
            conversation_id = %conversation.id,
            messages = conversation.messages.len(),
            "Processing conversation"
        );

        let definitions = self.tools.definitions();
        // Results of calls already executed this run, by canonical call key.
        let mut executed: HashMap<String, String> = HashMap::new();
        let mut tokens_used = 0u32;

        for iteration in 1..=self.max_iterations {
            debug!(conversation_id = %conversation.id, iteration, "Agent loop iteration");

            let mut request = ProviderRequest::new(self.model.clone(), self.request_messages(conversation));
            request.temperature = self.temperature;
            request.max_tokens = self.max_tokens;
            request.tools = definitions.clone();

            let response = self.provider.complete(request).await?;
            if let Some(usage) = &response.usage {
                tokens_used = tokens_used.saturating_add(usage.total_tokens);
            }
            let mut reply = response.message;

            let Some(extraction) = extract::extract(&reply, |name| self.tools.contains(name)) else {
                reply.content = strip_thinking(&reply.content);
                conversation.push(reply.clone());
                self.publish(DomainEvent::ResponseGenerated {
                    conversation_id: conversation.id.to_string(),
                    model: response.model,
                    iterations: iteration,
                    tokens_used,
                    timestamp: Utc::now(),
                });
                return Ok(reply);
            };

            debug!(
                format = extraction.format.as_str(),
                calls = extraction.calls.len(),
                "Extracted tool calls"
            );
            let calls = assign_ids(conversation, extraction.calls);

            reply.content = strip_thinking(&reply.content);
            reply.tool_calls = calls
                .iter()
                .map(|(id, call)| MessageToolCall {
                    id: id.clone(),
                    name: call.name.clone(),
                    arguments: call.raw_arguments.clone(),
                })
                .collect();
            reply
                .metadata
                .insert(CALL_FORMAT_KEY.into(), extraction.format.as_str().into());
            conversation.push(reply);

            for (id, call) in calls {
                let output = self.execute(&id, call, &mut executed).await;
                conversation.push(Message::tool_result(id, output));
            }
        }

        warn!(
            conversation_id = %conversation.id,
            iterations = self.max_iterations,
            "Max tool iterations reached without a final answer"
        );
        Err(Error::MaxIterationsExceeded {
            iterations: self.max_iterations,
        })
    }

    /// Execute one call and return the text for its tool-role message.
    async fn execute(
        &self,
        id: &str,
        call: ExtractedCall,
        executed: &mut HashMap<String, String>,
    ) -> String {
        let arguments = match call.arguments {
            Ok(arguments) => arguments,
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Malformed tool call");
                self.publish(DomainEvent::ToolExecuted {
                    tool_name: call.name,
                    success: false,
                    duration_ms: 0,
                    timestamp: Utc::now(),
                });
                return format!("Error: {e}");
            }
        };

        let key = call_key(&call.name, &arguments);
        if let Some(previous) = executed.get(&key) {
            debug!(tool = %call.name, "Replaying result of duplicate call");
            return previous.clone();
        }

        let tool_call = ToolCall::new(id, call.name, arguments);
        let start = std::time::Instant::now();
        let result = self.tools.execute(&tool_call).await;
        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        self.publish(DomainEvent::ToolExecuted {
            tool_name: tool_call.name.clone(),
            success: result.is_ok(),
            duration_ms,
            timestamp: Utc::now(),
        });

        let output = match result {
            Ok(output) => output,
            Err(e) => {
                warn!(tool = %tool_call.name, error = %e, "Tool execution failed");
                format!("Error: {e}")
            }
        };
        executed.insert(key, output.clone());
        output
    }
}

/// Keep backend ids that are present and unused; mint fresh ones otherwise.
fn assign_ids(conversation: &Conversation, calls: Vec<ExtractedCall>) -> Vec<(String, ExtractedCall)> {
    let mut taken: Vec<String> = Vec::with_capacity(calls.len());
    calls
        .into_iter()
        .map(|call| {
            let id = call
                .id
                .clone()
                .filter(|id| !conversation.has_tool_call_id(id) && !taken.contains(id))
                .unwrap_or_else(|| format!("call_{}", Uuid::new_v4().simple()));
            taken.push(id.clone());
            (id, call)
        })
        .collect()
}

/// Tool name plus arguments serialised with sorted keys.
fn call_key(name: &str, arguments: &serde_json::Map<String, Value>) -> String {
    fn canonical(value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let mut entries: Vec<_> = map.iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));
                Value::Object(
                    entries
                        .into_iter()
                        .map(|(k, v)| (k.clone(), canonical(v)))
                        .collect(),
                )
            }
            Value::Array(items) => Value::Array(items.iter().map(canonical).collect()),
            other => other.clone(),
        }
    }
    format!("{name}|{}", canonical(&Value::Object(arguments.clone())))
}
