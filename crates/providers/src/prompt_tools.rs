//! Prompt-instructed tool calling for backends without native tool support.
//!
//! [`PromptToolProvider`] wraps another provider. Instead of sending tool
//! definitions in the request, it describes them in the system prompt and
//! asks the model to answer with `<tool_call>{...}</tool_call>` blocks.
//! Earlier tool traffic in the history is re-encoded as text so the wrapped
//! backend never sees `tool` roles or native tool-call fields.

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use talkbot_core::error::ProviderError;
use talkbot_core::message::{Message, Role};
use talkbot_core::provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition};

pub struct PromptToolProvider {
    name: String,
    inner: Arc<dyn Provider>,
}

impl PromptToolProvider {
    pub fn new(inner: Arc<dyn Provider>) -> Self {
        Self {
            name: format!("{}+prompt-tools", inner.name()),
            inner,
        }
    }
}

/// Render the tool list and calling convention as prompt text.
pub fn tool_instructions(tools: &[ToolDefinition]) -> String {
    let mut text = String::from("You can call these tools:\n");
    for tool in tools {
        let params: Vec<String> = tool
            .parameters
            .iter()
            .map(|p| {
                let flag = if p.required { "" } else { "?" };
                format!("{}{flag}: {}", p.name, p.schema_type)
            })
            .collect();
        text.push_str(&format!(
            "- {}({}): {}\n",
            tool.name,
            params.join(", "),
            tool.description
        ));
    }
    text.push_str(
        "\nTo call a tool, reply with one block per call and nothing else:\n\
         <tool_call>{\"name\": \"tool_name\", \"arguments\": {\"param\": \"value\"}}</tool_call>\n\
         Tool results come back inside <tool_response> blocks. \
         Once you have what you need, answer the user in plain text.",
    );
    text
}

fn encode_history(messages: Vec<Message>) -> Vec<Message> {
    messages
        .into_iter()
        .map(|mut m| match m.role {
            Role::Assistant if !m.tool_calls.is_empty() => {
                let mut content = m.content.trim().to_string();
                for call in m.tool_calls.drain(..) {
                    let arguments = serde_json::from_str::<Value>(&call.arguments)
                        .ok()
                        .filter(Value::is_object)
                        .unwrap_or_else(|| Value::Object(Map::new()));
                    if !content.is_empty() {
                        content.push('\n');
                    }
                    content.push_str(&format!(
                        "<tool_call>{}</tool_call>",
                        json!({ "name": call.name, "arguments": arguments })
                    ));
                }
                m.content = content;
                m
            }
            Role::Tool => {
                m.role = Role::User;
                m.content = format!("<tool_response>\n{}\n</tool_response>", m.content);
                m.tool_call_id = None;
                m
            }
            _ => m,
        })
        .collect()
}

#[async_trait]
impl Provider for PromptToolProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        mut request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let tools = std::mem::take(&mut request.tools);
        let mut messages = encode_history(std::mem::take(&mut request.messages));

        if !tools.is_empty() {
            let instructions = tool_instructions(&tools);
            match messages.first_mut() {
                Some(first) if first.role == Role::System => {
                    first.content = format!("{}\n\n{instructions}", first.content);
                }
                _ => messages.insert(0, Message::system(instructions)),
            }
        }

        request.messages = messages;
        self.inner.complete(request).await
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        self.inner.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use talkbot_core::message::MessageToolCall;
    use talkbot_core::provider::ToolParameter;

    /// Records the request it receives and answers with fixed text.
    struct Recorder {
        seen: Mutex<Option<ProviderRequest>>,
    }

    #[async_trait]
    impl Provider for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        async fn complete(
            &self,
            request: ProviderRequest,
        ) -> std::result::Result<ProviderResponse, ProviderError> {
            *self.seen.lock().unwrap() = Some(request);
            Ok(ProviderResponse {
                message: Message::assistant("ok"),
                usage: None,
                model: "m".into(),
            })
        }
    }

    fn timer_tool() -> ToolDefinition {
        ToolDefinition {
            name: "set_timer".into(),
            description: "Set a countdown timer".into(),
            parameters: vec![
                ToolParameter::integer("seconds", "Duration").required(),
                ToolParameter::string("label", "Name"),
            ],
        }
    }

    #[test]
    fn instructions_describe_tools_and_format() {
        let text = tool_instructions(&[timer_tool()]);
        assert!(text.contains("- set_timer(seconds: integer, label?: string): Set a countdown timer"));
        assert!(text.contains("<tool_call>"));
    }

    #[tokio::test]
    async fn moves_tools_into_system_prompt_and_reencodes_history() {
        let recorder = Arc::new(Recorder {
            seen: Mutex::new(None),
        });
        let provider = PromptToolProvider::new(recorder.clone());
        assert_eq!(provider.name(), "recorder+prompt-tools");

        let mut request = ProviderRequest::new(
            "m",
            vec![
                Message::system("Be brief."),
                Message::user("tea timer"),
                Message::assistant_with_calls(
                    "",
                    vec![MessageToolCall {
                        id: "c1".into(),
                        name: "set_timer".into(),
                        arguments: r#"{"seconds":120,"label":"tea"}"#.into(),
                    }],
                ),
                Message::tool_result("c1", "Timer #1 set."),
            ],
        );
        request.tools = vec![timer_tool()];

        provider.complete(request).await.unwrap();

        let seen = recorder.seen.lock().unwrap().take().unwrap();
        assert!(seen.tools.is_empty());
        assert!(seen.messages[0].content.starts_with("Be brief.\n\nYou can call these tools:"));
        assert_eq!(
            seen.messages[2].content,
            r#"<tool_call>{"name":"set_timer","arguments":{"seconds":120,"label":"tea"}}</tool_call>"#
        );
        assert!(seen.messages[2].tool_calls.is_empty());
        assert_eq!(seen.messages[3].role, Role::User);
        assert!(seen.messages[3].content.contains("Timer #1 set."));
        assert!(seen.messages[3].tool_call_id.is_none());
    }

    #[tokio::test]
    async fn adds_system_prompt_when_missing() {
        let recorder = Arc::new(Recorder {
            seen: Mutex::new(None),
        });
        let provider = PromptToolProvider::new(recorder.clone());
        let mut request = ProviderRequest::new("m", vec![Message::user("hi")]);
        request.tools = vec![timer_tool()];

        provider.complete(request).await.unwrap();

        let seen = recorder.seen.lock().unwrap().take().unwrap();
        assert_eq!(seen.messages.len(), 2);
        assert_eq!(seen.messages[0].role, Role::System);
    }
}
