//! End-to-end integration tests for the Talkbot runtime.
//!
//! These tests exercise the full pipeline from user input to final answer:
//! a scripted backend, the real built-in tool registry, the scheduler and
//! the document stores, wired together the way `talkbot chat` wires them.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use talkbot_agent::{AgentLoop, CALL_FORMAT_KEY};
use talkbot_core::alert::AlertSlot;
use talkbot_core::error::{Error, ProviderError};
use talkbot_core::message::{Conversation, Message, MessageToolCall, Role};
use talkbot_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use talkbot_core::store::DocumentStore;
use talkbot_core::tool::ToolRegistry;
use talkbot_memory::{InMemoryStore, JsonFileStore};
use talkbot_providers::PromptToolProvider;
use talkbot_scheduler::Scheduler;
use talkbot_tools::default_registry;
use tokio::sync::mpsc;

// ── Mock Provider ────────────────────────────────────────────────────────

/// A mock provider that returns scripted replies in sequence and keeps
/// repeating the last one.
struct ScriptedProvider {
    replies: Vec<Message>,
    calls: AtomicUsize,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    fn new(replies: Vec<Message>) -> Arc<Self> {
        Arc::new(Self {
            replies,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);
        Ok(ProviderResponse {
            message: self.replies[n.min(self.replies.len() - 1)].clone(),
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            model: "mock-model".into(),
        })
    }
}

fn tool_call(id: &str, name: &str, args: serde_json::Value) -> Message {
    Message::assistant_with_calls(
        "",
        vec![MessageToolCall {
            id: id.into(),
            name: name.into(),
            arguments: args.to_string(),
        }],
    )
}

/// Registry over an in-memory store plus a receiver for fired alerts.
fn runtime() -> (Arc<ToolRegistry>, Scheduler, mpsc::UnboundedReceiver<String>) {
    let scheduler = Scheduler::new(AlertSlot::new());
    let registry = default_registry(scheduler.clone(), Arc::new(InMemoryStore::new()));
    let (tx, rx) = mpsc::unbounded_channel();
    registry.set_alert_callback(Arc::new(move |text: &str| {
        let _ = tx.send(text.to_string());
    }));
    (Arc::new(registry), scheduler, rx)
}

fn ask(text: &str) -> Conversation {
    let mut conv = Conversation::with_system("You are a helpful voice assistant.");
    conv.push(Message::user(text));
    conv
}

fn tool_messages(conv: &Conversation) -> Vec<&Message> {
    conv.messages.iter().filter(|m| m.role == Role::Tool).collect()
}

// ── Scenarios ────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_calculator_two_plus_two() {
    let provider = ScriptedProvider::new(vec![
        tool_call("call_calc", "calculator", json!({"expression": "2+2"})),
        Message::assistant("4"),
    ]);
    let (tools, _, _) = runtime();
    let agent = AgentLoop::new(provider.clone(), "mock-model", tools);

    let mut conv = ask("What's 2+2?");
    let answer = agent.run(&mut conv).await.unwrap();

    assert_eq!(answer.content, "4");
    assert_eq!(provider.calls(), 2);

    let assistant = &conv.messages[2];
    assert_eq!(assistant.tool_calls[0].name, "calculator");
    let tools = tool_messages(&conv);
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].tool_call_id.as_deref(), Some("call_calc"));
    assert_eq!(tools[0].content, "4");
    assert_eq!(conv.last().unwrap().content, "4");
}

#[tokio::test(start_paused = true)]
async fn e2e_tea_timer_cancelled_never_fires() {
    let provider = ScriptedProvider::new(vec![
        tool_call("t1", "set_timer", json!({"seconds": 2, "label": "tea"})),
        tool_call("t2", "cancel_timer", json!({"timer_id": "1"})),
        tool_call("t3", "list_timers", json!({})),
        Message::assistant("Your tea timer is cancelled."),
    ]);
    let (tools, scheduler, mut alerts) = runtime();
    let agent = AgentLoop::new(provider, "mock-model", tools);

    let mut conv = ask("Set a 2 second tea timer. Actually, cancel it.");
    agent.run(&mut conv).await.unwrap();

    let outputs: Vec<&str> = tool_messages(&conv).iter().map(|m| m.content.as_str()).collect();
    assert_eq!(
        outputs,
        [
            "Timer #1 set. 'tea' will fire in 2 seconds.",
            "Timer #1 ('tea') cancelled.",
            "No active timers.",
        ]
    );

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(scheduler.list().is_empty());
    assert!(alerts.try_recv().is_err(), "a cancelled timer must not fire");
}

#[tokio::test(start_paused = true)]
async fn e2e_reminder_fires_through_alert_callback() {
    let provider = ScriptedProvider::new(vec![
        Message::assistant(r#"set_reminder(seconds=60, message="Time to stretch")"#),
        Message::assistant("I'll remind you in a minute."),
    ]);
    let (tools, _, mut alerts) = runtime();
    let agent = AgentLoop::new(provider, "mock-model", tools);

    let mut conv = ask("Remind me to stretch in a minute");
    agent.run(&mut conv).await.unwrap();
    assert_eq!(conv.messages[2].metadata[CALL_FORMAT_KEY], "call_syntax");
    assert_eq!(
        tool_messages(&conv)[0].content,
        "Reminder #1 set for 1m 0s: \"Time to stretch\""
    );

    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(alerts.recv().await.unwrap(), "Time to stretch");
}

#[tokio::test]
async fn e2e_unknown_tool_is_reported_and_loop_continues() {
    let provider = ScriptedProvider::new(vec![
        Message::assistant(r#"<tool_call>{"name": "foo_bar", "arguments": {"x": 1}}</tool_call>"#),
        Message::assistant("Sorry, I can't do that."),
    ]);
    let (tools, _, _) = runtime();
    let agent = AgentLoop::new(provider.clone(), "mock-model", tools);

    let mut conv = ask("Please foo the bar");
    let answer = agent.run(&mut conv).await.unwrap();

    let tools = tool_messages(&conv);
    assert_eq!(tools.len(), 1);
    assert!(tools[0].content.contains("foo_bar"));
    assert!(tools[0].content.contains("Unknown tool"));
    assert_eq!(answer.content, "Sorry, I can't do that.");
    assert_eq!(provider.calls(), 2);
}

#[tokio::test]
async fn e2e_max_iterations_after_exact_round_trips() {
    let provider = ScriptedProvider::new(vec![Message::assistant("list_timers")]);
    let (tools, _, _) = runtime();
    let agent = AgentLoop::new(provider.clone(), "mock-model", tools).with_max_iterations(4);

    let mut conv = ask("What timers do I have?");
    let err = agent.run(&mut conv).await.unwrap_err();

    assert!(matches!(err, Error::MaxIterationsExceeded { iterations: 4 }));
    assert_eq!(provider.calls(), 4);
    assert_eq!(tool_messages(&conv).len(), 4);
}

#[tokio::test]
async fn e2e_malformed_call_gets_a_diagnostic() {
    let provider = ScriptedProvider::new(vec![
        Message::assistant(r#"[TOOL_CALLS][{"name": "calculator", "arguments": {"expression": }]"#),
        Message::assistant(r#"[TOOL_CALLS][{"name": "calculator", "arguments": {"expression": "6*7"}}]"#),
        Message::assistant("42"),
    ]);
    let (tools, _, _) = runtime();
    let agent = AgentLoop::new(provider, "mock-model", tools);

    let mut conv = ask("six times seven");
    agent.run(&mut conv).await.unwrap();

    let tools = tool_messages(&conv);
    assert!(tools[0].content.starts_with("Error: Malformed tool call for 'calculator'"));
    assert_eq!(tools[1].content, "42");
}

#[tokio::test]
async fn e2e_prompt_mode_round_trip() {
    let backend = ScriptedProvider::new(vec![
        Message::assistant(
            "<think>need the list</think><tool_call>{\"name\": \"add_items_to_list\", \
             \"arguments\": {\"items\": [\"milk\", \"eggs\"]}}</tool_call>",
        ),
        Message::assistant("Added milk and eggs."),
    ]);
    let provider = Arc::new(PromptToolProvider::new(backend.clone()));
    let (tools, _, _) = runtime();
    let agent = AgentLoop::new(provider, "mock-model", tools);

    let mut conv = ask("add milk and eggs");
    let answer = agent.run(&mut conv).await.unwrap();
    assert_eq!(answer.content, "Added milk and eggs.");
    assert_eq!(
        tool_messages(&conv)[0].content,
        "Added milk, eggs to the shopping list."
    );

    let requests = backend.requests.lock().unwrap();
    assert!(requests.iter().all(|r| r.tools.is_empty()));
    assert!(requests[0].messages[0].content.contains("<tool_call>"));
    // The second request carries the tool result as text, never a tool role.
    assert!(requests[1].messages.iter().all(|m| m.role != Role::Tool));
    assert!(
        requests[1]
            .messages
            .iter()
            .any(|m| m.content.contains("<tool_response>"))
    );
}

#[tokio::test]
async fn e2e_lists_persist_across_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let scheduler = Scheduler::new(AlertSlot::new());

    {
        let store: Arc<dyn DocumentStore> = Arc::new(JsonFileStore::new(dir.path()));
        let tools = Arc::new(default_registry(scheduler.clone(), store));
        let provider = ScriptedProvider::new(vec![
            Message::assistant(r#"add_to_list(item="oat milk", list_name="groceries")"#),
            Message::assistant("Done."),
        ]);
        let agent = AgentLoop::new(provider, "mock-model", tools);
        agent.run(&mut ask("add oat milk to groceries")).await.unwrap();
    }

    let store: Arc<dyn DocumentStore> = Arc::new(JsonFileStore::new(dir.path()));
    let tools = Arc::new(default_registry(scheduler, store));
    let provider = ScriptedProvider::new(vec![
        tool_call("g1", "get_list", json!({"list_name": "groceries"})),
        Message::assistant("You have oat milk."),
    ]);
    let agent = AgentLoop::new(provider, "mock-model", tools);
    let mut conv = ask("what's on my groceries list?");
    agent.run(&mut conv).await.unwrap();

    assert_eq!(tool_messages(&conv)[0].content, "Groceries list:\n- oat milk");
}

#[tokio::test]
async fn e2e_all_tools_have_schemas() {
    let (tools, _, _) = runtime();
    let definitions = tools.definitions();
    assert_eq!(definitions.len(), 21);
    for def in &definitions {
        let schema = def.json_schema();
        for required in schema["required"].as_array().unwrap() {
            let name = required.as_str().unwrap();
            assert!(schema["properties"].get(name).is_some(), "{}: {name}", def.name);
        }
    }
}
