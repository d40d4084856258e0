//! `talkbot chat`: interactive or single-message chat mode.

use std::io::Write;
use std::sync::Arc;
use talkbot_agent::AgentLoop;
use talkbot_config::AppConfig;
use talkbot_core::alert::AlertSlot;
use talkbot_core::error::{Error, ProviderError};
use talkbot_core::message::{Conversation, Message};
use talkbot_core::store::DocumentStore;
use talkbot_memory::JsonFileStore;
use talkbot_scheduler::Scheduler;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

pub async fn run(message: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let router = match talkbot_providers::build_from_config(&config) {
        Ok(router) => router,
        Err(e @ (ProviderError::NotConfigured(_) | ProviderError::AuthenticationFailed(_))) => {
            print_setup_help(&config);
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };
    let provider = router
        .default_provider()
        .ok_or("No default provider configured")?;

    let scheduler = Scheduler::new(AlertSlot::new());
    let store: Arc<dyn DocumentStore> = Arc::new(JsonFileStore::new(config.data_dir()));
    let tools = talkbot_tools::default_registry(scheduler.clone(), store);
    tools.set_alert_callback(Arc::new(|text: &str| {
        println!("\n  [TIMER] {text}");
    }));
    let tool_count = tools.len();

    let agent = AgentLoop::new(provider, &config.default_model, Arc::new(tools))
        .with_temperature(config.default_temperature)
        .with_max_tokens(config.default_max_tokens)
        .with_max_iterations(config.agent.max_iterations)
        .with_history_limit(config.agent.max_history_messages);

    let mut conv = match config.agent.effective_system_prompt() {
        Some(prompt) => Conversation::with_system(prompt),
        None => Conversation::new(),
    };

    if let Some(msg) = message {
        // Single message mode
        conv.push(Message::user(msg));

        eprint!("  Thinking...");
        let answer = agent.run(&mut conv).await;
        eprint!("\r              \r");
        println!("{}", answer?.content);

        let pending = scheduler.list().len();
        if pending > 0 {
            warn!(pending, "Exiting with pending timers; they will not fire");
        }
        return Ok(());
    }

    // Interactive mode
    println!();
    println!("  Talkbot, interactive mode");
    println!();
    println!("  Provider:  {}", config.default_provider);
    println!("  Model:     {}", config.default_model);
    println!("  Tools:     {tool_count} built-in");
    println!("  Data:      {}", config.data_dir().display());
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt()?;

    while let Some(line) = lines.next_line().await? {
        let text = line.trim();
        if text.is_empty() {
            prompt()?;
            continue;
        }
        if matches!(text, "exit" | "quit") {
            break;
        }

        conv.push(Message::user(text));
        eprint!("  ...");
        let result = agent.run(&mut conv).await;
        eprint!("\r     \r");

        match result {
            Ok(answer) => {
                println!();
                for line in answer.content.lines() {
                    println!("  Assistant > {line}");
                }
                println!();
            }
            Err(Error::MaxIterationsExceeded { iterations }) => {
                eprintln!("  [Error] No answer after {iterations} tool rounds. Try rephrasing.");
                println!();
            }
            Err(e) => {
                eprintln!("  [Error] {e}");
                println!();
            }
        }

        // The session owns its history; keep it compact between turns.
        conv.trim_history(config.agent.max_history_messages);
        prompt()?;
    }

    scheduler.reset();
    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}

fn prompt() -> std::io::Result<()> {
    print!("  You > ");
    std::io::stdout().flush()
}

fn print_setup_help(config: &AppConfig) {
    eprintln!();
    eprintln!("  ERROR: provider '{}' is not usable.", config.default_provider);
    eprintln!();
    eprintln!("  For a local OpenAI-compatible server (default):");
    eprintln!("    export TALKBOT_LLM_PROVIDER=local_server");
    eprintln!("    export TALKBOT_LOCAL_SERVER_URL=http://127.0.0.1:8000/v1");
    eprintln!();
    eprintln!("  For OpenRouter:");
    eprintln!("    export TALKBOT_LLM_PROVIDER=openrouter");
    eprintln!("    export OPENROUTER_API_KEY=sk-or-v1-...");
    eprintln!();
    eprintln!("  Or edit {}", AppConfig::config_dir().join("config.toml").display());
    eprintln!();
}
