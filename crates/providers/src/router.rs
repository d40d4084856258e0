//! Provider router: selects the backend named in the configuration.

use std::collections::HashMap;
use std::sync::Arc;
use talkbot_config::{AppConfig, ProviderConfig, ToolMode};
use talkbot_core::error::ProviderError;
use talkbot_core::provider::Provider;
use tracing::debug;

use crate::openai_compat::OpenAiCompatProvider;
use crate::prompt_tools::PromptToolProvider;

/// Holds the configured backends by name.
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn Provider>>,
    default_provider: String,
}

impl ProviderRouter {
    /// Create a new router with a default provider.
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider.into(),
        }
    }

    /// Register a provider.
    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(name.into(), provider);
    }

    /// Get the default provider.
    pub fn default_provider(&self) -> Option<Arc<dyn Provider>> {
        self.providers.get(&self.default_provider).cloned()
    }

    /// Get a specific provider by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    /// List all registered provider names.
    pub fn list(&self) -> Vec<&str> {
        self.providers.keys().map(|s| s.as_str()).collect()
    }
}

/// Build providers from configuration.
///
/// Every entry of `[providers]` is built, plus the default provider if it
/// has no entry. Providers configured with `tool_mode = "prompt"` are
/// wrapped in a [`PromptToolProvider`].
pub fn build_from_config(config: &AppConfig) -> Result<ProviderRouter, ProviderError> {
    let mut router = ProviderRouter::new(&config.default_provider);

    for (name, provider_config) in &config.providers {
        let provider = build_one(name, provider_config, config)?;
        router.register(name.clone(), provider);
    }

    if router.get(&config.default_provider).is_none() {
        let provider = build_one(&config.default_provider, &ProviderConfig::default(), config)?;
        router.register(config.default_provider.clone(), provider);
    }

    Ok(router)
}

fn build_one(
    name: &str,
    provider_config: &ProviderConfig,
    config: &AppConfig,
) -> Result<Arc<dyn Provider>, ProviderError> {
    let api_key = provider_config
        .api_key
        .clone()
        .or_else(|| config.api_key.clone())
        .unwrap_or_default();

    let base = match name {
        "openrouter" => match &provider_config.api_url {
            Some(url) => OpenAiCompatProvider::new(name, url, api_key)?,
            None => OpenAiCompatProvider::openrouter(api_key)?,
        },
        "local_server" => {
            let url = provider_config
                .api_url
                .as_deref()
                .unwrap_or("http://127.0.0.1:8000/v1");
            // Local servers only get a key when one is configured for them
            let key = provider_config.api_key.clone().unwrap_or_default();
            OpenAiCompatProvider::local_server(url, key)?
        }
        other => match &provider_config.api_url {
            Some(url) => OpenAiCompatProvider::new(other, url, api_key)?,
            None => {
                return Err(ProviderError::NotConfigured(format!(
                    "Unknown provider '{other}'. Expected local_server, openrouter, or a [providers.{other}] entry with api_url."
                )));
            }
        },
    };
    let base: Arc<dyn Provider> = Arc::new(base.with_thinking(config.agent.enable_thinking));

    debug!(provider = name, tool_mode = ?provider_config.tool_mode, "Provider built");
    Ok(match provider_config.tool_mode {
        ToolMode::Native => base,
        ToolMode::Prompt => Arc::new(PromptToolProvider::new(base)),
    })
}
