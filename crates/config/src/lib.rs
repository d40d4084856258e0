//! Configuration loading, validation, and management for Talkbot.
//!
//! Loads configuration from `~/.talkbot/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Appended to the system prompt when thinking mode is off.
pub const NO_THINK_INSTRUCTION: &str =
    "Respond directly with concise final answers. Do not include chain-of-thought or <think> tags.";

/// The root configuration structure.
///
/// Maps directly to `~/.talkbot/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default backend: "local_server" or "openrouter"
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Orchestration loop settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Where lists and memories are kept
    #[serde(default)]
    pub storage: StorageConfig,
}

fn default_provider() -> String {
    "local_server".into()
}
fn default_model() -> String {
    "qwen/qwen3-1.7b".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    512
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("agent", &self.agent)
            .field("providers", &self.providers)
            .field("storage", &self.storage)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .field("tool_mode", &self.tool_mode)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Backend round-trips allowed per user turn
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Dialog messages kept in context (system prompt excluded)
    #[serde(default = "default_max_history")]
    pub max_history_messages: usize,

    /// Let the model emit `<think>` reasoning
    #[serde(default)]
    pub enable_thinking: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

fn default_max_iterations() -> u32 {
    10
}
fn default_max_history() -> usize {
    12
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_history_messages: default_max_history(),
            enable_thinking: false,
            system_prompt: None,
        }
    }
}

impl AgentConfig {
    /// The system prompt as sent to the model, with the no-think
    /// instruction appended unless thinking is enabled.
    pub fn effective_system_prompt(&self) -> Option<String> {
        if self.enable_thinking {
            return self.system_prompt.clone();
        }
        Some(match self.system_prompt.as_deref() {
            Some(prompt) if !prompt.trim().is_empty() => format!("{prompt}\n\n{NO_THINK_INSTRUCTION}"),
            _ => NO_THINK_INSTRUCTION.to_string(),
        })
    }
}

/// How tool schemas reach the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolMode {
    /// Structured `tools` field in the request
    #[default]
    Native,
    /// Schema and calling convention injected into the system prompt
    Prompt,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,

    #[serde(default)]
    pub tool_mode: ToolMode,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Defaults to `~/.talkbot`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from the default path with environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides (highest priority). `lookup` is injected
    /// so tests don't have to touch the process environment.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if self.api_key.is_none() {
            self.api_key = var("TALKBOT_API_KEY").or_else(|| var("OPENROUTER_API_KEY"));
        }
        if let Some(provider) = var("TALKBOT_LLM_PROVIDER") {
            self.default_provider = provider;
        }
        if let Some(model) = var("TALKBOT_DEFAULT_MODEL") {
            self.default_model = model;
        }
        if let Some(url) = var("TALKBOT_LOCAL_SERVER_URL") {
            self.providers.entry("local_server".into()).or_default().api_url = Some(url);
        }
        if let Some(key) = var("TALKBOT_LOCAL_SERVER_API_KEY") {
            self.providers.entry("local_server".into()).or_default().api_key = Some(key);
        }
        if let Some(dir) = var("TALKBOT_DATA_DIR") {
            self.storage.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(flag) = var("TALKBOT_ENABLE_THINKING") {
            self.agent.enable_thinking =
                matches!(flag.to_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
        if let Some(raw) = var("TALKBOT_MAX_TOOL_ITERATIONS") {
            self.agent.max_iterations = raw.parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "TALKBOT_MAX_TOOL_ITERATIONS must be a positive integer, got '{raw}'"
                ))
            })?;
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".talkbot")
    }

    /// Directory for the list and memory documents.
    pub fn data_dir(&self) -> PathBuf {
        match &self.storage.data_dir {
            Some(dir) => expand_home(dir),
            None => Self::config_dir(),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be at least 1".into(),
            ));
        }

        if self.agent.max_history_messages == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_history_messages must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for the `config` command).
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            agent: AgentConfig::default(),
            providers: HashMap::new(),
            storage: StorageConfig::default(),
        }
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs_home().join(rest),
        Err(_) => path.to_path_buf(),
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.default_provider, "local_server");
        assert_eq!(config.agent.max_iterations, 10);
        assert_eq!(config.agent.max_history_messages, 12);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_provider, config.default_provider);
        assert_eq!(parsed.agent.max_iterations, config.agent.max_iterations);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            default_temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_iterations_rejected() {
        let mut config = AppConfig::default();
        config.agent.max_iterations = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.default_model, "qwen/qwen3-1.7b");
    }

    #[test]
    fn loads_file_with_tool_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
default_provider = "openrouter"

[agent]
max_iterations = 4

[providers.openrouter]
api_key = "sk-or-secret"
tool_mode = "prompt"
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.default_provider, "openrouter");
        assert_eq!(config.agent.max_iterations, 4);
        assert_eq!(config.providers["openrouter"].tool_mode, ToolMode::Prompt);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "default_provider = [").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = AppConfig::default();
        config
            .apply_env(env(&[
                ("TALKBOT_LLM_PROVIDER", "openrouter"),
                ("TALKBOT_DEFAULT_MODEL", "qwen/qwen3-8b"),
                ("OPENROUTER_API_KEY", "sk-or-1"),
                ("TALKBOT_DATA_DIR", "/var/lib/talkbot"),
                ("TALKBOT_ENABLE_THINKING", "yes"),
                ("TALKBOT_MAX_TOOL_ITERATIONS", "3"),
                ("TALKBOT_LOCAL_SERVER_URL", "http://10.0.0.2:8000/v1"),
            ]))
            .unwrap();

        assert_eq!(config.default_provider, "openrouter");
        assert_eq!(config.default_model, "qwen/qwen3-8b");
        assert_eq!(config.api_key.as_deref(), Some("sk-or-1"));
        assert_eq!(config.data_dir(), PathBuf::from("/var/lib/talkbot"));
        assert!(config.agent.enable_thinking);
        assert_eq!(config.agent.max_iterations, 3);
        assert_eq!(
            config.providers["local_server"].api_url.as_deref(),
            Some("http://10.0.0.2:8000/v1")
        );
    }

    #[test]
    fn bad_iteration_override_rejected() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env(env(&[("TALKBOT_MAX_TOOL_ITERATIONS", "lots")]))
            .unwrap_err();
        assert!(err.to_string().contains("TALKBOT_MAX_TOOL_ITERATIONS"));
    }

    #[test]
    fn no_think_instruction_appended_unless_enabled() {
        let mut agent = AgentConfig {
            system_prompt: Some("You are a kitchen helper.".into()),
            ..AgentConfig::default()
        };
        let prompt = agent.effective_system_prompt().unwrap();
        assert!(prompt.starts_with("You are a kitchen helper."));
        assert!(prompt.ends_with(NO_THINK_INSTRUCTION));

        agent.enable_thinking = true;
        assert_eq!(
            agent.effective_system_prompt().as_deref(),
            Some("You are a kitchen helper.")
        );
    }

    #[test]
    fn debug_redacts_secrets() {
        let mut config = AppConfig {
            api_key: Some("sk-or-very-secret".into()),
            ..AppConfig::default()
        };
        config.providers.insert(
            "openrouter".into(),
            ProviderConfig {
                api_key: Some("sk-or-other".into()),
                ..ProviderConfig::default()
            },
        );
        let dump = format!("{config:?}");
        assert!(!dump.contains("very-secret"));
        assert!(!dump.contains("sk-or-other"));
        assert!(dump.contains("[REDACTED]"));
    }
}
