//! Error types for the Talkbot domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`Error`] is the top-level
//! type surfaced to callers of the orchestration loop.

use thiserror::Error;

/// The top-level error type for all Talkbot operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Backend transport errors ---
    #[error("Transport error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Store errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Scheduler errors ---
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// The model kept requesting tools and never produced a final answer.
    #[error("Maximum tool iterations exceeded after {iterations} backend round-trips")]
    MaxIterationsExceeded { iterations: u32 },

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures of a backend transport. Propagated unchanged by the loop.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Per-call tool failures. The loop turns every variant into a tool-role
/// diagnostic message instead of aborting.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Malformed tool call for '{tool_name}': {reason}")]
    Malformed { tool_name: String, reason: String },
}

impl ToolError {
    /// Wrap an underlying cause raised while a tool was running.
    pub fn execution(tool_name: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::ExecutionFailed {
            tool_name: tool_name.into(),
            reason: reason.to_string(),
        }
    }
}

/// Failures of the keyed JSON document store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),
}

/// Failures of the scheduled-callback subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// The id is unknown, or the timer already fired or was cancelled.
    #[error("No active timer with ID '{0}'")]
    TimerNotFound(String),

    #[error("Invalid timer duration: {0}")]
    InvalidDuration(String),

    #[error("Timers need a running Tokio runtime")]
    NoRuntime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn tool_error_displays_correctly() {
        let err = Error::Tool(ToolError::execution("calculator", "division by zero"));
        assert!(err.to_string().contains("calculator"));
        assert!(err.to_string().contains("division by zero"));
    }

    #[test]
    fn unknown_tool_names_the_tool() {
        let err = ToolError::NotFound("foo_bar".into());
        assert_eq!(err.to_string(), "Unknown tool: foo_bar");
    }

    #[test]
    fn max_iterations_reports_count() {
        let err = Error::MaxIterationsExceeded { iterations: 3 };
        assert!(err.to_string().contains('3'));
    }

    #[test]
    fn timer_not_found_displays_id() {
        let err = SchedulerError::TimerNotFound("7".into());
        assert_eq!(err.to_string(), "No active timer with ID '7'");
    }
}
