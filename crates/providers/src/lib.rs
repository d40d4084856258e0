//! Backend transports for Talkbot.
//!
//! All providers implement the `talkbot_core::Provider` trait.
//! The router selects the correct provider based on configuration.

pub mod openai_compat;
pub mod prompt_tools;
pub mod router;

pub use openai_compat::OpenAiCompatProvider;
pub use prompt_tools::PromptToolProvider;
pub use router::{ProviderRouter, build_from_config};
