//! # Talkbot Core
//!
//! Domain types, traits, and error definitions for the Talkbot runtime.
//! This crate has **no framework dependencies**: it defines the domain model
//! that every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Each collaborator of the orchestration loop is a trait here:
//! - [`Provider`]: a language-model backend transport
//! - [`Tool`]: one callable capability, collected in a [`ToolRegistry`]
//! - [`DocumentStore`]: the keyed JSON store behind the list and memory tools
//!
//! Implementations live in their own crates, so tests can swap in scripted
//! providers and in-memory stores.

pub mod alert;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod store;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use alert::{AlertCallback, AlertSlot};
pub use error::{Error, ProviderError, Result, SchedulerError, StoreError, ToolError};
pub use event::{DomainEvent, EventBus};
pub use message::{Conversation, ConversationId, Message, MessageToolCall, Role};
pub use provider::{
    Provider, ProviderRequest, ProviderResponse, ToolDefinition, ToolParameter, Usage,
};
pub use store::{Document, DocumentStore};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult};
