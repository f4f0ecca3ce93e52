//! acl-protocol: Shared types for AgentCore Local.
//!
//! This crate defines the conversation model used between the agent loop and
//! LLM backends, and the AG-UI wire types spoken to the browser.

pub mod agui;
pub mod context;
pub mod message;

pub use agui::{AgUiEvent, AgUiMessage, AgUiToolCall, ContextItem, RunAgentInput};
pub use context::{
    AgentRequest, ConversationMessage, Role, ToolCallRecord, ToolResultRecord, ToolSpec,
};
pub use message::StreamEvent;
