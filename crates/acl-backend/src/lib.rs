//! acl-backend: LLM provider adapters for AgentCore Local.
//!
//! This crate provides the [`ChatProvider`] seam used by the agent loop, the
//! Ollama streaming client behind it, a scripted mock for tests, and a client
//! for AG-UI run endpoints.

pub mod agui_client;
pub mod framing;
pub mod mock;
pub mod ndjson;
pub mod ollama;
pub mod provider;
pub mod sse;

pub use agui_client::{AgUiClient, AgUiClientError};
pub use mock::{MockProvider, MockStep, MockTurn};
pub use ollama::{OllamaClient, OllamaError};
pub use provider::ChatProvider;
