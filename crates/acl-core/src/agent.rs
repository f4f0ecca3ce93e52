//! The agent loop.
//!
//! One run alternates model turns and tool execution: stream a turn from the
//! provider, and if it requested tools, run them, append the calls and their
//! results to the conversation and ask again. A turn without tool calls is
//! the final answer.

use std::sync::Arc;

use acl_backend::ChatProvider;
use acl_protocol::{AgentRequest, ConversationMessage, StreamEvent, ToolCallRecord, ToolResultRecord};
use async_stream::stream;
use futures::{Stream, StreamExt};
use serde::Serialize;
use thiserror::Error;

use crate::config::AgentConfig;
use crate::tools::ToolRegistry;

pub const DEFAULT_SYSTEM_PROMPT: &str = "あなたは親切で知識豊富なAIアシスタントです。
ユーザーの質問に日本語で丁寧に答えてください。
現在の日時を聞かれた場合は、current_timeツールを使用して正確な時刻を取得してください。
回答は簡潔かつ分かりやすくしてください。";

/// The one agent this runtime hosts. The chat page binds to it and runs
/// addressed to any other name are rejected.
pub const AGENT_NAME: &str = "strands_agent";

const DEFAULT_MAX_ITERATIONS: usize = 8;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AgentError {
    #[error("provider error: {0}")]
    Provider(String),
    #[error("no final answer after {0} model turns")]
    IterationLimit(usize),
}

/// Token counts summed over every turn of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Result of a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentOutcome {
    /// Text of the final turn.
    pub text: String,
    pub usage: TokenUsage,
    /// Every tool call made during the run, in order.
    pub tool_calls: Vec<ToolCallRecord>,
    /// The input conversation plus everything the run appended.
    pub conversation: Vec<ConversationMessage>,
}

/// Progress of a run. The last event is always `Finished` or `Failed`.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    TurnStarted { iteration: usize },
    ThinkingDelta(String),
    TextDelta(String),
    ToolCall(ToolCallRecord),
    ToolResult(ToolResultRecord),
    Usage(TokenUsage),
    Finished(AgentOutcome),
    Failed(AgentError),
}

pub struct Agent {
    name: String,
    description: String,
    system_prompt: String,
    provider: Arc<dyn ChatProvider>,
    tools: Arc<ToolRegistry>,
    max_iterations: usize,
}

impl Agent {
    pub fn new(name: impl Into<String>, provider: Arc<dyn ChatProvider>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            provider,
            tools: Arc::new(ToolRegistry::builtin()),
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    /// Build the hosted agent from its config section. The name is always
    /// [`AGENT_NAME`].
    pub fn from_config(config: &AgentConfig, provider: Arc<dyn ChatProvider>) -> Self {
        Self::new(AGENT_NAME, provider)
            .with_description(&config.description)
            .with_system_prompt(&config.system_prompt)
            .with_max_iterations(config.max_iterations)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = Arc::new(tools);
        self
    }

    /// At least one turn is always allowed.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn model(&self) -> &str {
        self.provider.model()
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Run the agent over `conversation`, streaming progress.
    pub fn run(
        &self,
        conversation: Vec<ConversationMessage>,
    ) -> impl Stream<Item = AgentEvent> + Send + 'static {
        let provider = Arc::clone(&self.provider);
        let tools = Arc::clone(&self.tools);
        let system_prompt = self.system_prompt.clone();
        let max_iterations = self.max_iterations;
        let agent = self.name.clone();

        stream! {
            let specs = tools.specs();
            let mut conversation = conversation;
            let mut usage = TokenUsage::default();
            let mut all_calls: Vec<ToolCallRecord> = Vec::new();

            for iteration in 0..max_iterations {
                yield AgentEvent::TurnStarted { iteration };

                let request = AgentRequest::new(system_prompt.clone())
                    .with_conversation(conversation.clone())
                    .with_tools(specs.clone());
                let mut events = provider.stream(&request);

                let mut text = String::new();
                let mut calls: Vec<ToolCallRecord> = Vec::new();

                while let Some(event) = events.next().await {
                    match event {
                        StreamEvent::ThinkingDelta(t) => {
                            yield AgentEvent::ThinkingDelta(t);
                        }
                        StreamEvent::TextDelta(t) => {
                            text.push_str(&t);
                            yield AgentEvent::TextDelta(t);
                        }
                        StreamEvent::ToolCall { id, name, arguments_json } => {
                            let call = ToolCallRecord { id, name, arguments_json };
                            calls.push(call.clone());
                            yield AgentEvent::ToolCall(call);
                        }
                        StreamEvent::Usage { input_tokens, output_tokens } => {
                            let turn = TokenUsage {
                                input_tokens: u64::from(input_tokens),
                                output_tokens: u64::from(output_tokens),
                            };
                            usage.input_tokens += turn.input_tokens;
                            usage.output_tokens += turn.output_tokens;
                            yield AgentEvent::Usage(turn);
                        }
                        StreamEvent::Done => break,
                        StreamEvent::Error(e) => {
                            tracing::warn!(agent = %agent, iteration, error = %e, "provider failed");
                            yield AgentEvent::Failed(AgentError::Provider(e));
                            return;
                        }
                    }
                }

                if calls.is_empty() {
                    if !text.is_empty() {
                        conversation.push(ConversationMessage::assistant(&text));
                    }
                    tracing::debug!(agent = %agent, iterations = iteration + 1, "run finished");
                    yield AgentEvent::Finished(AgentOutcome {
                        text,
                        usage,
                        tool_calls: all_calls,
                        conversation,
                    });
                    return;
                }

                conversation.push(ConversationMessage::assistant_with_tool_calls(&text, calls.clone()));

                let mut results = Vec::with_capacity(calls.len());
                for call in &calls {
                    let content = match tools.call(&call.name, &call.arguments()) {
                        Ok(output) => output,
                        Err(e) => {
                            tracing::warn!(tool = %call.name, error = %e, "tool failed");
                            format!("Error: {e}")
                        }
                    };
                    tracing::debug!(tool = %call.name, id = %call.id, "tool executed");
                    let result = ToolResultRecord {
                        tool_call_id: call.id.clone(),
                        content,
                    };
                    results.push(result.clone());
                    yield AgentEvent::ToolResult(result);
                }
                conversation.push(ConversationMessage::tool_result(results));
                all_calls.extend(calls);
            }

            tracing::warn!(agent = %agent, max_iterations, "iteration limit reached");
            yield AgentEvent::Failed(AgentError::IterationLimit(max_iterations));
        }
    }

    /// Run to completion and return the outcome.
    pub async fn invoke(
        &self,
        conversation: Vec<ConversationMessage>,
    ) -> Result<AgentOutcome, AgentError> {
        let events = self.run(conversation);
        let mut events = std::pin::pin!(events);
        while let Some(event) = events.next().await {
            match event {
                AgentEvent::Finished(outcome) => return Ok(outcome),
                AgentEvent::Failed(e) => return Err(e),
                _ => {}
            }
        }
        Err(AgentError::Provider("run ended without a result".to_string()))
    }
}
