//! AG-UI protocol types.
//!
//! A run is requested with a [`RunAgentInput`] body and answered with a stream
//! of [`AgUiEvent`]s, each serialized as one SSE `data:` line. Field names
//! follow the protocol's camelCase JSON; event names are SCREAMING_SNAKE_CASE
//! in the `type` tag.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::{ConversationMessage, Role, ToolCallRecord, ToolResultRecord};

/// Request body for one agent run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RunAgentInput {
    pub thread_id: Option<String>,
    pub run_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_run_id: Option<String>,
    pub state: Value,
    pub messages: Vec<AgUiMessage>,
    pub tools: Vec<Value>,
    pub context: Vec<ContextItem>,
    pub forwarded_props: Value,
    /// Agent name some clients send beside `forwardedProps`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
}

impl RunAgentInput {
    /// A single-turn run carrying one user message.
    pub fn from_user_text(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            messages: vec![AgUiMessage {
                id: id.into(),
                role: "user".to_string(),
                content: Some(Value::String(text.into())),
                tool_calls: Vec::new(),
                tool_call_id: None,
            }],
            ..Default::default()
        }
    }

    /// Agent name requested by the client, if any.
    ///
    /// Looked up in `forwardedProps.agent`, `forwardedProps.agentName`, then
    /// the top-level `agent` field.
    pub fn requested_agent(&self) -> Option<&str> {
        ["agent", "agentName"]
            .iter()
            .find_map(|key| self.forwarded_props.get(key).and_then(Value::as_str))
            .or(self.agent.as_deref())
    }

    /// Convert the client's message history into conversation messages.
    ///
    /// Messages without usable content (and no tool data) are dropped.
    pub fn conversation(&self) -> Vec<ConversationMessage> {
        self.messages
            .iter()
            .filter_map(AgUiMessage::to_conversation_message)
            .collect()
    }
}

/// Extra context the client attaches to a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContextItem {
    pub description: String,
    pub value: String,
}

/// A message as exchanged between the UI and the agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgUiMessage {
    #[serde(default)]
    pub id: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<AgUiToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl AgUiMessage {
    /// Plain text of the message. Accepts a string or an array of
    /// `{"type":"text","text":…}` parts.
    pub fn text(&self) -> String {
        match &self.content {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Array(parts)) => parts
                .iter()
                .filter(|p| p.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("\n"),
            _ => String::new(),
        }
    }

    fn to_conversation_message(&self) -> Option<ConversationMessage> {
        let text = self.text();
        match self.role.as_str() {
            "user" if !text.is_empty() => Some(ConversationMessage::user(text)),
            "system" | "developer" if !text.is_empty() => {
                Some(ConversationMessage::system(text))
            }
            "assistant" if !self.tool_calls.is_empty() => {
                let calls = self
                    .tool_calls
                    .iter()
                    .map(|c| ToolCallRecord {
                        id: c.id.clone(),
                        name: c.function.name.clone(),
                        arguments_json: c.function.arguments.clone(),
                    })
                    .collect();
                Some(ConversationMessage::assistant_with_tool_calls(text, calls))
            }
            "assistant" if !text.is_empty() => Some(ConversationMessage::assistant(text)),
            "tool" => self.tool_call_id.as_ref().map(|id| {
                ConversationMessage::tool_result(vec![ToolResultRecord {
                    tool_call_id: id.clone(),
                    content: text,
                }])
            }),
            _ => None,
        }
    }
}

/// A tool call embedded in an assistant message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgUiToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_type")]
    pub call_type: String,
    pub function: AgUiFunctionCall,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgUiFunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

/// Events streamed back to the UI during a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgUiEvent {
    #[serde(rename_all = "camelCase")]
    RunStarted { thread_id: String, run_id: String },
    #[serde(rename_all = "camelCase")]
    RunFinished {
        thread_id: String,
        run_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
    },
    #[serde(rename_all = "camelCase")]
    RunError {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    StepStarted { step_name: String },
    #[serde(rename_all = "camelCase")]
    StepFinished { step_name: String },
    #[serde(rename_all = "camelCase")]
    TextMessageStart { message_id: String, role: String },
    #[serde(rename_all = "camelCase")]
    TextMessageContent { message_id: String, delta: String },
    #[serde(rename_all = "camelCase")]
    TextMessageEnd { message_id: String },
    #[serde(rename_all = "camelCase")]
    ToolCallStart {
        tool_call_id: String,
        tool_call_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_message_id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    ToolCallArgs { tool_call_id: String, delta: String },
    #[serde(rename_all = "camelCase")]
    ToolCallEnd { tool_call_id: String },
    #[serde(rename_all = "camelCase")]
    ToolCallResult {
        message_id: String,
        tool_call_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        role: Option<String>,
    },
}

impl AgUiEvent {
    /// The protocol name of this event, as it appears in the `type` tag.
    pub fn name(&self) -> &'static str {
        match self {
            AgUiEvent::RunStarted { .. } => "RUN_STARTED",
            AgUiEvent::RunFinished { .. } => "RUN_FINISHED",
            AgUiEvent::RunError { .. } => "RUN_ERROR",
            AgUiEvent::StepStarted { .. } => "STEP_STARTED",
            AgUiEvent::StepFinished { .. } => "STEP_FINISHED",
            AgUiEvent::TextMessageStart { .. } => "TEXT_MESSAGE_START",
            AgUiEvent::TextMessageContent { .. } => "TEXT_MESSAGE_CONTENT",
            AgUiEvent::TextMessageEnd { .. } => "TEXT_MESSAGE_END",
            AgUiEvent::ToolCallStart { .. } => "TOOL_CALL_START",
            AgUiEvent::ToolCallArgs { .. } => "TOOL_CALL_ARGS",
            AgUiEvent::ToolCallEnd { .. } => "TOOL_CALL_END",
            AgUiEvent::ToolCallResult { .. } => "TOOL_CALL_RESULT",
        }
    }

    /// True for the events that close a run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AgUiEvent::RunFinished { .. } | AgUiEvent::RunError { .. }
        )
    }
}
