//! Ollama chat API client with NDJSON streaming support.

use std::collections::HashMap;
use std::time::Duration;

use acl_protocol::{AgentRequest, Role, StreamEvent, ToolSpec};
use async_stream::stream;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::ndjson::parse_ndjson_stream;
use crate::provider::ChatProvider;

pub const DEFAULT_HOST: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "qwen3:8b";

#[derive(Debug, Error)]
pub enum OllamaError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("API error: {0}")]
    Api(String),
}

/// Ollama API client.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    host: String,
    model: String,
    think: Option<bool>,
    http: Client,
}

/// HTTP client shared by every request to the Ollama server. The request
/// timeout has to cover a cold model load.
fn build_http_client() -> Result<Client, OllamaError> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(300))
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(2)
        .build()?)
}

impl OllamaClient {
    /// Create a client for the given server and model.
    pub fn new(host: impl Into<String>, model: impl Into<String>) -> Result<Self, OllamaError> {
        Ok(Self {
            host: host.into().trim_end_matches('/').to_string(),
            model: model.into(),
            think: None,
            http: build_http_client()?,
        })
    }

    /// Ask reasoning models to emit (or suppress) their thinking.
    pub fn with_think(mut self, think: Option<bool>) -> Self {
        self.think = think;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Names of the models installed on the server.
    pub async fn list_models(&self) -> Result<Vec<String>, OllamaError> {
        let response = self
            .http
            .get(format!("{}/api/tags", self.host))
            .send()
            .await?;
        let response = check_status(response).await?;
        let tags: TagsResponse = response.json().await?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Stream a chat completion for `request`.
    pub fn send(&self, request: &AgentRequest) -> impl Stream<Item = StreamEvent> + Send + 'static {
        let http = self.http.clone();
        let url = format!("{}/api/chat", self.host);
        let body = build_request_body(&self.model, self.think, request);

        stream! {
            let response = match http.post(&url).json(&body).send().await {
                Ok(response) => response,
                Err(e) => {
                    yield StreamEvent::Error(OllamaError::from(e).to_string());
                    return;
                }
            };
            let response = match check_status(response).await {
                Ok(response) => response,
                Err(e) => {
                    yield StreamEvent::Error(e.to_string());
                    return;
                }
            };

            let mut chunks = parse_ndjson_stream::<_, ApiChunk>(response.bytes_stream());
            let mut processor = ChunkProcessor::new();

            while let Some(result) = chunks.next().await {
                match result {
                    Ok(Ok(chunk)) => {
                        for event in processor.process(chunk) {
                            let terminal = event.is_terminal();
                            yield event;
                            if terminal {
                                return;
                            }
                        }
                    }
                    Ok(Err(e)) => {
                        tracing::debug!(error = %e, "skipping malformed chunk from ollama");
                    }
                    Err(e) => {
                        yield StreamEvent::Error(format!("Stream error: {e}"));
                        return;
                    }
                }
            }

            // Connection closed without a done chunk.
            yield StreamEvent::Done;
        }
    }
}

impl ChatProvider for OllamaClient {
    fn model(&self) -> &str {
        &self.model
    }

    fn stream(&self, request: &AgentRequest) -> BoxStream<'static, StreamEvent> {
        self.send(request).boxed()
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, OllamaError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    // Ollama reports failures as {"error": "..."}.
    let detail = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or(body);
    Err(OllamaError::Api(format!("{status}: {detail}")))
}

fn build_request_body(model: &str, think: Option<bool>, request: &AgentRequest) -> ApiRequest {
    ApiRequest {
        model: model.to_string(),
        stream: true,
        messages: build_messages(request),
        tools: request.tools.iter().map(build_tool).collect(),
        think,
    }
}

fn build_tool(spec: &ToolSpec) -> ApiTool {
    ApiTool {
        tool_type: "function".to_string(),
        function: ApiFunction {
            name: spec.name.clone(),
            description: spec.description.clone(),
            parameters: spec.parameters.clone(),
        },
    }
}

fn build_messages(request: &AgentRequest) -> Vec<ApiMessage> {
    let mut messages = Vec::new();
    // Tool results name their call by id; Ollama wants the tool name.
    let mut call_names: HashMap<&str, &str> = HashMap::new();

    if !request.system_prompt.is_empty() {
        messages.push(ApiMessage::text("system", &request.system_prompt));
    }

    for msg in &request.conversation {
        match msg.role {
            Role::Tool => {
                // One tool message per result.
                for result in &msg.tool_results {
                    let mut message = ApiMessage::text("tool", &result.content);
                    message.tool_name = call_names
                        .get(result.tool_call_id.as_str())
                        .map(|name| name.to_string());
                    messages.push(message);
                }
            }
            Role::Assistant if !msg.tool_calls.is_empty() => {
                for call in &msg.tool_calls {
                    call_names.insert(&call.id, &call.name);
                }
                let tool_calls = msg
                    .tool_calls
                    .iter()
                    .map(|call| ApiToolCall {
                        function: ApiFunctionCall {
                            name: call.name.clone(),
                            arguments: call.arguments(),
                        },
                    })
                    .collect();
                messages.push(ApiMessage {
                    role: "assistant".to_string(),
                    content: msg.content.clone(),
                    tool_calls,
                    tool_name: None,
                });
            }
            role => messages.push(ApiMessage::text(role.as_str(), &msg.content)),
        }
    }

    messages
}

/// Turns Ollama chat chunks into stream events.
///
/// Ollama delivers tool calls whole (not as argument deltas), so each call is
/// emitted as soon as its chunk arrives. Ids are synthesized when absent.
struct ChunkProcessor {
    next_call: usize,
}

impl ChunkProcessor {
    fn new() -> Self {
        Self { next_call: 0 }
    }

    fn process(&mut self, chunk: ApiChunk) -> Vec<StreamEvent> {
        let mut events = Vec::new();

        if let Some(error) = chunk.error {
            events.push(StreamEvent::Error(error));
            return events;
        }

        if let Some(message) = chunk.message {
            if !message.thinking.is_empty() {
                events.push(StreamEvent::ThinkingDelta(message.thinking));
            }
            if !message.content.is_empty() {
                events.push(StreamEvent::TextDelta(message.content));
            }
            for call in message.tool_calls {
                let id = call.id.unwrap_or_else(|| format!("call_{}", self.next_call));
                self.next_call += 1;
                events.push(StreamEvent::ToolCall {
                    id,
                    name: call.function.name,
                    arguments_json: call.function.arguments.to_string(),
                });
            }
        }

        if chunk.done {
            if chunk.prompt_eval_count.is_some() || chunk.eval_count.is_some() {
                events.push(StreamEvent::Usage {
                    input_tokens: chunk.prompt_eval_count.unwrap_or(0),
                    output_tokens: chunk.eval_count.unwrap_or(0),
                });
            }
            events.push(StreamEvent::Done);
        }

        events
    }
}

// Wire types for /api/chat and /api/tags

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    stream: bool,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    think: Option<bool>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<ApiToolCall>,
    /// Set on `tool` messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_name: Option<String>,
}

impl ApiMessage {
    fn text(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
            tool_calls: Vec::new(),
            tool_name: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct ApiTool {
    #[serde(rename = "type")]
    tool_type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize)]
struct ApiFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize)]
struct ApiToolCall {
    function: ApiFunctionCall,
}

#[derive(Debug, Serialize)]
struct ApiFunctionCall {
    name: String,
    arguments: Value,
}

#[derive(Debug, Deserialize)]
struct ApiChunk {
    #[serde(default)]
    message: Option<ApiResponseMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    thinking: String,
    #[serde(default)]
    tool_calls: Vec<ApiResponseToolCall>,
}

#[derive(Debug, Deserialize)]
struct ApiResponseToolCall {
    #[serde(default)]
    id: Option<String>,
    function: ApiResponseFunction,
}

#[derive(Debug, Deserialize)]
struct ApiResponseFunction {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagsModel>,
}

#[derive(Debug, Deserialize)]
struct TagsModel {
    name: String,
}
