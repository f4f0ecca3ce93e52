//! Scripted provider.
//!
//! [`MockProvider`] replays one [`MockTurn`] per `stream` call and records
//! every request, so the agent loop and the HTTP server run without Ollama.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use acl_protocol::{AgentRequest, StreamEvent};
use async_stream::stream;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};

use crate::provider::ChatProvider;

/// One step of a scripted turn.
#[derive(Debug, Clone, PartialEq)]
pub enum MockStep {
    Thinking(String),
    Text(String),
    ToolCall {
        id: String,
        name: String,
        arguments_json: String,
    },
    Usage {
        input_tokens: u32,
        output_tokens: u32,
    },
    /// Emit an error; the turn ends without `Done`.
    Fail(String),
    /// Wait without emitting anything.
    Pause(Duration),
}

/// A scripted model turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MockTurn {
    pub steps: Vec<MockStep>,
    pub step_delay: Option<Duration>,
}

impl MockTurn {
    pub fn new(steps: Vec<MockStep>) -> Self {
        Self {
            steps,
            step_delay: None,
        }
    }

    /// Sleep before every step.
    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = Some(delay);
        self
    }

    /// Replay the turn as provider events.
    pub fn replay(self) -> impl Stream<Item = StreamEvent> + Send + 'static {
        stream! {
            for step in self.steps {
                if let Some(delay) = self.step_delay {
                    tokio::time::sleep(delay).await;
                }
                let event = match step {
                    MockStep::Thinking(t) => StreamEvent::ThinkingDelta(t),
                    MockStep::Text(t) => StreamEvent::TextDelta(t),
                    MockStep::ToolCall { id, name, arguments_json } => {
                        StreamEvent::ToolCall { id, name, arguments_json }
                    }
                    MockStep::Usage { input_tokens, output_tokens } => {
                        StreamEvent::Usage { input_tokens, output_tokens }
                    }
                    MockStep::Fail(message) => {
                        yield StreamEvent::Error(message);
                        return;
                    }
                    MockStep::Pause(d) => {
                        tokio::time::sleep(d).await;
                        continue;
                    }
                };
                yield event;
            }
            yield StreamEvent::Done;
        }
    }
}

#[derive(Debug, Default)]
pub struct MockProvider {
    turns: Mutex<VecDeque<MockTurn>>,
    requests: Mutex<Vec<AgentRequest>>,
}

impl MockProvider {
    pub fn new(turns: Vec<MockTurn>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<AgentRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn remaining(&self) -> usize {
        self.turns.lock().map(|t| t.len()).unwrap_or(0)
    }
}

impl ChatProvider for MockProvider {
    fn model(&self) -> &str {
        "mock"
    }

    fn stream(&self, request: &AgentRequest) -> BoxStream<'static, StreamEvent> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        match self.turns.lock().ok().and_then(|mut t| t.pop_front()) {
            Some(turn) => turn.replay().boxed(),
            None => futures::stream::once(async {
                StreamEvent::Error("mock provider has no scripted turns left".to_string())
            })
            .boxed(),
        }
    }
}

/// Turns for common conversations.
pub mod fixtures {
    use super::{MockStep, MockTurn};

    pub fn text_reply(text: &str) -> MockTurn {
        MockTurn::new(vec![MockStep::Text(text.to_string())])
    }

    /// Text delivered as several deltas.
    pub fn streaming_text(chunks: &[&str]) -> MockTurn {
        MockTurn::new(chunks.iter().map(|c| MockStep::Text(c.to_string())).collect())
    }

    pub fn tool_call(id: &str, name: &str, arguments_json: &str) -> MockTurn {
        MockTurn::new(vec![MockStep::ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            arguments_json: arguments_json.to_string(),
        }])
    }

    /// `current_time` for Asia/Tokyo, then `answer`.
    pub fn time_question(answer: &str) -> Vec<MockTurn> {
        vec![
            tool_call("call_0", "current_time", r#"{"timezone":"Asia/Tokyo"}"#),
            text_reply(answer),
        ]
    }

    /// Some text, then a provider failure.
    pub fn error_mid_stream(text_before: &str, error: &str) -> MockTurn {
        MockTurn::new(vec![
            MockStep::Text(text_before.to_string()),
            MockStep::Fail(error.to_string()),
        ])
    }
}
