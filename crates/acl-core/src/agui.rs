//! Maps agent runs onto AG-UI events.

use acl_protocol::{AgUiEvent, Role, RunAgentInput};
use async_stream::stream;
use futures::{Stream, StreamExt};
use uuid::Uuid;

use crate::agent::{Agent, AgentEvent};

pub const AGENT_NOT_FOUND: &str = "AGENT_NOT_FOUND";
pub const AGENT_ERROR: &str = "AGENT_ERROR";
pub const NO_USER_MESSAGE: &str = "NO_USER_MESSAGE";

/// Turns [`AgentEvent`]s into AG-UI events for one run.
///
/// Text between tool calls becomes one text message; a message is closed
/// before any tool call and before the run ends.
pub struct RunTranslator {
    thread_id: String,
    run_id: String,
    open_message: Option<String>,
    last_message: Option<String>,
    counter: usize,
}

impl RunTranslator {
    pub fn new(thread_id: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            run_id: run_id.into(),
            open_message: None,
            last_message: None,
            counter: 0,
        }
    }

    pub fn started(&self) -> AgUiEvent {
        AgUiEvent::RunStarted {
            thread_id: self.thread_id.clone(),
            run_id: self.run_id.clone(),
        }
    }

    /// Close any open message and report `message` as a run error.
    pub fn error(&mut self, message: impl Into<String>, code: &str) -> Vec<AgUiEvent> {
        let mut events = Vec::new();
        self.close_message(&mut events);
        events.push(AgUiEvent::RunError {
            message: message.into(),
            code: Some(code.to_string()),
        });
        events
    }

    fn next_id(&mut self, kind: &str) -> String {
        let id = format!("{}-{kind}-{}", self.run_id, self.counter);
        self.counter += 1;
        id
    }

    fn close_message(&mut self, events: &mut Vec<AgUiEvent>) {
        if let Some(message_id) = self.open_message.take() {
            events.push(AgUiEvent::TextMessageEnd { message_id });
        }
    }

    pub fn translate(&mut self, event: AgentEvent) -> Vec<AgUiEvent> {
        let mut events = Vec::new();
        match event {
            AgentEvent::TextDelta(delta) => {
                if delta.is_empty() {
                    return events;
                }
                let message_id = match &self.open_message {
                    Some(id) => id.clone(),
                    None => {
                        let id = self.next_id("msg");
                        events.push(AgUiEvent::TextMessageStart {
                            message_id: id.clone(),
                            role: Role::Assistant.as_str().to_string(),
                        });
                        self.open_message = Some(id.clone());
                        self.last_message = Some(id.clone());
                        id
                    }
                };
                events.push(AgUiEvent::TextMessageContent { message_id, delta });
            }
            AgentEvent::ToolCall(call) => {
                self.close_message(&mut events);
                events.push(AgUiEvent::ToolCallStart {
                    tool_call_id: call.id.clone(),
                    tool_call_name: call.name,
                    parent_message_id: self.last_message.clone(),
                });
                events.push(AgUiEvent::ToolCallArgs {
                    tool_call_id: call.id.clone(),
                    delta: call.arguments_json,
                });
                events.push(AgUiEvent::ToolCallEnd {
                    tool_call_id: call.id,
                });
            }
            AgentEvent::ToolResult(result) => {
                let message_id = self.next_id("tool");
                events.push(AgUiEvent::ToolCallResult {
                    message_id,
                    tool_call_id: result.tool_call_id,
                    content: result.content,
                    role: Some(Role::Tool.as_str().to_string()),
                });
            }
            AgentEvent::TurnStarted { .. } => self.close_message(&mut events),
            AgentEvent::ThinkingDelta(_) | AgentEvent::Usage(_) => {}
            AgentEvent::Finished(outcome) => {
                self.close_message(&mut events);
                events.push(AgUiEvent::RunFinished {
                    thread_id: self.thread_id.clone(),
                    run_id: self.run_id.clone(),
                    result: serde_json::to_value(outcome.usage)
                        .ok()
                        .map(|usage| serde_json::json!({ "usage": usage })),
                });
            }
            AgentEvent::Failed(e) => return self.error(e.to_string(), AGENT_ERROR),
        }
        events
    }
}

/// Run `agent` for an AG-UI request. The stream always starts with
/// `RUN_STARTED` and ends with `RUN_FINISHED` or `RUN_ERROR`.
pub fn run_events(
    agent: &Agent,
    input: RunAgentInput,
) -> impl Stream<Item = AgUiEvent> + Send + 'static {
    let thread_id = input
        .thread_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let run_id = input
        .run_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let mut translator = RunTranslator::new(thread_id.clone(), run_id.clone());

    let conversation = input.conversation();
    let mismatch = input
        .requested_agent()
        .filter(|requested| *requested != agent.name())
        .map(str::to_string);
    let has_user_message = conversation.iter().any(|m| m.role == Role::User);
    // Built eagerly so the stream does not borrow the agent.
    let run = (mismatch.is_none() && has_user_message).then(|| agent.run(conversation));
    let agent_name = agent.name().to_string();

    stream! {
        tracing::info!(thread_id = %thread_id, run_id = %run_id, agent = %agent_name, "run started");
        yield translator.started();

        if let Some(requested) = mismatch {
            tracing::warn!(requested = %requested, "unknown agent requested");
            for event in translator.error(format!("Agent not found: {requested}"), AGENT_NOT_FOUND) {
                yield event;
            }
            return;
        }

        let Some(run) = run else {
            for event in translator.error("No user message in request", NO_USER_MESSAGE) {
                yield event;
            }
            return;
        };

        let mut run = std::pin::pin!(run);
        while let Some(event) = run.next().await {
            let terminal = matches!(event, AgentEvent::Finished(_) | AgentEvent::Failed(_));
            if let AgentEvent::Failed(ref e) = event {
                tracing::warn!(run_id = %run_id, error = %e, "run failed");
            }
            for out in translator.translate(event) {
                yield out;
            }
            if terminal {
                tracing::info!(run_id = %run_id, "run finished");
                return;
            }
        }

        for event in translator.error("Agent stopped without a result", AGENT_ERROR) {
            yield event;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use acl_backend::mock::fixtures;
    use acl_backend::{ChatProvider, MockProvider};
    use acl_protocol::{ToolCallRecord, ToolResultRecord};
    use serde_json::json;

    fn agent(turns: Vec<acl_backend::MockTurn>) -> Agent {
        let provider: Arc<dyn ChatProvider> = Arc::new(MockProvider::new(turns));
        Agent::new("strands_agent", provider)
    }

    fn names(events: &[AgUiEvent]) -> Vec<&'static str> {
        events.iter().map(AgUiEvent::name).collect()
    }

    fn input(text: &str) -> RunAgentInput {
        let mut input = RunAgentInput::from_user_text("m0", text);
        input.thread_id = Some("t1".to_string());
        input.run_id = Some("r1".to_string());
        input
    }

    #[test]
    fn text_deltas_share_one_message() {
        let mut t = RunTranslator::new("t", "r");
        let first = t.translate(AgentEvent::TextDelta("a".to_string()));
        let second = t.translate(AgentEvent::TextDelta("b".to_string()));
        assert_eq!(names(&first), vec!["TEXT_MESSAGE_START", "TEXT_MESSAGE_CONTENT"]);
        assert_eq!(
            second,
            vec![AgUiEvent::TextMessageContent {
                message_id: "r-msg-0".to_string(),
                delta: "b".to_string()
            }]
        );
        assert!(t.translate(AgentEvent::TextDelta(String::new())).is_empty());
    }

    #[test]
    fn tool_call_closes_text_and_links_parent() {
        let mut t = RunTranslator::new("t", "r");
        t.translate(AgentEvent::TextDelta("checking".to_string()));
        let events = t.translate(AgentEvent::ToolCall(ToolCallRecord {
            id: "call_0".to_string(),
            name: "current_time".to_string(),
            arguments_json: "{}".to_string(),
        }));
        assert_eq!(
            names(&events),
            vec!["TEXT_MESSAGE_END", "TOOL_CALL_START", "TOOL_CALL_ARGS", "TOOL_CALL_END"]
        );
        assert_eq!(
            events[1],
            AgUiEvent::ToolCallStart {
                tool_call_id: "call_0".to_string(),
                tool_call_name: "current_time".to_string(),
                parent_message_id: Some("r-msg-0".to_string()),
            }
        );

        let result = t.translate(AgentEvent::ToolResult(ToolResultRecord {
            tool_call_id: "call_0".to_string(),
            content: "12:00".to_string(),
        }));
        assert_eq!(
            result,
            vec![AgUiEvent::ToolCallResult {
                message_id: "r-tool-1".to_string(),
                tool_call_id: "call_0".to_string(),
                content: "12:00".to_string(),
                role: Some("tool".to_string()),
            }]
        );
    }

    #[tokio::test]
    async fn full_run_event_sequence() {
        let agent = agent(fixtures::time_question("今は12時です。"));
        let events: Vec<_> = run_events(&agent, input("今何時ですか?")).collect().await;

        assert_eq!(
            names(&events),
            vec![
                "RUN_STARTED",
                "TOOL_CALL_START",
                "TOOL_CALL_ARGS",
                "TOOL_CALL_END",
                "TOOL_CALL_RESULT",
                "TEXT_MESSAGE_START",
                "TEXT_MESSAGE_CONTENT",
                "TEXT_MESSAGE_END",
                "RUN_FINISHED",
            ]
        );
        assert_eq!(
            events[0],
            AgUiEvent::RunStarted {
                thread_id: "t1".to_string(),
                run_id: "r1".to_string()
            }
        );
        assert!(matches!(
            events[6],
            AgUiEvent::TextMessageContent { ref delta, .. } if delta == "今は12時です。"
        ));
    }

    #[tokio::test]
    async fn missing_ids_are_generated() {
        let agent = agent(vec![fixtures::text_reply("hi")]);
        let events: Vec<_> = run_events(&agent, RunAgentInput::from_user_text("m", "hello"))
            .collect()
            .await;
        let AgUiEvent::RunStarted { thread_id, run_id } = &events[0] else {
            panic!("expected RUN_STARTED, got {:?}", events[0]);
        };
        assert!(Uuid::parse_str(thread_id).is_ok());
        assert!(Uuid::parse_str(run_id).is_ok());
        assert_ne!(thread_id, run_id);
    }

    #[tokio::test]
    async fn agent_mismatch_is_a_run_error() {
        let agent = agent(vec![fixtures::text_reply("unused")]);
        let mut request = input("hi");
        request.forwarded_props = json!({"agent": "other_agent"});
        let events: Vec<_> = run_events(&agent, request).collect().await;

        assert_eq!(names(&events), vec!["RUN_STARTED", "RUN_ERROR"]);
        assert!(matches!(
            events[1],
            AgUiEvent::RunError { ref code, .. } if code.as_deref() == Some(AGENT_NOT_FOUND)
        ));
    }

    #[tokio::test]
    async fn matching_agent_name_runs() {
        let agent = agent(vec![fixtures::text_reply("ok")]);
        let mut request = input("hi");
        request.forwarded_props = json!({"agent": "strands_agent"});
        let events: Vec<_> = run_events(&agent, request).collect().await;
        assert_eq!(events.last().map(AgUiEvent::name), Some("RUN_FINISHED"));
    }

    #[tokio::test]
    async fn provider_failure_closes_message_then_errors() {
        let agent = agent(vec![fixtures::error_mid_stream("partial", "connection refused")]);
        let events: Vec<_> = run_events(&agent, input("hi")).collect().await;
        assert_eq!(
            names(&events),
            vec![
                "RUN_STARTED",
                "TEXT_MESSAGE_START",
                "TEXT_MESSAGE_CONTENT",
                "TEXT_MESSAGE_END",
                "RUN_ERROR",
            ]
        );
        assert!(matches!(
            events[4],
            AgUiEvent::RunError { ref message, ref code }
                if message.contains("connection refused") && code.as_deref() == Some(AGENT_ERROR)
        ));
    }

    #[tokio::test]
    async fn malformed_tool_arguments_still_finish_the_run() {
        let agent = agent(vec![
            fixtures::tool_call("call_0", "current_time", r#"{"timezone":"+aあ"}"#),
            fixtures::text_reply("タイムゾーンが不正です。"),
        ]);
        let events: Vec<_> = run_events(&agent, input("今何時?")).collect().await;

        assert_eq!(names(&events).first(), Some(&"RUN_STARTED"));
        assert_eq!(names(&events).last(), Some(&"RUN_FINISHED"));
        let result = events
            .iter()
            .find_map(|e| match e {
                AgUiEvent::ToolCallResult { content, .. } => Some(content.as_str()),
                _ => None,
            })
            .unwrap();
        assert_eq!(result, "Error: unknown timezone: +aあ");
    }

    #[tokio::test]
    async fn request_without_user_message() {
        let agent = agent(vec![]);
        let events: Vec<_> = run_events(&agent, RunAgentInput::default()).collect().await;
        assert_eq!(names(&events), vec!["RUN_STARTED", "RUN_ERROR"]);
    }

    #[tokio::test]
    async fn finished_reports_usage() {
        let agent = agent(vec![fixtures::text_reply("ok")]);
        let events: Vec<_> = run_events(&agent, input("hi")).collect().await;
        let Some(AgUiEvent::RunFinished { result, .. }) = events.last() else {
            panic!("expected RUN_FINISHED");
        };
        assert_eq!(
            result.as_ref().map(|r| r["usage"]["input_tokens"].clone()),
            Some(json!(0))
        );
    }
}
