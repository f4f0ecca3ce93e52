//! Events emitted by LLM providers while streaming a response.

/// Events emitted during a streaming response.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A chunk of reasoning text from the model.
    ThinkingDelta(String),

    /// A chunk of response text.
    TextDelta(String),

    /// A complete tool call.
    ToolCall {
        id: String,
        name: String,
        arguments_json: String,
    },

    /// Token usage information.
    Usage {
        input_tokens: u32,
        output_tokens: u32,
    },

    /// Stream has completed successfully.
    Done,

    /// An error occurred during streaming. No further events follow.
    Error(String),
}

impl StreamEvent {
    /// True for events after which the stream yields nothing more.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done | StreamEvent::Error(_))
    }
}
