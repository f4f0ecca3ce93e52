//! The seam between the agent loop and LLM backends.

use acl_protocol::{AgentRequest, StreamEvent};
use futures::stream::BoxStream;

/// A backend that streams a model response for a request.
///
/// Every stream ends with exactly one [`StreamEvent::Done`], or stops right
/// after a [`StreamEvent::Error`].
pub trait ChatProvider: Send + Sync {
    /// Model identifier, reported by health endpoints.
    fn model(&self) -> &str;

    fn stream(&self, request: &AgentRequest) -> BoxStream<'static, StreamEvent>;
}
