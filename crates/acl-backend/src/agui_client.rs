//! Client for AG-UI run endpoints.
//!
//! Posts a [`RunAgentInput`] and decodes the SSE response into
//! [`AgUiEvent`]s. Used by the `ask` command to talk to a running server.

use std::time::Duration;

use acl_protocol::{AgUiEvent, RunAgentInput};
use async_stream::stream;
use futures::{Stream, StreamExt};
use reqwest::Client;
use thiserror::Error;

use crate::sse::parse_sse_stream;

#[derive(Debug, Error)]
pub enum AgUiClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("stream error: {0}")]
    Stream(String),
}

pub struct AgUiClient {
    url: String,
    http: Client,
}

impl AgUiClient {
    pub fn new(url: impl Into<String>) -> Result<Self, AgUiClientError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            url: url.into(),
            http,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Start a run and stream its events. The stream ends after the first
    /// terminal event (`RUN_FINISHED` / `RUN_ERROR`) or when the server closes
    /// the connection.
    pub fn run(
        &self,
        input: &RunAgentInput,
    ) -> impl Stream<Item = Result<AgUiEvent, AgUiClientError>> + Send + 'static {
        let request = self
            .http
            .post(&self.url)
            .header("accept", "text/event-stream")
            .json(input);

        stream! {
            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    yield Err(AgUiClientError::from(e));
                    return;
                }
            };

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                yield Err(AgUiClientError::Status { status: status.as_u16(), body });
                return;
            }

            let mut events = parse_sse_stream(response.bytes_stream());
            while let Some(result) = events.next().await {
                match result {
                    Ok(sse) => match serde_json::from_str::<AgUiEvent>(&sse.data) {
                        Ok(event) => {
                            let terminal = event.is_terminal();
                            yield Ok(event);
                            if terminal {
                                return;
                            }
                        }
                        Err(e) => {
                            tracing::debug!(error = %e, data = %sse.data, "skipping unrecognized AG-UI event");
                        }
                    },
                    Err(e) => {
                        yield Err(AgUiClientError::Stream(e.to_string()));
                        return;
                    }
                }
            }
        }
    }
}
