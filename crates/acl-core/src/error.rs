use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::agent::AgentError;
use crate::store::StoreError;

/// Errors surfaced by the HTTP handlers, rendered as `{"detail": …}`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Conversation not found")]
    ConversationNotFound,
    #[error("{0}")]
    InvalidRequest(String),
    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
    #[error("Storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::ConversationNotFound => StatusCode::NOT_FOUND,
            AppError::InvalidRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Agent(_) | AppError::Store(_) | AppError::Task(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}
