//! HTTP surface: the chat page, the AG-UI run endpoints, health checks and
//! the conversation history API.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use acl_protocol::{AgUiEvent, ConversationMessage, RunAgentInput};
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Local;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::agent::Agent;
use crate::agui::run_events;
use crate::config::Config;
use crate::error::AppError;
use crate::page::{ChatPage, PageConfig, RUNTIME_URL};
use crate::store::{
    conversation_title, Conversation, ConversationDetail, ConversationStore, StoreError,
};

const SIDEBAR_JS: &str = include_str!("../static/sidebar.js");
const SIDEBAR_CSS: &str = include_str!("../static/sidebar.css");

/// POST routes the agent path may not shadow.
const RESERVED_POST_PATHS: &[&str] = &[RUNTIME_URL, "/chat"];

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub agent: Arc<Agent>,
    pub store: Arc<ConversationStore>,
    page: Arc<ChatPage>,
    page_html: Arc<str>,
}

impl AppState {
    pub fn new(config: Config, agent: Agent, store: ConversationStore) -> Self {
        let page = ChatPage::new(agent.model());
        let page_html = Arc::from(page.render());
        Self {
            config: Arc::new(config),
            agent: Arc::new(agent),
            store: Arc::new(store),
            page: Arc::new(page),
            page_html,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let agent_path = state.config.server.normalized_agent_path();
    let cors = if state.config.server.permissive_cors {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
    };

    let mut router = Router::new()
        .route("/", get(index))
        .route("/static/sidebar.js", get(sidebar_js))
        .route("/static/sidebar.css", get(sidebar_css))
        .route("/api/config", get(page_config))
        .route(RUNTIME_URL, post(run_agent))
        .route("/ping", get(ping))
        .route("/health", get(health))
        .route("/chat", post(chat))
        .route("/conversations", get(list_conversations))
        .route(
            "/conversations/:id",
            get(get_conversation).delete(delete_conversation),
        );

    if RESERVED_POST_PATHS.contains(&agent_path.as_str()) {
        if agent_path != RUNTIME_URL {
            tracing::warn!(path = %agent_path, "agent path collides with a built-in route, not mounted");
        }
    } else {
        router = router.route(&agent_path, post(run_agent));
    }

    router
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until Ctrl-C.
pub async fn serve(state: AppState, addr: SocketAddr) -> std::io::Result<()> {
    let agent_path = state.config.server.normalized_agent_path();
    let model = state.agent.model().to_string();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, agent_path = %agent_path, model = %model, "listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

async fn index(State(state): State<AppState>) -> Html<String> {
    Html(state.page_html.to_string())
}

async fn sidebar_js() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript; charset=utf-8")],
        SIDEBAR_JS,
    )
}

async fn sidebar_css() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/css; charset=utf-8")], SIDEBAR_CSS)
}

async fn page_config(State(state): State<AppState>) -> Json<PageConfig> {
    Json(state.page.config())
}

fn sse_event(event: &AgUiEvent) -> Event {
    Event::default().json_data(event).unwrap_or_else(|e| {
        tracing::warn!(event = event.name(), error = %e, "failed to encode event");
        Event::default().comment("encoding error")
    })
}

async fn run_agent(
    State(state): State<AppState>,
    Json(input): Json<RunAgentInput>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>> + Send + 'static> {
    let events = run_events(&state.agent, input).map(|event| Ok(sse_event(&event)));
    Sse::new(events).keep_alive(KeepAlive::default())
}

async fn ping(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "status": "ok", "model": state.agent.model() }))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "status": "healthy", "model": state.agent.model() }))
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub conversation_id: String,
    pub timestamp: String,
}

/// Fold earlier turns into a single prompt for the agent.
fn build_prompt(history: &[crate::store::StoredMessage], message: &str) -> String {
    if history.is_empty() {
        return message.to_string();
    }
    let context = history
        .iter()
        .map(|m| format!("{}: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n");
    format!("これまでの会話:\n{context}\n\nユーザー: {message}")
}

/// Run `op` against the store on the blocking pool.
async fn with_store<T, F>(state: &AppState, op: F) -> Result<T, AppError>
where
    F: FnOnce(&ConversationStore) -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    let store = Arc::clone(&state.store);
    Ok(tokio::task::spawn_blocking(move || op(&store)).await??)
}

async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    if request.message.trim().is_empty() {
        return Err(AppError::InvalidRequest(
            "message must not be empty".to_string(),
        ));
    }

    let message = request.message;
    let requested = request.conversation_id.filter(|id| !id.is_empty());
    let user_message = message.clone();
    let prepared = with_store(&state, move |store| {
        let conversation_id = match requested {
            Some(id) => {
                if !store.exists(&id)? {
                    return Ok(None);
                }
                id
            }
            None => {
                store
                    .create_conversation(&conversation_title(&user_message))?
                    .id
            }
        };
        store.save_message(&conversation_id, "user", &user_message)?;
        let history = store.messages(&conversation_id)?;
        Ok(Some((conversation_id, history)))
    })
    .await?;
    let Some((conversation_id, history)) = prepared else {
        return Err(AppError::ConversationNotFound);
    };

    let earlier = &history[..history.len().saturating_sub(1)];
    let prompt = build_prompt(earlier, &message);

    let outcome = state
        .agent
        .invoke(vec![ConversationMessage::user(prompt)])
        .await?;

    let reply = outcome.text;
    let saved_id = conversation_id.clone();
    let saved_reply = reply.clone();
    with_store(&state, move |store| {
        store.save_message(&saved_id, "assistant", &saved_reply)
    })
    .await?;
    tracing::info!(conversation_id = %conversation_id, "chat reply saved");

    Ok(Json(ChatResponse {
        response: reply,
        conversation_id,
        timestamp: Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
    }))
}

async fn list_conversations(
    State(state): State<AppState>,
) -> Result<Json<Vec<Conversation>>, AppError> {
    let conversations = with_store(&state, |store| store.list_conversations()).await?;
    Ok(Json(conversations))
}

async fn get_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ConversationDetail>, AppError> {
    with_store(&state, move |store| store.get_conversation(&id))
        .await?
        .map(Json)
        .ok_or(AppError::ConversationNotFound)
}

async fn delete_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    with_store(&state, move |store| store.delete_conversation(&id)).await?;
    Ok(Json(json!({ "status": "deleted" })))
}
