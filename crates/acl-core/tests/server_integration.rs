//! Drives the router end to end with a scripted provider and an in-memory
//! store.

use std::sync::Arc;

use acl_backend::mock::fixtures;
use acl_backend::{MockProvider, MockTurn};
use acl_core::agent::Agent;
use acl_core::config::Config;
use acl_core::server::{router, AppState};
use acl_core::store::ConversationStore;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

fn app_with(config: Config, turns: Vec<MockTurn>) -> (Router, Arc<MockProvider>) {
    let provider = Arc::new(MockProvider::new(turns));
    let agent = Agent::from_config(&config.agent, provider.clone());
    let store = ConversationStore::in_memory().unwrap();
    (router(AppState::new(config, agent, store)), provider)
}

fn app(turns: Vec<MockTurn>) -> (Router, Arc<MockProvider>) {
    app_with(Config::default(), turns)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_string(res: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(res: axum::response::Response) -> Value {
    serde_json::from_str(&body_string(res).await).unwrap()
}

/// The JSON payloads of every `data:` line in an SSE body.
fn sse_events(body: &str) -> Vec<Value> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| serde_json::from_str(data.trim_start()).unwrap())
        .collect()
}

fn types(events: &[Value]) -> Vec<&str> {
    events.iter().map(|e| e["type"].as_str().unwrap()).collect()
}

fn run_input(text: &str) -> Value {
    json!({
        "threadId": "thread-1",
        "runId": "run-1",
        "state": {},
        "messages": [{"id": "m1", "role": "user", "content": text}],
        "tools": [],
        "context": [],
        "forwardedProps": {"agent": "strands_agent"}
    })
}

#[tokio::test]
async fn index_serves_the_chat_page() {
    let (app, _) = app(vec![]);
    let res = app.oneshot(get("/")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/html"));

    let html = body_string(res).await;
    assert!(html.contains("<html lang=\"ja\">"));
    assert!(html.contains("<title>AgentCore Local - AG-UI</title>"));
    assert!(html.contains("id=\"acl-binding\""));
    assert!(html.contains("\"runtimeUrl\":\"/api/copilotkit\""));
    assert!(html.contains("Ollama (mock)"));
}

#[tokio::test]
async fn static_assets() {
    let (app, _) = app(vec![]);
    let res = app.clone().oneshot(get("/static/sidebar.js")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers()[header::CONTENT_TYPE],
        "application/javascript; charset=utf-8"
    );
    let js = body_string(res).await;
    assert!(js.contains("acl-binding"));
    // Every SSE payload goes through the one guarded parse site.
    assert_eq!(js.matches("handle(JSON.parse(").count(), 1);
    assert_eq!(js.matches("drain(buffer").count(), 2);
    assert_eq!(js.matches(", handleData)").count(), 2);

    let res = app.oneshot(get("/static/sidebar.css")).await.unwrap();
    assert_eq!(res.headers()[header::CONTENT_TYPE], "text/css; charset=utf-8");
}

#[tokio::test]
async fn config_endpoint() {
    let (app, _) = app(vec![]);
    let json = body_json(app.oneshot(get("/api/config")).await.unwrap()).await;
    assert_eq!(json["metadata"]["title"], "AgentCore Local - AG-UI");
    assert_eq!(json["binding"], json!({"runtimeUrl": "/api/copilotkit", "agent": "strands_agent"}));
    assert_eq!(json["sidebar"]["defaultOpen"], true);
    assert_eq!(
        json["build"]["server_external_packages"],
        json!(["pino", "pino-pretty", "thread-stream"])
    );
}

#[tokio::test]
async fn health_checks_report_the_model() {
    let (app, _) = app(vec![]);
    let ping = body_json(app.clone().oneshot(get("/ping")).await.unwrap()).await;
    assert_eq!(ping, json!({"status": "ok", "model": "mock"}));
    let health = body_json(app.oneshot(get("/health")).await.unwrap()).await;
    assert_eq!(health, json!({"status": "healthy", "model": "mock"}));
}

#[tokio::test]
async fn runtime_endpoint_streams_ag_ui_events() {
    let (app, _) = app(fixtures::time_question("今は12時です。"));
    let res = app
        .oneshot(post_json("/api/copilotkit", run_input("今何時ですか?")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let events = sse_events(&body_string(res).await);
    assert_eq!(
        types(&events),
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
    assert_eq!(events[0]["threadId"], "thread-1");
    assert_eq!(events[0]["runId"], "run-1");
    assert_eq!(events[1]["toolCallName"], "current_time");
    assert!(events[4]["content"].as_str().unwrap().ends_with("+09:00"));
    assert_eq!(events[6]["delta"], "今は12時です。");
}

#[tokio::test]
async fn agent_path_serves_the_same_run() {
    let (app, _) = app(vec![fixtures::text_reply("hello")]);
    let res = app
        .oneshot(post_json("/invocations", run_input("hi")))
        .await
        .unwrap();
    let events = sse_events(&body_string(res).await);
    assert_eq!(events.last().unwrap()["type"], "RUN_FINISHED");
}

#[tokio::test]
async fn custom_agent_path() {
    let mut config = Config::default();
    config.server.agent_path = "run/".to_string();
    let (app, _) = app_with(config, vec![fixtures::text_reply("hello")]);

    let res = app
        .clone()
        .oneshot(post_json("/run", run_input("hi")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = app
        .oneshot(post_json("/invocations", run_input("hi")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_agent_is_reported_in_stream() {
    let (app, provider) = app(vec![fixtures::text_reply("unused")]);
    let mut input = run_input("hi");
    input["forwardedProps"] = json!({"agent": "someone_else"});

    let res = app.oneshot(post_json("/api/copilotkit", input)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let events = sse_events(&body_string(res).await);
    assert_eq!(types(&events), vec!["RUN_STARTED", "RUN_ERROR"]);
    assert_eq!(events[1]["code"], "AGENT_NOT_FOUND");
    assert_eq!(provider.remaining(), 1);
}

#[tokio::test]
async fn page_binding_reaches_a_customised_agent() {
    let config: Config = toml::from_str(
        r#"
[agent]
name = "helper"
description = "time keeper"
system_prompt = "be terse"
"#,
    )
    .unwrap();
    let (app, provider) = app_with(config, vec![fixtures::text_reply("ok")]);

    let page = body_json(app.clone().oneshot(get("/api/config")).await.unwrap()).await;
    let mut input = run_input("hi");
    input["forwardedProps"] = json!({"agent": page["binding"]["agent"]});

    let res = app
        .oneshot(post_json(page["binding"]["runtimeUrl"].as_str().unwrap(), input))
        .await
        .unwrap();
    let events = sse_events(&body_string(res).await);
    assert_eq!(types(&events).last(), Some(&"RUN_FINISHED"));
    assert_eq!(provider.requests()[0].system_prompt, "be terse");
}

#[tokio::test]
async fn top_level_agent_field_is_checked() {
    let (app, _) = app(vec![fixtures::text_reply("unused")]);
    let mut input = run_input("hi");
    input["forwardedProps"] = json!({});
    input["agent"] = json!("someone_else");

    let res = app.oneshot(post_json("/api/copilotkit", input)).await.unwrap();
    let events = sse_events(&body_string(res).await);
    assert_eq!(types(&events), vec!["RUN_STARTED", "RUN_ERROR"]);
    assert_eq!(events[1]["code"], "AGENT_NOT_FOUND");
}

#[tokio::test]
async fn provider_failure_is_a_run_error() {
    let (app, _) = app(vec![fixtures::error_mid_stream("", "model not found")]);
    let res = app
        .oneshot(post_json("/api/copilotkit", run_input("hi")))
        .await
        .unwrap();
    let events = sse_events(&body_string(res).await);
    assert_eq!(types(&events), vec!["RUN_STARTED", "RUN_ERROR"]);
    assert!(events[1]["message"]
        .as_str()
        .unwrap()
        .contains("model not found"));
}

#[tokio::test]
async fn chat_creates_and_continues_a_conversation() {
    let (app, provider) = app(vec![
        fixtures::text_reply("こんにちは！"),
        fixtures::text_reply("12時です。"),
    ]);

    let res = app
        .clone()
        .oneshot(post_json("/chat", json!({"message": "こんにちは"})))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let first = body_json(res).await;
    assert_eq!(first["response"], "こんにちは！");
    let id = first["conversation_id"].as_str().unwrap().to_string();
    assert_eq!(id.len(), 20);
    assert!(first["timestamp"].as_str().is_some());

    let res = app
        .clone()
        .oneshot(post_json(
            "/chat",
            json!({"message": "今何時?", "conversation_id": id}),
        ))
        .await
        .unwrap();
    let second = body_json(res).await;
    assert_eq!(second["conversation_id"], id.as_str());

    let requests = provider.requests();
    assert_eq!(requests[0].conversation[0].content, "こんにちは");
    assert_eq!(
        requests[1].conversation[0].content,
        "これまでの会話:\nuser: こんにちは\nassistant: こんにちは！\n\nユーザー: 今何時?"
    );

    let detail = body_json(
        app.clone()
            .oneshot(get(&format!("/conversations/{id}")))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(detail["title"], "こんにちは");
    assert_eq!(detail["messages"].as_array().unwrap().len(), 4);
    assert_eq!(detail["messages"][3], json!({"role": "assistant", "content": "12時です。"}));

    let list = body_json(app.oneshot(get("/conversations")).await.unwrap()).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["id"], id.as_str());
}

#[tokio::test]
async fn chat_rejects_empty_message() {
    let (app, _) = app(vec![]);
    let res = app
        .oneshot(post_json("/chat", json!({"message": "   "})))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body_json(res).await["detail"].is_string());
}

#[tokio::test]
async fn chat_with_unknown_conversation() {
    let (app, _) = app(vec![]);
    let res = app
        .oneshot(post_json(
            "/chat",
            json!({"message": "hi", "conversation_id": "19700101000000000000"}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(res).await, json!({"detail": "Conversation not found"}));
}

#[tokio::test]
async fn chat_agent_failure() {
    let (app, _) = app(vec![fixtures::error_mid_stream("", "connection refused")]);
    let res = app
        .oneshot(post_json("/chat", json!({"message": "hi"})))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let detail = body_json(res).await["detail"].as_str().unwrap().to_string();
    assert!(detail.starts_with("Agent error: "));
    assert!(detail.contains("connection refused"));
}

#[tokio::test]
async fn missing_conversation_is_404() {
    let (app, _) = app(vec![]);
    let res = app.oneshot(get("/conversations/nope")).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(res).await, json!({"detail": "Conversation not found"}));
}

#[tokio::test]
async fn delete_is_idempotent() {
    let (app, _) = app(vec![fixtures::text_reply("ok")]);
    let created = body_json(
        app.clone()
            .oneshot(post_json("/chat", json!({"message": "hi"})))
            .await
            .unwrap(),
    )
    .await;
    let uri = format!("/conversations/{}", created["conversation_id"].as_str().unwrap());

    for _ in 0..2 {
        let req = Request::builder()
            .method("DELETE")
            .uri(&uri)
            .body(Body::empty())
            .unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res).await, json!({"status": "deleted"}));
    }

    let res = app.oneshot(get(&uri)).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cors_is_permissive() {
    let (app, _) = app(vec![]);
    let req = Request::builder()
        .method("OPTIONS")
        .uri("/api/copilotkit")
        .header(header::ORIGIN, "http://localhost:3000")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}
