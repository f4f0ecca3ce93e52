use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;

use acl_backend::{AgUiClient, OllamaClient};
use acl_core::agent::Agent;
use acl_core::cli::{Cli, Command};
use acl_core::config::Config;
use acl_core::server::{self, AppState};
use acl_core::store::ConversationStore;
use acl_protocol::{AgUiEvent, RunAgentInput};
use anyhow::{bail, Context};
use clap::Parser;
use futures::StreamExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref());

    match cli.resolved_command() {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            run_server(config).await
        }
        Command::Ask {
            message,
            url,
            thread,
        } => ask(&url, &message, thread).await,
    }
}

async fn run_server(config: Config) -> anyhow::Result<()> {
    let ollama = OllamaClient::new(&config.ollama.host, &config.ollama.model)
        .context("failed to build Ollama client")?
        .with_think(config.ollama.think);

    match ollama.list_models().await {
        Ok(models) if !models.iter().any(|m| *m == config.ollama.model) => {
            tracing::warn!(
                model = %config.ollama.model,
                installed = ?models,
                "model is not installed, run `ollama pull {}`",
                config.ollama.model
            );
        }
        Ok(_) => {}
        Err(e) => tracing::warn!(host = %ollama.host(), error = %e, "Ollama is not reachable yet"),
    }

    let db_path = config.storage.resolve_db_path();
    let store = ConversationStore::open(&db_path)
        .with_context(|| format!("failed to open {}", db_path.display()))?;
    tracing::info!(path = %db_path.display(), "conversation store opened");

    let agent = Agent::from_config(&config.agent, Arc::new(ollama));
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "invalid bind address {}:{}",
                config.server.host, config.server.port
            )
        })?;

    server::serve(AppState::new(config, agent, store), addr)
        .await
        .context("server error")
}

async fn ask(url: &str, message: &str, thread: Option<String>) -> anyhow::Result<()> {
    let client = AgUiClient::new(url)?;
    let mut input = RunAgentInput::from_user_text(uuid::Uuid::new_v4().to_string(), message);
    input.thread_id = thread;

    let events = client.run(&input);
    let mut events = std::pin::pin!(events);
    let mut stdout = std::io::stdout();
    while let Some(event) = events.next().await {
        match event? {
            AgUiEvent::TextMessageContent { delta, .. } => {
                write!(stdout, "{delta}")?;
                stdout.flush()?;
            }
            AgUiEvent::TextMessageEnd { .. } => writeln!(stdout)?,
            AgUiEvent::ToolCallStart { tool_call_name, .. } => {
                tracing::info!(tool = %tool_call_name, "tool call");
            }
            AgUiEvent::RunFinished { thread_id, .. } => {
                tracing::debug!(thread_id = %thread_id, "run finished");
                return Ok(());
            }
            AgUiEvent::RunError { message, code } => {
                bail!("run failed ({}): {message}", code.as_deref().unwrap_or("UNKNOWN"));
            }
            _ => {}
        }
    }
    bail!("server closed the stream before the run finished")
}
