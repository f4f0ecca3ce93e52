use serde::Deserialize;
use std::path::{Path, PathBuf};

use acl_backend::ollama::{DEFAULT_HOST, DEFAULT_MODEL};

use crate::agent::DEFAULT_SYSTEM_PROMPT;

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub ollama: OllamaConfig,
    pub agent: AgentConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind.
    pub host: String,
    pub port: u16,
    /// Extra path serving the AG-UI run endpoint, next to `/api/copilotkit`.
    pub agent_path: String,
    /// Allow any origin, method and header.
    pub permissive_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            agent_path: "/invocations".to_string(),
            permissive_cors: true,
        }
    }
}

impl ServerConfig {
    /// `agent_path` with exactly one leading slash and no trailing slash.
    pub fn normalized_agent_path(&self) -> String {
        let trimmed = self.agent_path.trim().trim_matches('/');
        format!("/{trimmed}")
    }
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct OllamaConfig {
    pub host: String,
    pub model: String,
    /// Ask reasoning models to think (true) or answer directly (false).
    /// Unset leaves the model's default.
    pub think: Option<bool>,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            model: DEFAULT_MODEL.to_string(),
            think: None,
        }
    }
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    pub description: String,
    pub system_prompt: String,
    /// Model turns allowed per run before giving up.
    pub max_iterations: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            description: "A helpful assistant powered by Strands and Ollama".to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_iterations: 8,
        }
    }
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Custom database path. Defaults to ~/.local/share/agentcore-local/conversations.db.
    pub db_path: Option<String>,
}

impl StorageConfig {
    /// Resolve the database path, using the configured path or the XDG default.
    pub fn resolve_db_path(&self) -> PathBuf {
        if let Some(ref custom) = self.db_path {
            return PathBuf::from(custom);
        }

        let base = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".local").join("share")
            });
        base.join("agentcore-local").join("conversations.db")
    }
}

impl Config {
    /// Load the config file (explicit path or the XDG default), then apply
    /// environment overrides. A missing file means defaults; a malformed one
    /// is reported and ignored.
    pub fn load(path: Option<&Path>) -> Self {
        let path = path.map(Path::to_path_buf).unwrap_or_else(config_path);
        let mut config = match std::fs::read_to_string(&path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "failed to parse config, using defaults");
                Config::default()
            }),
            Err(_) => Config::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup("OLLAMA_HOST") {
            self.ollama.host = host;
        }
        if let Some(model) = lookup("OLLAMA_MODEL") {
            self.ollama.model = model;
        }
        if let Some(path) = lookup("AGENT_PATH") {
            self.server.agent_path = path;
        }
        if let Some(host) = lookup("AGENT_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("AGENT_PORT") {
            match port.trim().parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!(value = %port, "ignoring invalid AGENT_PORT"),
            }
        }
        if let Some(db_path) = lookup("AGENTCORE_DB_PATH") {
            self.storage.db_path = Some(db_path);
        }
    }
}

fn config_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("agentcore-local").join("config.toml")
}
