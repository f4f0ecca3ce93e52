//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub const DEFAULT_ASK_URL: &str = "http://localhost:8000/api/copilotkit";

/// Local agent runtime speaking AG-UI, backed by Ollama.
#[derive(Parser, Debug)]
#[command(name = "agentcore-local", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file. Defaults to ~/.config/agentcore-local/config.toml.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Run the HTTP server (default).
    Serve {
        /// Address to bind, overriding config and AGENT_HOST.
        #[arg(long)]
        host: Option<String>,

        /// Port to bind, overriding config and AGENT_PORT.
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Send one message to a running server and print the reply.
    Ask {
        message: String,

        /// AG-UI run endpoint.
        #[arg(long, default_value = DEFAULT_ASK_URL)]
        url: String,

        /// Thread to continue.
        #[arg(long)]
        thread: Option<String>,
    },
}

impl Cli {
    /// The subcommand, with `serve` when none was given.
    pub fn resolved_command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Serve {
            host: None,
            port: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_serve() {
        let cli = Cli::try_parse_from(["agentcore-local"]).unwrap();
        assert_eq!(
            cli.resolved_command(),
            Command::Serve {
                host: None,
                port: None
            }
        );
    }

    #[test]
    fn serve_flags() {
        let cli = Cli::try_parse_from([
            "agentcore-local",
            "serve",
            "--host",
            "127.0.0.1",
            "-p",
            "9000",
            "--config",
            "/tmp/c.toml",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.toml")));
        assert_eq!(
            cli.resolved_command(),
            Command::Serve {
                host: Some("127.0.0.1".to_string()),
                port: Some(9000)
            }
        );
    }

    #[test]
    fn ask_defaults_to_local_runtime() {
        let cli = Cli::try_parse_from(["agentcore-local", "ask", "今何時ですか?"]).unwrap();
        assert_eq!(
            cli.resolved_command(),
            Command::Ask {
                message: "今何時ですか?".to_string(),
                url: DEFAULT_ASK_URL.to_string(),
                thread: None,
            }
        );
    }

    #[test]
    fn ask_requires_a_message() {
        assert!(Cli::try_parse_from(["agentcore-local", "ask"]).is_err());
    }
}
