//! Launcher for conclave nodes.
//!
//! One binary runs any of the three roles: a tool server, a domain agent,
//! or the orchestrator with its chat gateway.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

mod config;
mod roles;

use config::{CatalogKind, ConfigError, NodeConfig};

#[derive(Parser, Debug)]
#[command(name = "conclave", version)]
#[command(about = "Multi-agent chat orchestration nodes")]
struct Cli {
    /// YAML config file; flags override its values
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve a seeded tool catalog over HTTP
    ToolServer {
        /// Bind address
        #[arg(long)]
        listen: Option<String>,
        /// Catalog to expose (user, product, all)
        #[arg(long)]
        catalog: Option<String>,
    },
    /// Serve a domain agent backed by a tool server
    Agent {
        /// Bind address
        #[arg(long)]
        listen: Option<String>,
        /// Tool server endpoint
        #[arg(long)]
        tool_server: Option<String>,
        /// Agent display name
        #[arg(long)]
        name: Option<String>,
    },
    /// Serve the orchestrator and its chat gateway
    Orchestrator {
        /// Bind address
        #[arg(long)]
        listen: Option<String>,
        /// Delegate agent endpoints (repeatable)
        #[arg(long = "agent")]
        agents: Vec<String>,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Unknown catalog '{0}' (expected user, product or all)")]
    UnknownCatalog(String),
    #[error(transparent)]
    Tool(#[from] conclave_tools::ToolError),
    #[error(transparent)]
    Protocol(#[from] conclave_a2a::A2aError),
    #[error(transparent)]
    Agent(#[from] conclave_agent::AgentError),
    #[error(transparent)]
    Gateway(#[from] conclave_gateway::GatewayError),
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => NodeConfig::load(path)?,
        None => NodeConfig::default(),
    };

    match cli.command {
        Commands::ToolServer { listen, catalog } => {
            if let Some(listen) = listen {
                config.listen = Some(listen);
            }
            if let Some(catalog) = catalog {
                config.catalog = parse_catalog(&catalog)?;
            }
            roles::run_tool_server(config).await?;
        }
        Commands::Agent {
            listen,
            tool_server,
            name,
        } => {
            if let Some(listen) = listen {
                config.listen = Some(listen);
            }
            if let Some(tool_server) = tool_server {
                config.tool_server = Some(tool_server);
            }
            if let Some(name) = name {
                config.agent_name = Some(name);
            }
            roles::run_agent(config).await?;
        }
        Commands::Orchestrator { listen, agents } => {
            if let Some(listen) = listen {
                config.listen = Some(listen);
            }
            if !agents.is_empty() {
                config.agents = agents;
            }
            roles::run_orchestrator(config).await?;
        }
    }

    Ok(())
}

fn parse_catalog(value: &str) -> Result<CatalogKind, CliError> {
    match value {
        "user" => Ok(CatalogKind::User),
        "product" => Ok(CatalogKind::Product),
        "all" => Ok(CatalogKind::All),
        other => Err(CliError::UnknownCatalog(other.to_string())),
    }
}
