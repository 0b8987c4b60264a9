//! Role entrypoints for the conclave binary.

use crate::config::{CatalogKind, NodeConfig};
use conclave_a2a::{AgentServer, AgentSkill};
use conclave_agent::{
    AgentError, AgentRoster, Delegate, DomainAgent, KeywordPlanner, KeywordReasoner, Orchestrator,
    RemoteDelegate,
};
use conclave_gateway::{ChatGateway, GatewayError};
use conclave_tools::{
    HttpToolClient, ProductLookupTool, ProductStore, ToolError, ToolRegistry, ToolServer,
    ToolTransport, UserLookupTool, UserStore,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const DEFAULT_TOOL_LISTEN: &str = "0.0.0.0:9011";
const DEFAULT_AGENT_LISTEN: &str = "0.0.0.0:9101";
const DEFAULT_GATEWAY_LISTEN: &str = "0.0.0.0:9200";

pub async fn run_tool_server(config: NodeConfig) -> Result<(), ToolError> {
    let registry = match config.catalog {
        CatalogKind::User => ToolRegistry::new().register(UserLookupTool::new(UserStore::seeded())),
        CatalogKind::Product => {
            ToolRegistry::new().register(ProductLookupTool::new(ProductStore::seeded()))
        }
        CatalogKind::All => ToolRegistry::new()
            .register(UserLookupTool::new(UserStore::seeded()))
            .register(ProductLookupTool::new(ProductStore::seeded())),
    };

    let listen = config.listen.as_deref().unwrap_or(DEFAULT_TOOL_LISTEN);
    ToolServer::new(registry).serve(listen).await
}

pub async fn run_agent(config: NodeConfig) -> Result<(), AgentError> {
    let tool_server = config
        .tool_server
        .as_deref()
        .unwrap_or("http://localhost:9011");
    let listen = config.listen.as_deref().unwrap_or(DEFAULT_AGENT_LISTEN);
    let name = config.agent_name.as_deref().unwrap_or("domain-agent");

    let transport = Arc::new(HttpToolClient::new(tool_server)?);

    // Advertise one skill per tool the server actually has.
    let schemas = transport.list_schemas().await?;
    info!(agent = %name, tools = schemas.len(), "Fetched tool schemas");

    let mut agent = DomainAgent::new(
        name,
        format!("http://{}", listen),
        Arc::new(KeywordReasoner::new()),
        transport,
    );
    for schema in &schemas {
        let subject = schema.name.strip_prefix("lookup_").unwrap_or(&schema.name);
        let mut skill = AgentSkill::new(&schema.name, &schema.name).with_tag(subject);
        if let Some(description) = &schema.description {
            skill = skill.with_description(description);
        }
        agent = agent.with_skill(skill);
    }

    AgentServer::new(agent).serve(listen).await?;
    Ok(())
}

pub async fn run_orchestrator(config: NodeConfig) -> Result<(), GatewayError> {
    let listen = config.listen.as_deref().unwrap_or(DEFAULT_GATEWAY_LISTEN);

    let descriptors = match AgentRoster::discover(&config.agents).await {
        Ok(descriptors) => descriptors,
        Err(e) => {
            // Come up anyway; the gateway degrades until agents appear.
            tracing::warn!(error = %e, "Delegate discovery failed, starting with an empty roster");
            Vec::new()
        }
    };

    let mut orchestrator = Orchestrator::new(Arc::new(KeywordPlanner::new()));
    for descriptor in descriptors {
        match RemoteDelegate::new(descriptor.clone()) {
            Ok(delegate) => {
                orchestrator = orchestrator.with_delegate(Arc::new(delegate) as Arc<dyn Delegate>);
            }
            Err(e) => {
                tracing::warn!(agent = %descriptor.name, error = %e, "Skipping delegate");
            }
        }
    }
    if let Some(secs) = config.task_timeout_secs {
        orchestrator = orchestrator.with_task_timeout(Duration::from_secs(secs));
    }

    let mut gateway = ChatGateway::new(Arc::new(orchestrator));
    if let Some(dir) = &config.static_dir {
        gateway = gateway.with_static_dir(dir);
    }

    gateway.serve(listen).await
}
