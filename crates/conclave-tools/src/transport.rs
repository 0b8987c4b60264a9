//! Transport seam between agents and tool servers.
//!
//! Agents talk to tools through [`ToolTransport`] so tests can swap the
//! HTTP client for an in-process registry.

use crate::error::ToolError;
use crate::registry::{InvokeRequest, Lookup, ToolRegistry, ToolResult};
use crate::schema::ToolSchema;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// How an agent reaches its tools.
#[async_trait]
pub trait ToolTransport: Send + Sync {
    /// Fetch the schemas of every tool behind this transport.
    async fn list_schemas(&self) -> Result<Vec<ToolSchema>, ToolError>;

    /// Invoke a tool by name. Tool-level faults come back as typed errors;
    /// a miss is `Ok(Lookup::Miss)`.
    async fn invoke(&self, tool: &str, arguments: Value) -> Result<Lookup, ToolError>;
}

/// HTTP client for a remote tool server.
#[derive(Clone)]
pub struct HttpToolClient {
    base_url: Url,
    client: reqwest::Client,
}

impl HttpToolClient {
    pub fn new(base_url: impl AsRef<str>) -> Result<Self, ToolError> {
        let base_url = Url::parse(base_url.as_ref())?;
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| ToolError::protocol(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

#[async_trait]
impl ToolTransport for HttpToolClient {
    async fn list_schemas(&self) -> Result<Vec<ToolSchema>, ToolError> {
        let url = self.base_url.join("/tools")?;
        debug!(url = %url, "Listing tools");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ToolError::unreachable(format!("Connection failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ToolError::protocol(format!(
                "Tool server returned HTTP {}",
                response.status()
            )));
        }

        response
            .json::<Vec<ToolSchema>>()
            .await
            .map_err(|e| ToolError::protocol(format!("Invalid schema list: {}", e)))
    }

    async fn invoke(&self, tool: &str, arguments: Value) -> Result<Lookup, ToolError> {
        let url = self.base_url.join("/tools/invoke")?;
        let request = InvokeRequest::new(tool, arguments);

        let response = self
            .client
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ToolError::unreachable(format!("Connection failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ToolError::protocol(format!(
                "Tool server returned HTTP {}",
                response.status()
            )));
        }

        let result = response
            .json::<ToolResult>()
            .await
            .map_err(|e| ToolError::protocol(format!("Invalid invoke response: {}", e)))?;

        result.into_lookup()
    }
}

/// In-process transport over a registry, for tests and single-process runs.
#[derive(Clone)]
pub struct LocalTransport {
    registry: Arc<ToolRegistry>,
}

impl LocalTransport {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }
}

#[async_trait]
impl ToolTransport for LocalTransport {
    async fn list_schemas(&self) -> Result<Vec<ToolSchema>, ToolError> {
        Ok(self.registry.schemas())
    }

    async fn invoke(&self, tool: &str, arguments: Value) -> Result<Lookup, ToolError> {
        self.registry.invoke(tool, &arguments)
    }
}
