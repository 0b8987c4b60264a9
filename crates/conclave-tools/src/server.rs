//! HTTP surface for a tool registry.
//!
//! `GET /tools` publishes the schemas for startup introspection;
//! `POST /tools/invoke` runs a lookup. Tool-level faults are reported in
//! the result body, not as HTTP errors, so callers always get a
//! [`ToolResult`] back from a live server.

use crate::error::ToolError;
use crate::registry::{InvokeRequest, ToolRegistry, ToolResult};
use crate::schema::ToolSchema;
use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info, warn};

/// HTTP tool server around an in-memory registry.
pub struct ToolServer {
    registry: Arc<ToolRegistry>,
}

impl ToolServer {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    /// Build the Axum router for this server.
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .route("/tools", get(list_tools))
            .route("/tools/invoke", post(invoke_tool))
            .with_state(Arc::clone(&self.registry))
            .layer(cors)
    }

    /// Serve on the given address until the process exits.
    pub async fn serve(self, addr: &str) -> Result<(), ToolError> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ToolError::unreachable(format!("Failed to bind to {}: {}", addr, e)))?;

        info!(address = %addr, tools = self.registry.schemas().len(), "Tool server starting");

        let router = self.router();
        axum::serve(listener, router)
            .await
            .map_err(|e| ToolError::protocol(format!("Server error: {}", e)))?;

        Ok(())
    }
}

/// GET /tools - published tool schemas
async fn list_tools(State(registry): State<Arc<ToolRegistry>>) -> Json<Vec<ToolSchema>> {
    Json(registry.schemas())
}

/// POST /tools/invoke - validate and run a lookup
async fn invoke_tool(
    State(registry): State<Arc<ToolRegistry>>,
    Json(request): Json<InvokeRequest>,
) -> Json<ToolResult> {
    debug!(tool = %request.tool, "Invoke request");

    let result = match registry.invoke(&request.tool, &request.arguments) {
        Ok(lookup) => ToolResult::from_lookup(&request.tool, lookup),
        Err(err) => {
            warn!(tool = %request.tool, error = %err, "Tool invocation failed");
            ToolResult::fault(&request.tool, &err)
        }
    };

    Json(result)
}
