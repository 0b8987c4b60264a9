//! Agent-invocation protocol server.
//!
//! Exposes a domain agent over HTTP: agent card discovery, task dispatch
//! (complete and streaming) and best-effort cancellation. Implement
//! [`AgentHandler`] to define how the agent serves a task.

use crate::error::{A2aError, A2aResult, ErrorResponse};
use crate::types::{AgentCard, AgentResponse, CancelAck, TaskEvent, TaskRequest};
use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use futures::Stream;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};
use tokio::task::AbortHandle;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error, info, warn};

/// Size of broadcast channels for streaming events
const BROADCAST_CHANNEL_SIZE: usize = 64;

/// Trait for implementing domain agent behavior behind the protocol server.
#[async_trait]
pub trait AgentHandler: Send + Sync + 'static {
    /// Get the agent card describing this agent's capabilities.
    fn agent_card(&self) -> AgentCard;

    /// Serve a task and produce the final response.
    ///
    /// Returning `Err` surfaces to the caller as a `failed` response; the
    /// raw error text is logged, not forwarded.
    async fn handle_task(&self, request: TaskRequest) -> Result<AgentResponse, String>;

    /// Serve a task with streaming updates.
    ///
    /// Emit [`TaskEvent::Chunk`] events on `event_tx` as partial text
    /// becomes available; the server appends the terminal `done` marker.
    /// The default implementation delegates to [`AgentHandler::handle_task`].
    async fn handle_task_streaming(
        &self,
        request: TaskRequest,
        _event_tx: broadcast::Sender<TaskEvent>,
    ) -> Result<AgentResponse, String> {
        self.handle_task(request).await
    }

    /// Called when a task is cancelled, after the in-flight work is aborted.
    async fn on_cancel(&self, _task_id: &str) {}
}

/// Shared application state
struct AppState<H: AgentHandler> {
    handler: Arc<H>,
    inflight: Arc<RwLock<HashMap<String, AbortHandle>>>,
}

impl<H: AgentHandler> Clone for AppState<H> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            inflight: Arc::clone(&self.inflight),
        }
    }
}

/// Agent-invocation protocol server.
pub struct AgentServer<H: AgentHandler> {
    handler: Arc<H>,
    inflight: Arc<RwLock<HashMap<String, AbortHandle>>>,
}

impl<H: AgentHandler> AgentServer<H> {
    /// Create a new server around the given handler.
    pub fn new(handler: H) -> Self {
        Self {
            handler: Arc::new(handler),
            inflight: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of tasks currently in flight.
    pub async fn inflight_count(&self) -> usize {
        self.inflight.read().await.len()
    }

    /// Build the Axum router for this server.
    pub fn router(&self) -> Router {
        let state = AppState {
            handler: Arc::clone(&self.handler),
            inflight: Arc::clone(&self.inflight),
        };

        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .route("/.well-known/agent.json", get(get_agent_card::<H>))
            .route("/tasks/send", post(send_task::<H>))
            .route("/tasks/sendSubscribe", post(send_task_subscribe::<H>))
            .route("/tasks/{task_id}/cancel", post(cancel_task::<H>))
            .with_state(state)
            .layer(cors)
    }

    /// Serve on the given address until the process exits.
    pub async fn serve(self, addr: &str) -> A2aResult<()> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| A2aError::internal(format!("Failed to bind to {}: {}", addr, e)))?;

        let card = self.handler.agent_card();
        info!(agent = %card.name, address = %addr, "Agent server starting");

        let router = self.router();
        axum::serve(listener, router)
            .await
            .map_err(|e| A2aError::internal(format!("Server error: {}", e)))?;

        Ok(())
    }
}

// =============================================================================
// Route Handlers
// =============================================================================

/// GET /.well-known/agent.json - agent card discovery
async fn get_agent_card<H: AgentHandler>(State(state): State<AppState<H>>) -> Json<AgentCard> {
    let card = state.handler.agent_card();
    debug!(agent = %card.name, "Serving agent card");
    Json(card)
}

/// POST /tasks/send - dispatch a task, blocking until the response
async fn send_task<H: AgentHandler>(
    State(state): State<AppState<H>>,
    Json(request): Json<TaskRequest>,
) -> Result<Json<AgentResponse>, A2aErrorResponse> {
    let task_id = request.task_id.clone();
    debug!(task_id = %task_id, "Received task");

    // Register before spawning so the duplicate-dispatch guard holds.
    let join = {
        let mut inflight = state.inflight.write().await;
        if inflight.contains_key(&task_id) {
            return Err(A2aError::task_already_running(&task_id).into());
        }
        let handler = Arc::clone(&state.handler);
        let join = tokio::spawn(async move { handler.handle_task(request).await });
        inflight.insert(task_id.clone(), join.abort_handle());
        join
    };

    let result = join.await;
    state.inflight.write().await.remove(&task_id);

    match result {
        Ok(Ok(response)) => {
            debug!(task_id = %task_id, status = %response.status, "Task served");
            Ok(Json(response))
        }
        Ok(Err(e)) => {
            error!(task_id = %task_id, error = %e, "Handler error");
            Ok(Json(AgentResponse::failed(
                &task_id,
                "The agent could not complete this task.",
            )))
        }
        Err(join_err) if join_err.is_cancelled() => {
            info!(task_id = %task_id, "Task cancelled mid-flight");
            Ok(Json(AgentResponse::failed(&task_id, "Task was cancelled.")))
        }
        Err(join_err) => Err(A2aError::internal(format!("Task panicked: {}", join_err)).into()),
    }
}

/// POST /tasks/sendSubscribe - dispatch a task with a streaming response
async fn send_task_subscribe<H: AgentHandler>(
    State(state): State<AppState<H>>,
    Json(request): Json<TaskRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, A2aErrorResponse> {
    let task_id = request.task_id.clone();
    debug!(task_id = %task_id, "Received streaming task");

    let (event_tx, event_rx) = broadcast::channel(BROADCAST_CHANNEL_SIZE);

    {
        let mut inflight = state.inflight.write().await;
        if inflight.contains_key(&task_id) {
            return Err(A2aError::task_already_running(&task_id).into());
        }

        let handler = Arc::clone(&state.handler);
        let inflight_map = Arc::clone(&state.inflight);
        let tx = event_tx.clone();
        let driver_task_id = task_id.clone();

        let join = tokio::spawn(async move {
            let response = match handler.handle_task_streaming(request, tx.clone()).await {
                Ok(response) => response,
                Err(e) => {
                    error!(task_id = %driver_task_id, error = %e, "Handler error");
                    AgentResponse::failed(
                        &driver_task_id,
                        "The agent could not complete this task.",
                    )
                }
            };
            let _ = tx.send(TaskEvent::done(response));
            inflight_map.write().await.remove(&driver_task_id);
        });
        inflight.insert(task_id.clone(), join.abort_handle());
    }

    let stream = create_sse_stream(event_rx);
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// POST /tasks/{task_id}/cancel - best-effort cancellation
async fn cancel_task<H: AgentHandler>(
    State(state): State<AppState<H>>,
    Path(task_id): Path<String>,
) -> Json<CancelAck> {
    let handle = state.inflight.write().await.remove(&task_id);
    let cancelled = match handle {
        Some(handle) => {
            handle.abort();
            state.handler.on_cancel(&task_id).await;
            info!(task_id = %task_id, "Task cancelled");
            true
        }
        None => {
            warn!(task_id = %task_id, "Cancel for unknown or finished task");
            false
        }
    };

    Json(CancelAck { task_id, cancelled })
}

// =============================================================================
// Error Response
// =============================================================================

/// Wrapper for protocol errors that implements IntoResponse
struct A2aErrorResponse(A2aError);

impl From<A2aError> for A2aErrorResponse {
    fn from(err: A2aError) -> Self {
        Self(err)
    }
}

impl IntoResponse for A2aErrorResponse {
    fn into_response(self) -> Response {
        let error_response: ErrorResponse = self.0.into();
        let status =
            StatusCode::from_u16(error_response.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(error_response)).into_response()
    }
}

// =============================================================================
// SSE helpers
// =============================================================================

/// Create an SSE stream from a broadcast receiver; ends after the terminal
/// event or when the sender side is dropped (e.g. the task was aborted).
fn create_sse_stream(
    rx: broadcast::Receiver<TaskEvent>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        let mut rx = rx;
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let is_terminal = event.is_terminal();
                    yield Ok(task_event_to_sse(&event));
                    if is_terminal {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
            }
        }
    }
}

/// Convert a TaskEvent into an SSE Event.
#[inline]
fn task_event_to_sse(event: &TaskEvent) -> Event {
    let data = serde_json::to_string(event).unwrap_or_default();
    let event_type = match event {
        TaskEvent::Chunk { .. } => "chunk",
        TaskEvent::Done { .. } => "done",
    };
    Event::default().event(event_type).data(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AgentSkill;

    struct EchoHandler;

    #[async_trait]
    impl AgentHandler for EchoHandler {
        fn agent_card(&self) -> AgentCard {
            AgentCard::new("echo-agent", "http://localhost:3000")
                .with_description("A test agent")
                .with_skill(AgentSkill::new("echo", "Echo").with_tag("echo"))
        }

        async fn handle_task(&self, request: TaskRequest) -> Result<AgentResponse, String> {
            Ok(AgentResponse::ok(
                request.task_id,
                format!("Echo: {}", request.instruction),
            ))
        }
    }

    #[tokio::test]
    async fn test_handler_serves_task() {
        let handler = EchoHandler;
        let request = TaskRequest::with_id("t-1", "Hello!", "conv-1");
        let response = handler.handle_task(request).await.unwrap();

        assert_eq!(response.task_id, "t-1");
        assert_eq!(response.text, "Echo: Hello!");
        assert_eq!(response.status, crate::types::ResponseStatus::Ok);
    }

    #[test]
    fn test_server_creation() {
        let server = AgentServer::new(EchoHandler);
        let _router = server.router();
    }

    #[test]
    fn test_error_response_status() {
        let response: A2aErrorResponse = A2aError::task_already_running("t-1").into();
        let axum_response = response.into_response();
        assert_eq!(axum_response.status(), StatusCode::CONFLICT);
    }
}
