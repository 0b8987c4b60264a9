//! The chat gateway: an outward-facing facade over the orchestrator.
//!
//! Exposes `/chat/complete` and `/chat/stream` plus the static front-end.
//! Whatever goes wrong underneath, the chat surface answers with a
//! natural-language message and HTTP 200; raw errors stop here.

use axum::{
    Json, Router,
    extract::State,
    response::{
        sse::{Event, KeepAlive, Sse},
        Html, IntoResponse,
    },
    routing::{get, post},
};
use conclave_agent::{Orchestrator, TurnEvent, TurnStream};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// What the gateway says when the orchestrator cannot answer.
const APOLOGY: &str =
    "I'm sorry, I couldn't put together an answer just now. Please try again in a moment.";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Who said a line of client-held history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryRole {
    User,
    Assistant,
}

/// An incoming chat message with its client-held context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChattingRequest {
    pub question: String,
    #[serde(rename = "roomId", default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    /// Prior turns, oldest first. The server keeps nothing between turns.
    #[serde(default)]
    pub history: Vec<(HistoryRole, String)>,
}

impl ChattingRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            room_id: None,
            history: Vec::new(),
        }
    }

    /// The room id, minted fresh when the client did not send one. Doubles
    /// as the conversation id on dispatched tasks.
    pub fn room_or_new(&self) -> String {
        self.room_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string())
    }

    /// Fold the history into the utterance so the orchestrator sees the
    /// context without holding any itself.
    pub fn folded_utterance(&self) -> String {
        if self.history.is_empty() {
            return self.question.clone();
        }

        let mut folded = String::from("Conversation so far:\n");
        for (role, text) in &self.history {
            let speaker = match role {
                HistoryRole::User => "user",
                HistoryRole::Assistant => "assistant",
            };
            folded.push_str(speaker);
            folded.push_str(": ");
            folded.push_str(text);
            folded.push('\n');
        }
        folded.push_str("\nCurrent question: ");
        folded.push_str(&self.question);
        folded
    }
}

/// The gateway's answer; always well-formed, never a raw error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub message: String,
    #[serde(rename = "roomId")]
    pub room_id: String,
}

/// One streamed fragment of a chat answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatChunk {
    pub text: String,
}

/// Chat facade over an orchestrator.
pub struct ChatGateway {
    orchestrator: Arc<Orchestrator>,
    static_dir: Option<PathBuf>,
}

impl ChatGateway {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            static_dir: None,
        }
    }

    /// Serve the front-end bundle from this directory under `/static`.
    pub fn with_static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.static_dir = Some(dir.into());
        self
    }

    /// Build the Axum router for the gateway.
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        let mut router = Router::new()
            .route("/chat/complete", post(chat_complete))
            .route("/chat/stream", post(chat_stream))
            .with_state(Arc::clone(&self.orchestrator));

        if let Some(dir) = &self.static_dir {
            let index = dir.join("index.html");
            router = router
                .nest_service("/static", ServeDir::new(dir))
                .route("/index", get(move || serve_index(index.clone())));
        }

        router.layer(cors)
    }

    /// Serve on the given address until the process exits.
    pub async fn serve(self, addr: &str) -> Result<(), GatewayError> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!(address = %addr, "Chat gateway starting");

        let router = self.router();
        axum::serve(listener, router).await?;
        Ok(())
    }
}

async fn serve_index(path: PathBuf) -> impl IntoResponse {
    match tokio::fs::read_to_string(&path).await {
        Ok(contents) => Html(contents).into_response(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Front-end entry page missing");
            (axum::http::StatusCode::NOT_FOUND, "front-end not installed").into_response()
        }
    }
}

/// POST /chat/complete - one full answer
async fn chat_complete(
    State(orchestrator): State<Arc<Orchestrator>>,
    Json(request): Json<ChattingRequest>,
) -> Json<ChatResponse> {
    let room_id = request.room_or_new();
    let utterance = request.folded_utterance();
    debug!(room_id = %room_id, "Chat request");

    let message = match orchestrator.handle(&utterance, &room_id).await {
        Ok(turn) => turn.reply,
        Err(e) => {
            warn!(room_id = %room_id, error = %e, "Turn failed, degrading to apology");
            APOLOGY.to_string()
        }
    };

    Json(ChatResponse { message, room_id })
}

/// POST /chat/stream - fragments as delegates answer, then the full message
async fn chat_stream(
    State(orchestrator): State<Arc<Orchestrator>>,
    Json(request): Json<ChattingRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let room_id = request.room_or_new();
    let utterance = request.folded_utterance();
    debug!(room_id = %room_id, "Streaming chat request");

    let turn_stream = orchestrator.handle_streaming(&utterance, &room_id);
    let stream = turn_frames(turn_stream, room_id).map(|frame| Ok(frame_event(&frame)));

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// One outgoing frame of a streamed chat answer.
#[derive(Debug, Clone)]
enum StreamFrame {
    Chunk(ChatChunk),
    Done(ChatResponse),
}

/// Translate turn events into chat frames. Always ends with a `Done`
/// frame; turn errors degrade to the apology instead of surfacing.
fn turn_frames(mut turn_stream: TurnStream, room_id: String) -> impl Stream<Item = StreamFrame> {
    async_stream::stream! {
        let mut finished = false;
        while let Some(event) = turn_stream.next().await {
            match event {
                Ok(TurnEvent::Delegate { text, failed, .. }) => {
                    // Failed fragments are internal detail, not chat output.
                    if !failed {
                        yield StreamFrame::Chunk(ChatChunk { text });
                    }
                }
                Ok(TurnEvent::Completed { turn }) => {
                    yield StreamFrame::Done(ChatResponse {
                        message: turn.reply,
                        room_id: room_id.clone(),
                    });
                    finished = true;
                    break;
                }
                Err(e) => {
                    warn!(room_id = %room_id, error = %e, "Streaming turn failed, degrading to apology");
                    yield StreamFrame::Done(ChatResponse {
                        message: APOLOGY.to_string(),
                        room_id: room_id.clone(),
                    });
                    finished = true;
                    break;
                }
            }
        }
        // The driver vanished without a terminal event; never leave the
        // client hanging without a message.
        if !finished {
            yield StreamFrame::Done(ChatResponse {
                message: APOLOGY.to_string(),
                room_id: room_id.clone(),
            });
        }
    }
}

fn frame_event(frame: &StreamFrame) -> Event {
    match frame {
        StreamFrame::Chunk(chunk) => {
            let data = serde_json::to_string(chunk).unwrap_or_default();
            Event::default().event("chunk").data(data)
        }
        StreamFrame::Done(response) => {
            let data = serde_json::to_string(response).unwrap_or_default();
            Event::default().event("done").data(data)
        }
    }
}
