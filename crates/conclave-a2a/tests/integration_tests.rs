//! Integration tests for agent client/server interaction
//!
//! Spins up a real server on an ephemeral port and exercises card
//! discovery, task dispatch, streaming, duplicate rejection and cancel.

#![cfg(all(feature = "client", feature = "server"))]

use async_trait::async_trait;
use conclave_a2a::{
    AgentCard, AgentClient, AgentHandler, AgentResponse, AgentServer, AgentSkill, ResponseStatus,
    TaskEvent, TaskRequest,
};
use futures::StreamExt;
use std::net::TcpListener;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;

// =============================================================================
// Test Agent Handlers
// =============================================================================

/// Echoes the instruction back as the answer.
struct EchoAgent;

#[async_trait]
impl AgentHandler for EchoAgent {
    fn agent_card(&self) -> AgentCard {
        AgentCard::new("echo-agent", "http://localhost")
            .with_description("An agent that echoes instructions back")
            .with_skill(AgentSkill::new("echo", "Echo").with_tag("echo"))
    }

    async fn handle_task(&self, request: TaskRequest) -> Result<AgentResponse, String> {
        Ok(AgentResponse::ok(
            request.task_id,
            format!("Echo: {}", request.instruction),
        ))
    }
}

/// Streams the instruction word by word before the final response.
struct StreamingAgent;

#[async_trait]
impl AgentHandler for StreamingAgent {
    fn agent_card(&self) -> AgentCard {
        AgentCard::new("streaming-agent", "http://localhost").with_streaming()
    }

    async fn handle_task(&self, request: TaskRequest) -> Result<AgentResponse, String> {
        Ok(AgentResponse::ok(request.task_id, request.instruction))
    }

    async fn handle_task_streaming(
        &self,
        request: TaskRequest,
        event_tx: broadcast::Sender<TaskEvent>,
    ) -> Result<AgentResponse, String> {
        let mut full = String::new();
        for word in request.instruction.split_whitespace() {
            let _ = event_tx.send(TaskEvent::chunk(&request.task_id, word));
            full.push_str(word);
            full.push(' ');
        }
        Ok(AgentResponse::ok(request.task_id, full.trim_end()))
    }
}

/// Sleeps long enough to be cancelled or observed as in flight.
struct SlowAgent;

#[async_trait]
impl AgentHandler for SlowAgent {
    fn agent_card(&self) -> AgentCard {
        AgentCard::new("slow-agent", "http://localhost")
    }

    async fn handle_task(&self, request: TaskRequest) -> Result<AgentResponse, String> {
        tokio::time::sleep(Duration::from_secs(10)).await;
        Ok(AgentResponse::ok(request.task_id, "finally done"))
    }
}

/// Counts how many times its card is requested.
struct CountingAgent {
    card_hits: Arc<AtomicUsize>,
}

#[async_trait]
impl AgentHandler for CountingAgent {
    fn agent_card(&self) -> AgentCard {
        self.card_hits.fetch_add(1, Ordering::SeqCst);
        AgentCard::new("counting-agent", "http://localhost")
    }

    async fn handle_task(&self, request: TaskRequest) -> Result<AgentResponse, String> {
        Ok(AgentResponse::ok(request.task_id, "counted"))
    }
}

/// Always returns a handler-level error.
struct FailingAgent;

#[async_trait]
impl AgentHandler for FailingAgent {
    fn agent_card(&self) -> AgentCard {
        AgentCard::new("failing-agent", "http://localhost")
    }

    async fn handle_task(&self, _request: TaskRequest) -> Result<AgentResponse, String> {
        Err("simulated backend outage".to_string())
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Start a server on an ephemeral port, returning its base URL.
async fn spawn_server<H: AgentHandler>(handler: H) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let server = AgentServer::new(handler);
    let bind_addr = addr.to_string();
    tokio::spawn(async move {
        server.serve(&bind_addr).await.expect("server run");
    });

    // Give the server a moment to bind.
    tokio::time::sleep(Duration::from_millis(100)).await;
    format!("http://{}", addr)
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_agent_card_discovery() {
    let url = spawn_server(EchoAgent).await;
    let client = AgentClient::new(&url).expect("client");

    let card = client.get_agent_card().await.expect("card");
    assert_eq!(card.name, "echo-agent");
    assert_eq!(card.skills.len(), 1);
    assert!(card.capability_tags().contains(&"echo".to_string()));
    assert!(!card.capabilities.streaming);
}

#[tokio::test]
async fn test_agent_card_cached_after_first_fetch() {
    let card_hits = Arc::new(AtomicUsize::new(0));
    let url = spawn_server(CountingAgent {
        card_hits: Arc::clone(&card_hits),
    })
    .await;
    let client = AgentClient::new(&url).expect("client");

    let first = client.get_agent_card().await.expect("card");
    let hits_after_first = card_hits.load(Ordering::SeqCst);

    let second = client.get_agent_card().await.expect("card");
    assert_eq!(first, second);
    // The second discovery is served from the cache, not the server.
    assert_eq!(card_hits.load(Ordering::SeqCst), hits_after_first);

    // Clones share the cache.
    let clone = client.clone();
    clone.get_agent_card().await.expect("card");
    assert_eq!(card_hits.load(Ordering::SeqCst), hits_after_first);
}

#[tokio::test]
async fn test_send_task_round_trip() {
    let url = spawn_server(EchoAgent).await;
    let client = AgentClient::new(&url).expect("client");

    let request = TaskRequest::with_id("task-1", "hello there", "conv-1");
    let response = client.send_task(&request).await.expect("response");

    assert_eq!(response.task_id, "task-1");
    assert_eq!(response.text, "Echo: hello there");
    assert_eq!(response.status, ResponseStatus::Ok);
}

#[tokio::test]
async fn test_handler_error_becomes_failed_response() {
    let url = spawn_server(FailingAgent).await;
    let client = AgentClient::new(&url).expect("client");

    let request = TaskRequest::with_id("task-err", "anything", "conv-1");
    let response = client.send_task(&request).await.expect("response");

    assert_eq!(response.status, ResponseStatus::Failed);
    // Raw handler error text must not leak to the caller.
    assert!(!response.text.contains("simulated backend outage"));
}

#[tokio::test]
async fn test_streaming_chunks_then_done() {
    let url = spawn_server(StreamingAgent).await;
    let client = AgentClient::new(&url).expect("client");

    let request = TaskRequest::with_id("task-s", "one two three", "conv-1");
    let mut stream = client.send_task_streaming(&request).await.expect("stream");

    let mut chunks = Vec::new();
    let mut done = None;
    while let Some(event) = stream.next().await {
        match event.expect("event") {
            TaskEvent::Chunk { text, .. } => chunks.push(text),
            TaskEvent::Done { response } => {
                done = Some(response);
                break;
            }
        }
    }

    assert_eq!(chunks, vec!["one", "two", "three"]);
    let response = done.expect("terminal event");
    assert_eq!(response.text, "one two three");
    assert_eq!(response.status, ResponseStatus::Ok);
}

#[tokio::test]
async fn test_streaming_ends_after_done() {
    let url = spawn_server(EchoAgent).await;
    let client = AgentClient::new(&url).expect("client");

    let request = TaskRequest::with_id("task-end", "hi", "conv-1");
    let mut stream = client.send_task_streaming(&request).await.expect("stream");

    let first = stream.next().await.expect("one event").expect("event");
    assert!(first.is_terminal());
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn test_duplicate_task_id_rejected() {
    let url = spawn_server(SlowAgent).await;
    let client = AgentClient::new(&url).expect("client");

    let request = TaskRequest::with_id("task-dup", "take your time", "conv-1");
    let first = {
        let client = client.clone();
        let request = request.clone();
        tokio::spawn(async move { client.send_task(&request).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    let err = client
        .send_task(&request)
        .await
        .expect_err("duplicate should be rejected");
    assert!(err.to_string().contains("already running"));

    // Unblock the first dispatch.
    client.cancel_task("task-dup").await.expect("cancel");
    let response = first.await.expect("join").expect("response");
    assert_eq!(response.status, ResponseStatus::Failed);
}

#[tokio::test]
async fn test_inflight_count_tracks_dispatch() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let server = AgentServer::new(SlowAgent);
    let router = server.router();
    let bind_addr = addr.to_string();
    tokio::spawn(async move {
        let listener = tokio::net::TcpListener::bind(&bind_addr).await.expect("bind");
        axum::serve(listener, router).await.expect("serve");
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let client = AgentClient::new(format!("http://{}", addr)).expect("client");
    assert_eq!(server.inflight_count().await, 0);

    let request = TaskRequest::with_id("task-inflight", "take your time", "conv-1");
    let dispatch = {
        let client = client.clone();
        tokio::spawn(async move { client.send_task(&request).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(server.inflight_count().await, 1);

    client.cancel_task("task-inflight").await.expect("cancel");
    let response = dispatch.await.expect("join").expect("response");
    assert_eq!(response.status, ResponseStatus::Failed);
    assert_eq!(server.inflight_count().await, 0);
}

#[tokio::test]
async fn test_cancel_in_flight_task() {
    let url = spawn_server(SlowAgent).await;
    let client = AgentClient::new(&url).expect("client");

    let request = TaskRequest::with_id("task-c", "take your time", "conv-1");
    let dispatch = {
        let client = client.clone();
        let request = request.clone();
        tokio::spawn(async move { client.send_task(&request).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    let ack = client.cancel_task("task-c").await.expect("cancel");
    assert!(ack.cancelled);
    assert_eq!(ack.task_id, "task-c");

    let response = dispatch.await.expect("join").expect("response");
    assert_eq!(response.status, ResponseStatus::Failed);
}

#[tokio::test]
async fn test_cancel_unknown_task() {
    let url = spawn_server(EchoAgent).await;
    let client = AgentClient::new(&url).expect("client");

    let ack = client.cancel_task("no-such-task").await.expect("ack");
    assert!(!ack.cancelled);
}

#[tokio::test]
async fn test_unreachable_agent() {
    let client = AgentClient::new("http://127.0.0.1:1").expect("client");
    let err = client.get_agent_card().await.expect_err("unreachable");
    assert!(err.is_retryable());
}
