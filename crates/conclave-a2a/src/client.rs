//! Agent-invocation protocol client.
//!
//! HTTP client for talking to remote domain agents: card discovery, task
//! dispatch (complete and streaming) and cancellation.

use crate::error::{A2aError, A2aResult};
use crate::types::{AgentCard, AgentResponse, CancelAck, TaskEvent, TaskRequest};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OnceCell, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};
use url::Url;

/// Default timeout for blocking requests
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for streaming requests
const STREAMING_TIMEOUT: Duration = Duration::from_secs(300);

/// Client for a single remote agent.
#[derive(Clone)]
pub struct AgentClient {
    base_url: Url,
    client: reqwest::Client,
    card: Arc<OnceCell<AgentCard>>,
}

impl AgentClient {
    /// Create a client for the agent at `base_url`.
    pub fn new(base_url: impl AsRef<str>) -> A2aResult<Self> {
        let base_url = Url::parse(base_url.as_ref())?;
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| A2aError::internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            client,
            card: Arc::new(OnceCell::new()),
        })
    }

    /// Base URL of the remote agent.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The remote agent's card, fetched from the well-known path on first
    /// use and cached afterwards. Clones of this client share the cache.
    pub async fn get_agent_card(&self) -> A2aResult<AgentCard> {
        self.card
            .get_or_try_init(|| self.fetch_agent_card())
            .await
            .cloned()
    }

    async fn fetch_agent_card(&self) -> A2aResult<AgentCard> {
        let url = self.endpoint("/.well-known/agent.json")?;
        debug!(url = %url, "Fetching agent card");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(connection_error)?;

        Self::check_status(&response)?;
        let card = response
            .json::<AgentCard>()
            .await
            .map_err(|e| A2aError::protocol(format!("Invalid agent card: {}", e)))?;

        Ok(card)
    }

    /// Dispatch a task and wait for the final response.
    pub async fn send_task(&self, request: &TaskRequest) -> A2aResult<AgentResponse> {
        let url = self.endpoint("/tasks/send")?;
        debug!(task_id = %request.task_id, url = %url, "Sending task");

        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(connection_error)?;

        Self::check_status(&response)?;
        let agent_response = response
            .json::<AgentResponse>()
            .await
            .map_err(|e| A2aError::protocol(format!("Invalid task response: {}", e)))?;

        Ok(agent_response)
    }

    /// Dispatch a task with a streaming response.
    ///
    /// Returns a stream of task events ending with [`TaskEvent::Done`]. The
    /// stream ends early if the connection drops or the task is cancelled.
    pub async fn send_task_streaming(
        &self,
        request: &TaskRequest,
    ) -> A2aResult<ReceiverStream<A2aResult<TaskEvent>>> {
        let url = self.endpoint("/tasks/sendSubscribe")?;
        debug!(task_id = %request.task_id, url = %url, "Sending streaming task");

        let response = self
            .client
            .post(url)
            .json(request)
            .timeout(STREAMING_TIMEOUT)
            .send()
            .await
            .map_err(connection_error)?;

        Self::check_status(&response)?;

        let (tx, rx) = mpsc::channel(32);
        let mut byte_stream = response.bytes_stream();

        tokio::spawn(async move {
            let mut buffer = String::new();

            while let Some(chunk) = byte_stream.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        let _ = tx
                            .send(Err(A2aError::protocol(format!("Stream error: {}", e))))
                            .await;
                        return;
                    }
                };

                buffer.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(event) = parse_sse_event(&mut buffer) {
                    let is_terminal = matches!(event, Ok(TaskEvent::Done { .. }));
                    if tx.send(event).await.is_err() {
                        return;
                    }
                    if is_terminal {
                        return;
                    }
                }
            }
        });

        Ok(ReceiverStream::new(rx))
    }

    /// Request cancellation of an in-flight task.
    pub async fn cancel_task(&self, task_id: &str) -> A2aResult<CancelAck> {
        let url = self.endpoint(&format!("/tasks/{}/cancel", task_id))?;
        debug!(task_id = %task_id, "Cancelling task");

        let response = self
            .client
            .post(url)
            .send()
            .await
            .map_err(connection_error)?;

        Self::check_status(&response)?;
        let ack = response
            .json::<CancelAck>()
            .await
            .map_err(|e| A2aError::protocol(format!("Invalid cancel response: {}", e)))?;

        if !ack.cancelled {
            warn!(task_id = %task_id, "Cancel acknowledged but task was not in flight");
        }

        Ok(ack)
    }

    fn endpoint(&self, path: &str) -> A2aResult<Url> {
        Ok(self.base_url.join(path)?)
    }

    fn check_status(response: &reqwest::Response) -> A2aResult<()> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        match status.as_u16() {
            409 => Err(A2aError::protocol("Task already running on remote agent")),
            404 => Err(A2aError::protocol("Unknown task or endpoint")),
            504 => Err(A2aError::Timeout {
                timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
            }),
            code => Err(A2aError::protocol(format!(
                "Remote agent returned HTTP {}",
                code
            ))),
        }
    }
}

fn connection_error(e: reqwest::Error) -> A2aError {
    if e.is_timeout() {
        A2aError::Timeout {
            timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
        }
    } else {
        A2aError::unreachable(format!("Connection failed: {}", e))
    }
}

/// Parse a single SSE event out of the buffer, if a complete one is present.
///
/// Events are delimited by a blank line. Consumes the event (and any
/// leading keep-alive comments) from the buffer.
fn parse_sse_event(buffer: &mut String) -> Option<A2aResult<TaskEvent>> {
    loop {
        let boundary = buffer.find("\n\n")?;
        let raw_event = buffer[..boundary].to_string();
        buffer.drain(..boundary + 2);

        let mut data = None;
        for line in raw_event.lines() {
            if let Some(rest) = line.strip_prefix("data:") {
                data = Some(rest.trim_start().to_string());
            }
        }

        // Keep-alive comments and event-only lines carry no data.
        let Some(data) = data else { continue };

        return Some(
            serde_json::from_str::<TaskEvent>(&data)
                .map_err(|e| A2aError::protocol(format!("Invalid task event: {}", e))),
        );
    }
}
