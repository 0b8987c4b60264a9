//! Agent-invocation protocol wire types.
//!
//! These types define the contract between the orchestrator and domain
//! agents: agent cards for capability discovery, task requests for
//! delegated work, agent responses with a terminal status, and streaming
//! events for incremental delivery.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Agent Card Types
// ============================================================================

/// Agent card for capability discovery.
///
/// Served at `/.well-known/agent.json`; the orchestrator fetches it at
/// startup to learn each delegate's name, endpoint and capability tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCard {
    /// Human-readable name of the agent
    pub name: String,

    /// Description of what the agent can do
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Base URL the agent is reachable at
    pub url: String,

    /// Agent version string
    pub version: String,

    /// Protocol capabilities
    #[serde(default)]
    pub capabilities: AgentCapabilities,

    /// Skills the agent can perform
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skills: Vec<AgentSkill>,
}

impl AgentCard {
    /// Create a new agent card with required fields.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            url: url.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            capabilities: AgentCapabilities::default(),
            skills: Vec::new(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add a skill to the card.
    pub fn with_skill(mut self, skill: AgentSkill) -> Self {
        self.skills.push(skill);
        self
    }

    /// Enable streaming capability.
    pub fn with_streaming(mut self) -> Self {
        self.capabilities.streaming = true;
        self
    }

    /// All capability tags declared across this agent's skills.
    pub fn capability_tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = Vec::new();
        for skill in &self.skills {
            for tag in &skill.tags {
                if !tags.contains(tag) {
                    tags.push(tag.clone());
                }
            }
        }
        tags
    }
}

/// Protocol capabilities declared by an agent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCapabilities {
    /// Whether the agent supports the streaming endpoint
    #[serde(default)]
    pub streaming: bool,
}

/// A skill the agent can perform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSkill {
    /// Unique identifier for the skill
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// Description of what the skill does
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Capability tags (e.g. "user-info", "product-info")
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl AgentSkill {
    /// Create a new skill.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            tags: Vec::new(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add a capability tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}

// ============================================================================
// Task Request / Response Types
// ============================================================================

/// A delegated unit of work sent from the orchestrator to a domain agent.
///
/// Consumed exactly once by the target agent; a task id may not be
/// re-dispatched while a task with that id is still in flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRequest {
    /// Unique task identifier (unique per conversation turn)
    pub task_id: String,

    /// Natural-language instruction for the agent
    pub instruction: String,

    /// Conversation this task belongs to
    pub conversation_id: String,
}

impl TaskRequest {
    /// Create a task request with a generated task id.
    pub fn new(instruction: impl Into<String>, conversation_id: impl Into<String>) -> Self {
        Self {
            task_id: Uuid::new_v4().to_string(),
            instruction: instruction.into(),
            conversation_id: conversation_id.into(),
        }
    }

    /// Create a task request with an explicit task id.
    pub fn with_id(
        task_id: impl Into<String>,
        instruction: impl Into<String>,
        conversation_id: impl Into<String>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            instruction: instruction.into(),
            conversation_id: conversation_id.into(),
        }
    }
}

/// Terminal status of a delegated task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    /// The agent produced a final answer
    Ok,
    /// The step budget ran out; the text is a best-effort answer
    Partial,
    /// The agent could not complete the task
    Failed,
}

impl std::fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseStatus::Ok => write!(f, "ok"),
            ResponseStatus::Partial => write!(f, "partial"),
            ResponseStatus::Failed => write!(f, "failed"),
        }
    }
}

/// A record of one tool invocation made while serving a task.
///
/// Kept for traceability in the response; `ok` is false when the call
/// came back as a tool-level error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInvocation {
    /// Name of the invoked tool
    pub tool: String,

    /// Whether the invocation succeeded
    pub ok: bool,
}

/// The final answer a domain agent returns for a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResponse {
    /// Task this response answers
    pub task_id: String,

    /// Natural-language answer text
    pub text: String,

    /// Terminal status of the task
    pub status: ResponseStatus,

    /// Tool invocations made while serving the task, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_invocations: Vec<ToolInvocation>,
}

impl AgentResponse {
    /// Build a successful response.
    pub fn ok(task_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            text: text.into(),
            status: ResponseStatus::Ok,
            tool_invocations: Vec::new(),
        }
    }

    /// Build a best-effort response after the step budget ran out.
    pub fn partial(task_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            text: text.into(),
            status: ResponseStatus::Partial,
            tool_invocations: Vec::new(),
        }
    }

    /// Build a failed response.
    pub fn failed(task_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            text: text.into(),
            status: ResponseStatus::Failed,
            tool_invocations: Vec::new(),
        }
    }

    /// Attach the tool invocation trace.
    pub fn with_invocations(mut self, invocations: Vec<ToolInvocation>) -> Self {
        self.tool_invocations = invocations;
        self
    }

    /// Whether the task failed outright.
    pub fn is_failed(&self) -> bool {
        self.status == ResponseStatus::Failed
    }
}

// ============================================================================
// Streaming Event Types
// ============================================================================

/// Events emitted on the streaming endpoint.
///
/// A stream is an ordered sequence of `chunk` events terminated by exactly
/// one `done` event carrying the final response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TaskEvent {
    /// A partial-text chunk of the reply
    #[serde(rename = "chunk")]
    Chunk {
        #[serde(rename = "taskId")]
        task_id: String,
        text: String,
    },

    /// Completion marker carrying the final response
    #[serde(rename = "done")]
    Done { response: AgentResponse },
}

impl TaskEvent {
    /// Create a chunk event.
    pub fn chunk(task_id: impl Into<String>, text: impl Into<String>) -> Self {
        TaskEvent::Chunk {
            task_id: task_id.into(),
            text: text.into(),
        }
    }

    /// Create the completion marker.
    pub fn done(response: AgentResponse) -> Self {
        TaskEvent::Done { response }
    }

    /// Whether this event terminates the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskEvent::Done { .. })
    }
}

/// Acknowledgement returned by the cancel endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelAck {
    /// The task that was asked to cancel
    pub task_id: String,

    /// Whether an in-flight task was actually aborted
    pub cancelled: bool,
}
