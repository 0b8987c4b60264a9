//! Error types for domain agents and the orchestrator.

use conclave_a2a::A2aError;
use conclave_tools::ToolError;
use thiserror::Error;

/// Errors from the reasoning loop and turn orchestration.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The agent's tool server could not be reached after retries.
    #[error("Tool server unreachable: {message}")]
    ToolUnreachable { message: String },

    /// The reasoning loop hit its step budget before producing a reply.
    #[error("Reasoning step limit of {limit} exceeded")]
    StepLimitExceeded { limit: usize },

    /// A delegate did not answer within the per-task timeout.
    #[error("Delegate '{agent}' timed out after {timeout_ms}ms")]
    DelegateTimeout { agent: String, timeout_ms: u64 },

    /// A delegate could not be reached at all.
    #[error("Delegate '{agent}' unreachable: {message}")]
    DelegateUnreachable { agent: String, message: String },

    /// A delegate answered, but with a failed status.
    #[error("Delegate '{agent}' failed: {message}")]
    DelegateFailed { agent: String, message: String },

    /// Every task in the turn failed; there is nothing to degrade to.
    #[error("All delegates failed for this turn")]
    AllDelegatesFailed,

    /// The plan named an agent that is not in the delegate set.
    #[error("Unknown delegate: {agent}")]
    UnknownDelegate { agent: String },

    /// The reasoning capability itself failed.
    #[error("Reasoning failure: {message}")]
    Reasoning { message: String },

    /// Tool-protocol error.
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// Agent-invocation protocol error.
    #[error(transparent)]
    Protocol(#[from] A2aError),
}

impl AgentError {
    pub fn tool_unreachable(message: impl Into<String>) -> Self {
        Self::ToolUnreachable {
            message: message.into(),
        }
    }

    pub fn unknown_delegate(agent: impl Into<String>) -> Self {
        Self::UnknownDelegate {
            agent: agent.into(),
        }
    }

    pub fn reasoning(message: impl Into<String>) -> Self {
        Self::Reasoning {
            message: message.into(),
        }
    }
}

/// Result alias for agent operations.
pub type AgentResult<T> = Result<T, AgentError>;
