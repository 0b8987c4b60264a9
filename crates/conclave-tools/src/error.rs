//! Tool-invocation error taxonomy.
//!
//! A lookup that finds nothing is not an error; see
//! [`crate::registry::Lookup::Miss`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from tool registration, validation and dispatch.
#[derive(Debug, Error)]
pub enum ToolError {
    /// No tool registered under the requested name.
    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },

    /// Arguments failed validation against the tool's schema.
    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    /// The tool server could not be reached.
    #[error("Tool server unreachable: {message}")]
    Unreachable { message: String },

    /// The tool server responded with something we could not interpret.
    #[error("Tool protocol error: {message}")]
    Protocol { message: String },

    /// JSON serialization/deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid tool server URL.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl ToolError {
    pub fn unknown_tool(name: impl Into<String>) -> Self {
        Self::UnknownTool { name: name.into() }
    }

    pub fn invalid_arguments(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArguments {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::Unreachable {
            message: message.into(),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Whether a reasoning step can recover by correcting the request.
    ///
    /// Unknown tools and invalid arguments are the model's mistakes to fix;
    /// transport and protocol failures are not.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::UnknownTool { .. } | Self::InvalidArguments { .. }
        )
    }
}

/// Stable error codes carried in [`ErrorDetail`].
pub const CODE_UNKNOWN_TOOL: &str = "UNKNOWN_TOOL";
pub const CODE_INVALID_ARGUMENTS: &str = "INVALID_ARGUMENTS";
pub const CODE_INTERNAL: &str = "INTERNAL";

/// Wire form of a tool-level fault, carried inside an invocation result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl From<&ToolError> for ErrorDetail {
    fn from(err: &ToolError) -> Self {
        let code = match err {
            ToolError::UnknownTool { .. } => CODE_UNKNOWN_TOOL,
            ToolError::InvalidArguments { .. } => CODE_INVALID_ARGUMENTS,
            _ => CODE_INTERNAL,
        };
        Self {
            code: code.to_string(),
            message: err.to_string(),
        }
    }
}

impl ErrorDetail {
    /// Rebuild the typed error from its wire form, as seen by a client.
    pub fn into_tool_error(self, tool: &str) -> ToolError {
        match self.code.as_str() {
            CODE_UNKNOWN_TOOL => ToolError::unknown_tool(tool),
            CODE_INVALID_ARGUMENTS => ToolError::invalid_arguments(tool, self.message),
            _ => ToolError::protocol(self.message),
        }
    }
}
