//! Tool schemas and argument validation.

use crate::error::ToolError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// JSON type expected for a tool argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgKind {
    String,
    Integer,
    Number,
    Boolean,
}

impl ArgKind {
    /// Whether the given JSON value has this kind.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
        }
    }
}

impl fmt::Display for ArgKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
        };
        write!(f, "{}", s)
    }
}

/// Declaration of one tool argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgSpec {
    pub name: String,
    pub kind: ArgKind,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ArgSpec {
    pub fn required(name: impl Into<String>, kind: ArgKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
            description: None,
        }
    }

    pub fn optional(name: impl Into<String>, kind: ArgKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Published description of a tool: its name and argument contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub args: Vec<ArgSpec>,
}

impl ToolSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            args: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_arg(mut self, arg: ArgSpec) -> Self {
        self.args.push(arg);
        self
    }

    /// Validate an argument object against this schema.
    ///
    /// Rejects missing required arguments, arguments the schema does not
    /// declare, and values of the wrong JSON type.
    pub fn validate(&self, args: &Map<String, Value>) -> Result<(), ToolError> {
        for spec in &self.args {
            match args.get(&spec.name) {
                Some(value) => {
                    if !spec.kind.matches(value) {
                        return Err(ToolError::invalid_arguments(
                            &self.name,
                            format!("argument '{}' must be a {}", spec.name, spec.kind),
                        ));
                    }
                }
                None if spec.required => {
                    return Err(ToolError::invalid_arguments(
                        &self.name,
                        format!("missing required argument: {}", spec.name),
                    ));
                }
                None => {}
            }
        }

        for name in args.keys() {
            if !self.args.iter().any(|spec| &spec.name == name) {
                return Err(ToolError::invalid_arguments(
                    &self.name,
                    format!("unknown argument: {}", name),
                ));
            }
        }

        Ok(())
    }
}
