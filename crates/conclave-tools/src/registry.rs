//! Lookup tools and the in-memory registry that dispatches to them.

use crate::error::{ErrorDetail, ToolError};
use crate::schema::ToolSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Outcome of a successful lookup.
///
/// A miss means the tool ran fine and the requested record does not exist.
/// It is never an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Hit(Value),
    Miss,
}

impl Lookup {
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit(_))
    }

    /// The payload for a hit, `None` for a miss.
    pub fn payload(self) -> Option<Value> {
        match self {
            Self::Hit(value) => Some(value),
            Self::Miss => None,
        }
    }
}

/// A named, pure read-only operation exposed to agents.
pub trait LookupTool: Send + Sync {
    /// The tool's published schema.
    fn schema(&self) -> ToolSchema;

    /// Run the lookup. Arguments have already been validated against
    /// [`LookupTool::schema`].
    fn lookup(&self, args: &Map<String, Value>) -> Result<Lookup, ToolError>;
}

/// Request body for a tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokeRequest {
    pub tool: String,
    #[serde(default)]
    pub arguments: Value,
}

impl InvokeRequest {
    pub fn new(tool: impl Into<String>, arguments: Value) -> Self {
        Self {
            tool: tool.into(),
            arguments,
        }
    }
}

/// Wire form of an invocation outcome.
///
/// A miss is `ok: true` with a null payload. Tool-level faults (unknown
/// tool, invalid arguments) are `ok: false` with a coded error detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

impl ToolResult {
    pub fn from_lookup(tool: impl Into<String>, lookup: Lookup) -> Self {
        Self {
            tool: tool.into(),
            ok: true,
            payload: lookup.payload(),
            error: None,
        }
    }

    pub fn fault(tool: impl Into<String>, err: &ToolError) -> Self {
        Self {
            tool: tool.into(),
            ok: false,
            payload: None,
            error: Some(ErrorDetail::from(err)),
        }
    }

    /// Convert back into the typed lookup outcome, surfacing faults.
    pub fn into_lookup(self) -> Result<Lookup, ToolError> {
        if self.ok {
            Ok(match self.payload {
                Some(value) => Lookup::Hit(value),
                None => Lookup::Miss,
            })
        } else {
            let detail = self.error.unwrap_or(ErrorDetail {
                code: crate::error::CODE_INTERNAL.to_string(),
                message: "tool invocation failed without detail".to_string(),
            });
            Err(detail.into_tool_error(&self.tool))
        }
    }
}

/// In-memory registry of lookup tools keyed by name.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn LookupTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under its schema name. Replaces any previous tool
    /// with the same name.
    pub fn register(mut self, tool: impl LookupTool + 'static) -> Self {
        let name = tool.schema().name.clone();
        self.tools.insert(name, Arc::new(tool));
        self
    }

    /// Schemas of every registered tool, sorted by name for stable output.
    pub fn schemas(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> = self.tools.values().map(|t| t.schema()).collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Validate and run a tool by name.
    pub fn invoke(&self, name: &str, arguments: &Value) -> Result<Lookup, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::unknown_tool(name))?;

        let args = match arguments {
            Value::Object(map) => map.clone(),
            Value::Null => Map::new(),
            _ => {
                return Err(ToolError::invalid_arguments(
                    name,
                    "arguments must be a JSON object",
                ));
            }
        };

        tool.schema().validate(&args)?;
        debug!(tool = %name, "Invoking tool");
        tool.lookup(&args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ArgKind, ArgSpec};
    use serde_json::json;

    struct GreeterTool;

    impl LookupTool for GreeterTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema::new("greet").with_arg(ArgSpec::required("name", ArgKind::String))
        }

        fn lookup(&self, args: &Map<String, Value>) -> Result<Lookup, ToolError> {
            let name = args["name"].as_str().unwrap_or_default();
            if name == "nobody" {
                Ok(Lookup::Miss)
            } else {
                Ok(Lookup::Hit(json!({ "greeting": format!("hi {}", name) })))
            }
        }
    }

    #[test]
    fn test_invoke_hit() {
        let registry = ToolRegistry::new().register(GreeterTool);
        let lookup = registry.invoke("greet", &json!({"name": "kira"})).unwrap();
        assert_eq!(lookup, Lookup::Hit(json!({"greeting": "hi kira"})));
    }

    #[test]
    fn test_invoke_miss_is_not_an_error() {
        let registry = ToolRegistry::new().register(GreeterTool);
        let lookup = registry.invoke("greet", &json!({"name": "nobody"})).unwrap();
        assert_eq!(lookup, Lookup::Miss);
    }

    #[test]
    fn test_invoke_unknown_tool() {
        let registry = ToolRegistry::new().register(GreeterTool);
        let err = registry.invoke("nope", &json!({})).unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool { .. }));
    }

    #[test]
    fn test_invoke_invalid_arguments() {
        let registry = ToolRegistry::new().register(GreeterTool);
        let err = registry.invoke("greet", &json!({})).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));

        let err = registry.invoke("greet", &json!([1, 2])).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }

    #[test]
    fn test_tool_result_round_trip() {
        let result = ToolResult::from_lookup("greet", Lookup::Miss);
        assert!(result.ok);
        assert_eq!(result.payload, None);
        assert_eq!(result.into_lookup().unwrap(), Lookup::Miss);

        let err = ToolError::unknown_tool("nope");
        let result = ToolResult::fault("nope", &err);
        assert!(!result.ok);
        assert!(result.into_lookup().unwrap_err().is_recoverable());
    }

    #[test]
    fn test_schemas_sorted() {
        struct Named(&'static str);
        impl LookupTool for Named {
            fn schema(&self) -> ToolSchema {
                ToolSchema::new(self.0)
            }
            fn lookup(&self, _args: &Map<String, Value>) -> Result<Lookup, ToolError> {
                Ok(Lookup::Miss)
            }
        }

        let registry = ToolRegistry::new().register(Named("zeta")).register(Named("alpha"));
        let schemas = registry.schemas();
        let names: Vec<&str> = schemas.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }
}
