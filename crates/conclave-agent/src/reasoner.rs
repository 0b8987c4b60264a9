//! The reasoning capability behind a domain agent.
//!
//! A [`Reasoner`] looks at the instruction, the transcript of tool results
//! so far, and the available tool schemas, and decides whether to answer
//! or to call more tools. Live model backends implement this trait
//! externally; the in-tree implementations are deterministic:
//! [`ScriptedReasoner`] replays a fixture and [`KeywordReasoner`] matches
//! schemas by keyword.

use crate::error::{AgentError, AgentResult};
use async_trait::async_trait;
use conclave_tools::{Lookup, ToolSchema};
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::Mutex;

/// One requested tool call.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolRequest {
    pub tool: String,
    pub arguments: Value,
}

impl ToolRequest {
    pub fn new(tool: impl Into<String>, arguments: Value) -> Self {
        Self {
            tool: tool.into(),
            arguments,
        }
    }
}

/// What the reasoner wants to do next.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    /// Produce this final reply.
    Reply(String),
    /// Invoke these tools, then reason again over the results.
    CallTools(Vec<ToolRequest>),
}

/// One transcript entry from a prior reasoning step.
#[derive(Debug, Clone, PartialEq)]
pub enum Exchange {
    /// A tool ran; a miss is recorded as an outcome, not a fault.
    Outcome { tool: String, lookup: Lookup },
    /// A recoverable fault (unknown tool, invalid arguments) the reasoner
    /// may correct on its next step.
    Fault { tool: String, message: String },
}

impl Exchange {
    pub fn outcome(tool: impl Into<String>, lookup: Lookup) -> Self {
        Self::Outcome {
            tool: tool.into(),
            lookup,
        }
    }

    pub fn fault(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fault {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

/// Decides the next move in a domain agent's reasoning loop.
#[async_trait]
pub trait Reasoner: Send + Sync {
    async fn decide(
        &self,
        instruction: &str,
        transcript: &[Exchange],
        schemas: &[ToolSchema],
    ) -> AgentResult<Directive>;
}

/// Replays a fixed sequence of directives, one per reasoning step.
///
/// The backbone of scenario tests: scripts let a test walk the agent
/// through an exact tool conversation without any model in the loop.
pub struct ScriptedReasoner {
    steps: Mutex<VecDeque<Directive>>,
}

impl ScriptedReasoner {
    pub fn new(steps: impl IntoIterator<Item = Directive>) -> Self {
        Self {
            steps: Mutex::new(steps.into_iter().collect()),
        }
    }

    /// Convenience for a reasoner that answers immediately.
    pub fn reply(text: impl Into<String>) -> Self {
        Self::new([Directive::Reply(text.into())])
    }

    fn pop(&self) -> Option<Directive> {
        match self.steps.lock() {
            Ok(mut steps) => steps.pop_front(),
            Err(poisoned) => poisoned.into_inner().pop_front(),
        }
    }
}

#[async_trait]
impl Reasoner for ScriptedReasoner {
    async fn decide(
        &self,
        _instruction: &str,
        _transcript: &[Exchange],
        _schemas: &[ToolSchema],
    ) -> AgentResult<Directive> {
        self.pop()
            .ok_or_else(|| AgentError::reasoning("script exhausted"))
    }
}

/// Deterministic schema-matching reasoner.
///
/// On the first step it picks every tool whose subject appears in the
/// instruction and feeds it the first id-like token as its required
/// argument. Once tool results are on the transcript it formats them into
/// a reply.
#[derive(Default)]
pub struct KeywordReasoner;

impl KeywordReasoner {
    pub fn new() -> Self {
        Self
    }

    /// The part of the tool name a user would mention: `lookup_user` is
    /// about "user".
    fn subject(schema: &ToolSchema) -> &str {
        schema.name.strip_prefix("lookup_").unwrap_or(&schema.name)
    }

    /// First token that looks like an identifier: alphanumeric with at
    /// least one digit, quotes stripped.
    fn id_token(instruction: &str) -> Option<String> {
        instruction
            .split(|c: char| c.is_whitespace() || c == ',' || c == '?' || c == '.')
            .map(|t| t.trim_matches(|c| c == '\'' || c == '"'))
            .find(|t| {
                !t.is_empty()
                    && t.chars().any(|c| c.is_ascii_digit())
                    && t.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            })
            .map(|t| t.to_string())
    }

    fn format_reply(transcript: &[Exchange]) -> String {
        let mut lines = Vec::new();
        for entry in transcript {
            match entry {
                Exchange::Outcome {
                    tool,
                    lookup: Lookup::Hit(payload),
                } => {
                    let subject = tool.strip_prefix("lookup_").unwrap_or(tool);
                    lines.push(format!("Here is the {} information: {}", subject, payload));
                }
                Exchange::Outcome {
                    tool,
                    lookup: Lookup::Miss,
                } => {
                    let subject = tool.strip_prefix("lookup_").unwrap_or(tool);
                    lines.push(format!("I could not find a matching {} record.", subject));
                }
                Exchange::Fault { .. } => {}
            }
        }
        if lines.is_empty() {
            "I was unable to gather any information for that request.".to_string()
        } else {
            lines.join(" ")
        }
    }
}

#[async_trait]
impl Reasoner for KeywordReasoner {
    async fn decide(
        &self,
        instruction: &str,
        transcript: &[Exchange],
        schemas: &[ToolSchema],
    ) -> AgentResult<Directive> {
        // Results are in; answer from them.
        if transcript
            .iter()
            .any(|e| matches!(e, Exchange::Outcome { .. }))
        {
            return Ok(Directive::Reply(Self::format_reply(transcript)));
        }

        let lowered = instruction.to_lowercase();
        let mut requests = Vec::new();

        for schema in schemas {
            if !lowered.contains(Self::subject(schema)) {
                continue;
            }
            let Some(id) = Self::id_token(instruction) else {
                continue;
            };
            let Some(arg) = schema.args.iter().find(|a| a.required) else {
                continue;
            };
            let mut arguments = serde_json::Map::new();
            arguments.insert(arg.name.clone(), Value::String(id));
            requests.push(ToolRequest::new(&schema.name, Value::Object(arguments)));
        }

        if requests.is_empty() {
            Ok(Directive::Reply(
                "I do not have a tool that can answer that.".to_string(),
            ))
        } else {
            Ok(Directive::CallTools(requests))
        }
    }
}
