//! The domain agent: a bounded loop alternating between reasoning and
//! tool invocation.
//!
//! Terminal mapping: a reply from the reasoner is `ok`; an exhausted step
//! budget degrades to `partial` with whatever tool payloads were gathered;
//! an unreachable tool server or a reasoner failure is `failed`.

use crate::error::{AgentError, AgentResult};
use crate::reasoner::{Directive, Exchange, Reasoner, ToolRequest};
use async_trait::async_trait;
use conclave_a2a::{
    AgentCard, AgentHandler, AgentResponse, AgentSkill, TaskEvent, TaskRequest, ToolInvocation,
};
use conclave_tools::{Lookup, ToolSchema, ToolTransport};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

const DEFAULT_MAX_STEPS: usize = 8;
const DEFAULT_TOOL_RETRIES: usize = 2;

/// A single-responsibility agent bound to one tool server.
pub struct DomainAgent {
    name: String,
    card: AgentCard,
    reasoner: Arc<dyn Reasoner>,
    tools: Arc<dyn ToolTransport>,
    max_steps: usize,
    tool_retries: usize,
}

impl DomainAgent {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        reasoner: Arc<dyn Reasoner>,
        tools: Arc<dyn ToolTransport>,
    ) -> Self {
        let name = name.into();
        let card = AgentCard::new(&name, url).with_streaming();
        Self {
            name,
            card,
            reasoner,
            tools,
            max_steps: DEFAULT_MAX_STEPS,
            tool_retries: DEFAULT_TOOL_RETRIES,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.card = self.card.with_description(description);
        self
    }

    pub fn with_skill(mut self, skill: AgentSkill) -> Self {
        self.card = self.card.with_skill(skill);
        self
    }

    /// Cap on reasoning iterations per task.
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Retries for transport-level tool failures. Recoverable faults
    /// (unknown tool, bad arguments) never consume this budget.
    pub fn with_tool_retries(mut self, tool_retries: usize) -> Self {
        self.tool_retries = tool_retries;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Serve one task to completion.
    pub async fn respond(&self, request: &TaskRequest) -> AgentResult<AgentResponse> {
        let schemas = self
            .tools
            .list_schemas()
            .await
            .map_err(|e| AgentError::tool_unreachable(e.to_string()))?;

        let mut transcript: Vec<Exchange> = Vec::new();
        let mut invocations: Vec<ToolInvocation> = Vec::new();

        let result = self
            .reason_loop(request, &schemas, &mut transcript, &mut invocations)
            .await;

        match result {
            Ok(text) => {
                info!(agent = %self.name, task_id = %request.task_id, "Task answered");
                Ok(AgentResponse::ok(&request.task_id, text).with_invocations(invocations))
            }
            Err(AgentError::StepLimitExceeded { limit }) => {
                warn!(agent = %self.name, task_id = %request.task_id, limit, "Step budget exhausted");
                let summary = Self::partial_summary(&transcript);
                Ok(AgentResponse::partial(&request.task_id, summary).with_invocations(invocations))
            }
            Err(e) => Err(e),
        }
    }

    async fn reason_loop(
        &self,
        request: &TaskRequest,
        schemas: &[ToolSchema],
        transcript: &mut Vec<Exchange>,
        invocations: &mut Vec<ToolInvocation>,
    ) -> AgentResult<String> {
        for step in 0..self.max_steps {
            let directive = self
                .reasoner
                .decide(&request.instruction, transcript, schemas)
                .await?;

            match directive {
                Directive::Reply(text) => return Ok(text),
                Directive::CallTools(requests) => {
                    debug!(agent = %self.name, step, count = requests.len(), "Invoking tools");
                    for tool_request in requests {
                        self.run_tool(tool_request, schemas, transcript, invocations)
                            .await?;
                    }
                }
            }
        }

        Err(AgentError::StepLimitExceeded {
            limit: self.max_steps,
        })
    }

    /// Run one requested tool call, recording the outcome on the
    /// transcript. Only transport failures propagate as errors.
    async fn run_tool(
        &self,
        request: ToolRequest,
        schemas: &[ToolSchema],
        transcript: &mut Vec<Exchange>,
        invocations: &mut Vec<ToolInvocation>,
    ) -> AgentResult<()> {
        // Catch hallucinated tool names before any network dispatch.
        if !schemas.iter().any(|s| s.name == request.tool) {
            warn!(agent = %self.name, tool = %request.tool, "Requested tool not in schema set");
            invocations.push(ToolInvocation {
                tool: request.tool.clone(),
                ok: false,
            });
            transcript.push(Exchange::fault(
                &request.tool,
                format!("no such tool: {}", request.tool),
            ));
            return Ok(());
        }

        let mut attempt = 0;
        loop {
            match self
                .tools
                .invoke(&request.tool, request.arguments.clone())
                .await
            {
                Ok(lookup) => {
                    invocations.push(ToolInvocation {
                        tool: request.tool.clone(),
                        ok: true,
                    });
                    transcript.push(Exchange::outcome(&request.tool, lookup));
                    return Ok(());
                }
                Err(e) if e.is_recoverable() => {
                    invocations.push(ToolInvocation {
                        tool: request.tool.clone(),
                        ok: false,
                    });
                    transcript.push(Exchange::fault(&request.tool, e.to_string()));
                    return Ok(());
                }
                Err(e) if attempt < self.tool_retries => {
                    attempt += 1;
                    warn!(agent = %self.name, tool = %request.tool, attempt, error = %e, "Tool dispatch failed, retrying");
                }
                Err(e) => {
                    return Err(AgentError::tool_unreachable(e.to_string()));
                }
            }
        }
    }

    /// Best-effort answer from the payloads gathered before the budget
    /// ran out.
    fn partial_summary(transcript: &[Exchange]) -> String {
        let payloads: Vec<String> = transcript
            .iter()
            .filter_map(|e| match e {
                Exchange::Outcome {
                    lookup: Lookup::Hit(payload),
                    ..
                } => Some(payload.to_string()),
                _ => None,
            })
            .collect();

        if payloads.is_empty() {
            "I ran out of reasoning steps before finding an answer.".to_string()
        } else {
            format!(
                "I could not finish reasoning, but here is what I found: {}",
                payloads.join(" ")
            )
        }
    }
}

#[async_trait]
impl AgentHandler for DomainAgent {
    fn agent_card(&self) -> AgentCard {
        self.card.clone()
    }

    async fn handle_task(&self, request: TaskRequest) -> Result<AgentResponse, String> {
        match self.respond(&request).await {
            Ok(response) => Ok(response),
            Err(e) => {
                warn!(agent = %self.name, task_id = %request.task_id, error = %e, "Task failed");
                Ok(AgentResponse::failed(
                    &request.task_id,
                    format!("The {} agent could not complete this task.", self.name),
                ))
            }
        }
    }

    async fn handle_task_streaming(
        &self,
        request: TaskRequest,
        event_tx: broadcast::Sender<TaskEvent>,
    ) -> Result<AgentResponse, String> {
        let response = self.handle_task(request).await?;
        let _ = event_tx.send(TaskEvent::chunk(&response.task_id, &response.text));
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reasoner::ScriptedReasoner;
    use conclave_a2a::ResponseStatus;
    use conclave_tools::{LocalTransport, catalog};
    use serde_json::json;

    fn agent(reasoner: ScriptedReasoner) -> DomainAgent {
        DomainAgent::new(
            "product-agent",
            "http://localhost:9102",
            Arc::new(reasoner),
            Arc::new(LocalTransport::new(catalog::product_registry())),
        )
    }

    #[tokio::test]
    async fn test_reply_without_tools() {
        let agent = agent(ScriptedReasoner::reply("hello"));
        let request = TaskRequest::with_id("t-1", "hi", "c-1");

        let response = agent.respond(&request).await.unwrap();
        assert_eq!(response.status, ResponseStatus::Ok);
        assert_eq!(response.text, "hello");
        assert!(response.tool_invocations.is_empty());
    }

    #[tokio::test]
    async fn test_tool_then_reply() {
        let agent = agent(ScriptedReasoner::new([
            Directive::CallTools(vec![ToolRequest::new(
                "lookup_product",
                json!({"sku": "SKU-123"}),
            )]),
            Directive::Reply("the mug costs 19.99".to_string()),
        ]));
        let request = TaskRequest::with_id("t-2", "price of SKU-123?", "c-1");

        let response = agent.respond(&request).await.unwrap();
        assert_eq!(response.status, ResponseStatus::Ok);
        assert_eq!(response.tool_invocations.len(), 1);
        assert!(response.tool_invocations[0].ok);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_recoverable() {
        let agent = agent(ScriptedReasoner::new([
            Directive::CallTools(vec![ToolRequest::new("lookup_weather", json!({}))]),
            Directive::Reply("never mind".to_string()),
        ]));
        let request = TaskRequest::with_id("t-3", "weather?", "c-1");

        let response = agent.respond(&request).await.unwrap();
        assert_eq!(response.status, ResponseStatus::Ok);
        assert_eq!(response.tool_invocations.len(), 1);
        assert!(!response.tool_invocations[0].ok);
    }

    #[tokio::test]
    async fn test_step_budget_degrades_to_partial() {
        let steps = (0..4).map(|_| {
            Directive::CallTools(vec![ToolRequest::new(
                "lookup_product",
                json!({"sku": "SKU-123"}),
            )])
        });
        let agent = agent(ScriptedReasoner::new(steps)).with_max_steps(3);
        let request = TaskRequest::with_id("t-4", "keep digging", "c-1");

        let response = agent.respond(&request).await.unwrap();
        assert_eq!(response.status, ResponseStatus::Partial);
        assert!(response.text.contains("19.99"));
    }

    #[tokio::test]
    async fn test_reasoner_failure_propagates() {
        // An empty script fails on the first decide call.
        let agent = agent(ScriptedReasoner::new([]));
        let request = TaskRequest::with_id("t-5", "anything", "c-1");

        let err = agent.respond(&request).await.unwrap_err();
        assert!(matches!(err, AgentError::Reasoning { .. }));

        // Through the handler it becomes a failed response, not an error.
        let response = agent
            .handle_task(TaskRequest::with_id("t-6", "anything", "c-1"))
            .await
            .unwrap();
        assert_eq!(response.status, ResponseStatus::Failed);
    }
}
