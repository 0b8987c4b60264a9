//! Turn planning: decompose an utterance into delegate tasks and compose
//! their answers back into one reply.

use crate::error::{AgentError, AgentResult};
use crate::roster::AgentDescriptor;
use async_trait::async_trait;
use conclave_a2a::AgentResponse;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// One task for one delegate.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub agent: String,
    pub instruction: String,
}

impl Assignment {
    pub fn new(agent: impl Into<String>, instruction: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            instruction: instruction.into(),
        }
    }
}

/// The decomposition of one utterance. An empty plan means the planner
/// answers directly from [`Planner::compose`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Plan {
    pub assignments: Vec<Assignment>,
}

impl Plan {
    pub fn new(assignments: Vec<Assignment>) -> Self {
        Self { assignments }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

/// What came back from one dispatched task. Failures keep the typed
/// error so a timeout stays distinguishable from an unreachable delegate.
#[derive(Debug, Clone)]
pub enum TaskOutcome {
    Completed {
        task_id: String,
        agent: String,
        response: AgentResponse,
    },
    Failed {
        task_id: String,
        agent: String,
        error: Arc<AgentError>,
    },
}

impl TaskOutcome {
    pub fn completed(
        task_id: impl Into<String>,
        agent: impl Into<String>,
        response: AgentResponse,
    ) -> Self {
        Self::Completed {
            task_id: task_id.into(),
            agent: agent.into(),
            response,
        }
    }

    pub fn failed(
        task_id: impl Into<String>,
        agent: impl Into<String>,
        error: AgentError,
    ) -> Self {
        Self::Failed {
            task_id: task_id.into(),
            agent: agent.into(),
            error: Arc::new(error),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Why the task failed, if it did.
    pub fn error(&self) -> Option<&AgentError> {
        match self {
            Self::Completed { .. } => None,
            Self::Failed { error, .. } => Some(error),
        }
    }

    pub fn task_id(&self) -> &str {
        match self {
            Self::Completed { task_id, .. } | Self::Failed { task_id, .. } => task_id,
        }
    }

    pub fn agent(&self) -> &str {
        match self {
            Self::Completed { agent, .. } | Self::Failed { agent, .. } => agent,
        }
    }

    /// The usable answer text, if the task produced one.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Completed { response, .. } => Some(&response.text),
            Self::Failed { .. } => None,
        }
    }
}

/// The orchestrator's reasoning capability: decompose and compose.
#[async_trait]
pub trait Planner: Send + Sync {
    /// Break an utterance into per-delegate assignments against the
    /// current roster snapshot.
    async fn plan(&self, utterance: &str, roster: &[AgentDescriptor]) -> AgentResult<Plan>;

    /// Combine the task outcomes into the user-facing reply. Called with
    /// an empty slice when the plan had no assignments.
    async fn compose(&self, utterance: &str, outcomes: &[TaskOutcome]) -> AgentResult<String>;
}

/// Stitch completed answers together, noting degradation when some tasks
/// failed. Shared by the deterministic planners.
fn stitch(outcomes: &[TaskOutcome], fallback: &str) -> String {
    let texts: Vec<&str> = outcomes.iter().filter_map(TaskOutcome::text).collect();
    if texts.is_empty() {
        return fallback.to_string();
    }

    let mut reply = texts.join("\n");
    if outcomes.iter().any(TaskOutcome::is_failure) {
        reply.push_str("\n(Some of the requested information was unavailable.)");
    }
    reply
}

/// Replays a fixed sequence of plans, one per turn.
pub struct ScriptedPlanner {
    plans: Mutex<VecDeque<Plan>>,
    direct_reply: String,
}

impl ScriptedPlanner {
    pub fn new(plans: impl IntoIterator<Item = Plan>) -> Self {
        Self {
            plans: Mutex::new(plans.into_iter().collect()),
            direct_reply: "I do not need any delegate for that.".to_string(),
        }
    }

    /// Reply used by `compose` when a turn produced no outcomes.
    pub fn with_direct_reply(mut self, reply: impl Into<String>) -> Self {
        self.direct_reply = reply.into();
        self
    }
}

#[async_trait]
impl Planner for ScriptedPlanner {
    async fn plan(&self, _utterance: &str, _roster: &[AgentDescriptor]) -> AgentResult<Plan> {
        let plan = match self.plans.lock() {
            Ok(mut plans) => plans.pop_front(),
            Err(poisoned) => poisoned.into_inner().pop_front(),
        };
        plan.ok_or_else(|| AgentError::reasoning("plan script exhausted"))
    }

    async fn compose(&self, _utterance: &str, outcomes: &[TaskOutcome]) -> AgentResult<String> {
        Ok(stitch(outcomes, &self.direct_reply))
    }
}

/// Routes an utterance to every roster agent whose capability tags or
/// description words it mentions.
#[derive(Default)]
pub struct KeywordPlanner;

impl KeywordPlanner {
    pub fn new() -> Self {
        Self
    }

    fn matches(descriptor: &AgentDescriptor, lowered: &str) -> bool {
        descriptor
            .tags
            .iter()
            .any(|tag| lowered.contains(&tag.to_lowercase()))
            || descriptor
                .description
                .as_deref()
                .unwrap_or_default()
                .to_lowercase()
                .split_whitespace()
                .filter(|word| word.len() > 3)
                .any(|word| lowered.contains(word))
    }
}

#[async_trait]
impl Planner for KeywordPlanner {
    async fn plan(&self, utterance: &str, roster: &[AgentDescriptor]) -> AgentResult<Plan> {
        let lowered = utterance.to_lowercase();
        let assignments = roster
            .iter()
            .filter(|descriptor| Self::matches(descriptor, &lowered))
            .map(|descriptor| Assignment::new(&descriptor.name, utterance))
            .collect();
        Ok(Plan::new(assignments))
    }

    async fn compose(&self, _utterance: &str, outcomes: &[TaskOutcome]) -> AgentResult<String> {
        Ok(stitch(
            outcomes,
            "I do not have an agent that can help with that yet.",
        ))
    }
}
