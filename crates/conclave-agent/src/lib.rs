//! Domain agents and the orchestrator for conclave.
//!
//! A [`DomainAgent`] owns one concern and one tool server, looping between
//! its [`Reasoner`] and tool invocations until it can answer. The
//! [`Orchestrator`] decomposes a user utterance across a roster of such
//! agents via its [`Planner`], fans the tasks out concurrently, and
//! composes the answers into a single reply.
//!
//! Reasoning is a capability, not a dependency: [`Reasoner`] and
//! [`Planner`] are traits, with deterministic scripted and keyword
//! implementations in-tree. Model-backed implementations plug in from
//! outside.

pub mod domain;
pub mod error;
pub mod orchestrator;
pub mod planner;
pub mod reasoner;
pub mod roster;

pub use domain::DomainAgent;
pub use error::{AgentError, AgentResult};
pub use orchestrator::{
    ConversationTurn, Delegate, Orchestrator, RemoteDelegate, TurnEvent, TurnStream,
};
pub use planner::{Assignment, KeywordPlanner, Plan, Planner, ScriptedPlanner, TaskOutcome};
pub use reasoner::{
    Directive, Exchange, KeywordReasoner, Reasoner, ScriptedReasoner, ToolRequest,
};
pub use roster::{AgentDescriptor, AgentRoster};
