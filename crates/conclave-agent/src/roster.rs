//! The orchestrator's view of its delegates.
//!
//! Descriptors are published as immutable snapshots: a turn that started
//! against one snapshot keeps it even if the roster is replaced while the
//! turn is in flight.

use conclave_a2a::{A2aResult, AgentCard, AgentClient};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tracing::info;

/// A delegate as the orchestrator knows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDescriptor {
    pub name: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub streaming: bool,
}

impl AgentDescriptor {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            description: None,
            tags: Vec::new(),
            streaming: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Build a descriptor from a fetched agent card.
    pub fn from_card(card: &AgentCard) -> Self {
        Self {
            name: card.name.clone(),
            url: card.url.clone(),
            description: card.description.clone(),
            tags: card.capability_tags(),
            streaming: card.capabilities.streaming,
        }
    }
}

/// Atomically replaceable roster of agent descriptors.
pub struct AgentRoster {
    snapshot: RwLock<Arc<[AgentDescriptor]>>,
}

impl AgentRoster {
    pub fn new(descriptors: Vec<AgentDescriptor>) -> Self {
        Self {
            snapshot: RwLock::new(descriptors.into()),
        }
    }

    /// The current snapshot. Cheap to clone and immune to later
    /// [`AgentRoster::replace`] calls.
    pub fn snapshot(&self) -> Arc<[AgentDescriptor]> {
        match self.snapshot.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Atomically publish a new snapshot.
    pub fn replace(&self, descriptors: Vec<AgentDescriptor>) {
        let next: Arc<[AgentDescriptor]> = descriptors.into();
        match self.snapshot.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }

    /// Fetch agent cards from the given endpoints and build descriptors.
    pub async fn discover(urls: &[String]) -> A2aResult<Vec<AgentDescriptor>> {
        let mut descriptors = Vec::with_capacity(urls.len());
        for url in urls {
            let client = AgentClient::new(url)?;
            let card = client.get_agent_card().await?;
            info!(agent = %card.name, url = %url, "Discovered delegate");

            let mut descriptor = AgentDescriptor::from_card(&card);
            // The card may advertise a canonical URL; dispatch where we
            // actually found the agent.
            descriptor.url = url.clone();
            descriptors.push(descriptor);
        }
        Ok(descriptors)
    }
}
