//! Agent-invocation protocol for conclave.
//!
//! Defines the wire types agents exchange (agent cards, task requests and
//! responses, streaming task events) plus an HTTP server and client for
//! them. The server half is behind the `server` feature, the client half
//! behind `client`.
//!
//! # Example
//!
//! ```rust,ignore
//! use conclave_a2a::{AgentCard, AgentHandler, AgentServer, AgentSkill};
//!
//! struct MyAgent;
//!
//! #[async_trait::async_trait]
//! impl AgentHandler for MyAgent {
//!     fn agent_card(&self) -> AgentCard {
//!         AgentCard::new("my-agent", "http://localhost:9101")
//!             .with_skill(AgentSkill::new("lookup_user", "User lookup"))
//!     }
//!
//!     async fn handle_task(
//!         &self,
//!         request: conclave_a2a::TaskRequest,
//!     ) -> Result<conclave_a2a::AgentResponse, String> {
//!         Ok(conclave_a2a::AgentResponse::ok(request.task_id, "done"))
//!     }
//! }
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! AgentServer::new(MyAgent).serve("127.0.0.1:9101").await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod types;

#[cfg(feature = "client")]
pub mod client;

#[cfg(feature = "server")]
pub mod server;

pub use error::{A2aError, A2aResult, ErrorResponse};
pub use types::{
    AgentCapabilities, AgentCard, AgentResponse, AgentSkill, CancelAck, ResponseStatus, TaskEvent,
    TaskRequest, ToolInvocation,
};

#[cfg(feature = "client")]
pub use client::AgentClient;

#[cfg(feature = "server")]
pub use server::{AgentHandler, AgentServer};
