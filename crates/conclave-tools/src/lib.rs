//! Tool-invocation boundary for conclave.
//!
//! Tools are named, read-only lookups with a declared argument schema.
//! This crate provides the schema and validation types, the [`LookupTool`]
//! trait and in-memory [`ToolRegistry`], an HTTP server exposing a
//! registry, and the [`ToolTransport`] seam agents use to reach tools
//! locally or over HTTP. The built-in user and product lookups live in
//! [`catalog`].

pub mod catalog;
pub mod error;
pub mod registry;
pub mod schema;
pub mod server;
pub mod transport;

pub use catalog::{
    ProductLookupTool, ProductRecord, ProductStore, UserLookupTool, UserRecord, UserStore,
};
pub use error::{ErrorDetail, ToolError};
pub use registry::{InvokeRequest, Lookup, LookupTool, ToolRegistry, ToolResult};
pub use schema::{ArgKind, ArgSpec, ToolSchema};
pub use server::ToolServer;
pub use transport::{HttpToolClient, LocalTransport, ToolTransport};
