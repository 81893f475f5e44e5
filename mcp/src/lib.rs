//! Stateless MCP client used by the gateway's tool expander and agentic loop.
//!
//! One [`session::McpToolSession`] is created per request per connector and
//! discarded at request end; server-assigned session ids are never reused.

pub mod client;
pub mod connector;
pub mod error;
pub mod session;

pub use client::{McpClient, McpToolCallResult, McpToolDescriptor};
pub use connector::{Connector, ConnectorStore, StaticConnectorStore};
pub use error::McpError;
pub use session::McpToolSession;
