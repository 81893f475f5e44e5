//! Tool expansion (§4.5): turns `mcp` and `file_search` tool descriptors into
//! `function` tools the backend understands, while recording enough state
//! for the engine to execute matching tool calls server-side.

pub mod file_search;
pub mod mcp_expansion;

use std::collections::HashMap;

use gw_mcp::McpToolSession;
use openai_protocol::responses::ToolDescriptor;

pub use file_search::FileSearchConfig;

/// Result of expanding a request's `tools` array: the tools to actually send
/// to the backend, plus the maps the engine uses to route a function-call
/// name back to whichever server-side executor owns it.
pub struct ExpandedTools {
    pub tools: Vec<ToolDescriptor>,
    pub mcp_sessions: HashMap<String, McpToolSession>,
    pub file_search: HashMap<String, FileSearchConfig>,
}

impl ExpandedTools {
    pub fn is_mcp_tool(&self, name: &str) -> bool {
        self.mcp_sessions.values().any(|s| s.has_tool(name))
    }

    pub fn is_file_search_tool(&self, name: &str) -> bool {
        self.file_search.contains_key(name)
    }

    /// The session that owns the given MCP tool name, if any.
    pub fn mcp_session_for(&self, name: &str) -> Option<&McpToolSession> {
        self.mcp_sessions.values().find(|s| s.has_tool(name))
    }
}
