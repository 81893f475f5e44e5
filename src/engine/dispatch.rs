//! Execution of server-side tool calls (MCP and `file_search`) against the
//! tools an earlier expansion pass discovered (§4.5, §4.10).

use serde_json::Value;

use crate::observability::metrics::record_tool_call;
use crate::tools::ExpandedTools;

use super::{Engine, ToolCallInfo};

/// Run one tool call against whichever server-side executor owns it.
///
/// A failed MCP call is recovered into an error string rather than
/// propagated: the agentic loop still needs a `function_call_output` to feed
/// back to the backend on the next turn (§4.10, "MCP tool-call failure
/// recovered into function_call_output").
pub async fn execute_server_side_tool(engine: &Engine, expanded: &ExpandedTools, call: &ToolCallInfo) -> String {
    record_tool_call(&call.name, true);

    if let Some(session) = expanded.mcp_session_for(&call.name) {
        let arguments: Value = serde_json::from_str(&call.arguments).unwrap_or(Value::Null);
        return match session.execute(&call.name, arguments).await {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(tool = %call.name, error = %err, "mcp tool call failed");
                format!("error: {err}")
            }
        };
    }

    if let Some(config) = expanded.file_search.get(&call.name) {
        let arguments: Value = serde_json::from_str(&call.arguments).unwrap_or(Value::Null);
        let query = arguments.get("query").and_then(Value::as_str).unwrap_or("");

        let mut results = Vec::new();
        for vector_store_id in &config.vector_store_ids {
            match engine
                .vector_search
                .search(vector_store_id, query, config.max_num_results)
                .await
            {
                Ok(mut found) => results.append(&mut found),
                Err(err) => tracing::warn!(
                    vector_store_id = %vector_store_id,
                    error = %err,
                    "vector search failed"
                ),
            }
        }
        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(config.max_num_results as usize);

        return serde_json::to_string(&results).unwrap_or_else(|_| "[]".to_string());
    }

    // Dispatch is only ever invoked for a name the expansion pass already
    // classified as server-side (see `ExpandedTools::is_mcp_tool` /
    // `is_file_search_tool`); reaching here means the caller's classification
    // and this lookup disagree.
    tracing::error!(tool = %call.name, "server-side tool dispatch found no matching executor");
    "error: no executor registered for this tool".to_string()
}
