use std::collections::HashMap;

use openai_protocol::responses::ToolDescriptor;
use serde_json::json;

const DEFAULT_MAX_NUM_RESULTS: u32 = 10;

#[derive(Debug, Clone)]
pub struct FileSearchConfig {
    pub vector_store_ids: Vec<String>,
    pub max_num_results: u32,
}

/// Replace each `file_search` entry with a synthetic `file_search` function
/// tool requiring a `query` string (§4.5). Non-matching entries pass through.
pub fn expand_file_search_tools(
    tools: &[ToolDescriptor],
) -> (Vec<ToolDescriptor>, HashMap<String, FileSearchConfig>) {
    let mut expanded = Vec::new();
    let mut configs = HashMap::new();

    for tool in tools {
        match tool {
            ToolDescriptor::FileSearch {
                vector_store_ids,
                max_num_results,
            } => {
                expanded.push(ToolDescriptor::Function {
                    name: "file_search".to_string(),
                    description: Some("Search configured vector stores for relevant content.".to_string()),
                    parameters: json!({
                        "type": "object",
                        "properties": { "query": { "type": "string" } },
                        "required": ["query"],
                    }),
                    strict: None,
                });
                configs.insert(
                    "file_search".to_string(),
                    FileSearchConfig {
                        vector_store_ids: vector_store_ids.clone(),
                        max_num_results: max_num_results.unwrap_or(DEFAULT_MAX_NUM_RESULTS),
                    },
                );
            }
            other => expanded.push(other.clone()),
        }
    }

    (expanded, configs)
}
