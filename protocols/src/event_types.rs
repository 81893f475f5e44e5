//! SSE event-type string constants for the Responses API streaming envelope.
//!
//! Centralized here so the streaming normalizer and its tests never hand-type
//! an event name. Matches the `response.*` / `*.delta` / `*.done` vocabulary
//! emitted by `response.created` through `response.completed`.

/// Top-level response lifecycle events.
pub enum ResponseEvent {}

impl ResponseEvent {
    pub const CREATED: &'static str = "response.created";
    pub const IN_PROGRESS: &'static str = "response.in_progress";
    pub const COMPLETED: &'static str = "response.completed";
    pub const FAILED: &'static str = "response.failed";
    pub const INCOMPLETE: &'static str = "response.incomplete";
}

/// Output-item lifecycle events (one item = one entry in `response.output`).
pub enum OutputItemEvent {}

impl OutputItemEvent {
    pub const ADDED: &'static str = "response.output_item.added";
    pub const DONE: &'static str = "response.output_item.done";
}

/// Content-part lifecycle events, scoped to a single output item.
pub enum ContentPartEvent {}

impl ContentPartEvent {
    pub const ADDED: &'static str = "response.content_part.added";
    pub const DONE: &'static str = "response.content_part.done";
}

/// Text deltas within a `output_text` content part.
pub enum OutputTextEvent {}

impl OutputTextEvent {
    pub const DELTA: &'static str = "response.output_text.delta";
    pub const DONE: &'static str = "response.output_text.done";
}

/// Function-call argument deltas, accumulated client-side into one JSON string.
pub enum FunctionCallEvent {}

impl FunctionCallEvent {
    pub const ARGUMENTS_DELTA: &'static str = "response.function_call_arguments.delta";
    pub const ARGUMENTS_DONE: &'static str = "response.function_call_arguments.done";
}

/// MCP tool-call lifecycle events emitted while the gateway executes a tool
/// server-side, in between backend turns.
pub enum McpEvent {}

impl McpEvent {
    pub const CALL_ARGUMENTS_DELTA: &'static str = "response.mcp_call_arguments.delta";
    pub const CALL_ARGUMENTS_DONE: &'static str = "response.mcp_call_arguments.done";
    pub const CALL_IN_PROGRESS: &'static str = "response.mcp_call.in_progress";
    pub const CALL_COMPLETED: &'static str = "response.mcp_call.completed";
    pub const CALL_FAILED: &'static str = "response.mcp_call.failed";
    pub const LIST_TOOLS_IN_PROGRESS: &'static str = "response.mcp_list_tools.in_progress";
    pub const LIST_TOOLS_COMPLETED: &'static str = "response.mcp_list_tools.completed";
    pub const LIST_TOOLS_FAILED: &'static str = "response.mcp_list_tools.failed";
}

/// File-search tool-call lifecycle events.
pub enum FileSearchCallEvent {}

impl FileSearchCallEvent {
    pub const IN_PROGRESS: &'static str = "response.file_search_call.in_progress";
    pub const SEARCHING: &'static str = "response.file_search_call.searching";
    pub const COMPLETED: &'static str = "response.file_search_call.completed";
}

/// Output item `type` discriminators, as they appear in `response.output[].type`
/// and in conversation-item JSON persisted to storage.
pub enum ItemType {}

impl ItemType {
    pub const MESSAGE: &'static str = "message";
    pub const REASONING: &'static str = "reasoning";
    pub const FUNCTION_CALL: &'static str = "function_call";
    pub const FUNCTION_CALL_OUTPUT: &'static str = "function_call_output";
    pub const MCP_CALL: &'static str = "mcp_call";
    pub const MCP_LIST_TOOLS: &'static str = "mcp_list_tools";
    pub const FILE_SEARCH_CALL: &'static str = "file_search_call";

    pub const fn is_function_call(item_type: &str) -> bool {
        matches!(item_type.as_bytes(), b"function_call")
    }

    pub const fn is_server_side_tool_call(item_type: &str) -> bool {
        matches!(item_type.as_bytes(), b"mcp_call" | b"file_search_call")
    }
}

/// True if `event_type` is one of the top-level `response.*` lifecycle events
/// (as opposed to an item- or part-scoped event).
pub fn is_response_lifecycle_event(event_type: &str) -> bool {
    matches!(
        event_type,
        ResponseEvent::CREATED
            | ResponseEvent::IN_PROGRESS
            | ResponseEvent::COMPLETED
            | ResponseEvent::FAILED
            | ResponseEvent::INCOMPLETE
    )
}

/// True if `item_type` denotes a function call the caller is expected to execute
/// (as opposed to a server-side tool call the gateway executes itself).
pub fn is_function_call_type(item_type: &str) -> bool {
    item_type == ItemType::FUNCTION_CALL
}
