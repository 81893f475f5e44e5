//! Wire types for the Responses API: request, response, input items, output
//! items, content parts, and tool descriptors.
//!
//! Unknown fields are tolerated everywhere via `#[serde(flatten)] other`, and
//! unrecognized input items deserialize into `InputItem::Unknown` rather than
//! failing the whole request — per-item leniency, not permissiveness on the
//! required top-level fields (`model`, `input`).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::{Validate, ValidationError};

use crate::common::{ResponseError, Usage};
use crate::validated::Normalizable;

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ResponsesRequest {
    #[validate(length(min = 1, message = "model must not be empty"))]
    pub model: String,

    #[validate(custom(function = "validate_input"))]
    pub input: ResponseInput,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDescriptor>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tool_calls: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel_tool_calls: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truncation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_logprobs: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_response_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,

    /// Unrecognized top-level fields, preserved for forward-compat echo back
    /// on the response but never interpreted by the engine.
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl ResponsesRequest {
    pub fn is_streaming(&self) -> bool {
        self.stream.unwrap_or(false)
    }

    pub fn effective_max_tool_calls(&self) -> i64 {
        self.max_tool_calls.unwrap_or(10).max(1)
    }
}

impl Normalizable for ResponsesRequest {
    fn normalize(&mut self) {
        // `store` on the outbound backend request is forced false elsewhere
        // (the gateway owns persistence); nothing to normalize on the inbound
        // request itself beyond leaving `store` as the caller's echoed intent.
    }
}

fn validate_input(input: &ResponseInput) -> Result<(), ValidationError> {
    match input {
        ResponseInput::Text(s) if s.is_empty() => {
            Err(ValidationError::new("input must not be empty"))
        }
        ResponseInput::Items(items) if items.is_empty() => {
            Err(ValidationError::new("input must not be empty"))
        }
        _ => Ok(()),
    }
}

/// `input` is either a plain string (one implicit user message) or an ordered
/// sequence of input items.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseInput {
    Text(String),
    Items(Vec<InputItem>),
}

impl ResponseInput {
    pub fn is_empty(&self) -> bool {
        match self {
            ResponseInput::Text(s) => s.is_empty(),
            ResponseInput::Items(items) => items.is_empty(),
        }
    }
}

/// One element of a structured `input` sequence.
///
/// Deserialized permissively: an item with an unrecognized `type` and no
/// recognized `role` becomes `Unknown` and is dropped by the engine rather
/// than failing the request (§4.2, §9 "dynamic input parsing").
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum InputItem {
    Message(MessageItem),
    FunctionCall(FunctionCallItem),
    FunctionCallOutput(FunctionCallOutputItem),
    Unknown(Value),
}

impl<'de> Deserialize<'de> for InputItem {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let item_type = value.get("type").and_then(Value::as_str);
        let has_role = value.get("role").and_then(Value::as_str).is_some();

        let classified = match item_type {
            Some("function_call") => serde_json::from_value::<FunctionCallItem>(value.clone())
                .ok()
                .map(InputItem::FunctionCall),
            Some("function_call_output") => {
                serde_json::from_value::<FunctionCallOutputItem>(value.clone())
                    .ok()
                    .map(InputItem::FunctionCallOutput)
            }
            Some("message") => serde_json::from_value::<MessageItem>(value.clone())
                .ok()
                .map(InputItem::Message),
            Some(_) => None,
            None if has_role => serde_json::from_value::<MessageItem>(value.clone())
                .ok()
                .map(InputItem::Message),
            None => None,
        };

        Ok(classified.unwrap_or(InputItem::Unknown(value)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageItem {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub item_type: Option<String>,
    pub role: String,
    pub content: MessageContent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<InputContentPart>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputContentPart {
    InputText { text: String },
    #[serde(alias = "text")]
    Text { text: String },
    InputImage { image_url: String },
    InputFile { file: InputFileRef },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputFileRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCallItem {
    #[serde(rename = "type", default = "function_call_type")]
    pub item_type: String,
    pub call_id: String,
    pub name: String,
    pub arguments: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

fn function_call_type() -> String {
    "function_call".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCallOutputItem {
    #[serde(rename = "type", default = "function_call_output_type")]
    pub item_type: String,
    pub call_id: String,
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

fn function_call_output_type() -> String {
    "function_call_output".to_string()
}

// ---------------------------------------------------------------------------
// Tool descriptors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolDescriptor {
    Function {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(default)]
        parameters: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        strict: Option<bool>,
    },
    Mcp {
        server_label: String,
    },
    FileSearch {
        vector_store_ids: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_num_results: Option<u32>,
    },
    /// Any other tool type the gateway doesn't expand (`web_search`, etc.):
    /// passed through the expanders untouched, stripped by the Chat adapter.
    #[serde(other)]
    Other,
}

impl ToolDescriptor {
    pub fn type_name(&self) -> &'static str {
        match self {
            ToolDescriptor::Function { .. } => "function",
            ToolDescriptor::Mcp { .. } => "mcp",
            ToolDescriptor::FileSearch { .. } => "file_search",
            ToolDescriptor::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolChoice {
    Mode(String),
    Function { name: String },
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    InProgress,
    Completed,
    Incomplete,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: String,
    #[serde(default = "response_object")]
    pub object: String,
    pub status: ResponseStatus,
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_response_id: Option<String>,

    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,

    pub output: Vec<OutputItem>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incomplete_details: Option<IncompleteDetails>,

    // Echoed request parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDescriptor>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tool_calls: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel_tool_calls: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truncation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_logprobs: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, String>>,

    #[serde(flatten)]
    pub other: Map<String, Value>,
}

fn response_object() -> String {
    "response".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncompleteDetails {
    pub reason: String,
}

impl Response {
    pub fn new(id: String, model: String, created_at: i64) -> Self {
        Self {
            id,
            object: response_object(),
            status: ResponseStatus::InProgress,
            model,
            conversation: None,
            previous_response_id: None,
            created_at,
            completed_at: None,
            output: Vec::new(),
            usage: None,
            error: None,
            incomplete_details: None,
            instructions: None,
            tools: None,
            tool_choice: None,
            temperature: None,
            top_p: None,
            max_output_tokens: None,
            max_tool_calls: None,
            parallel_tool_calls: None,
            truncation: None,
            top_logprobs: None,
            store: None,
            metadata: None,
            other: Map::new(),
        }
    }

    pub fn echo_request(&mut self, req: &ResponsesRequest) {
        self.instructions = req.instructions.clone();
        self.tools = req.tools.clone();
        self.tool_choice = req.tool_choice.clone();
        self.temperature = req.temperature;
        self.top_p = req.top_p;
        self.max_output_tokens = req.max_output_tokens;
        self.max_tool_calls = req.max_tool_calls;
        self.parallel_tool_calls = req.parallel_tool_calls;
        self.truncation = req.truncation.clone();
        self.top_logprobs = req.top_logprobs;
        self.store = req.store;
        self.metadata = req.metadata.clone();
        self.previous_response_id = req.previous_response_id.clone();
    }

    pub fn mark_completed(&mut self, completed_at: i64) {
        self.status = ResponseStatus::Completed;
        self.completed_at = Some(completed_at);
    }

    pub fn mark_incomplete(&mut self, reason: impl Into<String>, completed_at: i64) {
        self.status = ResponseStatus::Incomplete;
        self.completed_at = Some(completed_at);
        self.incomplete_details = Some(IncompleteDetails {
            reason: reason.into(),
        });
    }

    pub fn mark_failed(&mut self, error: ResponseError, completed_at: i64) {
        self.status = ResponseStatus::Failed;
        self.completed_at = Some(completed_at);
        self.error = Some(error);
    }
}

/// One element of `response.output`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputItem {
    Message {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        role: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<String>,
        content: Vec<OutputContentPart>,
    },
    FunctionCall {
        id: String,
        call_id: String,
        name: String,
        arguments: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<String>,
    },
    FunctionCallOutput {
        id: String,
        call_id: String,
        output: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<String>,
    },
}

impl OutputItem {
    pub fn id(&self) -> &str {
        match self {
            OutputItem::Message { id, .. } => id,
            OutputItem::FunctionCall { id, .. } => id,
            OutputItem::FunctionCallOutput { id, .. } => id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputContentPart {
    OutputText {
        text: String,
        #[serde(default)]
        annotations: Vec<Value>,
        #[serde(default)]
        logprobs: Vec<Value>,
    },
}

impl OutputContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        OutputContentPart::OutputText {
            text: text.into(),
            annotations: Vec::new(),
            logprobs: Vec::new(),
        }
    }
}
