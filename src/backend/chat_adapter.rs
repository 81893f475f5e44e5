//! Chat Completions adapter (§4.4): translates a `ResponsesRequest` (whose
//! `input` carries the engine's rolling transcript as Responses input items)
//! to a Chat Completions request, and translates the Chat response — or
//! stream of chunks — back into the Responses shape.

use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use openai_protocol::chat::{
    ChatChoice, ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, ChatContent,
    ChatContentPart, ChatFunctionDef, ChatImageUrl, ChatMessage, ChatTool, ChatToolCall, StreamOptions,
};
use openai_protocol::common::Usage;
use openai_protocol::ids;
use openai_protocol::responses::{
    InputContentPart, InputItem, MessageContent, OutputContentPart, OutputItem, Response,
    ResponseInput, ResponseStatus, ResponsesRequest, ToolChoice, ToolDescriptor,
};

use super::sse::frames;
use super::{BackendClient, BackendError, BackendResult, StreamEvent};

pub struct ChatCompletionsAdapter {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl ChatCompletionsAdapter {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn apply_auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}

// ---------------------------------------------------------------------------
// Outbound: Responses request -> Chat Completions request
// ---------------------------------------------------------------------------

/// Rule 1-4 of §4.4's outbound message construction.
pub fn build_chat_messages(request: &ResponsesRequest) -> Vec<ChatMessage> {
    let mut messages = Vec::new();

    if let Some(instructions) = &request.instructions {
        if !instructions.is_empty() {
            messages.push(ChatMessage::system(instructions.clone()));
        }
    }

    let mut pending_tool_calls: Vec<ChatToolCall> = Vec::new();
    let flush = |messages: &mut Vec<ChatMessage>, pending: &mut Vec<ChatToolCall>| {
        if !pending.is_empty() {
            messages.push(ChatMessage::assistant_tool_calls(std::mem::take(pending)));
        }
    };

    match &request.input {
        ResponseInput::Text(text) => {
            messages.push(ChatMessage::user(ChatContent::Text(text.clone())));
        }
        ResponseInput::Items(items) => {
            for item in items {
                match item {
                    InputItem::Message(m) => {
                        flush(&mut messages, &mut pending_tool_calls);
                        let role = remap_role(&m.role);
                        let content = convert_message_content(&m.content);
                        messages.push(ChatMessage {
                            role,
                            content: Some(content),
                            tool_calls: None,
                            tool_call_id: None,
                        });
                    }
                    InputItem::FunctionCall(fc) => {
                        pending_tool_calls.push(ChatToolCall {
                            id: fc.call_id.clone(),
                            call_type: "function".to_string(),
                            function: openai_protocol::chat::ChatFunctionCall {
                                name: fc.name.clone(),
                                arguments: fc.arguments.clone(),
                            },
                        });
                    }
                    InputItem::FunctionCallOutput(fco) => {
                        flush(&mut messages, &mut pending_tool_calls);
                        messages.push(ChatMessage::tool_result(fco.call_id.clone(), fco.output.clone()));
                    }
                    InputItem::Unknown(value) => {
                        flush(&mut messages, &mut pending_tool_calls);
                        if let Some(content) = value.get("content").and_then(|c| c.as_str()) {
                            let role = value
                                .get("role")
                                .and_then(|r| r.as_str())
                                .map(remap_role)
                                .unwrap_or_else(|| "user".to_string());
                            messages.push(ChatMessage {
                                role,
                                content: Some(ChatContent::Text(content.to_string())),
                                tool_calls: None,
                                tool_call_id: None,
                            });
                        }
                        // Otherwise genuinely unrecognized: dropped (§4.2, §9).
                    }
                }
            }
        }
    }
    flush(&mut messages, &mut pending_tool_calls);

    messages
}

fn remap_role(role: &str) -> String {
    if role == "developer" {
        "system".to_string()
    } else {
        role.to_string()
    }
}

fn convert_message_content(content: &MessageContent) -> ChatContent {
    match content {
        MessageContent::Text(text) => ChatContent::Text(text.clone()),
        MessageContent::Parts(parts) => {
            let all_text = parts
                .iter()
                .all(|p| matches!(p, InputContentPart::InputText { .. } | InputContentPart::Text { .. }));

            if all_text {
                let joined = parts
                    .iter()
                    .map(|p| match p {
                        InputContentPart::InputText { text } | InputContentPart::Text { text } => {
                            text.as_str()
                        }
                        _ => "",
                    })
                    .collect::<Vec<_>>()
                    .join(" ");
                ChatContent::Text(joined)
            } else {
                let converted = parts
                    .iter()
                    .map(|p| match p {
                        InputContentPart::InputText { text } | InputContentPart::Text { text } => {
                            ChatContentPart::Text { text: text.clone() }
                        }
                        InputContentPart::InputImage { image_url } => ChatContentPart::ImageUrl {
                            image_url: ChatImageUrl {
                                url: image_url.clone(),
                            },
                        },
                        InputContentPart::InputFile { file } => {
                            ChatContentPart::File { file: serde_json::to_value(file).unwrap_or_default() }
                        }
                    })
                    .collect();
                ChatContent::Parts(converted)
            }
        }
    }
}

/// Strip non-function tools; drop `tool_choice` if nothing remains (§4.4).
fn build_chat_tools(tools: Option<&[ToolDescriptor]>, tool_choice: Option<&ToolChoice>) -> (Option<Vec<ChatTool>>, Option<serde_json::Value>) {
    let Some(tools) = tools else {
        return (None, None);
    };

    let function_tools: Vec<ChatTool> = tools
        .iter()
        .filter_map(|t| match t {
            ToolDescriptor::Function {
                name,
                description,
                parameters,
                ..
            } => Some(ChatTool {
                tool_type: "function".to_string(),
                function: ChatFunctionDef {
                    name: name.clone(),
                    description: description.clone(),
                    parameters: parameters.clone(),
                },
            }),
            _ => None,
        })
        .collect();

    if function_tools.is_empty() {
        return (None, None);
    }

    let choice = tool_choice.map(|tc| match tc {
        ToolChoice::Mode(mode) => serde_json::Value::String(mode.clone()),
        ToolChoice::Function { name } => serde_json::json!({
            "type": "function",
            "function": { "name": name }
        }),
    });

    (Some(function_tools), choice)
}

pub fn build_chat_request(request: &ResponsesRequest, stream: bool) -> ChatCompletionRequest {
    let messages = build_chat_messages(request);
    let (tools, tool_choice) = build_chat_tools(request.tools.as_deref(), request.tool_choice.as_ref());

    let mut logprobs = None;
    if request.top_logprobs.is_some() {
        logprobs = Some(true);
    }

    ChatCompletionRequest {
        model: request.model.clone(),
        messages,
        tools,
        tool_choice,
        temperature: request.temperature,
        top_p: request.top_p,
        frequency_penalty: request.frequency_penalty,
        presence_penalty: request.presence_penalty,
        max_tokens: request.max_output_tokens,
        logprobs,
        top_logprobs: request.top_logprobs,
        stream: Some(stream),
        stream_options: if stream {
            Some(StreamOptions { include_usage: true })
        } else {
            None
        },
        other: Default::default(),
    }
}

// ---------------------------------------------------------------------------
// Inbound (non-streaming): Chat response -> Responses output items
// ---------------------------------------------------------------------------

fn map_usage(chat_usage: &openai_protocol::chat::ChatUsage) -> Usage {
    Usage {
        input_tokens: chat_usage.prompt_tokens,
        output_tokens: chat_usage.completion_tokens,
        total_tokens: chat_usage.total_tokens,
        ..Default::default()
    }
}

fn status_for_finish_reason(finish_reason: Option<&str>) -> ResponseStatus {
    match finish_reason {
        Some("length") => ResponseStatus::Incomplete,
        _ => ResponseStatus::Completed,
    }
}

pub fn chat_response_to_responses(resp: ChatCompletionResponse, model: &str) -> Response {
    let created_at = if resp.created > 0 { resp.created } else { ids::now_seconds() };
    let mut out = Response::new(ids::generate_response_id(), model.to_string(), created_at);

    let Some(choice) = resp.choices.into_iter().next() else {
        out.status = ResponseStatus::Completed;
        out.usage = resp.usage.as_ref().map(map_usage);
        return out;
    };
    build_output_from_choice(&mut out, choice);
    out.usage = resp.usage.as_ref().map(map_usage);
    out
}

fn build_output_from_choice(out: &mut Response, choice: ChatChoice) {
    out.status = status_for_finish_reason(choice.finish_reason.as_deref());

    if let Some(content) = choice.message.content.filter(|c| !c.is_empty()) {
        out.output.push(OutputItem::Message {
            id: ids::generate_id("msg"),
            role: Some("assistant".to_string()),
            status: Some("completed".to_string()),
            content: vec![OutputContentPart::text(content)],
        });
    }

    if let Some(tool_calls) = choice.message.tool_calls {
        for tc in tool_calls {
            out.output.push(OutputItem::FunctionCall {
                id: ids::generate_id("fc"),
                call_id: tc.id,
                name: tc.function.name,
                arguments: tc.function.arguments,
                status: Some("completed".to_string()),
            });
        }
    }
}

// ---------------------------------------------------------------------------
// Inbound (streaming): Chat chunks -> Responses adapter events
// ---------------------------------------------------------------------------

struct StreamAccumulator {
    response_id: Option<String>,
    model: Option<String>,
    created_at: Option<i64>,
    message_item_id: Option<String>,
    text: String,
    text_seen: bool,
    tool_calls: BTreeMap<usize, ToolCallAccumulator>,
    finish_reason: Option<String>,
    usage: Option<Usage>,
}

#[derive(Default)]
struct ToolCallAccumulator {
    item_id: String,
    call_id: String,
    name: String,
    arguments: String,
}

impl StreamAccumulator {
    fn new() -> Self {
        Self {
            response_id: None,
            model: None,
            created_at: None,
            message_item_id: None,
            text: String::new(),
            text_seen: false,
            tool_calls: BTreeMap::new(),
            finish_reason: None,
            usage: None,
        }
    }

    fn capture_metadata(&mut self, chunk: &ChatCompletionChunk) {
        if self.response_id.is_none() && !chunk.id.is_empty() {
            self.response_id = Some(chunk.id.clone());
        }
        if self.model.is_none() && !chunk.model.is_empty() {
            self.model = Some(chunk.model.clone());
        }
        if self.created_at.is_none() && chunk.created > 0 {
            self.created_at = Some(chunk.created);
        }
    }

    fn text_output_index(&self) -> usize {
        0
    }

    fn tool_call_base_index(&self) -> usize {
        if self.text_seen {
            1
        } else {
            0
        }
    }

    fn finish(&self, fallback_model: &str) -> Response {
        let id = self.response_id.clone().unwrap_or_else(ids::generate_response_id);
        let model = self.model.clone().unwrap_or_else(|| fallback_model.to_string());
        let created_at = self.created_at.unwrap_or_else(ids::now_seconds);
        let mut response = Response::new(id, model, created_at);
        response.status = status_for_finish_reason(self.finish_reason.as_deref());

        if self.text_seen {
            response.output.push(OutputItem::Message {
                id: self
                    .message_item_id
                    .clone()
                    .unwrap_or_else(|| ids::generate_id("msg")),
                role: Some("assistant".to_string()),
                status: Some("completed".to_string()),
                content: vec![OutputContentPart::text(self.text.clone())],
            });
        }
        for tc in self.tool_calls.values() {
            response.output.push(OutputItem::FunctionCall {
                id: tc.item_id.clone(),
                call_id: tc.call_id.clone(),
                name: tc.name.clone(),
                arguments: tc.arguments.clone(),
                status: Some("completed".to_string()),
            });
        }
        response.usage = self.usage.clone();
        response
    }
}

fn sse_json(event_type: &str, mut body: serde_json::Value) -> StreamEvent {
    if let Some(obj) = body.as_object_mut() {
        obj.insert("type".to_string(), serde_json::Value::String(event_type.to_string()));
    }
    StreamEvent {
        event_type: event_type.to_string(),
        data: Bytes::from(serde_json::to_vec(&body).unwrap_or_default()),
    }
}

/// Translate one Chat Completions chunk into zero or more adapter-level
/// Responses-shaped stream events, folding state into `acc`.
fn translate_chunk(acc: &mut StreamAccumulator, chunk: ChatCompletionChunk) -> Vec<StreamEvent> {
    acc.capture_metadata(&chunk);
    let response_id = acc.response_id.clone().unwrap_or_default();
    let mut events = Vec::new();

    if let Some(usage) = &chunk.usage {
        acc.usage = Some(map_usage(usage));
    }

    for choice in &chunk.choices {
        if let Some(reason) = &choice.finish_reason {
            acc.finish_reason = Some(reason.clone());
        }

        if let Some(content) = choice.delta.content.as_ref().filter(|c| !c.is_empty()) {
            if acc.message_item_id.is_none() {
                acc.message_item_id = Some(ids::generate_id("msg"));
            }
            acc.text_seen = true;
            acc.text.push_str(content);

            events.push(sse_json(
                "response.output_text.delta",
                serde_json::json!({
                    "output_index": acc.text_output_index(),
                    "content_index": 0,
                    "item_id": acc.message_item_id,
                    "delta": content,
                    "response_id": response_id,
                }),
            ));
        }

        if let Some(tool_call_deltas) = &choice.delta.tool_calls {
            for delta in tool_call_deltas {
                let base = acc.tool_call_base_index();
                let entry = acc.tool_calls.entry(delta.index).or_insert_with(|| ToolCallAccumulator {
                    item_id: ids::generate_id("fc"),
                    ..Default::default()
                });
                if let Some(id) = &delta.id {
                    entry.call_id = id.clone();
                }
                if let Some(function) = &delta.function {
                    if let Some(name) = &function.name {
                        entry.name.push_str(name);
                    }
                    if let Some(arguments) = &function.arguments {
                        entry.arguments.push_str(arguments);
                        let item_id = entry.item_id.clone();
                        let output_index = base + delta.index;
                        events.push(sse_json(
                            "response.function_call_arguments.delta",
                            serde_json::json!({
                                "output_index": output_index,
                                "item_id": item_id,
                                "delta": arguments,
                                "response_id": response_id,
                            }),
                        ));
                    }
                }
            }
        }
    }

    events
}

#[async_trait]
impl BackendClient for ChatCompletionsAdapter {
    async fn invoke(&self, request: &ResponsesRequest) -> BackendResult<Response> {
        let chat_req = build_chat_request(request, false);
        let req = self.apply_auth(
            self.http
                .post(self.endpoint())
                .header("content-type", "application/json")
                .json(&chat_req),
        );

        let resp = req
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(if status.is_client_error() {
                BackendError::Client(format!("{status}: {body}"))
            } else {
                BackendError::Server(format!("{status}: {body}"))
            });
        }

        let chat_resp: ChatCompletionResponse =
            serde_json::from_str(&body).map_err(|e| BackendError::Unparseable(e.to_string()))?;
        Ok(chat_response_to_responses(chat_resp, &request.model))
    }

    async fn invoke_stream(
        &self,
        request: &ResponsesRequest,
    ) -> BackendResult<BoxStream<'static, BackendResult<StreamEvent>>> {
        let chat_req = build_chat_request(request, true);
        let req = self.apply_auth(
            self.http
                .post(self.endpoint())
                .header("content-type", "application/json")
                .header("accept", "text/event-stream")
                .json(&chat_req),
        );

        let resp = req
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(if status.is_client_error() {
                BackendError::Client(format!("{status}: {body}"))
            } else {
                BackendError::Server(format!("{status}: {body}"))
            });
        }

        let model = request.model.clone();
        let byte_stream = resp
            .bytes_stream()
            .map(|r| r.map_err(|e| BackendError::Transport(e.to_string())));

        let raw_frames = frames(byte_stream);

        let translated = futures::stream::unfold(
            (raw_frames, StreamAccumulator::new(), Vec::<BackendResult<StreamEvent>>::new(), model, false),
            |(mut raw_frames, mut acc, mut pending, model, mut finished)| async move {
                loop {
                    if let Some(event) = pending.pop() {
                        return Some((event, (raw_frames, acc, pending, model, finished)));
                    }
                    if finished {
                        return None;
                    }
                    match raw_frames.next().await {
                        Some(Ok(frame)) => {
                            if frame.data.trim() == "[DONE]" {
                                finished = true;
                                let response = acc.finish(&model);
                                pending.push(Ok(sse_json(
                                    "response.completed",
                                    serde_json::json!({ "response": response }),
                                )));
                                continue;
                            }
                            match serde_json::from_str::<ChatCompletionChunk>(&frame.data) {
                                Ok(chunk) => {
                                    let mut events = translate_chunk(&mut acc, chunk);
                                    events.reverse();
                                    pending.extend(events.into_iter().map(Ok));
                                }
                                Err(e) => {
                                    pending.push(Err(BackendError::Unparseable(e.to_string())));
                                }
                            }
                        }
                        Some(Err(e)) => {
                            pending.push(Err(e));
                        }
                        None => {
                            finished = true;
                            let response = acc.finish(&model);
                            pending.push(Ok(sse_json(
                                "response.completed",
                                serde_json::json!({ "response": response }),
                            )));
                        }
                    }
                }
            },
        );

        Ok(Box::pin(translated))
    }
}
