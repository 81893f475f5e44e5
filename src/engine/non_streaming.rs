//! The non-streaming agentic loop (§4.7): resolve conversation, rebuild
//! history, expand tools, then alternate backend invocations with
//! server-side tool execution until the model stops calling tools, a
//! client-side tool call appears, or `max_tool_calls` is exhausted.

use openai_protocol::common::{ResponseError, Usage};
use openai_protocol::ids;
use openai_protocol::responses::{InputItem, OutputItem, ResponseInput, ResponsesRequest};

use gw_storage::StoredResponse;

use crate::tools::file_search::expand_file_search_tools;
use crate::tools::mcp_expansion::expand_mcp_tools;
use crate::tools::ExpandedTools;

use super::dispatch::execute_server_side_tool;
use super::history::{build_history, resolve_conversation};
use super::{parse_output, Engine, EngineError, ToolCallInfo};

/// Run a request to completion and return the final `Response` — the
/// response's own `status`/`error`/`incomplete_details` carry backend and
/// tool failures (§4.10); `Err` is reserved for failures the caller can't
/// recover a response for at all (bad conversation id, persistence failure).
pub async fn run(engine: &Engine, request: ResponsesRequest) -> Result<openai_protocol::responses::Response, EngineError> {
    let conversation = match resolve_conversation(engine.conversations.as_ref(), request.conversation.as_deref()).await {
        Ok(c) => c,
        Err(EngineError::ConversationNotFound(id)) => {
            // §4.10: a named conversation that doesn't exist fails the
            // response (not the whole request) — there's no response id to
            // return a generic error envelope against yet, so we mint one
            // purely to carry the failure.
            let mut response = openai_protocol::responses::Response::new(
                ids::generate_response_id(),
                request.model.clone(),
                ids::now_seconds(),
            );
            response.echo_request(&request);
            response.mark_failed(
                ResponseError::new("conversation_not_found", format!("conversation not found: {id}")),
                ids::now_seconds(),
            );
            return Ok(response);
        }
        Err(other) => return Err(other),
    };

    let mut response = openai_protocol::responses::Response::new(
        ids::generate_response_id(),
        request.model.clone(),
        ids::now_seconds(),
    );
    response.echo_request(&request);
    response.conversation = Some(conversation.id.0.clone());

    let mut messages = build_history(
        engine.responses.as_ref(),
        &conversation.id,
        request.previous_response_id.as_deref(),
        &request,
    )
    .await?;

    let requested_tools = request.tools.clone().unwrap_or_default();
    let (tools_after_mcp, mcp_sessions) =
        match expand_mcp_tools(&requested_tools, engine.connectors.as_ref(), engine.http.clone()).await {
            Ok(expanded) => expanded,
            Err(err) => {
                // §4.10: MCP initialize/list failure fails the response before
                // any backend call is made.
                response.mark_failed(ResponseError::new("mcp_error", err.to_string()), ids::now_seconds());
                return Ok(response);
            }
        };
    let (tools, file_search) = expand_file_search_tools(&tools_after_mcp);
    let expanded = ExpandedTools {
        tools,
        mcp_sessions,
        file_search,
    };

    let max_iterations = request.effective_max_tool_calls();
    let budget = request.max_output_tokens;
    let mut accumulated_out_tokens: i64 = 0;
    let mut all_output: Vec<OutputItem> = Vec::new();
    let mut usage_total = Usage::default();
    let mut exhausted = true;

    'outer: for _ in 0..max_iterations {
        let mut backend_req = request.clone();
        backend_req.input = ResponseInput::Items(messages.clone());
        backend_req.tools = if expanded.tools.is_empty() {
            None
        } else {
            Some(expanded.tools.clone())
        };
        backend_req.stream = Some(false);

        if let Some(budget) = budget {
            let remaining = budget - accumulated_out_tokens;
            if remaining <= 0 {
                response.mark_incomplete("max_output_tokens", ids::now_seconds());
                exhausted = false;
                break 'outer;
            }
            backend_req.max_output_tokens = Some(remaining);
        }

        let backend_response = match engine.backend.invoke(&backend_req).await {
            Ok(r) => r,
            Err(err) => {
                response.mark_failed(ResponseError::new("llm_error", err.to_string()), ids::now_seconds());
                exhausted = false;
                break 'outer;
            }
        };

        if let Some(usage) = &backend_response.usage {
            usage_total.accumulate_output(usage);
            accumulated_out_tokens += usage.output_tokens;
        }

        let (text, tool_calls) = parse_output(&backend_response.output);

        if tool_calls.is_empty() {
            if let Some(text) = text {
                let msg_id = ids::generate_id("msg");
                all_output.push(OutputItem::Message {
                    id: msg_id,
                    role: Some("assistant".to_string()),
                    status: Some("completed".to_string()),
                    content: vec![openai_protocol::responses::OutputContentPart::text(text.clone())],
                });
                messages.push(assistant_message(text));
            }
            exhausted = false;
            break 'outer;
        }

        let mut client_side: Vec<ToolCallInfo> = Vec::new();
        for call in tool_calls {
            if expanded.is_mcp_tool(&call.name) || expanded.is_file_search_tool(&call.name) {
                let output = execute_server_side_tool(engine, &expanded, &call).await;

                let fc_id = ids::generate_id("fc");
                let fco_id = ids::generate_id("fc");
                all_output.push(OutputItem::FunctionCall {
                    id: fc_id.clone(),
                    call_id: call.call_id.clone(),
                    name: call.name.clone(),
                    arguments: call.arguments.clone(),
                    status: Some("completed".to_string()),
                });
                all_output.push(OutputItem::FunctionCallOutput {
                    id: fco_id,
                    call_id: call.call_id.clone(),
                    output: output.clone(),
                    status: Some("completed".to_string()),
                });

                messages.push(function_call_item(&call));
                messages.push(function_call_output_item(&call.call_id, &output));
            } else {
                client_side.push(call);
            }
        }

        if !client_side.is_empty() {
            for call in &client_side {
                crate::observability::metrics::record_tool_call(&call.name, false);
                let fc_id = ids::generate_id("fc");
                all_output.push(OutputItem::FunctionCall {
                    id: fc_id,
                    call_id: call.call_id.clone(),
                    name: call.name.clone(),
                    arguments: call.arguments.clone(),
                    status: Some("completed".to_string()),
                });
                messages.push(function_call_item(call));
            }
            exhausted = false;
            break 'outer;
        }
    }

    response.output = all_output;
    if usage_total != Usage::default() {
        crate::observability::metrics::record_tokens(
            usage_total.input_tokens.max(0) as u64,
            usage_total.output_tokens.max(0) as u64,
            usage_total.output_tokens_details.reasoning_tokens.max(0) as u64,
        );
        response.usage = Some(usage_total);
    }

    match response.status {
        openai_protocol::responses::ResponseStatus::InProgress if exhausted => {
            response.mark_incomplete("max_tool_calls", ids::now_seconds());
        }
        openai_protocol::responses::ResponseStatus::InProgress => {
            response.mark_completed(ids::now_seconds());
        }
        _ => {}
    }

    persist(engine, &conversation.id, &request, &response, messages).await?;

    Ok(response)
}

pub(crate) fn assistant_message(text: String) -> InputItem {
    InputItem::Message(openai_protocol::responses::MessageItem {
        item_type: Some("message".to_string()),
        role: "assistant".to_string(),
        content: openai_protocol::responses::MessageContent::Text(text),
        id: None,
        status: None,
    })
}

pub(crate) fn function_call_item(call: &ToolCallInfo) -> InputItem {
    InputItem::FunctionCall(openai_protocol::responses::FunctionCallItem {
        item_type: "function_call".to_string(),
        call_id: call.call_id.clone(),
        name: call.name.clone(),
        arguments: call.arguments.clone(),
        id: None,
        status: None,
    })
}

pub(crate) fn function_call_output_item(call_id: &str, output: &str) -> InputItem {
    InputItem::FunctionCallOutput(openai_protocol::responses::FunctionCallOutputItem {
        item_type: "function_call_output".to_string(),
        call_id: call_id.to_string(),
        output: output.to_string(),
        id: None,
        status: None,
    })
}

pub(crate) async fn persist(
    engine: &Engine,
    conversation_id: &gw_storage::ConversationId,
    request: &ResponsesRequest,
    response: &openai_protocol::responses::Response,
    messages: Vec<InputItem>,
) -> Result<(), EngineError> {
    let mut stored = StoredResponse::new(request.model.clone(), request.previous_response_id.clone());
    stored.id = gw_storage::ResponseId(response.id.clone());
    stored.conversation_id = Some(conversation_id.clone());
    stored.status = status_string(response.status);
    stored.input = serde_json::to_value(&request.input).unwrap_or(serde_json::Value::Null);
    stored.messages = messages.clone();
    stored.output = response.output.clone();
    stored.usage = response.usage.clone();
    stored.created_at = response.created_at;
    stored.completed_at = response.completed_at;

    engine
        .responses
        .save_response(stored)
        .await
        .map_err(|e| EngineError::Internal(e.to_string()))?;

    engine
        .conversations
        .append_items(conversation_id, messages)
        .await
        .map_err(|e| EngineError::Internal(e.to_string()))?;

    Ok(())
}

fn status_string(status: openai_protocol::responses::ResponseStatus) -> String {
    match status {
        openai_protocol::responses::ResponseStatus::InProgress => "in_progress",
        openai_protocol::responses::ResponseStatus::Completed => "completed",
        openai_protocol::responses::ResponseStatus::Incomplete => "incomplete",
        openai_protocol::responses::ResponseStatus::Failed => "failed",
    }
    .to_string()
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use futures::stream::BoxStream;
    use gw_mcp::StaticConnectorStore;
    use gw_storage::{EmptyVectorSearch, InMemoryConversationStorage, InMemoryResponseStorage};
    use openai_protocol::responses::{Response as WireResponse, ResponseStatus, ToolDescriptor};
    use parking_lot::Mutex;

    use crate::backend::{BackendClient, BackendError, BackendResult, StreamEvent};

    use super::*;

    /// Scripts a fixed sequence of backend turns, one consumed per call to
    /// `invoke`. `invoke_stream` is never exercised by these tests.
    pub(crate) struct FakeBackend {
        turns: Mutex<Vec<WireResponse>>,
    }

    impl FakeBackend {
        pub(crate) fn new(turns: Vec<WireResponse>) -> Self {
            Self { turns: Mutex::new(turns) }
        }

        pub(crate) fn text_turn(text: &str) -> WireResponse {
            let mut response = WireResponse::new(ids::generate_response_id(), "gpt-5".to_string(), ids::now_seconds());
            response.output = vec![OutputItem::Message {
                id: ids::generate_id("msg"),
                role: Some("assistant".to_string()),
                status: Some("completed".to_string()),
                content: vec![openai_protocol::responses::OutputContentPart::text(text)],
            }];
            response.usage = Some(Usage {
                input_tokens: 5,
                output_tokens: 3,
                total_tokens: 8,
                ..Default::default()
            });
            response
        }

        pub(crate) fn tool_call_turn(name: &str, call_id: &str, arguments: &str) -> WireResponse {
            let mut response = WireResponse::new(ids::generate_response_id(), "gpt-5".to_string(), ids::now_seconds());
            response.output = vec![OutputItem::FunctionCall {
                id: ids::generate_id("fc"),
                call_id: call_id.to_string(),
                name: name.to_string(),
                arguments: arguments.to_string(),
                status: Some("completed".to_string()),
            }];
            response
        }
    }

    #[async_trait]
    impl BackendClient for FakeBackend {
        async fn invoke(&self, _request: &ResponsesRequest) -> BackendResult<WireResponse> {
            let mut turns = self.turns.lock();
            if turns.is_empty() {
                return Err(BackendError::Server("no more scripted turns".to_string()));
            }
            Ok(turns.remove(0))
        }

        async fn invoke_stream(
            &self,
            _request: &ResponsesRequest,
        ) -> BackendResult<BoxStream<'static, BackendResult<StreamEvent>>> {
            unimplemented!("FakeBackend only scripts non-streaming turns")
        }
    }

    pub(crate) fn test_engine(backend: FakeBackend) -> Engine {
        Engine {
            backend: Arc::new(backend),
            connectors: Arc::new(StaticConnectorStore::new()),
            conversations: Arc::new(InMemoryConversationStorage::new()),
            responses: Arc::new(InMemoryResponseStorage::new()),
            vector_search: Arc::new(EmptyVectorSearch),
            http: reqwest::Client::new(),
        }
    }

    pub(crate) fn sample_request(input: &str) -> ResponsesRequest {
        serde_json::from_value(serde_json::json!({
            "model": "gpt-5",
            "input": input,
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn text_only_completion_marks_completed() {
        let engine = test_engine(FakeBackend::new(vec![FakeBackend::text_turn("hi there")]));
        let response = run(&engine, sample_request("hello")).await.unwrap();
        assert!(matches!(response.status, ResponseStatus::Completed));
        assert_eq!(response.output.len(), 1);
        assert!(matches!(&response.output[0], OutputItem::Message { .. }));
    }

    #[tokio::test]
    async fn client_side_tool_call_still_completes_the_response() {
        let engine = test_engine(FakeBackend::new(vec![FakeBackend::tool_call_turn(
            "get_weather",
            "call_1",
            "{\"city\":\"nyc\"}",
        )]));
        let response = run(&engine, sample_request("what's the weather")).await.unwrap();
        // A function_call the client owns still completes the response; the
        // loop just has nothing left to do until the client submits the
        // tool's output in a follow-up turn.
        assert!(matches!(response.status, ResponseStatus::Completed));
        assert_eq!(response.output.len(), 1);
        assert!(matches!(&response.output[0], OutputItem::FunctionCall { name, .. } if name == "get_weather"));
    }

    #[tokio::test]
    async fn zero_max_output_tokens_exhausts_budget_before_any_backend_call() {
        let mut request = sample_request("hello");
        request.max_output_tokens = Some(0);
        let engine = test_engine(FakeBackend::new(vec![FakeBackend::text_turn("should never be used")]));
        let response = run(&engine, request).await.unwrap();
        assert!(matches!(response.status, ResponseStatus::Incomplete));
        assert_eq!(
            response.incomplete_details.as_ref().map(|d| d.reason.as_str()),
            Some("max_output_tokens")
        );
        assert!(response.output.is_empty());
    }

    #[tokio::test]
    async fn unknown_conversation_id_fails_the_response_not_the_request() {
        let engine = test_engine(FakeBackend::new(vec![]));
        let mut request = sample_request("hello");
        request.conversation = Some("conv_missing".to_string());
        let response = run(&engine, request).await.unwrap();
        assert!(matches!(response.status, ResponseStatus::Failed));
        assert_eq!(
            response.error.as_ref().map(|e| e.error_type.as_str()),
            Some("conversation_not_found")
        );
    }

    #[tokio::test]
    async fn file_search_tool_call_round_trips_through_the_loop() {
        let engine = test_engine(FakeBackend::new(vec![
            FakeBackend::tool_call_turn("file_search", "call_1", "{\"query\":\"docs\"}"),
            FakeBackend::text_turn("found nothing relevant"),
        ]));
        let mut request = sample_request("search the docs");
        request.tools = Some(vec![ToolDescriptor::FileSearch {
            vector_store_ids: vec!["vs_1".to_string()],
            max_num_results: Some(5),
        }]);

        let response = run(&engine, request).await.unwrap();

        assert!(matches!(response.status, ResponseStatus::Completed));
        // Synthesized function_call + function_call_output from the first
        // turn, then the assistant message from the second.
        assert_eq!(response.output.len(), 3);
        assert!(matches!(&response.output[0], OutputItem::FunctionCall { name, .. } if name == "file_search"));
        assert!(matches!(&response.output[1], OutputItem::FunctionCallOutput { .. }));
        assert!(matches!(&response.output[2], OutputItem::Message { .. }));
    }
}
