//! The streaming agentic loop (§4.8): same skeleton as the non-streaming
//! path, but backend turns are opened as streams and forwarded through the
//! normalizer, with the gateway owning response lifecycle events.
//!
//! Implemented as a producer task feeding a bounded channel (§5: "buffer
//! 10"); the returned stream is just the receiving end. Send errors (a
//! disconnected client) stop the producer on the next attempted send.

use futures::stream::{BoxStream, StreamExt};
use openai_protocol::common::{ResponseError, Usage};
use openai_protocol::event_types::ResponseEvent;
use openai_protocol::ids;
use openai_protocol::responses::{Response, ResponseInput, ResponseStatus, ResponsesRequest};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::backend::StreamEvent;
use crate::tools::file_search::expand_file_search_tools;
use crate::tools::mcp_expansion::expand_mcp_tools;
use crate::tools::ExpandedTools;

use super::dispatch::execute_server_side_tool;
use super::history::{build_history, resolve_conversation};
use super::non_streaming::{assistant_message, function_call_item, function_call_output_item, persist};
use super::normalizer::Normalizer;
use super::{parse_output, Engine, EngineError};

const CHANNEL_BUFFER: usize = 10;

/// Run a streamed request. The stream itself never carries an `Err` variant —
/// failures surface as a `response.failed` or `error` event, matching the
/// wire contract (§4.10).
pub fn run(engine: Engine, request: ResponsesRequest) -> BoxStream<'static, StreamEvent> {
    let (tx, rx) = mpsc::channel(CHANNEL_BUFFER);
    tokio::spawn(async move {
        drive(engine, request, tx).await;
    });
    Box::pin(ReceiverStream::new(rx))
}

async fn drive(engine: Engine, request: ResponsesRequest, tx: mpsc::Sender<StreamEvent>) {
    let response_id = ids::generate_response_id();
    let mut normalizer = Normalizer::new(response_id.clone());

    let mut response = Response::new(response_id, request.model.clone(), ids::now_seconds());
    response.echo_request(&request);

    let conversation = match resolve_conversation(engine.conversations.as_ref(), request.conversation.as_deref()).await
    {
        Ok(c) => c,
        Err(EngineError::ConversationNotFound(id)) => {
            response.mark_failed(
                ResponseError::new("conversation_not_found", format!("conversation not found: {id}")),
                ids::now_seconds(),
            );
            let _ = tx
                .send(normalizer.emit(ResponseEvent::FAILED, serde_json::json!({ "response": response })))
                .await;
            return;
        }
        Err(err) => {
            response.mark_failed(ResponseError::new("internal_error", err.to_string()), ids::now_seconds());
            let _ = tx
                .send(normalizer.emit(ResponseEvent::FAILED, serde_json::json!({ "response": response })))
                .await;
            return;
        }
    };
    response.conversation = Some(conversation.id.0.clone());

    // Emit response.created with the echoed, in_progress response before the
    // first backend call (§4.8).
    if tx
        .send(normalizer.emit(ResponseEvent::CREATED, serde_json::json!({ "response": response })))
        .await
        .is_err()
    {
        return;
    }

    // Build history before persisting anything for this response: list_responses
    // returns most-recent-first, so an early-persisted in_progress record for
    // *this* request would otherwise shadow the prior turn's transcript on the
    // second and later turns of a streaming conversation.
    let mut messages = match build_history(
        engine.responses.as_ref(),
        &conversation.id,
        request.previous_response_id.as_deref(),
        &request,
    )
    .await
    {
        Ok(m) => m,
        Err(err) => {
            response.mark_failed(ResponseError::new("internal_error", err.to_string()), ids::now_seconds());
            let _ = tx
                .send(normalizer.emit(ResponseEvent::FAILED, serde_json::json!({ "response": response })))
                .await;
            return;
        }
    };

    if let Err(err) = persist(&engine, &conversation.id, &request, &response, Vec::new()).await {
        tracing::warn!(error = %err, "failed to early-persist in_progress response");
    }

    if tx
        .send(normalizer.emit(ResponseEvent::IN_PROGRESS, serde_json::json!({ "response": response })))
        .await
        .is_err()
    {
        return;
    }

    let requested_tools = request.tools.clone().unwrap_or_default();
    let (tools_after_mcp, mcp_sessions) =
        match expand_mcp_tools(&requested_tools, engine.connectors.as_ref(), engine.http.clone()).await {
            Ok(expanded) => expanded,
            Err(err) => {
                response.mark_failed(ResponseError::new("mcp_error", err.to_string()), ids::now_seconds());
                let _ = tx
                    .send(normalizer.emit(ResponseEvent::FAILED, serde_json::json!({ "response": response })))
                    .await;
                if let Err(err) = persist(&engine, &conversation.id, &request, &response, messages).await {
                    tracing::warn!(error = %err, "failed to persist failed response");
                }
                return;
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
    let mut all_output = Vec::new();
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
        backend_req.stream = Some(true);

        if let Some(budget) = budget {
            let remaining = budget - accumulated_out_tokens;
            if remaining <= 0 {
                response.mark_incomplete("max_output_tokens", ids::now_seconds());
                exhausted = false;
                break 'outer;
            }
            backend_req.max_output_tokens = Some(remaining);
        }

        let mut backend_stream = match engine.backend.invoke_stream(&backend_req).await {
            Ok(s) => s,
            Err(err) => {
                response.mark_failed(ResponseError::new("llm_error", err.to_string()), ids::now_seconds());
                let _ = tx
                    .send(normalizer.emit("error", serde_json::json!({ "message": err.to_string() })))
                    .await;
                exhausted = false;
                break 'outer;
            }
        };

        let mut transport_failed = false;
        while let Some(event) = backend_stream.next().await {
            match event {
                Ok(raw) => {
                    for out in normalizer.normalize(raw) {
                        if tx.send(out).await.is_err() {
                            return;
                        }
                    }
                }
                Err(err) => {
                    response.mark_failed(ResponseError::new("llm_error", err.to_string()), ids::now_seconds());
                    let _ = tx
                        .send(normalizer.emit("error", serde_json::json!({ "message": err.to_string() })))
                        .await;
                    transport_failed = true;
                    break;
                }
            }
        }
        if transport_failed {
            exhausted = false;
            break 'outer;
        }

        for out in normalizer.flush() {
            if tx.send(out).await.is_err() {
                return;
            }
        }

        let Some(final_response) = normalizer.take_final_response() else {
            response.mark_failed(
                ResponseError::new("llm_error", "backend stream ended without a completed event"),
                ids::now_seconds(),
            );
            let _ = tx
                .send(normalizer.emit("error", serde_json::json!({ "message": "stream ended unexpectedly" })))
                .await;
            exhausted = false;
            break 'outer;
        };

        if let Some(usage) = &final_response.usage {
            usage_total.accumulate_output(usage);
            accumulated_out_tokens += usage.output_tokens;
        }

        let (text, tool_calls) = parse_output(&final_response.output);

        if tool_calls.is_empty() {
            if let Some(text) = text {
                if let Some(item) = final_response
                    .output
                    .iter()
                    .find(|item| matches!(item, openai_protocol::responses::OutputItem::Message { .. }))
                {
                    all_output.push(item.clone());
                }
                messages.push(assistant_message(text));
            }
            exhausted = false;
            break 'outer;
        }

        let mut client_side = Vec::new();
        for call in tool_calls {
            if expanded.is_mcp_tool(&call.name) || expanded.is_file_search_tool(&call.name) {
                let output = execute_server_side_tool(&engine, &expanded, &call).await;

                let fc_item = openai_protocol::responses::OutputItem::FunctionCall {
                    id: ids::generate_id("fc"),
                    call_id: call.call_id.clone(),
                    name: call.name.clone(),
                    arguments: call.arguments.clone(),
                    status: Some("completed".to_string()),
                };
                let fco_item = openai_protocol::responses::OutputItem::FunctionCallOutput {
                    id: ids::generate_id("fc"),
                    call_id: call.call_id.clone(),
                    output: output.clone(),
                    status: Some("completed".to_string()),
                };

                // §4.8: emit output_item.added/done per synthesized
                // function_call_output while the loop continues.
                let fc_index = all_output.len() as i64;
                let fco_index = fc_index + 1;
                for (index, item) in [(fc_index, &fc_item), (fco_index, &fco_item)] {
                    if tx
                        .send(normalizer.emit(
                            openai_protocol::event_types::OutputItemEvent::ADDED,
                            serde_json::json!({ "output_index": index, "item": item }),
                        ))
                        .await
                        .is_err()
                    {
                        return;
                    }
                    if tx
                        .send(normalizer.emit(
                            openai_protocol::event_types::OutputItemEvent::DONE,
                            serde_json::json!({ "output_index": index, "item": item }),
                        ))
                        .await
                        .is_err()
                    {
                        return;
                    }
                }

                messages.push(function_call_item(&call));
                messages.push(function_call_output_item(&call.call_id, &output));
                all_output.push(fc_item);
                all_output.push(fco_item);
            } else {
                client_side.push(call);
            }
        }

        if !client_side.is_empty() {
            for call in &client_side {
                crate::observability::metrics::record_tool_call(&call.name, false);
                all_output.push(openai_protocol::responses::OutputItem::FunctionCall {
                    id: ids::generate_id("fc"),
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

        normalizer.reset_indices();
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
        ResponseStatus::InProgress if exhausted => {
            response.mark_incomplete("max_tool_calls", ids::now_seconds());
        }
        ResponseStatus::InProgress => {
            response.mark_completed(ids::now_seconds());
        }
        _ => {}
    }

    let _ = tx
        .send(normalizer.emit(ResponseEvent::COMPLETED, serde_json::json!({ "response": response })))
        .await;

    if let Err(err) = persist(&engine, &conversation.id, &request, &response, messages).await {
        tracing::warn!(error = %err, "failed to persist streamed response");
    }
}
