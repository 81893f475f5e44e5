//! `POST /v1/responses` (§6): dispatches to the non-streaming or streaming
//! agentic loop depending on `stream`, returning either a JSON `Response` or
//! a `text/event-stream` body framed as `event: <type>\ndata: <json>\n\n`.

use axum::{
    extract::State,
    response::{
        sse::{Event, Sse},
        IntoResponse, Response as HttpResponse,
    },
    Json,
};
use futures::stream::{Stream, StreamExt};
use openai_protocol::responses::ResponsesRequest;
use openai_protocol::validated::ValidatedJson;

use crate::engine::{self, Engine};
use crate::observability::metrics::RequestTimer;

use super::error;

pub async fn handle(
    State(gw_engine): State<Engine>,
    ValidatedJson(request): ValidatedJson<ResponsesRequest>,
) -> HttpResponse {
    let _timer = RequestTimer::new(request.is_streaming());

    if request.is_streaming() {
        handle_streaming(gw_engine, request).await
    } else {
        handle_non_streaming(gw_engine, request).await
    }
}

async fn handle_non_streaming(gw_engine: Engine, request: ResponsesRequest) -> HttpResponse {
    match engine::non_streaming::run(&gw_engine, request).await {
        Ok(response) => {
            crate::observability::metrics::record_response_status(status_label(response.status));
            Json(response).into_response()
        }
        Err(err) => {
            crate::observability::metrics::record_backend_error(err.error_kind());
            error::from_kind(err.error_kind(), err.to_string())
        }
    }
}

async fn handle_streaming(gw_engine: Engine, request: ResponsesRequest) -> HttpResponse {
    let events = engine::streaming::run(gw_engine, request);
    let sse_stream = events.map(|event| {
        Ok::<_, std::convert::Infallible>(
            Event::default()
                .event(event.event_type)
                .data(String::from_utf8_lossy(&event.data).into_owned()),
        )
    });
    sse_to_response(sse_stream)
}

fn sse_to_response(
    stream: impl Stream<Item = Result<Event, std::convert::Infallible>> + Send + 'static,
) -> HttpResponse {
    Sse::new(stream)
        .keep_alive(axum::response::sse::KeepAlive::default())
        .into_response()
}

fn status_label(status: openai_protocol::responses::ResponseStatus) -> &'static str {
    use openai_protocol::responses::ResponseStatus::*;
    match status {
        InProgress => "in_progress",
        Completed => "completed",
        Incomplete => "incomplete",
        Failed => "failed",
    }
}
