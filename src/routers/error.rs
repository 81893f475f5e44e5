//! HTTP error envelope (§7): maps an engine error kind to a status code and
//! a Responses-API-shaped JSON body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: ErrorDetail<'a>,
}

#[derive(Serialize)]
struct ErrorDetail<'a> {
    #[serde(rename = "type")]
    error_type: &'a str,
    message: &'a str,
}

/// §7's error-kind → HTTP-analogue table.
fn status_for_kind(kind: &str) -> StatusCode {
    match kind {
        "invalid_request" => StatusCode::BAD_REQUEST,
        "conversation_not_found" => StatusCode::NOT_FOUND,
        "mcp_error" => StatusCode::BAD_GATEWAY,
        "llm_error" => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn from_kind(kind: &str, message: impl Into<String>) -> Response {
    let message = message.into();
    (
        status_for_kind(kind),
        Json(ErrorBody {
            error: ErrorDetail {
                error_type: kind,
                message: &message,
            },
        }),
    )
        .into_response()
}

pub fn internal_error(message: impl Into<String>) -> Response {
    from_kind("internal_error", message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_not_found_maps_to_404() {
        assert_eq!(status_for_kind("conversation_not_found"), StatusCode::NOT_FOUND);
    }

    #[test]
    fn unknown_kind_falls_back_to_500() {
        assert_eq!(status_for_kind("something_else"), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
