use axum::{
    Json,
    body::Body,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::time::Instant;
use tracing::{error, info, warn};

use crate::ErrorResponse;

/// Logs every request and rewrites transport-level failures (oversized
/// bodies, timeouts, bare 5xx) into the JSON `ErrorResponse` shape.
///
/// GraphQL errors travel inside a 200 response and pass through untouched.
pub async fn error_handling_middleware(req: Request<Body>, next: Next) -> Response {
    let started = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_owned();

    let response = next.run(req).await;
    let status = response.status();

    info!(
        %method,
        %path,
        status = status.as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Request finished"
    );

    match status {
        StatusCode::PAYLOAD_TOO_LARGE => {
            warn!(%path, "Rejected oversized request body");
            envelope(
                status,
                "PAYLOAD_TOO_LARGE",
                "The request body exceeds the maximum allowed size",
                Some("Send a smaller GraphQL document or fewer variables"),
            )
        }
        StatusCode::REQUEST_TIMEOUT => {
            warn!(%path, "Request timed out");
            envelope(
                status,
                "REQUEST_TIMEOUT",
                "The request took too long to complete",
                Some("Please retry the request"),
            )
        }
        s if s.is_server_error() => {
            error!(%path, status = s.as_u16(), "Server error");
            envelope(
                s,
                "SERVER_ERROR",
                "An internal server error occurred",
                Some("Please try again later or contact support if the issue persists"),
            )
        }
        _ => response,
    }
}

fn envelope(status: StatusCode, code: &str, message: &str, help: Option<&str>) -> Response {
    let body = ErrorResponse {
        status: status.to_string(),
        message: message.to_string(),
        code: code.to_string(),
        details: None,
        help: help.map(String::from),
    };

    (status, Json(body)).into_response()
}
