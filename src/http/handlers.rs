//! Route handlers.

use std::error::Error as StdError;
use std::sync::Arc;

use axum::{
    body::{self, Body},
    extract::{Query, State},
    http::{HeaderMap, Request, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use http_body_util::LengthLimitError;
use serde::Serialize;

use crate::http::request::{provenance, request_id, ReadParams};
use crate::http::response::{palette_response, text_error, written_response};
use crate::http::server::AppState;
use crate::palette::rules::PaletteRules;
use crate::palette::service::ReadRequest;

/// `GET /colors`: the current palette, optionally waiting for a change.
pub async fn read_colors(
    State(state): State<AppState>,
    Query(params): Query<ReadParams>,
    headers: HeaderMap,
) -> Response {
    let baseline = match params.baseline(&headers) {
        Ok(baseline) => baseline,
        Err(e) => return text_error(StatusCode::BAD_REQUEST, e.to_string()),
    };
    let request = ReadRequest {
        baseline,
        hang: params.wants_hang(),
    };

    tracing::debug!(
        request_id = %request_id(&headers),
        baseline = ?request.baseline,
        hang = request.hang,
        "Palette read"
    );

    let outcome = state.service.read(request).await;
    palette_response(&outcome)
}

/// `POST /colors`: validate and install a new palette.
pub async fn write_colors(State(state): State<AppState>, request: Request<Body>) -> Response {
    let provenance = provenance(&request);
    let request_id = request_id(request.headers()).to_string();

    let body = match body::to_bytes(request.into_body(), state.max_body_size).await {
        Ok(bytes) => bytes,
        Err(e) if exceeds_limit(&e) => {
            tracing::warn!(request_id = %request_id, "Request body over limit");
            return text_error(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large.");
        }
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Unreadable request body");
            return text_error(StatusCode::BAD_REQUEST, "Could not read request body.");
        }
    };

    tracing::info!(
        request_id = %request_id,
        body = %String::from_utf8_lossy(&body),
        "Received palette write"
    );

    // Saving may touch the disk while holding the writer lock.
    let service = Arc::clone(&state.service);
    let written =
        tokio::task::spawn_blocking(move || service.write_bytes(&body, Some(provenance))).await;

    match written {
        Ok(Ok(snapshot)) => written_response(snapshot.version),
        Ok(Err(e)) => e.into_response(),
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Palette write task failed");
            text_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to store configuration.",
            )
        }
    }
}

/// Whether a body read failed because it crossed the size limit.
fn exceeds_limit(err: &axum::Error) -> bool {
    let mut source: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            return true;
        }
        source = e.source();
    }
    false
}

/// `GET /limits`: accepted colors and bounds, for page renderers.
pub async fn get_limits(State(state): State<AppState>) -> Json<PaletteRules> {
    Json(state.service.rules())
}

#[derive(Debug, Serialize)]
pub struct ServiceStatus {
    pub server_version: &'static str,
    pub version: u64,
    pub updated_at_ms: u64,
    pub pending_waiters: usize,
    pub max_wait_ms: u64,
}

/// `GET /status`: current version and waiter count.
pub async fn get_status(State(state): State<AppState>) -> Json<ServiceStatus> {
    let current = state.service.current();
    Json(ServiceStatus {
        server_version: env!("CARGO_PKG_VERSION"),
        version: current.version.as_u64(),
        updated_at_ms: current.updated_at_ms,
        pending_waiters: state.service.pending_waiters(),
        max_wait_ms: state.service.policy().max_wait.as_millis() as u64,
    })
}

/// `GET /health`.
pub async fn health() -> &'static str {
    "ok"
}
