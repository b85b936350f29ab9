//! Response construction.
//!
//! # Responsibilities
//! - Render a snapshot as the public JSON body plus version headers
//! - Map service errors to status codes with single-line text bodies
//! - Response headers applied to every route
//!
//! # Design Decisions
//! - Rejections are client errors (400); storage failures are server errors
//!   (500) and never leak backend detail to the caller
//! - Every response is `no-store`: a cached long-poll answer is a wrong answer

use axum::{
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::http::request::X_CONFIG_VERSION;
use crate::palette::coordinator::WaitOutcome;
use crate::palette::model::Version;
use crate::palette::service::ServiceError;

/// How the read was answered: `immediate`, `changed` or `timeout`.
pub const X_WAIT_OUTCOME: HeaderName = HeaderName::from_static("x-wait-outcome");

/// Body and headers for a read.
pub fn palette_response(outcome: &WaitOutcome) -> Response {
    let mut response = Json(&outcome.snapshot.palette).into_response();
    let headers = response.headers_mut();
    headers.insert(X_CONFIG_VERSION, version_header(outcome.snapshot.version));
    headers.insert(X_WAIT_OUTCOME, HeaderValue::from_static(outcome.kind.as_str()));
    response
}

/// Empty `200 OK` carrying the new version.
pub fn written_response(version: Version) -> Response {
    let mut response = StatusCode::OK.into_response();
    response
        .headers_mut()
        .insert(X_CONFIG_VERSION, version_header(version));
    response
}

/// Single-line plain-text error body.
pub fn text_error(status: StatusCode, message: impl Into<String>) -> Response {
    let mut body = message.into();
    body.push('\n');
    (
        status,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body,
    )
        .into_response()
}

fn version_header(version: Version) -> HeaderValue {
    HeaderValue::from(version.as_u64())
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        match self {
            ServiceError::Rejected(rejection) => {
                text_error(StatusCode::BAD_REQUEST, rejection.to_string())
            }
            ServiceError::Storage(_) => text_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to store configuration.",
            ),
        }
    }
}

/// `cache-control: no-store` on every response.
pub fn no_store_layer() -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::overriding(header::CACHE_CONTROL, HeaderValue::from_static("no-store"))
}

/// `x-content-type-options: nosniff` on every response.
pub fn nosniff_layer() -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::if_not_present(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    )
}
