//! Request handling helpers.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) as early as possible
//! - Extract the read baseline from query or header
//! - Extract writer provenance (user agent, peer address)

use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::{header, HeaderMap, HeaderName, Request};
use serde::Deserialize;
use thiserror::Error;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

use crate::palette::model::{Provenance, Version};

/// Request ID header.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Version token header, sent on responses and accepted as a read baseline.
pub const X_CONFIG_VERSION: HeaderName = HeaderName::from_static("x-config-version");

/// Layer assigning an `x-request-id` to requests that lack one.
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid)
}

/// Layer copying the request ID onto the response.
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(X_REQUEST_ID)
}

/// The request ID assigned by [`set_request_id_layer`], if any.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// A baseline that is not a version number, from either source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("baseline must be a version number. Received: {0}")]
pub struct InvalidBaseline(pub String);

/// Query parameters accepted by `GET /colors`.
///
/// Kept as raw strings so a bad baseline is reported the same way whether it
/// came from the query or the header.
#[derive(Debug, Default, Deserialize)]
pub struct ReadParams {
    /// `1` or `true` to hang until the palette changes.
    pub hang: Option<String>,
    /// Last version the caller saw.
    pub baseline: Option<String>,
}

impl ReadParams {
    pub fn wants_hang(&self) -> bool {
        matches!(self.hang.as_deref(), Some("1") | Some("true"))
    }

    /// Baseline from the query, falling back to the `x-config-version` header.
    pub fn baseline(&self, headers: &HeaderMap) -> Result<Option<Version>, InvalidBaseline> {
        if let Some(raw) = &self.baseline {
            return parse_baseline(raw).map(Some);
        }
        match headers.get(X_CONFIG_VERSION) {
            Some(value) => {
                let raw = String::from_utf8_lossy(value.as_bytes());
                parse_baseline(&raw).map(Some)
            }
            None => Ok(None),
        }
    }
}

fn parse_baseline(raw: &str) -> Result<Version, InvalidBaseline> {
    raw.parse().map_err(|_| InvalidBaseline(raw.to_string()))
}

/// Provenance of a write: `User-Agent` plus the peer address when the server
/// was started with connect info.
pub fn provenance<B>(request: &Request<B>) -> Provenance {
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let address = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    Provenance::new(user_agent, address)
}
