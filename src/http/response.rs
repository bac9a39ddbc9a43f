//! Response handling and transformation.
//!
//! # Responsibilities
//! - Relay the backend response to the caller
//! - Strip hop-by-hop headers in both directions
//!
//! # Design Decisions
//! - Streaming responses avoid buffering entire body
//! - Status and remaining headers are copied verbatim; the proxy does not
//!   interpret backend semantics

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderName},
    response::Response,
};

/// Headers that describe a single connection rather than the message.
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Whether `name` is hop-by-hop, either by definition or because the
/// message's `Connection` header lists it.
pub fn is_hop_by_hop(headers: &HeaderMap, name: &HeaderName) -> bool {
    if HOP_BY_HOP.contains(name) {
        return true;
    }
    headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case(name.as_str()))
}

/// Copy of `headers` without hop-by-hop entries.
pub fn end_to_end_headers(headers: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if !is_hop_by_hop(headers, name) {
            out.append(name.clone(), value.clone());
        }
    }
    out
}

/// Caller-facing response for a backend response, body streamed through.
pub fn relay(backend: reqwest::Response) -> Response {
    let status = backend.status();
    let headers = end_to_end_headers(backend.headers());

    let mut response = Response::new(Body::from_stream(backend.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}
