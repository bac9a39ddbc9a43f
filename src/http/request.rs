//! Request handling and transformation.
//!
//! # Responsibilities
//! - Extract the bearer token from the Authorization header
//! - Prepare inbound headers for forwarding to the backend
//!
//! # Design Decisions
//! - Header shape problems (missing, wrong scheme) are 400s; whether the
//!   token itself is any good is the validator's call (401)
//! - Authorization never leaves the proxy; the token is consumed here

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};
use std::net::SocketAddr;

use crate::error::ProxyError;
use crate::http::response::is_hop_by_hop;

pub const X_REQUEST_ID: &str = "x-request-id";
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Token from `Authorization: <scheme> <token>`.
///
/// The scheme comparison is exact. An empty token is returned as-is and
/// left for the validator to reject.
pub fn bearer_token<'a>(headers: &'a HeaderMap, scheme: &str) -> Result<&'a str, ProxyError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(ProxyError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| ProxyError::MalformedAuthHeader)?;

    match value.split_once(' ') {
        Some((s, token)) if s == scheme && !token.contains(' ') => Ok(token),
        _ => Err(ProxyError::MalformedAuthHeader),
    }
}

/// Request ID assigned by the request-id layer, if any.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Headers to send upstream: everything except hop-by-hop headers,
/// `Host` and `Authorization`, with the peer appended to `x-forwarded-for`.
pub fn forward_headers(inbound: &HeaderMap, peer: Option<SocketAddr>) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(inbound.len() + 1);
    for (name, value) in inbound {
        if is_hop_by_hop(inbound, name) || name == header::HOST || name == header::AUTHORIZATION {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }

    if let Some(peer) = peer {
        append_forwarded_for(&mut headers, peer);
    }
    headers
}

fn append_forwarded_for(headers: &mut HeaderMap, peer: SocketAddr) {
    let name = HeaderName::from_static(X_FORWARDED_FOR);
    let ip = peer.ip().to_string();
    let value = match headers.get(&name).and_then(|v| v.to_str().ok()) {
        Some(existing) if !existing.is_empty() => format!("{existing}, {ip}"),
        _ => ip,
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(name, value);
    }
}
