//! Upload forwarding.
//!
//! # Data Flow
//! ```text
//! Received      Authorization header present, expected scheme   (else 400)
//!     → Authenticated  token valid, operation matches the path    (else 401)
//!     → Resolved       target found and ready                     (else 404/400/503)
//!     → Forwarding     request sent on the current mTLS client    (else 502/503)
//!     → Completed      backend status, headers and body relayed
//! ```
//!
//! Every request ends in exactly one of `Completed`, `Rejected` or `Failed`.
//! Credentials are checked before any external state is touched, so an
//! unauthenticated caller learns nothing about which targets exist.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::Method,
    response::{IntoResponse, Response},
};
use std::fmt;
use std::net::SocketAddr;
use std::time::Instant;

use crate::error::ProxyError;
use crate::http::request::{bearer_token, forward_headers, request_id};
use crate::http::response::relay;
use crate::http::server::AppState;
use crate::observability::metrics::{self, Outcome};
use crate::token::Operation;

/// Position of a request in the forwarding state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Authenticated,
    Resolved,
    Forwarding,
    Completed,
    Rejected,
    Failed,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Received => "received",
            Stage::Authenticated => "authenticated",
            Stage::Resolved => "resolved",
            Stage::Forwarding => "forwarding",
            Stage::Completed => "completed",
            Stage::Rejected => "rejected",
            Stage::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Completed | Stage::Rejected | Stage::Failed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `POST`/`HEAD` on the synchronous upload path.
pub async fn upload(State(state): State<AppState>, request: Request) -> Response {
    handle(state, Operation::Upload, request).await
}

/// `POST`/`HEAD` on the asynchronous upload path.
pub async fn upload_async(State(state): State<AppState>, request: Request) -> Response {
    handle(state, Operation::UploadAsync, request).await
}

async fn handle(state: AppState, operation: Operation, request: Request) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let request_id = request_id(request.headers()).to_string();
    let mut stage = Stage::Received;

    let result = forward(&state, operation, request, &mut stage).await;

    match result {
        Ok(response) => {
            let status = response.status();
            tracing::info!(
                request_id = %request_id,
                stage = %Stage::Completed,
                status = status.as_u16(),
                "Upload request forwarded"
            );
            metrics::record_request(method.as_str(), status.as_u16(), Outcome::Forwarded, start);
            response
        }
        Err(err) => {
            let terminal = match err.outcome() {
                Outcome::Failed => Stage::Failed,
                _ => Stage::Rejected,
            };
            let status = err.status();
            if terminal == Stage::Failed {
                tracing::error!(
                    request_id = %request_id,
                    stage = %terminal,
                    failed_at = %stage,
                    status = status.as_u16(),
                    error = %err,
                    "Upload request failed"
                );
            } else {
                tracing::warn!(
                    request_id = %request_id,
                    stage = %terminal,
                    failed_at = %stage,
                    status = status.as_u16(),
                    error = %err,
                    "Upload request rejected"
                );
            }
            metrics::record_request(method.as_str(), status.as_u16(), err.outcome(), start);
            err.into_response()
        }
    }
}

async fn forward(
    state: &AppState,
    operation: Operation,
    request: Request,
    stage: &mut Stage,
) -> Result<Response, ProxyError> {
    let token = bearer_token(request.headers(), &state.auth_scheme)?;
    let claim = state.validator.validate(token)?;
    if claim.operation != operation {
        return Err(ProxyError::OperationMismatch);
    }
    if !claim.resource.is_persistent_volume_claims() {
        return Err(ProxyError::UnsupportedTarget(claim.resource.to_string()));
    }
    *stage = Stage::Authenticated;
    tracing::debug!(
        namespace = %claim.namespace,
        name = %claim.name,
        operation = %claim.operation,
        "Token accepted"
    );

    let backend = state
        .resolver
        .resolve(&claim.namespace, &claim.name, &claim.resource)
        .await?;
    *stage = Stage::Resolved;

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let (parts, body) = request.into_parts();
    let url = backend.endpoint(parts.uri.path(), parts.uri.query());
    let headers = forward_headers(&parts.headers, peer);

    // Held until the backend has answered; a rotation meanwhile only
    // affects later requests.
    let generation = state.clients.current();
    let mut outbound = generation
        .client()
        .request(parts.method.clone(), url)
        .headers(headers);
    if parts.method != Method::HEAD {
        outbound = outbound.body(reqwest::Body::wrap_stream(body.into_data_stream()));
    }

    *stage = Stage::Forwarding;
    tracing::debug!(
        backend = %backend,
        generation = generation.generation(),
        method = %parts.method,
        "Forwarding upload"
    );

    let response = outbound.send().await.map_err(ProxyError::from_transport)?;
    *stage = Stage::Completed;
    Ok(relay(response))
}

/// Liveness probe. Touches neither tokens, state nor backends.
pub async fn healthz() -> impl IntoResponse {
    "OK"
}
