//! Error taxonomy.
//!
//! `ProxyError` covers everything that can end a single request early. Each
//! variant resolves to one status code and a short message; internal detail
//! stays in the logs. `StartupError` covers failures that stop the process
//! before it serves traffic.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;
use crate::observability::metrics::Outcome;
use crate::resolver::{ResolveError, StateError};
use crate::tls::TlsError;
use crate::token::TokenError;

/// Why a request did not reach the backend, or why the backend could not answer.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("authorization header missing")]
    MissingAuthHeader,

    #[error("authorization header malformed")]
    MalformedAuthHeader,

    #[error("invalid token: {0}")]
    InvalidToken(#[from] TokenError),

    #[error("token does not authorize this operation")]
    OperationMismatch,

    #[error("unsupported target resource {0}")]
    UnsupportedTarget(String),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("backend unreachable: {0}")]
    BackendUnreachable(#[source] reqwest::Error),

    #[error("backend request failed: {0}")]
    BackendFailed(#[source] reqwest::Error),
}

impl ProxyError {
    /// Classify a transport error from the backend client.
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_connect() {
            ProxyError::BackendUnreachable(err)
        } else {
            ProxyError::BackendFailed(err)
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::MissingAuthHeader | ProxyError::MalformedAuthHeader => {
                StatusCode::BAD_REQUEST
            }
            ProxyError::InvalidToken(_) | ProxyError::OperationMismatch => {
                StatusCode::UNAUTHORIZED
            }
            ProxyError::UnsupportedTarget(_) => StatusCode::BAD_REQUEST,
            ProxyError::Resolve(e) => match e {
                ResolveError::NotFound(_) => StatusCode::NOT_FOUND,
                ResolveError::NotReady(_)
                | ResolveError::Completed(_)
                | ResolveError::InvalidAddress(..) => StatusCode::BAD_REQUEST,
                ResolveError::Provider(_) => StatusCode::SERVICE_UNAVAILABLE,
            },
            ProxyError::BackendUnreachable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ProxyError::BackendFailed(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Message sent to the caller. Never includes token contents or
    /// backend addresses.
    pub fn public_message(&self) -> &'static str {
        match self {
            ProxyError::MissingAuthHeader => "missing authorization header",
            ProxyError::MalformedAuthHeader => "malformed authorization header",
            ProxyError::InvalidToken(_) | ProxyError::OperationMismatch => "invalid token",
            ProxyError::UnsupportedTarget(_) => "target malformed",
            ProxyError::Resolve(e) => match e {
                ResolveError::NotFound(_) => "target not found",
                ResolveError::NotReady(_) => "target not ready",
                ResolveError::Completed(_) => "target not ready: upload already completed",
                ResolveError::InvalidAddress(..) => "target malformed",
                ResolveError::Provider(_) => "target state unavailable",
            },
            ProxyError::BackendUnreachable(_) => "backend unavailable",
            ProxyError::BackendFailed(_) => "backend request failed",
        }
    }

    /// Terminal state this error puts the request in.
    pub fn outcome(&self) -> Outcome {
        if self.status().is_server_error() {
            Outcome::Failed
        } else {
            Outcome::Rejected
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status(), self.public_message()).into_response()
    }
}

/// Fatal initialization failures.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to read verification key {path}: {source}")]
    VerificationKey {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid verification key: {0}")]
    Token(#[from] TokenError),

    #[error("backend TLS client: {0}")]
    Tls(#[from] TlsError),

    #[error("mutual TLS credentials are not configured")]
    MissingCredentials,

    #[error("target state provider: {0}")]
    State(#[from] StateError),

    #[error("credential watcher: {0}")]
    Watch(#[from] notify::Error),

    #[error("listener: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid address {0}")]
    Address(String),
}
