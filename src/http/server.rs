//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the upload and liveness handlers
//! - Wire up middleware (request ID, tracing)
//! - Serve on a plain or TLS listener until shutdown

use axum::{
    body::Body,
    http::Request,
    routing::{get, post},
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::http::proxy;
use crate::http::request::request_id;
use crate::resolver::BackendResolver;
use crate::tls::TlsClientManager;
use crate::token::TokenValidator;

/// Synchronous upload path.
pub const UPLOAD_PATH: &str = "/v1alpha1/upload";

/// Asynchronous upload path.
pub const UPLOAD_ASYNC_PATH: &str = "/v1alpha1/upload-async";

/// Liveness path, no authentication.
pub const HEALTHZ_PATH: &str = "/healthz";

/// How long in-flight uploads may keep running after shutdown starts.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Application state injected into handlers.
///
/// Everything here is built once at startup and shared read-only; the only
/// thing that changes underneath is the client generation inside `clients`.
#[derive(Clone)]
pub struct AppState {
    pub validator: Arc<dyn TokenValidator>,
    pub resolver: BackendResolver,
    pub clients: Arc<TlsClientManager>,
    pub auth_scheme: Arc<str>,
}

impl AppState {
    pub fn new(
        validator: Arc<dyn TokenValidator>,
        resolver: BackendResolver,
        clients: Arc<TlsClientManager>,
        auth_scheme: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            validator,
            resolver,
            clients,
            auth_scheme: auth_scheme.into(),
        }
    }
}

/// HTTP server for the upload proxy.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server around the given state.
    pub fn new(state: AppState) -> Self {
        Self {
            router: Self::build_router(state),
        }
    }

    /// Build the Axum router with all middleware layers.
    pub fn build_router(state: AppState) -> Router {
        Router::new()
            .route(UPLOAD_PATH, post(proxy::upload).head(proxy::upload))
            .route(
                UPLOAD_ASYNC_PATH,
                post(proxy::upload_async).head(proxy::upload_async),
            )
            .route(HEALTHZ_PATH, get(proxy::healthz))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http().make_span_with(make_span))
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
    }

    /// The router, for driving the server without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server on a plain TCP listener until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, tls = false, "HTTP server starting");

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Run the server with TLS termination until `shutdown` fires.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        tracing::info!(address = %addr, tls = true, "HTTP server starting");

        let handle = axum_server::Handle::new();
        let drain = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server draining");
            drain.graceful_shutdown(Some(DRAIN_TIMEOUT));
        });

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(app)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

fn make_span(request: &Request<Body>) -> tracing::Span {
    tracing::info_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
        request_id = %request_id(request.headers()),
    )
}
