//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, request ID, tracing)
//!     → proxy.rs (authenticate → resolve → forward)
//!         → request.rs (auth header, outbound headers)
//!         → response.rs (relay backend response)
//!     → Send to client
//! ```

pub mod proxy;
pub mod request;
pub mod response;
pub mod server;

pub use proxy::Stage;
pub use request::{X_FORWARDED_FOR, X_REQUEST_ID};
pub use server::{AppState, HttpServer, HEALTHZ_PATH, UPLOAD_ASYNC_PATH, UPLOAD_PATH};
