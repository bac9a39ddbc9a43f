//! Upload Proxy Library
//!
//! Authenticating front door for disk-image uploads: validates an upload
//! token, finds the worker currently serving the target volume, and relays
//! the request to it over mutual TLS.

pub mod admission;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod resolver;
pub mod tls;
pub mod token;

pub use config::schema::ProxyConfig;
pub use error::{ProxyError, StartupError};
pub use http::{AppState, HttpServer};
pub use lifecycle::Shutdown;
