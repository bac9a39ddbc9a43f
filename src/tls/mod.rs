//! Backend TLS client subsystem.
//!
//! # Data Flow
//! ```text
//! Startup / rotation signal:
//!     fetcher.rs (cert + key + CA bundle PEM)
//!     → client.rs (rustls config with client auth + custom roots → reqwest)
//!     → manager.rs (new ClientGeneration, atomic swap)
//!
//! Per request:
//!     manager.current() → Arc<ClientGeneration> held until response completes
//!
//! watcher.rs: credential file change → manager.rotate()
//! ```
//!
//! # Design Decisions
//! - Full mutual TLS: the proxy proves its identity and verifies the worker
//! - Credential sets are replaced whole, never field by field
//! - A failed rotation leaves the previous generation in service

pub mod client;
pub mod fetcher;
pub mod manager;
pub mod watcher;

pub use client::{ClientCreator, MutualTlsClientCreator, TlsError};
pub use fetcher::{
    CertBundleFetcher, CertFetcher, FetchError, FileCertBundleFetcher, FileCertFetcher,
    MemCertBundleFetcher, MemCertFetcher,
};
pub use manager::{ClientGeneration, TlsClientManager};
pub use watcher::CredentialWatcher;
