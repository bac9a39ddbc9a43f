//! Mutually-authenticated HTTP client construction.
//!
//! # Responsibilities
//! - Parse the client certificate chain, private key and CA bundle
//! - Build a rustls config that presents the client certificate and trusts
//!   only the bundle
//! - Wrap it in a reqwest client shared by all forwarding tasks
//!
//! # Design Decisions
//! - Every credential component is mandatory; there is no unauthenticated
//!   fallback client
//! - The webpki root set is never consulted

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::{ClientConfig, RootCertStore};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::tls::fetcher::{CertBundleFetcher, CertFetcher, FetchError};

#[derive(Debug, Error)]
pub enum TlsError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("malformed PEM in {what}: {source}")]
    Pem {
        what: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("client certificate PEM holds no certificate")]
    NoCertificate,

    #[error("client key PEM holds no private key")]
    NoPrivateKey,

    #[error("CA bundle holds no certificate")]
    EmptyBundle,

    #[error("CA bundle certificate rejected: {0}")]
    InvalidRoot(rustls::Error),

    #[error("TLS configuration rejected: {0}")]
    Config(rustls::Error),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Produces the client used to reach backends.
pub trait ClientCreator: Send + Sync {
    fn create_client(&self) -> Result<reqwest::Client, TlsError>;
}

/// Builds mutual-TLS clients from fetched credentials.
pub struct MutualTlsClientCreator {
    cert_fetcher: Arc<dyn CertFetcher>,
    bundle_fetcher: Arc<dyn CertBundleFetcher>,
    connect_timeout: Duration,
    request_timeout: Option<Duration>,
}

impl MutualTlsClientCreator {
    pub fn new(cert_fetcher: Arc<dyn CertFetcher>, bundle_fetcher: Arc<dyn CertBundleFetcher>) -> Self {
        Self {
            cert_fetcher,
            bundle_fetcher,
            connect_timeout: Duration::from_secs(10),
            request_timeout: None,
        }
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn tls_config(&self) -> Result<ClientConfig, TlsError> {
        // Fetch the whole set before parsing so one generation never mixes sources.
        let cert_pem = self.cert_fetcher.cert_bytes()?;
        let key_pem = self.cert_fetcher.key_bytes()?;
        let bundle_pem = self.bundle_fetcher.bundle_bytes()?;

        let chain = parse_certs(&cert_pem, "client certificate")?;
        if chain.is_empty() {
            return Err(TlsError::NoCertificate);
        }

        let key = parse_key(&key_pem)?;

        let mut roots = RootCertStore::empty();
        for ca in parse_certs(&bundle_pem, "CA bundle")? {
            roots.add(ca).map_err(TlsError::InvalidRoot)?;
        }
        if roots.is_empty() {
            return Err(TlsError::EmptyBundle);
        }

        let provider = Arc::new(rustls::crypto::ring::default_provider());
        ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(TlsError::Config)?
            .with_root_certificates(roots)
            .with_client_auth_cert(chain, key)
            .map_err(TlsError::Config)
    }
}

fn parse_certs(pem: &[u8], what: &'static str) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    rustls_pemfile::certs(&mut &pem[..])
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsError::Pem { what, source })
}

fn parse_key(pem: &[u8]) -> Result<PrivateKeyDer<'static>, TlsError> {
    rustls_pemfile::private_key(&mut &pem[..])
        .map_err(|source| TlsError::Pem {
            what: "client key",
            source,
        })?
        .ok_or(TlsError::NoPrivateKey)
}

impl ClientCreator for MutualTlsClientCreator {
    fn create_client(&self) -> Result<reqwest::Client, TlsError> {
        let tls = self.tls_config()?;

        let mut builder = reqwest::Client::builder()
            .use_preconfigured_tls(tls)
            .connect_timeout(self.connect_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy();
        if let Some(timeout) = self.request_timeout {
            builder = builder.timeout(timeout);
        }

        Ok(builder.build()?)
    }
}
