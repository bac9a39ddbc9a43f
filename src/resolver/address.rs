//! Backend address derivation.
//!
//! The worker for a target is reachable at an address computed from the
//! target's identity alone, never from request content.

use std::fmt;
use url::Url;

use crate::config::UpstreamConfig;

/// Base URL of the worker serving one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendAddress(Url);

impl BackendAddress {
    pub fn new(base: Url) -> Self {
        Self(base)
    }

    pub fn as_url(&self) -> &Url {
        &self.0
    }

    /// URL of `path` (and `query`) on this backend. Host and port always
    /// come from the resolved address.
    pub fn endpoint(&self, path: &str, query: Option<&str>) -> Url {
        let mut url = self.0.clone();
        url.set_path(path);
        url.set_query(query);
        url
    }
}

impl fmt::Display for BackendAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Maps a target identity to its worker's base URL.
pub trait UrlResolver: Send + Sync {
    fn base_url(&self, namespace: &str, name: &str) -> Result<Url, url::ParseError>;
}

/// `https://<prefix><name>.<namespace>.<domain>[:port]`
#[derive(Debug, Clone)]
pub struct ServiceUrlResolver {
    scheme: String,
    prefix: String,
    domain: String,
    port: Option<u16>,
}

impl ServiceUrlResolver {
    pub fn new(prefix: impl Into<String>, domain: impl Into<String>, port: Option<u16>) -> Self {
        Self {
            scheme: "https".to_string(),
            prefix: prefix.into(),
            domain: domain.into(),
            port,
        }
    }

    pub fn from_config(config: &UpstreamConfig) -> Self {
        Self::new(
            config.service_prefix.clone(),
            config.service_domain.clone(),
            config.port,
        )
    }

    /// Service name of the worker for target `name`.
    pub fn service_name(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }
}

/// RFC 1123 label as used for service and namespace names: lowercase
/// alphanumerics and `-`, alphanumeric at both ends, at most 63 bytes.
pub fn is_dns_label(value: &str) -> bool {
    let bytes = value.as_bytes();
    let edge = |b: &u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    match (bytes.first(), bytes.last()) {
        (Some(first), Some(last)) => {
            bytes.len() <= 63
                && edge(first)
                && edge(last)
                && bytes.iter().all(|b| edge(b) || *b == b'-')
        }
        _ => false,
    }
}

impl UrlResolver for ServiceUrlResolver {
    fn base_url(&self, namespace: &str, name: &str) -> Result<Url, url::ParseError> {
        let service = self.service_name(name);
        if !is_dns_label(&service) || !is_dns_label(namespace) {
            return Err(url::ParseError::InvalidDomainCharacter);
        }
        let host = format!("{}.{}.{}", service, namespace, self.domain);
        let raw = match self.port {
            Some(port) => format!("{}://{}:{}/", self.scheme, host, port),
            None => format!("{}://{}/", self.scheme, host),
        };
        Url::parse(&raw)
    }
}

/// Sends every target to the same base URL. Single-worker setups and tests.
#[derive(Debug, Clone)]
pub struct FixedUrlResolver(Url);

impl FixedUrlResolver {
    pub fn new(base: Url) -> Self {
        Self(base)
    }
}

impl UrlResolver for FixedUrlResolver {
    fn base_url(&self, _namespace: &str, _name: &str) -> Result<Url, url::ParseError> {
        Ok(self.0.clone())
    }
}
