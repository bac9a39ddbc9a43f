//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the upload
//! proxy. All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration for the upload proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Upload token verification.
    pub auth: AuthConfig,

    /// Backend workers and the credentials used to reach them.
    pub upstream: UpstreamConfig,

    /// External target state provider.
    pub state: StateConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8443").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8443".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Token verification settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Authorization header scheme, compared case-sensitively.
    pub scheme: String,

    /// PEM RSA public key tokens are verified against.
    /// Without it every token is rejected.
    pub public_key_path: Option<PathBuf>,

    /// Clock skew tolerated on `exp`/`nbf`, in seconds.
    pub leeway_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            scheme: "Bearer".to_string(),
            public_key_path: None,
            leeway_secs: 5,
        }
    }
}

/// Upload worker addressing and mutual-TLS credentials.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Client certificate presented to workers (PEM).
    pub client_cert_path: Option<PathBuf>,

    /// Private key for the client certificate (PEM).
    pub client_key_path: Option<PathBuf>,

    /// CA bundle workers' certificates must chain to (PEM).
    pub ca_bundle_path: Option<PathBuf>,

    /// Worker service name prefix; the target name is appended.
    pub service_prefix: String,

    /// DNS suffix after `<service>.<namespace>`.
    pub service_domain: String,

    /// Worker port, when not the scheme default.
    pub port: Option<u16>,

    /// Rotate the backend client when a credential file changes.
    pub watch_credentials: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            client_cert_path: None,
            client_key_path: None,
            ca_bundle_path: None,
            service_prefix: "cdi-upload-".to_string(),
            service_domain: "svc".to_string(),
            port: None,
            watch_credentials: true,
        }
    }
}

impl UpstreamConfig {
    /// The three credential paths, when all are configured.
    pub fn credential_paths(&self) -> Option<(PathBuf, PathBuf, PathBuf)> {
        match (&self.client_cert_path, &self.client_key_path, &self.ca_bundle_path) {
            (Some(cert), Some(key), Some(ca)) => Some((cert.clone(), key.clone(), ca.clone())),
            _ => None,
        }
    }
}

/// Target state provider settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StateConfig {
    /// Base URL of the API server holding target objects.
    pub api_url: String,

    /// File containing a bearer token for the API server.
    pub token_path: Option<PathBuf>,

    /// CA certificate for the API server (PEM).
    pub ca_path: Option<PathBuf>,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            api_url: "https://kubernetes.default.svc".to_string(),
            token_path: None,
            ca_path: None,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Backend connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Total backend request timeout in seconds. 0 disables it; image
    /// uploads can legitimately run for a long time.
    pub request_secs: u64,

    /// State provider request timeout in seconds.
    pub state_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 10,
            request_secs: 0,
            state_secs: 10,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
