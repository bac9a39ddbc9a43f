//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses parse
//! - Reject partially configured credential sets
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::ProxyConfig;

/// One semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a parsed configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if let Some(tls) = &config.listener.tls {
        if tls.cert_path.is_empty() || tls.key_path.is_empty() {
            errors.push(ValidationError::new(
                "listener.tls",
                "cert_path and key_path are both required",
            ));
        }
    }

    if config.auth.scheme.trim().is_empty() || config.auth.scheme.contains(' ') {
        errors.push(ValidationError::new(
            "auth.scheme",
            "must be a single non-empty word",
        ));
    }

    let upstream = &config.upstream;
    let configured = [
        upstream.client_cert_path.is_some(),
        upstream.client_key_path.is_some(),
        upstream.ca_bundle_path.is_some(),
    ];
    if configured.iter().any(|c| *c) && !configured.iter().all(|c| *c) {
        errors.push(ValidationError::new(
            "upstream",
            "client_cert_path, client_key_path and ca_bundle_path must be set together",
        ));
    }

    if upstream.service_prefix.is_empty() {
        errors.push(ValidationError::new("upstream.service_prefix", "must not be empty"));
    }
    if upstream.service_domain.is_empty() {
        errors.push(ValidationError::new("upstream.service_domain", "must not be empty"));
    }
    if upstream.port == Some(0) {
        errors.push(ValidationError::new("upstream.port", "must not be 0"));
    }

    if url::Url::parse(&config.state.api_url).is_err() {
        errors.push(ValidationError::new(
            "state.api_url",
            format!("'{}' is not a URL", config.state.api_url),
        ));
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::new("timeouts.connect_secs", "must be greater than 0"));
    }
    if config.timeouts.state_secs == 0 {
        errors.push(ValidationError::new("timeouts.state_secs", "must be greater than 0"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
