//! Token verification.
//!
//! # Responsibilities
//! - Decode an RS256-signed JWT and check its signature and time claims
//! - Produce a fully populated [`Claim`]
//! - Reject everything when no verification key is configured
//!
//! # Design Decisions
//! - RS256 only; `alg` in the header cannot downgrade verification
//! - Pure function of token and key: no replay set, expiry bounds reuse

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use thiserror::Error;

use crate::token::claim::{Claim, TokenPayload};

/// Errors produced while validating or issuing tokens.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token is empty")]
    Empty,

    #[error("no verification key configured")]
    NoVerificationKey,

    #[error("token rejected: {0}")]
    Rejected(#[from] jsonwebtoken::errors::Error),

    #[error("token claim `{0}` is empty")]
    EmptyField(&'static str),

    #[error("invalid key material: {0}")]
    InvalidKey(jsonwebtoken::errors::Error),

    #[error("system clock before unix epoch")]
    Clock,
}

/// Turns a bearer token into a [`Claim`].
pub trait TokenValidator: Send + Sync {
    fn validate(&self, token: &str) -> Result<Claim, TokenError>;
}

/// RS256 JWT validator.
pub struct JwtTokenValidator {
    key: Option<DecodingKey>,
    validation: Validation,
}

impl JwtTokenValidator {
    /// Build a validator from a PEM RSA public key (PKCS#1 or SPKI).
    pub fn from_public_key_pem(pem: &[u8], leeway_secs: u64) -> Result<Self, TokenError> {
        let key = DecodingKey::from_rsa_pem(pem).map_err(TokenError::InvalidKey)?;
        Ok(Self {
            key: Some(key),
            validation: validation(leeway_secs),
        })
    }

    /// A validator without a key. Every token is rejected.
    pub fn fail_closed() -> Self {
        Self {
            key: None,
            validation: validation(0),
        }
    }

    pub fn has_key(&self) -> bool {
        self.key.is_some()
    }
}

fn validation(leeway_secs: u64) -> Validation {
    let mut validation = Validation::new(Algorithm::RS256);
    validation.algorithms = vec![Algorithm::RS256];
    validation.leeway = leeway_secs;
    validation.validate_nbf = true;
    validation.set_required_spec_claims(&["exp"]);
    validation
}

impl TokenValidator for JwtTokenValidator {
    fn validate(&self, token: &str) -> Result<Claim, TokenError> {
        if token.is_empty() {
            return Err(TokenError::Empty);
        }
        let key = self.key.as_ref().ok_or(TokenError::NoVerificationKey)?;

        let payload = decode::<TokenPayload>(token, key, &self.validation)?.claims;

        if payload.name.is_empty() {
            return Err(TokenError::EmptyField("name"));
        }
        if payload.namespace.is_empty() {
            return Err(TokenError::EmptyField("namespace"));
        }
        if payload.resource.resource.is_empty() {
            return Err(TokenError::EmptyField("resource"));
        }

        Ok(Claim {
            operation: payload.operation,
            name: payload.name,
            namespace: payload.namespace,
            resource: payload.resource,
        })
    }
}
