//! Token minting for the control plane and operator tooling.

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::token::claim::{Claim, TokenPayload};
use crate::token::validator::TokenError;

/// Default lifetime of an issued upload token.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(5 * 60);

/// Signs claims with an RSA private key.
pub struct TokenIssuer {
    key: EncodingKey,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn from_private_key_pem(pem: &[u8], ttl: Duration) -> Result<Self, TokenError> {
        let key = EncodingKey::from_rsa_pem(pem).map_err(TokenError::InvalidKey)?;
        Ok(Self { key, ttl })
    }

    /// Sign `claim`, valid from now for the configured TTL.
    pub fn issue(&self, claim: &Claim) -> Result<String, TokenError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| TokenError::Clock)?
            .as_secs();

        let payload = TokenPayload {
            operation: claim.operation,
            name: claim.name.clone(),
            namespace: claim.namespace.clone(),
            resource: claim.resource.clone(),
            exp: now + self.ttl.as_secs(),
            iat: Some(now),
            nbf: Some(now),
        };

        encode(&Header::new(Algorithm::RS256), &payload, &self.key).map_err(TokenError::InvalidKey)
    }
}
