//! Upload token subsystem.
//!
//! # Data Flow
//! ```text
//! Authorization: Bearer <jwt>
//!     → validator.rs (RS256 signature, exp/nbf)
//!     → claim.rs (operation + target identity)
//!
//! Control plane / CLI:
//!     Claim → issuer.rs → signed <jwt>
//! ```

pub mod claim;
pub mod issuer;
pub mod validator;

pub use claim::{Claim, GroupVersionResource, Operation, PVC_RESOURCE};
pub use issuer::{TokenIssuer, DEFAULT_TOKEN_TTL};
pub use validator::{JwtTokenValidator, TokenError, TokenValidator};
