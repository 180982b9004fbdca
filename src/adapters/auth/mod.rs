//! Authentication adapters.
//!
//! Implementations of the `SessionValidator` port:
//!
//! - `jwt` - HS256 tokens with a `username` claim, plus an issuer
//! - `mock` - Test implementation with a fixed token table

mod jwt;
mod mock;

pub use jwt::{JwtSessionValidator, JwtTokenIssuer, RelayClaims};
pub use mock::MockSessionValidator;
