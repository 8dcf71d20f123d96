//! Authentication module for the auth service.
//!
//! Verifies load-balancer issued access tokens against the issuer's JWKS and
//! resolves the request user from the companion data token.
//!
//! # Components
//!
//! - `key_cache` - Per-issuer key set cache with a one-hour TTL
//! - `jwks` - JWKS fetching with bounded retry
//! - `jwt` - Access-token verification
//! - `claims` - Token claim structures and role parsing
//! - `user` - Resolved user and capability checks
//! - `resolver` - Request header to user resolution

pub mod claims;
pub mod jwks;
pub mod jwt;
pub mod key_cache;
pub mod resolver;
pub mod user;

pub use claims::{AccessClaims, DataClaims};
pub use jwks::{FaultKind, FetchError, HttpJwksTransport, JwksTransport, KeySetFetcher, RetryPolicy};
pub use jwt::{Rejection, TokenVerifier, Verification};
pub use key_cache::{KeyCache, KeySet};
pub use resolver::UserResolver;
pub use user::{validate_read_user, validate_write_user, ResolvedUser};
