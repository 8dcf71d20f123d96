//! # Auth Test Utilities
//!
//! Shared test utilities for the auth service.
//!
//! This crate provides:
//! - Fixed RSA crypto fixtures (reproducible signing keys and JWKs)
//! - Token builders (AccessTokenBuilder, DataTokenBuilder)
//! - A scripted JWKS transport for retry and cache tests
//! - A wiremock-backed mock issuer
//! - Server test harness (TestAuthServer for E2E tests)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use auth_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let key = TestKeypair::primary("k1");
//!     let issuer = MockIssuer::start(&[&key]).await;
//!
//!     let access = key.sign(&AccessTokenBuilder::new(&issuer.issuer()).build())?;
//!     let data = DataTokenBuilder::new("LX1").with_roles(&["Ratatieto_luku"]).build();
//! }
//! ```

pub mod crypto_fixtures;
pub mod jwks_server;
pub mod mock_transport;
pub mod server_harness;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use jwks_server::*;
pub use mock_transport::*;
pub use server_harness::*;
pub use token_builders::*;
