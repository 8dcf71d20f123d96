//! Secret types for protecting bearer credentials from accidental logging.
//!
//! Re-exports the [`secrecy`] types used for every request-scoped token in
//! the extranet services. Access tokens and data tokens are bearer
//! credentials: anyone holding one can act as the user until it expires, so
//! they are wrapped from the moment they are read out of a request header.
//!
//! `SecretString` implements `Debug` with redaction, so structs that derive
//! `Debug` while holding tokens stay safe to log via `{:?}` or tracing
//! fields. Values are zeroized on drop.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct TokenPair {
//!     access_token: SecretString,
//!     data_token: SecretString,
//! }
//!
//! let pair = TokenPair {
//!     access_token: SecretString::from("eyJhbGciOi..."),
//!     data_token: SecretString::from("eyJ0eXAiOi..."),
//! };
//!
//! // Redacted
//! println!("{:?}", pair);
//!
//! // Explicit access at the verification boundary only
//! let raw: &str = pair.access_token.expose_secret();
//! assert!(raw.starts_with("eyJ"));
//! ```

pub use secrecy::{ExposeSecret, SecretString};
