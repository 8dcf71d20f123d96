//! JWT structure utilities shared by the extranet services.
//!
//! This module peeks into tokens WITHOUT verifying them:
//! - Size limit applied before any decoding (DoS prevention)
//! - Segment splitting (`header.payload.signature`)
//! - Base64url + JSON decoding of individual segments into typed structures
//! - `kid` / `iss` discovery ahead of signature verification
//!
//! # Security
//!
//! - Nothing returned from here is trusted. `kid` and `iss` are only used to
//!   select a key from a trusted JWKS; the token MUST still be verified.
//! - Data tokens are decoded here and deliberately never verified. They are
//!   delivered by the load balancer over a trusted channel.
//! - Error messages are generic; details go to debug logs.
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{peek_header, peek_payload};
//!
//! let header = peek_header(access_token)?;   // header.kid
//! let payload = peek_payload(access_token)?; // payload.iss
//! ```

use base64::{
    engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD},
    Engine,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// Tokens larger than this are rejected BEFORE any base64 decoding or JSON
/// parsing. Load-balancer issued access tokens are ~1KB; data tokens carrying
/// a long role list stay well under 4KB.
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

/// Minimum number of dot-separated segments needed to peek at a token.
pub const MIN_JWT_SEGMENTS: usize = 2;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while peeking into an unverified JWT.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    /// Token format is invalid (segments, base64 or JSON).
    #[error("The access token is invalid or expired")]
    MalformedToken,

    /// Token header is missing a usable `kid`.
    #[error("The access token is invalid or expired")]
    MissingKid,

    /// Token payload is missing a usable `iss`.
    #[error("The access token is invalid or expired")]
    MissingIssuer,
}

// =============================================================================
// Unverified Token Parts
// =============================================================================

/// JOSE header of a token, read before signature verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnverifiedHeader {
    /// Declared signing algorithm (e.g. "RS256"). Informational only; the
    /// verifier pins its own algorithm.
    pub alg: Option<String>,

    /// Key ID used to select the verification key.
    pub kid: String,
}

/// Issuer-bearing part of a token payload, read before verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnverifiedPayload {
    /// Token issuer URL.
    pub iss: String,
}

#[derive(Deserialize)]
struct RawHeader {
    #[serde(default)]
    alg: Option<String>,
    #[serde(default)]
    kid: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct RawPayload {
    #[serde(default)]
    iss: Option<serde_json::Value>,
}

// =============================================================================
// Functions
// =============================================================================

/// Split a token into its dot-separated segments after the size check.
///
/// # Errors
///
/// - `TokenTooLarge` - Token exceeds `MAX_JWT_SIZE_BYTES`
/// - `MalformedToken` - Fewer than `MIN_JWT_SEGMENTS` segments
pub fn split_segments(token: &str) -> Result<Vec<&str>, JwtValidationError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() < MIN_JWT_SEGMENTS {
        tracing::debug!(
            target: "common.jwt",
            segments = segments.len(),
            "Token rejected: invalid JWT format"
        );
        return Err(JwtValidationError::MalformedToken);
    }

    Ok(segments)
}

/// Decode one base64 segment into a typed JSON structure.
///
/// `=` padding is stripped first. The URL-safe alphabet is tried before the
/// standard one, since some proxies re-encode the data token with `+` and `/`.
///
/// # Errors
///
/// Returns `MalformedToken` when the segment is empty, is not base64 in either
/// alphabet, or does not deserialize into `T`.
pub fn decode_segment<T: DeserializeOwned>(segment: &str) -> Result<T, JwtValidationError> {
    let trimmed = segment.trim_end_matches('=');
    if trimmed.is_empty() {
        return Err(JwtValidationError::MalformedToken);
    }

    let bytes = URL_SAFE_NO_PAD
        .decode(trimmed)
        .or_else(|_| STANDARD_NO_PAD.decode(trimmed))
        .map_err(|e| {
            tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT segment base64");
            JwtValidationError::MalformedToken
        })?;

    serde_json::from_slice(&bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT segment JSON");
        JwtValidationError::MalformedToken
    })
}

/// Decode the payload segment (index 1) of a token without verification.
///
/// # Errors
///
/// Same as [`split_segments`] and [`decode_segment`].
pub fn decode_unverified_payload<T: DeserializeOwned>(token: &str) -> Result<T, JwtValidationError> {
    let segments = split_segments(token)?;
    let payload = segments
        .get(1)
        .ok_or(JwtValidationError::MalformedToken)?;
    decode_segment(payload)
}

/// Read the JOSE header of a token without verifying the signature.
///
/// # Errors
///
/// - `TokenTooLarge` / `MalformedToken` - see [`split_segments`]
/// - `MissingKid` - `kid` absent, not a string, or empty
pub fn peek_header(token: &str) -> Result<UnverifiedHeader, JwtValidationError> {
    let segments = split_segments(token)?;
    let header_part = segments
        .first()
        .ok_or(JwtValidationError::MalformedToken)?;
    let raw: RawHeader = decode_segment(header_part)?;

    // Empty kid rejected: it can never match a published key
    let kid = raw
        .kid
        .as_ref()
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .ok_or(JwtValidationError::MissingKid)?;

    Ok(UnverifiedHeader { alg: raw.alg, kid })
}

/// Read the issuer of a token without verifying the signature.
///
/// # Errors
///
/// - `TokenTooLarge` / `MalformedToken` - see [`split_segments`]
/// - `MissingIssuer` - `iss` absent, not a string, or empty
pub fn peek_payload(token: &str) -> Result<UnverifiedPayload, JwtValidationError> {
    let raw: RawPayload = decode_unverified_payload(token)?;

    let iss = raw
        .iss
        .as_ref()
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .ok_or(JwtValidationError::MissingIssuer)?;

    Ok(UnverifiedPayload { iss })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn b64(json: &str) -> String {
        URL_SAFE_NO_PAD.encode(json)
    }

    // -------------------------------------------------------------------------
    // split_segments Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_max_jwt_size_is_8kb() {
        assert_eq!(MAX_JWT_SIZE_BYTES, 8192);
    }

    #[test]
    fn test_split_segments_rejects_single_segment() {
        assert!(matches!(
            split_segments("not-a-jwt"),
            Err(JwtValidationError::MalformedToken)
        ));
        assert!(matches!(
            split_segments(""),
            Err(JwtValidationError::MalformedToken)
        ));
    }

    #[test]
    fn test_split_segments_accepts_two_segments() {
        let segments = split_segments("a.b").unwrap();
        assert_eq!(segments, vec!["a", "b"]);
    }

    #[test]
    fn test_split_segments_oversized_token() {
        let oversized = format!("{}.b.c", "a".repeat(MAX_JWT_SIZE_BYTES));
        assert!(matches!(
            split_segments(&oversized),
            Err(JwtValidationError::TokenTooLarge)
        ));
    }

    // -------------------------------------------------------------------------
    // decode_segment Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_decode_segment_strips_padding() {
        // 4-byte JSON -> standard base64 ends in "=="
        let padded = base64::engine::general_purpose::URL_SAFE.encode(r#"{"a":1}"#);
        assert!(padded.ends_with('='));

        let value: serde_json::Value = decode_segment(&padded).unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn test_decode_segment_accepts_standard_alphabet() {
        // Bytes chosen so the standard alphabet emits '+' and '/'
        let json = r#"{"k":"?>?>~~"}"#;
        let standard = base64::engine::general_purpose::STANDARD_NO_PAD.encode(json);
        assert!(standard.contains('/') || standard.contains('+'));

        let value: serde_json::Value = decode_segment(&standard).unwrap();
        assert_eq!(value["k"], "?>?>~~");
    }

    #[test]
    fn test_decode_segment_invalid_base64() {
        let result: Result<serde_json::Value, _> = decode_segment("!!!invalid!!!");
        assert!(matches!(result, Err(JwtValidationError::MalformedToken)));
    }

    #[test]
    fn test_decode_segment_invalid_json() {
        let result: Result<serde_json::Value, _> = decode_segment(&b64("not-json"));
        assert!(matches!(result, Err(JwtValidationError::MalformedToken)));
    }

    #[test]
    fn test_decode_segment_empty() {
        let result: Result<serde_json::Value, _> = decode_segment("==");
        assert!(matches!(result, Err(JwtValidationError::MalformedToken)));
    }

    // -------------------------------------------------------------------------
    // peek_header Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_peek_header_valid_token() {
        let token = format!("{}.payload.signature", b64(r#"{"alg":"RS256","kid":"key-01"}"#));

        let header = peek_header(&token).unwrap();
        assert_eq!(header.kid, "key-01");
        assert_eq!(header.alg.as_deref(), Some("RS256"));
    }

    #[test]
    fn test_peek_header_missing_kid() {
        let token = format!("{}.payload.signature", b64(r#"{"alg":"RS256"}"#));
        assert!(matches!(
            peek_header(&token),
            Err(JwtValidationError::MissingKid)
        ));
    }

    #[test]
    fn test_peek_header_non_string_kid() {
        let token = format!("{}.payload.signature", b64(r#"{"alg":"RS256","kid":12345}"#));
        assert!(matches!(
            peek_header(&token),
            Err(JwtValidationError::MissingKid)
        ));
    }

    #[test]
    fn test_peek_header_empty_kid() {
        let token = format!("{}.payload.signature", b64(r#"{"alg":"RS256","kid":""}"#));
        assert!(matches!(
            peek_header(&token),
            Err(JwtValidationError::MissingKid)
        ));
    }

    #[test]
    fn test_peek_header_empty_header_segment() {
        assert!(matches!(
            peek_header(".payload.signature"),
            Err(JwtValidationError::MalformedToken)
        ));
    }

    // -------------------------------------------------------------------------
    // peek_payload Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_peek_payload_reads_issuer() {
        let token = format!(
            "{}.{}.sig",
            b64(r#"{"kid":"k"}"#),
            b64(r#"{"iss":"https://idp.example.test/pool","token_use":"access"}"#)
        );

        let payload = peek_payload(&token).unwrap();
        assert_eq!(payload.iss, "https://idp.example.test/pool");
    }

    #[test]
    fn test_peek_payload_two_segment_token() {
        let token = format!("{}.{}", b64(r#"{"kid":"k"}"#), b64(r#"{"iss":"x"}"#));
        assert_eq!(peek_payload(&token).unwrap().iss, "x");
    }

    #[test]
    fn test_peek_payload_missing_issuer() {
        let token = format!("{}.{}.sig", b64(r#"{"kid":"k"}"#), b64(r#"{"sub":"u"}"#));
        assert!(matches!(
            peek_payload(&token),
            Err(JwtValidationError::MissingIssuer)
        ));
    }

    #[test]
    fn test_peek_payload_non_string_issuer() {
        let token = format!("{}.{}.sig", b64(r#"{"kid":"k"}"#), b64(r#"{"iss":["a"]}"#));
        assert!(matches!(
            peek_payload(&token),
            Err(JwtValidationError::MissingIssuer)
        ));
    }

    #[test]
    fn test_decode_unverified_payload_typed() {
        #[derive(Deserialize)]
        struct Data {
            uid: String,
        }

        let token = format!("{}.{}.sig", b64(r#"{"alg":"ES256"}"#), b64(r#"{"uid":"LX1"}"#));
        let data: Data = decode_unverified_payload(&token).unwrap();
        assert_eq!(data.uid, "LX1");
    }
}
