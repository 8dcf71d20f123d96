//! JWKS fetching with bounded retry.
//!
//! Fetches `{issuer}/.well-known/jwks.json`, converts each RSA JWK into a
//! verification key and stores the resulting key set in the [`KeyCache`].
//!
//! # Retry policy
//!
//! Every failure is classified into a [`FaultKind`]. Kinds listed in the
//! [`RetryPolicy`] are transient and retried immediately (no backoff) until
//! the attempt budget is spent; the last error is returned. Anything else
//! fails after one attempt. The default policy retries connection resets and
//! broken pipes only, with 3 attempts in total.
//!
//! # Security
//!
//! - HTTPS should be used for issuer URLs in production (deployment config)
//! - Only RSA keys are loaded; other key types are skipped

use crate::auth::key_cache::{KeyCache, KeySet};
use crate::observability::metrics;
use async_trait::async_trait;
use jsonwebtoken::DecodingKey;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::instrument;

/// Path of the key set document relative to the issuer URL.
pub const JWKS_PATH: &str = "/.well-known/jwks.json";

/// Default total number of fetch attempts (1 initial + 2 retries).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default HTTP timeout for a single JWKS request.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// JSON Web Key from a JWKS endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    /// Key type ("RSA" for RS256 keys).
    pub kty: String,

    /// Key ID - used to select the correct key for verification.
    pub kid: String,

    /// RSA modulus (base64url encoded).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url encoded).
    #[serde(default)]
    pub e: Option<String>,

    /// Algorithm (should be "RS256").
    #[serde(default)]
    pub alg: Option<String>,

    /// Key use (should be "sig" for signing).
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,
}

/// JWKS response body.
#[derive(Debug, Clone, Deserialize)]
pub struct JwksResponse {
    /// List of JSON Web Keys.
    pub keys: Vec<Jwk>,
}

/// Classification of a failed fetch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    /// Peer reset the connection.
    ConnectionReset,
    /// Connection aborted locally or by the peer's stack.
    ConnectionAborted,
    /// Write to a connection the peer already closed.
    BrokenPipe,
    /// Request or connect timed out.
    Timeout,
    /// Endpoint answered with a 5xx status.
    ServerError,
    /// Connection could not be established (DNS failure, refused).
    Connect,
    /// Endpoint answered with a non-success, non-5xx status.
    HttpStatus,
    /// Body was not a valid key set document.
    Decode,
    /// Anything else.
    Other,
}

impl FaultKind {
    /// Parse a configuration name (`connection_reset`, `connection_aborted`,
    /// `broken_pipe`, `timeout`, `server_error`).
    ///
    /// Only these five kinds may be configured as transient.
    pub fn from_config_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "connection_reset" => Some(Self::ConnectionReset),
            "connection_aborted" => Some(Self::ConnectionAborted),
            "broken_pipe" => Some(Self::BrokenPipe),
            "timeout" => Some(Self::Timeout),
            "server_error" => Some(Self::ServerError),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConnectionReset => "connection_reset",
            Self::ConnectionAborted => "connection_aborted",
            Self::BrokenPipe => "broken_pipe",
            Self::Timeout => "timeout",
            Self::ServerError => "server_error",
            Self::Connect => "connect",
            Self::HttpStatus => "http_status",
            Self::Decode => "decode",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from fetching a key set.
///
/// Surfaces as an infrastructure failure (HTTP 500), never as a rejection.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("JWKS request failed ({kind}): {message}")]
    Transport { kind: FaultKind, message: String },

    #[error("JWKS endpoint returned status {0}")]
    Status(u16),

    #[error("JWKS response could not be parsed: {0}")]
    InvalidBody(String),
}

impl FetchError {
    pub fn fault_kind(&self) -> FaultKind {
        match self {
            FetchError::Transport { kind, .. } => *kind,
            FetchError::Status(status) if *status >= 500 => FaultKind::ServerError,
            FetchError::Status(_) => FaultKind::HttpStatus,
            FetchError::InvalidBody(_) => FaultKind::Decode,
        }
    }
}

/// Which faults are retried and how many attempts are made in total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    transient: HashSet<FaultKind>,
}

impl RetryPolicy {
    /// Policy with an explicit attempt budget and transient set.
    ///
    /// `max_attempts` below 1 is raised to 1.
    pub fn new(max_attempts: u32, transient: impl IntoIterator<Item = FaultKind>) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            transient: transient.into_iter().collect(),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn is_transient(&self, kind: FaultKind) -> bool {
        self.transient.contains(&kind)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_ATTEMPTS,
            [FaultKind::ConnectionReset, FaultKind::BrokenPipe],
        )
    }
}

/// One GET of a key set document.
///
/// Implemented over HTTP in production and by scripted doubles in tests.
#[async_trait]
pub trait JwksTransport: Send + Sync {
    async fn get_jwks(&self, url: &str) -> Result<JwksResponse, FetchError>;
}

/// `reqwest`-backed transport.
pub struct HttpJwksTransport {
    http_client: reqwest::Client,
}

impl HttpJwksTransport {
    /// Create a transport whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "auth.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self { http_client }
    }
}

impl Default for HttpJwksTransport {
    fn default() -> Self {
        Self::new(DEFAULT_HTTP_TIMEOUT)
    }
}

#[async_trait]
impl JwksTransport for HttpJwksTransport {
    async fn get_jwks(&self, url: &str) -> Result<JwksResponse, FetchError> {
        let response = self.http_client.get(url).send().await.map_err(|e| {
            let kind = classify_reqwest_error(&e);
            FetchError::Transport {
                kind,
                message: e.to_string(),
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        response.json::<JwksResponse>().await.map_err(|e| {
            // Body streaming can also be cut by a reset
            match classify_reqwest_error(&e) {
                kind @ (FaultKind::ConnectionReset
                | FaultKind::ConnectionAborted
                | FaultKind::BrokenPipe
                | FaultKind::Timeout) => {
                    FetchError::Transport {
                        kind,
                        message: e.to_string(),
                    }
                }
                _ => FetchError::InvalidBody(e.to_string()),
            }
        })
    }
}

/// Map a `reqwest` error to a fault kind.
///
/// The underlying `io::Error`, if any, decides first, so a reset during
/// connect still counts as a reset rather than a generic connect failure.
pub fn classify_reqwest_error(err: &reqwest::Error) -> FaultKind {
    if let Some(kind) = io_error_kind(err).and_then(fault_kind_for_io) {
        return kind;
    }

    if err.is_timeout() {
        FaultKind::Timeout
    } else if err.is_connect() {
        FaultKind::Connect
    } else if err.is_decode() {
        FaultKind::Decode
    } else {
        FaultKind::Other
    }
}

/// Fault kind of an I/O error, if it is one the retry policy distinguishes.
fn fault_kind_for_io(kind: io::ErrorKind) -> Option<FaultKind> {
    match kind {
        io::ErrorKind::ConnectionReset => Some(FaultKind::ConnectionReset),
        io::ErrorKind::ConnectionAborted => Some(FaultKind::ConnectionAborted),
        io::ErrorKind::BrokenPipe => Some(FaultKind::BrokenPipe),
        io::ErrorKind::TimedOut => Some(FaultKind::Timeout),
        _ => None,
    }
}

/// Walk the source chain looking for an `io::Error`.
fn io_error_kind(err: &(dyn StdError + 'static)) -> Option<io::ErrorKind> {
    let mut source: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(current) = source {
        if let Some(io_err) = current.downcast_ref::<io::Error>() {
            return Some(io_err.kind());
        }
        source = current.source();
    }
    None
}

/// Convert a JWKS document into a key set, skipping unusable keys.
pub fn key_set_from_jwks(jwks: &JwksResponse) -> KeySet {
    KeySet::from_keys(
        jwks.keys
            .iter()
            .filter_map(|jwk| decoding_key(jwk).map(|key| (jwk.kid.clone(), key))),
    )
}

fn decoding_key(jwk: &Jwk) -> Option<DecodingKey> {
    if jwk.kty != "RSA" {
        tracing::warn!(target: "auth.jwks", kid = %jwk.kid, kty = %jwk.kty, "Skipping JWK with unsupported key type");
        return None;
    }
    if let Some(alg) = &jwk.alg {
        if alg != "RS256" {
            tracing::warn!(target: "auth.jwks", kid = %jwk.kid, alg = %alg, "Skipping JWK with unexpected algorithm");
            return None;
        }
    }
    if jwk.kid.is_empty() {
        tracing::warn!(target: "auth.jwks", "Skipping JWK with empty kid");
        return None;
    }

    let (Some(n), Some(e)) = (jwk.n.as_deref(), jwk.e.as_deref()) else {
        tracing::warn!(target: "auth.jwks", kid = %jwk.kid, "Skipping RSA JWK missing n or e");
        return None;
    };

    DecodingKey::from_rsa_components(n, e)
        .map_err(|err| {
            tracing::warn!(target: "auth.jwks", kid = %jwk.kid, error = %err, "Skipping RSA JWK with invalid components");
        })
        .ok()
}

/// Build the JWKS URL of an issuer.
pub fn jwks_url(issuer: &str) -> String {
    format!("{}{}", issuer.trim_end_matches('/'), JWKS_PATH)
}

/// Fetches issuer key sets and keeps the [`KeyCache`] populated.
pub struct KeySetFetcher {
    transport: Arc<dyn JwksTransport>,
    cache: Arc<KeyCache>,
    retry_policy: RetryPolicy,

    /// Per-issuer locks serializing remote fetches, so concurrent misses for
    /// one issuer share a result without blocking other issuers.
    fetch_locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeySetFetcher {
    pub fn new(
        transport: Arc<dyn JwksTransport>,
        cache: Arc<KeyCache>,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            cache,
            retry_policy,
            fetch_locks: RwLock::new(HashMap::new()),
        }
    }

    pub fn cache(&self) -> &Arc<KeyCache> {
        &self.cache
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Cached key set of an issuer, fetching it on a miss.
    ///
    /// # Errors
    ///
    /// Returns the last `FetchError` once the retry policy is exhausted.
    #[instrument(skip(self), fields(issuer = %issuer))]
    pub async fn key_set(&self, issuer: &str) -> Result<Arc<KeySet>, FetchError> {
        if let Some(key_set) = self.cache.get(issuer).await {
            return Ok(key_set);
        }

        let lock = self.issuer_lock(issuer).await;
        let _guard = lock.lock().await;

        // Another request may have filled the cache while we waited
        if let Some(key_set) = self.cache.get(issuer).await {
            tracing::debug!(target: "auth.jwks", "Key set was fetched while waiting for lock");
            return Ok(key_set);
        }

        self.fetch_locked(issuer).await
    }

    /// Invalidate the issuer's entry and fetch it again.
    ///
    /// Used when a token names a `kid` the cached set does not contain.
    #[instrument(skip(self), fields(issuer = %issuer))]
    pub async fn refetch(&self, issuer: &str) -> Result<Arc<KeySet>, FetchError> {
        let lock = self.issuer_lock(issuer).await;
        let _guard = lock.lock().await;
        self.cache.invalidate(issuer).await;
        self.fetch_locked(issuer).await
    }

    /// Fetch unconditionally and store the result.
    ///
    /// # Errors
    ///
    /// Returns the last `FetchError` once the retry policy is exhausted.
    pub async fn fetch(&self, issuer: &str) -> Result<Arc<KeySet>, FetchError> {
        let lock = self.issuer_lock(issuer).await;
        let _guard = lock.lock().await;
        self.fetch_locked(issuer).await
    }

    /// Fetch lock of one issuer, created on first use.
    ///
    /// Only issuers that passed the allow-list reach the fetcher, so the map
    /// is bounded by the accepted issuer list.
    async fn issuer_lock(&self, issuer: &str) -> Arc<Mutex<()>> {
        if let Some(lock) = self.fetch_locks.read().await.get(issuer) {
            return lock.clone();
        }

        self.fetch_locks
            .write()
            .await
            .entry(issuer.to_string())
            .or_default()
            .clone()
    }

    async fn fetch_locked(&self, issuer: &str) -> Result<Arc<KeySet>, FetchError> {
        let url = jwks_url(issuer);
        let max_attempts = self.retry_policy.max_attempts();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            tracing::debug!(target: "auth.jwks", url = %url, attempt, "Fetching JWKS");

            let start = Instant::now();
            match self.transport.get_jwks(&url).await {
                Ok(jwks) => {
                    metrics::record_jwks_fetch("success", start.elapsed());

                    let key_set = key_set_from_jwks(&jwks);
                    if key_set.is_empty() {
                        tracing::warn!(target: "auth.jwks", url = %url, "JWKS contains no usable keys");
                    }
                    tracing::info!(
                        target: "auth.jwks",
                        key_count = key_set.len(),
                        attempt,
                        "JWKS fetched"
                    );
                    return Ok(self.cache.put(issuer, key_set).await);
                }
                Err(err) => {
                    let kind = err.fault_kind();
                    let transient = self.retry_policy.is_transient(kind);
                    metrics::record_jwks_fetch(kind.as_str(), start.elapsed());

                    if transient && attempt < max_attempts {
                        tracing::warn!(
                            target: "auth.jwks",
                            error = %err,
                            attempt,
                            max_attempts,
                            "Transient JWKS fetch failure, retrying"
                        );
                        continue;
                    }

                    tracing::error!(
                        target: "auth.jwks",
                        error = %err,
                        attempt,
                        transient,
                        "Failed to fetch JWKS"
                    );
                    return Err(err);
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    // Modulus of the first auth-test-utils fixture key
    const TEST_N: &str = "2kgxMPVHu_3DtOLdqlEbBgQaJM2YtFrEyr-0KFEY30l9tVauFDU4AclYj8YNAKEu-GIMXqGB4iziJK_xbibhZg9OCsByMuYb2zi1e06MxXzr9q3XnzwBj4zwMkPKYZ0ifrobAcgbiqRzfc6Kg9ZNsO2gc2K7rZ4SZ2vPqL3mlJgLOvfJJj-P8LR04z41f2yC-IYJ2cD4B_GI1AtduU2jseyuN4wgiO7ykbDwsfd3UmMvwkTBm1UlBkcpssjKkYQ75aLvp6gedxhqpSbRv25P766gVLCrUk-h7weaO-YbBRscapaefwK5joemyg43lRugWWsznCks9PtwVuHOj-ckhQ";
    const TEST_E: &str = "AQAB";

    fn rsa_jwk(kid: &str) -> Jwk {
        Jwk {
            kty: "RSA".to_string(),
            kid: kid.to_string(),
            n: Some(TEST_N.to_string()),
            e: Some(TEST_E.to_string()),
            alg: Some("RS256".to_string()),
            key_use: Some("sig".to_string()),
        }
    }

    /// Transport serving one RSA key whose kid counts the calls
    /// (`key-1`, `key-2`, ...). URLs of `issuer-a` stall for 10s, URLs of
    /// `slow` answer after 50ms.
    #[derive(Default)]
    struct CountingTransport {
        calls: AtomicUsize,
        stalled: Notify,
    }

    #[async_trait]
    impl JwksTransport for CountingTransport {
        async fn get_jwks(&self, url: &str) -> Result<JwksResponse, FetchError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if url.contains("issuer-a") {
                self.stalled.notify_one();
                tokio::time::sleep(Duration::from_secs(10)).await;
            } else if url.contains("slow") {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            Ok(JwksResponse {
                keys: vec![rsa_jwk(&format!("key-{call}"))],
            })
        }
    }

    fn counting_fetcher(transport: Arc<CountingTransport>) -> Arc<KeySetFetcher> {
        Arc::new(KeySetFetcher::new(
            transport,
            Arc::new(KeyCache::new()),
            RetryPolicy::default(),
        ))
    }

    #[test]
    fn test_jwk_deserialization() {
        let json = format!(
            r#"{{"kty":"RSA","kid":"key-01","n":"{TEST_N}","e":"AQAB","alg":"RS256","use":"sig"}}"#
        );

        let jwk: Jwk = serde_json::from_str(&json).unwrap();

        assert_eq!(jwk.kty, "RSA");
        assert_eq!(jwk.kid, "key-01");
        assert_eq!(jwk.e.as_deref(), Some("AQAB"));
        assert_eq!(jwk.alg.as_deref(), Some("RS256"));
        assert_eq!(jwk.key_use.as_deref(), Some("sig"));
    }

    #[test]
    fn test_jwks_response_deserialization_minimal() {
        let json = r#"{"keys":[{"kty":"RSA","kid":"a"},{"kty":"EC","kid":"b"}]}"#;
        let jwks: JwksResponse = serde_json::from_str(json).unwrap();

        assert_eq!(jwks.keys.len(), 2);
        assert!(jwks.keys.first().unwrap().n.is_none());
    }

    #[test]
    fn test_key_set_from_jwks_skips_unusable_keys() {
        let mut missing_n = rsa_jwk("missing-n");
        missing_n.n = None;
        let mut ec_key = rsa_jwk("ec");
        ec_key.kty = "EC".to_string();
        let mut wrong_alg = rsa_jwk("wrong-alg");
        wrong_alg.alg = Some("RS512".to_string());
        let mut no_alg = rsa_jwk("no-alg");
        no_alg.alg = None;

        let jwks = JwksResponse {
            keys: vec![rsa_jwk("good"), missing_n, ec_key, wrong_alg, no_alg],
        };

        let key_set = key_set_from_jwks(&jwks);
        assert_eq!(key_set.kids(), vec!["good", "no-alg"]);
    }

    #[test]
    fn test_jwks_url_strips_trailing_slash() {
        assert_eq!(
            jwks_url("https://idp.example.test/pool/"),
            "https://idp.example.test/pool/.well-known/jwks.json"
        );
        assert_eq!(
            jwks_url("https://idp.example.test/pool"),
            "https://idp.example.test/pool/.well-known/jwks.json"
        );
    }

    #[test]
    fn test_fault_kind_from_config_name() {
        assert_eq!(
            FaultKind::from_config_name("connection_reset"),
            Some(FaultKind::ConnectionReset)
        );
        assert_eq!(
            FaultKind::from_config_name(" Broken_Pipe "),
            Some(FaultKind::BrokenPipe)
        );
        assert_eq!(
            FaultKind::from_config_name("connection_aborted"),
            Some(FaultKind::ConnectionAborted)
        );
        assert_eq!(FaultKind::from_config_name("timeout"), Some(FaultKind::Timeout));
        assert_eq!(
            FaultKind::from_config_name("server_error"),
            Some(FaultKind::ServerError)
        );
        // DNS / refused connections are never configurable as transient
        assert_eq!(FaultKind::from_config_name("connect"), None);
        assert_eq!(FaultKind::from_config_name("decode"), None);
    }

    #[test]
    fn test_fetch_error_fault_kind() {
        assert_eq!(FetchError::Status(503).fault_kind(), FaultKind::ServerError);
        assert_eq!(FetchError::Status(404).fault_kind(), FaultKind::HttpStatus);
        assert_eq!(
            FetchError::InvalidBody("x".to_string()).fault_kind(),
            FaultKind::Decode
        );
        assert_eq!(
            FetchError::Transport {
                kind: FaultKind::BrokenPipe,
                message: "x".to_string()
            }
            .fault_kind(),
            FaultKind::BrokenPipe
        );
    }

    #[test]
    fn test_default_retry_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 3);
        assert!(policy.is_transient(FaultKind::ConnectionReset));
        assert!(policy.is_transient(FaultKind::BrokenPipe));
        assert!(!policy.is_transient(FaultKind::ConnectionAborted));
        assert!(!policy.is_transient(FaultKind::Timeout));
        assert!(!policy.is_transient(FaultKind::ServerError));
        assert!(!policy.is_transient(FaultKind::Connect));
    }

    #[test]
    fn test_retry_policy_minimum_one_attempt() {
        assert_eq!(RetryPolicy::new(0, []).max_attempts(), 1);
        assert_eq!(RetryPolicy::new(1, []).max_attempts(), 1);
    }

    #[test]
    fn test_fault_kind_for_io() {
        assert_eq!(
            fault_kind_for_io(io::ErrorKind::ConnectionReset),
            Some(FaultKind::ConnectionReset)
        );
        // Aborted stays distinct from reset so it is only retried when configured
        assert_eq!(
            fault_kind_for_io(io::ErrorKind::ConnectionAborted),
            Some(FaultKind::ConnectionAborted)
        );
        assert_eq!(
            fault_kind_for_io(io::ErrorKind::BrokenPipe),
            Some(FaultKind::BrokenPipe)
        );
        assert_eq!(
            fault_kind_for_io(io::ErrorKind::TimedOut),
            Some(FaultKind::Timeout)
        );
        assert_eq!(fault_kind_for_io(io::ErrorKind::ConnectionRefused), None);
    }

    #[test]
    fn test_io_error_kind_walks_source_chain() {
        #[derive(Debug, Error)]
        #[error("wrapper")]
        struct Wrapper(#[source] io::Error);

        let err = Wrapper(io::Error::from(io::ErrorKind::ConnectionReset));
        assert_eq!(io_error_kind(&err), Some(io::ErrorKind::ConnectionReset));

        let plain = FetchError::Status(500);
        assert_eq!(io_error_kind(&plain), None);
    }

    #[tokio::test]
    async fn test_http_transport_fetches_key_set() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "keys": [{"kty": "RSA", "kid": "key-01", "n": TEST_N, "e": TEST_E}]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let transport = HttpJwksTransport::default();
        let jwks = transport
            .get_jwks(&jwks_url(&mock_server.uri()))
            .await
            .unwrap();

        assert_eq!(jwks.keys.len(), 1);
        assert_eq!(jwks.keys.first().unwrap().kid, "key-01");
    }

    #[tokio::test]
    async fn test_http_transport_classifies_server_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let err = HttpJwksTransport::default()
            .get_jwks(&jwks_url(&mock_server.uri()))
            .await
            .unwrap_err();

        assert_eq!(err, FetchError::Status(503));
        assert_eq!(err.fault_kind(), FaultKind::ServerError);
    }

    #[tokio::test]
    async fn test_http_transport_invalid_body() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&mock_server)
            .await;

        let err = HttpJwksTransport::default()
            .get_jwks(&jwks_url(&mock_server.uri()))
            .await
            .unwrap_err();

        assert_eq!(err.fault_kind(), FaultKind::Decode);
    }

    #[tokio::test]
    async fn test_http_transport_timeout_is_classified() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"keys": []}))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&mock_server)
            .await;

        let err = HttpJwksTransport::new(Duration::from_millis(100))
            .get_jwks(&jwks_url(&mock_server.uri()))
            .await
            .unwrap_err();

        assert_eq!(err.fault_kind(), FaultKind::Timeout);
    }

    #[tokio::test]
    async fn test_http_transport_refused_connection_is_not_transient() {
        // Bind then drop to get a port with nothing listening
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = HttpJwksTransport::default()
            .get_jwks(&jwks_url(&format!("http://{addr}")))
            .await
            .unwrap_err();

        assert!(!RetryPolicy::default().is_transient(err.fault_kind()));
    }

    #[tokio::test]
    async fn test_fetcher_stores_result_in_cache() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "keys": [{"kty": "RSA", "kid": "key-01", "n": TEST_N, "e": TEST_E}]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let cache = Arc::new(KeyCache::new());
        let fetcher = KeySetFetcher::new(
            Arc::new(HttpJwksTransport::default()),
            cache.clone(),
            RetryPolicy::default(),
        );

        let issuer = mock_server.uri();
        let fetched = fetcher.key_set(&issuer).await.unwrap();
        assert!(fetched.contains("key-01"));

        // Second lookup is served from the cache (mock expects exactly 1 call)
        let cached = fetcher.key_set(&issuer).await.unwrap();
        assert!(cached.contains("key-01"));
        assert!(cache.get(&issuer).await.is_some());
    }

    #[tokio::test]
    async fn test_slow_issuer_does_not_block_other_issuers() {
        let transport = Arc::new(CountingTransport::default());
        let fetcher = counting_fetcher(transport.clone());

        let stalled = {
            let fetcher = fetcher.clone();
            tokio::spawn(async move { fetcher.key_set("https://issuer-a.test").await })
        };
        // Issuer A now holds its fetch lock
        transport.stalled.notified().await;

        let key_set = tokio::time::timeout(
            Duration::from_secs(2),
            fetcher.key_set("https://issuer-b.test"),
        )
        .await
        .expect("issuer B fetch should not wait for issuer A")
        .unwrap();

        assert_eq!(key_set.len(), 1);
        assert!(!stalled.is_finished());
        stalled.abort();
    }

    #[tokio::test]
    async fn test_concurrent_misses_for_one_issuer_share_a_fetch() {
        let transport = Arc::new(CountingTransport::default());
        let fetcher = counting_fetcher(transport.clone());

        let (first, second) = tokio::join!(
            fetcher.key_set("https://slow.test"),
            fetcher.key_set("https://slow.test")
        );

        assert!(first.unwrap().contains("key-1"));
        assert!(second.unwrap().contains("key-1"));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_replaces_fresh_entry_and_restarts_ttl() {
        let issuer = "https://idp.example.test/pool-a";
        let transport = Arc::new(CountingTransport::default());
        let fetcher = counting_fetcher(transport.clone());

        assert!(fetcher.key_set(issuer).await.unwrap().contains("key-1"));

        // Entry is still fresh, fetch goes to the network anyway
        tokio::time::advance(Duration::from_secs(50 * 60)).await;
        let fetched = fetcher.fetch(issuer).await.unwrap();
        assert!(fetched.contains("key-2"));
        assert!(!fetched.contains("key-1"));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);

        let cached = fetcher.cache().get(issuer).await.unwrap();
        assert!(cached.contains("key-2"));

        // 70 minutes after the first fetch, 20 after the second
        tokio::time::advance(Duration::from_secs(20 * 60)).await;
        let key_set = fetcher.key_set(issuer).await.unwrap();
        assert!(key_set.contains("key-2"));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }
}
