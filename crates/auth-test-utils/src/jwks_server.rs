//! Mock issuer serving a JWKS over HTTP
//!
//! Wraps a `wiremock` server whose base URL doubles as the issuer URL, so
//! `{issuer}/.well-known/jwks.json` resolves to the mock.

use crate::crypto_fixtures::{jwks_json, TestKeypair};
use auth_service::auth::jwks::JWKS_PATH;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Mock token issuer.
///
/// # Example
/// ```rust,ignore
/// let key = TestKeypair::primary("k1");
/// let issuer = MockIssuer::start(&[&key]).await;
/// let token = key.sign(&AccessTokenBuilder::new(&issuer.issuer()).build())?;
/// ```
pub struct MockIssuer {
    server: MockServer,
}

impl MockIssuer {
    /// Start a mock issuer publishing `keys`.
    pub async fn start(keys: &[&TestKeypair]) -> Self {
        let issuer = Self {
            server: MockServer::start().await,
        };
        issuer.publish(keys).await;
        issuer
    }

    /// Start a mock issuer whose JWKS endpoint answers with `status`.
    pub async fn start_failing(status: u16) -> Self {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;
        Self { server }
    }

    /// Replace the published key set (simulates key rotation).
    pub async fn publish(&self, keys: &[&TestKeypair]) {
        self.server.reset().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks_json(keys)))
            .mount(&self.server)
            .await;
    }

    /// Issuer URL (the mock server's base URL).
    pub fn issuer(&self) -> String {
        self.server.uri()
    }

    /// Number of JWKS requests received since the last `publish`.
    pub async fn jwks_requests(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|requests| {
                requests
                    .iter()
                    .filter(|r| r.url.path() == JWKS_PATH)
                    .count()
            })
            .unwrap_or(0)
    }
}
