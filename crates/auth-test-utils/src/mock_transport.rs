//! Scripted JWKS transport
//!
//! A [`JwksTransport`] double that replays a queue of results and counts
//! calls. Used to exercise retry, TTL and rotation behavior without real
//! network faults.

use async_trait::async_trait;
use auth_service::auth::jwks::{FaultKind, FetchError, JwksResponse, JwksTransport};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Transport that returns scripted results in order.
///
/// When the script runs out, the fallback result (if any) is returned for
/// every further call; without a fallback, calls fail with a non-transient
/// `Status(404)`.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<JwksResponse, FetchError>>>,
    fallback: Mutex<Option<Result<JwksResponse, FetchError>>>,
    calls: AtomicUsize,
    urls: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response with the given JWKS document.
    pub fn then_jwks(self, jwks: Value) -> Self {
        self.push(parse_jwks(jwks))
    }

    /// Queue a failure.
    pub fn then_error(self, error: FetchError) -> Self {
        self.push(Err(error))
    }

    /// Queue a connection reset.
    pub fn then_connection_reset(self) -> Self {
        self.then_error(transport_error(FaultKind::ConnectionReset))
    }

    /// Queue a broken pipe.
    pub fn then_broken_pipe(self) -> Self {
        self.then_error(transport_error(FaultKind::BrokenPipe))
    }

    /// Serve `jwks` once the script is exhausted.
    pub fn otherwise_jwks(self, jwks: Value) -> Self {
        *self.fallback.lock().unwrap() = Some(parse_jwks(jwks));
        self
    }

    /// Fail with `error` once the script is exhausted.
    pub fn otherwise_error(self, error: FetchError) -> Self {
        *self.fallback.lock().unwrap() = Some(Err(error));
        self
    }

    /// Number of `get_jwks` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// URLs requested so far, in order.
    pub fn requested_urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }

    fn push(self, result: Result<JwksResponse, FetchError>) -> Self {
        self.script.lock().unwrap().push_back(result);
        self
    }
}

#[async_trait]
impl JwksTransport for ScriptedTransport {
    async fn get_jwks(&self, url: &str) -> Result<JwksResponse, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(url.to_string());

        if let Some(result) = self.script.lock().unwrap().pop_front() {
            return result;
        }

        self.fallback
            .lock()
            .unwrap()
            .clone()
            .unwrap_or(Err(FetchError::Status(404)))
    }
}

/// Transport-level failure of the given kind.
pub fn transport_error(kind: FaultKind) -> FetchError {
    FetchError::Transport {
        kind,
        message: format!("scripted {kind}"),
    }
}

fn parse_jwks(jwks: Value) -> Result<JwksResponse, FetchError> {
    serde_json::from_value(jwks).map_err(|e| FetchError::InvalidBody(e.to_string()))
}
