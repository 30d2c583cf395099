//! Timeout-bounded JSON fetches shared by every cached read.
//!
//! [`Fetcher::fetch_json`] is the one primitive the cache calls. It never
//! decodes error bodies: a non-2xx response keeps its raw text in
//! [`FetchError::Status`] for diagnostics.

use std::time::Duration;

use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};

/// How long a single fetch may take before it is aborted.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors produced by [`Fetcher::fetch_json`].
///
/// `Clone` so one coalesced result can be handed to every waiting caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("request to {url} timed out after {}ms", timeout.as_millis())]
    Timeout { url: String, timeout: Duration },

    #[error("failed to fetch {url}: HTTP {status}")]
    Status {
        url: String,
        status: u16,
        /// Raw response body text.
        info: String,
    },

    #[error("network error fetching {url}: {message}")]
    Network { url: String, message: String },

    #[error("invalid JSON from {url}: {message}")]
    Decode { url: String, message: String },
}

impl FetchError {
    /// The HTTP status, when the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The raw body of a non-2xx response.
    pub fn info(&self) -> Option<&str> {
        match self {
            Self::Status { info, .. } => Some(info),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Client errors (4xx) are final; everything else may succeed on retry,
    /// including failures that never produced a status.
    pub fn should_retry(&self) -> bool {
        !matches!(self.status(), Some(400..=499))
    }
}

/// Retry eligibility as a free function, for use as a predicate.
pub fn should_retry(err: &FetchError) -> bool {
    err.should_retry()
}

/// Issues GET requests and decodes JSON bodies.
///
/// Keys beginning with `/` are resolved against the base URL; absolute URLs
/// are used as-is.
///
/// # Examples
///
/// ```rust,no_run
/// use folio::fetch::Fetcher;
///
/// # async fn demo() -> Result<(), folio::fetch::FetchError> {
/// let fetcher = Fetcher::new(reqwest::Client::new()).with_base_url("https://example.dev");
/// let projects: serde_json::Value = fetcher.fetch_json("/api/github").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    base_url: Option<String>,
    timeout: Duration,
}

impl Fetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        self.base_url = Some(base_url.trim_end_matches('/').to_string());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The absolute URL for a cache key.
    pub fn resolve(&self, key: &str) -> String {
        match &self.base_url {
            Some(base) if key.starts_with('/') => format!("{base}{key}"),
            _ => key.to_string(),
        }
    }

    /// GET `key` and decode the JSON body.
    ///
    /// The whole exchange, body included, is bounded by the timeout. When it
    /// elapses the request future is dropped, which aborts the request and
    /// releases the timer.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Timeout`]: no complete response within the timeout.
    /// - [`FetchError::Status`]: non-2xx; carries the raw body text.
    /// - [`FetchError::Network`]: the request failed before a response.
    /// - [`FetchError::Decode`]: 2xx with a body that is not the expected JSON.
    pub async fn fetch_json<T>(&self, key: &str) -> Result<T, FetchError>
    where
        T: DeserializeOwned,
    {
        let url = self.resolve(key);
        match tokio::time::timeout(self.timeout, self.fetch_once(&url)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(url = %url, timeout_ms = self.timeout.as_millis() as u64, "fetch timed out");
                Err(FetchError::Timeout {
                    url,
                    timeout: self.timeout,
                })
            }
        }
    }

    async fn fetch_once<T>(&self, url: &str) -> Result<T, FetchError>
    where
        T: DeserializeOwned,
    {
        let network = |e: reqwest::Error| FetchError::Network {
            url: url.to_string(),
            message: e.to_string(),
        };

        let response = self.client.get(url).send().await.map_err(network)?;
        let status = response.status();

        if !status.is_success() {
            let info = response.text().await.map_err(network)?;
            debug!(url = %url, status = status.as_u16(), "fetch returned error status");
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                info,
            });
        }

        let bytes = response.bytes().await.map_err(network)?;
        serde_json::from_slice(&bytes).map_err(|e| FetchError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use serde::Deserialize;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Repo {
        name: String,
        stars: u32,
    }

    fn fetcher_for(server: &MockServer) -> Fetcher {
        Fetcher::new(reqwest::Client::new()).with_base_url(server.uri())
    }

    #[tokio::test]
    async fn decodes_json_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/github/folio"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "name": "folio", "stars": 12 })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let repo: Repo = fetcher_for(&server)
            .fetch_json("/api/github/folio")
            .await
            .unwrap();
        assert_eq!(
            repo,
            Repo {
                name: "folio".into(),
                stars: 12
            }
        );
    }

    #[tokio::test]
    async fn not_found_keeps_raw_body_text() {
        let server = MockServer::start().await;
        let body = r#"{"message": "Not Found"}"#;
        Mock::given(path("/api/github/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string(body))
            .mount(&server)
            .await;

        let err = fetcher_for(&server)
            .fetch_json::<serde_json::Value>("/api/github/missing")
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.info(), Some(body));
        assert!(!err.should_retry());
    }

    #[tokio::test]
    async fn slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let fetcher = fetcher_for(&server)
            .with_timeout(Duration::from_millis(100));
        let started = Instant::now();
        let err = fetcher
            .fetch_json::<serde_json::Value>("/slow")
            .await
            .unwrap_err();

        assert!(err.is_timeout(), "expected timeout, got {err:?}");
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(err.should_retry());
    }

    #[tokio::test]
    async fn malformed_json_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(path("/broken"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = fetcher_for(&server)
            .fetch_json::<serde_json::Value>("/broken")
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Decode { .. }));
        assert_eq!(err.status(), None);
    }

    #[tokio::test]
    async fn refused_connection_is_network_error() {
        let fetcher = Fetcher::new(reqwest::Client::new()).with_base_url("http://127.0.0.1:1");
        let err = fetcher
            .fetch_json::<serde_json::Value>("/api/github")
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Network { .. }));
        assert!(should_retry(&err));
    }

    #[test]
    fn retry_eligibility_by_status() {
        let status = |status| FetchError::Status {
            url: "/x".into(),
            status,
            info: String::new(),
        };
        assert!(!status(400).should_retry());
        assert!(!status(403).should_retry());
        assert!(!status(499).should_retry());
        assert!(status(500).should_retry());
        assert!(status(503).should_retry());
        assert!(
            FetchError::Network {
                url: "/x".into(),
                message: "reset".into()
            }
            .should_retry()
        );
    }

    #[test]
    fn resolve_against_base_url() {
        let fetcher = Fetcher::new(reqwest::Client::new()).with_base_url("https://example.dev/");
        assert_eq!(fetcher.resolve("/api/github"), "https://example.dev/api/github");
        assert_eq!(
            fetcher.resolve("https://api.github.com/users/x"),
            "https://api.github.com/users/x"
        );
        assert_eq!(fetcher.timeout(), DEFAULT_TIMEOUT);
    }
}
