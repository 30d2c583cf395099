//! Site configuration.
//!
//! Every section has defaults, so an empty JSON object is a complete config.
//!
//! ```json
//! {
//!   "base_url": "https://example.dev",
//!   "fetch_timeout_ms": 10000,
//!   "cache": { "dedup_interval_ms": 600000 },
//!   "project_cache": { "refresh_interval_ms": 900000 },
//!   "guard": { "protected": ["/dashboard(.*)"] }
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::cache::{CachePolicy, FetchCache, GITHUB_PROJECTS};
use crate::contact::{CONTACT_PATH, ContactForm};
use crate::fetch::{DEFAULT_TIMEOUT, Fetcher};
use crate::security::{Authenticator, DEFAULT_PROTECTED, GuardScope, RouteGuard, RouteMatcher};

/// `Duration` as whole milliseconds.
pub(crate) mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("base_url must be an http(s) URL, got {url:?}")]
    BaseUrl { url: String },
}

/// Route guard settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Protected route patterns; `(.*)` suffixes match everything below.
    pub protected: Vec<String>,
    pub scope: GuardScope,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            protected: DEFAULT_PROTECTED.iter().map(|p| p.to_string()).collect(),
            scope: GuardScope::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Origin that relative fetch keys and the contact path resolve against.
    pub base_url: String,
    pub contact_path: String,
    #[serde(rename = "fetch_timeout_ms", with = "millis")]
    pub fetch_timeout: Duration,
    /// Policy for every key without its own.
    pub cache: CachePolicy,
    /// Policy for the GitHub projects collection.
    pub project_cache: CachePolicy,
    pub guard: GuardConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            contact_path: CONTACT_PATH.to_string(),
            fetch_timeout: DEFAULT_TIMEOUT,
            cache: CachePolicy::default(),
            project_cache: CachePolicy::projects(),
            guard: GuardConfig::default(),
        }
    }
}

impl SiteConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::BaseUrl {
                url: self.base_url.clone(),
            });
        }
        Ok(())
    }

    pub fn fetcher(&self, client: reqwest::Client) -> Fetcher {
        Fetcher::new(client)
            .with_base_url(self.base_url.as_str())
            .with_timeout(self.fetch_timeout)
    }

    /// The shared cache with the projects policy registered.
    pub fn fetch_cache(&self, client: reqwest::Client) -> FetchCache {
        let cache = FetchCache::new(self.fetcher(client), self.cache.clone());
        cache.register(GITHUB_PROJECTS, self.project_cache.clone());
        debug!(base_url = %self.base_url, "fetch cache configured");
        cache
    }

    pub fn contact_form(&self, client: reqwest::Client) -> ContactForm {
        let endpoint = format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            self.contact_path
        );
        ContactForm::with_endpoint(client, endpoint)
    }

    pub fn route_guard(&self, authenticator: Arc<dyn Authenticator>) -> RouteGuard {
        RouteGuard::new(
            RouteMatcher::new(&self.guard.protected),
            self.guard.scope.clone(),
            authenticator,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Request;
    use crate::security::{AuthDecision, RouteClass};

    #[test]
    fn empty_object_uses_defaults() {
        let config = SiteConfig::from_json("{}").unwrap();
        assert_eq!(config, SiteConfig::default());
        assert_eq!(config.fetch_timeout, Duration::from_secs(10));
        assert_eq!(config.project_cache, CachePolicy::projects());
    }

    #[test]
    fn durations_read_as_milliseconds() {
        let config = SiteConfig::from_json(
            r#"{ "fetch_timeout_ms": 2500, "cache": { "error_retry_interval_ms": 50 } }"#,
        )
        .unwrap();
        assert_eq!(config.fetch_timeout, Duration::from_millis(2500));
        assert_eq!(config.cache.error_retry_interval, Duration::from_millis(50));
        assert_eq!(config.cache.error_retry_count, 3);
    }

    #[test]
    fn serializes_back_to_milliseconds() {
        let json = serde_json::to_value(SiteConfig::default()).unwrap();
        assert_eq!(json["fetch_timeout_ms"], 10_000);
        assert_eq!(json["project_cache"]["dedup_interval_ms"], 300_000);
    }

    #[test]
    fn rejects_non_http_base_url() {
        let err = SiteConfig::from_json(r#"{ "base_url": "ftp://example.dev" }"#).unwrap_err();
        assert!(matches!(err, ConfigError::BaseUrl { .. }));
    }

    #[test]
    fn rejects_malformed_json() {
        let err = SiteConfig::from_json("{ base_url: }").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn builds_components() {
        let config = SiteConfig::from_json(
            r#"{ "base_url": "https://example.dev/", "guard": { "protected": ["/admin(.*)"] } }"#,
        )
        .unwrap();
        let client = reqwest::Client::new();

        let form = config.contact_form(client.clone());
        assert_eq!(form.endpoint(), "https://example.dev/api/contact");

        let cache = config.fetch_cache(client);
        assert_eq!(cache.policy_for(GITHUB_PROJECTS), CachePolicy::projects());
        assert_eq!(
            cache.fetcher().resolve(GITHUB_PROJECTS),
            "https://example.dev/api/github"
        );

        let guard = config.route_guard(Arc::new(|_: &Request| AuthDecision::Allow));
        assert_eq!(guard.evaluate("/admin/users"), Some(RouteClass::Protected));
        assert_eq!(guard.evaluate("/dashboard"), Some(RouteClass::Public));
    }
}
