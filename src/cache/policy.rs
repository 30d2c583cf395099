//! Caching, retry, and revalidation settings for cached reads.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::millis;
use crate::fetch::FetchError;

/// How a cache entry is refreshed, deduplicated, and retried.
///
/// | Setting                    | Default  |
/// |----------------------------|----------|
/// | `revalidate_on_focus`      | `false`  |
/// | `revalidate_on_reconnect`  | `true`   |
/// | `revalidate_if_stale`      | `true`   |
/// | `refresh_interval`         | 30 min   |
/// | `dedup_interval`           | 10 min   |
/// | `error_retry_count`        | 3        |
/// | `error_retry_interval`     | 1 s      |
/// | `keep_previous_data`       | `true`   |
///
/// Durations (de)serialize as milliseconds under `*_ms` names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CachePolicy {
    /// Revalidate when the visitor returns to the page.
    pub revalidate_on_focus: bool,
    /// Revalidate after network connectivity comes back.
    pub revalidate_on_reconnect: bool,
    /// Reading a stale value starts a background refresh.
    pub revalidate_if_stale: bool,
    /// Periodic silent refresh; zero disables it.
    #[serde(rename = "refresh_interval_ms", with = "millis")]
    pub refresh_interval: Duration,
    /// Requests for the same key inside this window share one fetch.
    #[serde(rename = "dedup_interval_ms", with = "millis")]
    pub dedup_interval: Duration,
    /// Retries after the first failed attempt.
    pub error_retry_count: u32,
    /// Fixed delay between retries.
    #[serde(rename = "error_retry_interval_ms", with = "millis")]
    pub error_retry_interval: Duration,
    /// Keep serving the old value while a refresh runs.
    pub keep_previous_data: bool,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            revalidate_on_focus: false,
            revalidate_on_reconnect: true,
            revalidate_if_stale: true,
            refresh_interval: Duration::from_secs(30 * 60),
            dedup_interval: Duration::from_secs(10 * 60),
            error_retry_count: 3,
            error_retry_interval: Duration::from_secs(1),
            keep_previous_data: true,
        }
    }
}

impl CachePolicy {
    /// The GitHub projects list refreshes twice as often.
    pub fn projects() -> Self {
        Self {
            refresh_interval: Duration::from_secs(15 * 60),
            dedup_interval: Duration::from_secs(5 * 60),
            ..Self::default()
        }
    }

    /// Whether attempt number `retries + 1` should follow `err`.
    pub fn should_retry(&self, err: &FetchError, retries: u32) -> bool {
        retries < self.error_retry_count && err.should_retry()
    }
}
