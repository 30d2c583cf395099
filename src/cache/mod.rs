//! Shared client-side cache for read-only JSON fetches.
//!
//! Every cached read goes through one [`FetchCache`], so all data consumers
//! share the same deduplication, retry, and revalidation behavior:
//!
//! - Requests for one key inside its dedup window share a single physical
//!   fetch, whether it is still in flight or already finished.
//! - Retry-eligible failures are retried a bounded number of times with a
//!   fixed delay; 4xx responses never are.
//! - Reading a value whose window has passed returns it immediately and
//!   refreshes it in the background.
//! - [`FetchCache::mutate`] pushes a value in without touching the network;
//!   [`FetchCache::clear`] drops a value and forces the next read to fetch.
//!
//! Cache state sits behind a mutex that is never held across an `.await`.

mod keys;
mod policy;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::OnceCell;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

pub use keys::{GITHUB_PROJECTS, github_project};
pub use policy::CachePolicy;

use crate::fetch::{FetchError, Fetcher};

type Outcome = Result<Value, FetchError>;

// One physical request, shared by every caller inside the dedup window.
struct InFlight {
    started: Instant,
    generation: u64,
    cell: Arc<OnceCell<Outcome>>,
}

#[derive(Default)]
struct Entry {
    data: Option<Value>,
    error: Option<FetchError>,
    stale: bool,
    fetched_at: Option<Instant>,
    in_flight: Option<InFlight>,
    // Bumped by mutate/clear; results of requests started before are discarded.
    generation: u64,
}

impl Entry {
    fn in_window(&self, now: Instant, policy: &CachePolicy) -> bool {
        self.in_flight
            .as_ref()
            .is_some_and(|f| now.duration_since(f.started) < policy.dedup_interval)
    }
}

#[derive(Default)]
struct State {
    entries: HashMap<String, Entry>,
    policies: HashMap<String, CachePolicy>,
}

struct Inner {
    fetcher: Fetcher,
    default_policy: CachePolicy,
    state: Mutex<State>,
}

/// A point-in-time view of one cache entry.
#[derive(Debug, Clone, PartialEq)]
pub struct EntrySnapshot {
    pub data: Option<Value>,
    pub error: Option<FetchError>,
    /// Set by [`FetchCache::clear`] until the next successful fetch.
    pub is_stale: bool,
    pub fetched_at: Option<Instant>,
}

/// Stops a periodic refresh task when dropped.
#[derive(Debug)]
pub struct RefreshHandle {
    task: JoinHandle<()>,
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// The shared fetch cache. Cloning is cheap; clones share state.
///
/// # Examples
///
/// ```rust,no_run
/// use folio::cache::{CachePolicy, FetchCache, GITHUB_PROJECTS};
/// use folio::fetch::Fetcher;
///
/// # async fn demo() -> Result<(), folio::fetch::FetchError> {
/// let fetcher = Fetcher::new(reqwest::Client::new()).with_base_url("https://example.dev");
/// let cache = FetchCache::new(fetcher, CachePolicy::default());
/// cache.register(GITHUB_PROJECTS, CachePolicy::projects());
///
/// let projects = cache.read(GITHUB_PROJECTS).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct FetchCache {
    inner: Arc<Inner>,
}

impl FetchCache {
    pub fn new(fetcher: Fetcher, policy: CachePolicy) -> Self {
        Self {
            inner: Arc::new(Inner {
                fetcher,
                default_policy: policy,
                state: Mutex::new(State::default()),
            }),
        }
    }

    /// Use `policy` instead of the default for `key`.
    pub fn register(&self, key: impl Into<String>, policy: CachePolicy) {
        self.state().policies.insert(key.into(), policy);
    }

    pub fn policy_for(&self, key: &str) -> CachePolicy {
        self.state()
            .policies
            .get(key)
            .unwrap_or(&self.inner.default_policy)
            .clone()
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.inner.fetcher
    }

    /// Keys with an entry, in no particular order.
    pub fn keys(&self) -> Vec<String> {
        self.state().entries.keys().cloned().collect()
    }

    /// Read `key` the way a data hook does.
    ///
    /// A cached value inside its dedup window is returned as is. Past the
    /// window it is still returned while a background revalidation runs,
    /// unless `keep_previous_data` is off, in which case the read waits for
    /// fresh data. With nothing cached the read waits for a fetch.
    pub async fn read(&self, key: &str) -> Result<Value, FetchError> {
        let policy = self.policy_for(key);
        let cached = {
            let state = self.state();
            state.entries.get(key).and_then(|entry| {
                let data = entry.data.clone()?;
                let due = entry.stale || !entry.in_window(Instant::now(), &policy);
                Some((data, due))
            })
        };

        match cached {
            None => self.revalidate(key).await,
            Some((data, false)) => Ok(data),
            Some((data, true)) if !policy.revalidate_if_stale => Ok(data),
            Some((data, true)) if policy.keep_previous_data => {
                debug!(key = %key, "serving cached value while revalidating");
                self.spawn_revalidate(key);
                Ok(data)
            }
            Some((_, true)) => self.revalidate(key).await,
        }
    }

    /// [`read`](Self::read), decoded into `T`.
    pub async fn read_as<T>(&self, key: &str) -> Result<T, FetchError>
    where
        T: DeserializeOwned,
    {
        let value = self.read(key).await?;
        serde_json::from_value(value).map_err(|e| FetchError::Decode {
            url: self.inner.fetcher.resolve(key),
            message: e.to_string(),
        })
    }

    /// Fetch `key`, coalescing with any request started inside the dedup window.
    pub async fn revalidate(&self, key: &str) -> Result<Value, FetchError> {
        let (cell, generation) = self.join_or_start(key);
        let cache = self.clone();
        let owned_key = key.to_owned();
        let flight = Arc::clone(&cell);
        cell.get_or_init(|| async move {
            cache
                .fetch_and_store(&owned_key, &flight, generation)
                .await
        })
        .await
        .clone()
    }

    /// Replace the cached value without revalidating.
    pub fn mutate(&self, key: &str, value: Value) {
        self.mutate_with(key, |_| value);
    }

    /// Derive the new cached value from the current one without revalidating.
    pub fn mutate_with<F>(&self, key: &str, update: F)
    where
        F: FnOnce(Option<&Value>) -> Value,
    {
        let mut state = self.state();
        let entry = state.entries.entry(key.to_owned()).or_default();
        entry.data = Some(update(entry.data.as_ref()));
        entry.error = None;
        entry.stale = false;
        entry.generation += 1;
        debug!(key = %key, "cache populated without revalidation");
    }

    /// Drop the cached value and force the next read to fetch.
    pub fn clear(&self, key: &str) {
        let mut state = self.state();
        let entry = state.entries.entry(key.to_owned()).or_default();
        entry.data = None;
        entry.error = None;
        entry.in_flight = None;
        entry.stale = true;
        entry.generation += 1;
        debug!(key = %key, "cache entry cleared");
    }

    pub fn peek(&self, key: &str) -> Option<EntrySnapshot> {
        self.state().entries.get(key).map(|entry| EntrySnapshot {
            data: entry.data.clone(),
            error: entry.error.clone(),
            is_stale: entry.stale,
            fetched_at: entry.fetched_at,
        })
    }

    /// The page regained focus: revalidate keys whose policy asks for it.
    ///
    /// Returns how many keys now hold a successfully fetched value.
    pub async fn on_focus(&self) -> usize {
        self.revalidate_where(|p| p.revalidate_on_focus).await
    }

    /// Connectivity came back: revalidate keys whose policy asks for it.
    ///
    /// Returns how many keys now hold a successfully fetched value.
    pub async fn on_reconnect(&self) -> usize {
        self.revalidate_where(|p| p.revalidate_on_reconnect).await
    }

    /// Refresh `key` every `refresh_interval` until the handle is dropped.
    ///
    /// `None` when the key's policy has periodic refresh disabled.
    pub fn spawn_refresh(&self, key: &str) -> Option<RefreshHandle> {
        let interval = self.policy_for(key).refresh_interval;
        if interval.is_zero() {
            return None;
        }

        let cache = self.clone();
        let key = key.to_owned();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match cache.revalidate(&key).await {
                    Ok(_) => debug!(key = %key, "periodic refresh"),
                    Err(err) => warn!(key = %key, error = %err, "periodic refresh failed"),
                }
            }
        });
        Some(RefreshHandle { task })
    }

    fn spawn_revalidate(&self, key: &str) -> JoinHandle<()> {
        let cache = self.clone();
        let key = key.to_owned();
        tokio::spawn(async move {
            if let Err(err) = cache.revalidate(&key).await {
                debug!(key = %key, error = %err, "background revalidation failed");
            }
        })
    }

    async fn revalidate_where<P>(&self, enabled: P) -> usize
    where
        P: Fn(&CachePolicy) -> bool,
    {
        let keys: Vec<String> = {
            let state = self.state();
            state
                .entries
                .keys()
                .filter(|key| {
                    enabled(
                        state
                            .policies
                            .get(key.as_str())
                            .unwrap_or(&self.inner.default_policy),
                    )
                })
                .cloned()
                .collect()
        };

        let mut tasks = JoinSet::new();
        for key in keys {
            let cache = self.clone();
            tasks.spawn(async move { cache.revalidate(&key).await.is_ok() });
        }

        let mut refreshed = 0;
        while let Some(result) = tasks.join_next().await {
            if matches!(result, Ok(true)) {
                refreshed += 1;
            }
        }
        refreshed
    }

    // Returns the shared cell to await plus the generation it was started in.
    fn join_or_start(&self, key: &str) -> (Arc<OnceCell<Outcome>>, u64) {
        let policy = self.policy_for(key);
        let now = Instant::now();
        let mut state = self.state();
        let entry = state.entries.entry(key.to_owned()).or_default();

        if entry.in_window(now, &policy) {
            if let Some(flight) = entry
                .in_flight
                .as_ref()
                .filter(|f| f.generation == entry.generation)
            {
                debug!(key = %key, "joining request inside dedup window");
                return (Arc::clone(&flight.cell), flight.generation);
            }
        }

        let cell = Arc::new(OnceCell::new());
        entry.in_flight = Some(InFlight {
            started: now,
            generation: entry.generation,
            cell: Arc::clone(&cell),
        });
        (cell, entry.generation)
    }

    async fn fetch_and_store(
        &self,
        key: &str,
        flight: &Arc<OnceCell<Outcome>>,
        generation: u64,
    ) -> Outcome {
        let policy = self.policy_for(key);
        let mut retries = 0;
        let outcome = loop {
            match self.inner.fetcher.fetch_json::<Value>(key).await {
                Ok(value) => break Ok(value),
                Err(err) if policy.should_retry(&err, retries) => {
                    retries += 1;
                    warn!(
                        key = %key,
                        error = %err,
                        retry = retries,
                        max_retries = policy.error_retry_count,
                        backoff_ms = policy.error_retry_interval.as_millis() as u64,
                        "retrying fetch"
                    );
                    tokio::time::sleep(policy.error_retry_interval).await;
                }
                Err(err) => break Err(err),
            }
        };

        let mut state = self.state();
        let entry = state.entries.entry(key.to_owned()).or_default();
        let current = entry.generation == generation;
        match &outcome {
            Ok(value) if current => {
                entry.data = Some(value.clone());
                entry.error = None;
                entry.stale = false;
                entry.fetched_at = Some(Instant::now());
            }
            Ok(_) => debug!(key = %key, "discarding result superseded by a mutation"),
            Err(err) => {
                if current {
                    entry.error = Some(err.clone());
                }
                // Failures are not deduplicated: the next caller starts afresh.
                if entry
                    .in_flight
                    .as_ref()
                    .is_some_and(|f| Arc::ptr_eq(&f.cell, flight))
                {
                    entry.in_flight = None;
                }
                debug!(key = %key, error = %err, retries, "fetch failed");
            }
        }
        outcome
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Optimistically replace the GitHub projects collection.
pub fn mutate_github_projects(cache: &FetchCache, projects: Value) {
    cache.mutate(GITHUB_PROJECTS, projects);
}
