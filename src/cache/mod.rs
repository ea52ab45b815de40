//! Shared request cache
//!
//! Stores the last successful result of every read, keyed by operation and
//! parameters and labelled with one or more [`Tag`]s. Concurrent reads of the
//! same key share a single fetch. Mutations invalidate tags once they have
//! succeeded; invalidated entries are dropped, or kept as stale while some
//! [`Subscription`] still renders them.

mod key;
mod subscription;

pub use key::{CacheKey, Tag};
pub use subscription::Subscription;

use std::collections::HashMap;
use std::future::Future;
use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::watch;

use crate::{
    clock::Clock,
    config::CacheConfig,
    error::{ClientError, ClientResult},
};

/// A value served from the cache
#[derive(Debug, Clone, PartialEq)]
pub struct Cached<T> {
    pub data: T,
    pub fetched_at: DateTime<Utc>,
    /// Set when a refetch failed and `data` is the last good value
    pub refresh_error: Option<ClientError>,
}

impl<T> Cached<T> {
    pub fn into_inner(self) -> T {
        self.data
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Cached<U> {
        Cached {
            data: f(self.data),
            fetched_at: self.fetched_at,
            refresh_error: self.refresh_error,
        }
    }
}

impl<T> Deref for Cached<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.data
    }
}

/// Non-blocking view of one key, for rendering without awaiting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryState {
    pub has_data: bool,
    pub is_loading: bool,
    pub is_stale: bool,
    pub is_error: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub type InvalidateCallback = Arc<dyn Fn(Tag) + Send + Sync>;

#[derive(Clone)]
struct Fetched {
    value: Value,
    fetched_at: DateTime<Utc>,
}

type SharedFetch = Shared<BoxFuture<'static, Result<Fetched, ClientError>>>;

struct Entry {
    value: Value,
    tags: Vec<Tag>,
    fetched_at: DateTime<Utc>,
    stale: bool,
    last_error: Option<ClientError>,
}

struct InFlight {
    id: u64,
    fetch: SharedFetch,
    tags: Vec<Tag>,
    /// An invalidation touched this key while the fetch was running
    invalidated: bool,
    waiters: Arc<AtomicUsize>,
}

struct Watch {
    count: usize,
    tx: watch::Sender<u64>,
}

struct Listener {
    id: ListenerId,
    tag: Tag,
    callback: InvalidateCallback,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<CacheKey, Entry>,
    in_flight: HashMap<CacheKey, InFlight>,
    watches: HashMap<CacheKey, Watch>,
    listeners: Vec<Listener>,
    next_id: u64,
}

impl CacheState {
    fn is_watched(&self, key: &CacheKey) -> bool {
        self.watches.get(key).map(|w| w.count > 0).unwrap_or(false)
    }
}

/// Counts a caller awaiting an in-flight fetch
struct WaiterGuard(Arc<AtomicUsize>);

impl Drop for WaiterGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn overlaps(a: &[Tag], b: &[Tag]) -> bool {
    a.iter().any(|t| b.contains(t))
}

fn decode<T: DeserializeOwned>(value: Value, key: &CacheKey) -> ClientResult<T> {
    serde_json::from_value(value).map_err(|e| ClientError::Service {
        status: 200,
        message: format!("Unexpected data for {}: {}", key, e),
    })
}

#[derive(Clone)]
pub struct RequestCache {
    state: Arc<Mutex<CacheState>>,
    clock: Arc<dyn Clock>,
    max_age: Option<Duration>,
}

impl RequestCache {
    pub fn new(clock: Arc<dyn Clock>, config: &CacheConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(CacheState::default())),
            clock,
            max_age: config
                .max_age_secs
                .map(|secs| Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX / 1000))),
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_expired(&self, entry: &Entry, now: DateTime<Utc>) -> bool {
        self.max_age
            .map(|max_age| now - entry.fetched_at >= max_age)
            .unwrap_or(false)
    }

    /// Read `key`, fetching it if there is no fresh entry.
    ///
    /// A fresh entry is returned without calling `fetch`. If a fetch for the
    /// key is already running, and no invalidation has touched it since it
    /// started, the caller waits for that one instead of starting another. Failures are not cached: with no previous value the
    /// error is returned, otherwise the previous value is returned with
    /// `refresh_error` set.
    pub async fn read<T, F, Fut>(&self, key: CacheKey, tags: &[Tag], fetch: F) -> ClientResult<Cached<T>>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = ClientResult<T>> + Send + 'static,
    {
        let (shared, _guard) = {
            let mut state = self.lock();
            let now = self.clock.now();

            if let Some(entry) = state.entries.get(&key) {
                if !entry.stale && !self.is_expired(entry, now) {
                    tracing::debug!("Cache hit for {}", key);
                    return Ok(Cached {
                        data: decode(entry.value.clone(), &key)?,
                        fetched_at: entry.fetched_at,
                        refresh_error: None,
                    });
                }
            }

            // A fetch flagged by an invalidation predates the write, so later
            // reads start their own; callers already waiting keep the old one.
            let joinable = state.in_flight.get(&key).map(|f| !f.invalidated);
            if joinable == Some(true) {
                tracing::debug!("Joining in-flight fetch for {}", key);
            } else {
                if joinable.is_some() {
                    tracing::debug!("In-flight fetch for {} was invalidated, refetching", key);
                } else {
                    tracing::debug!("Cache miss for {}, fetching", key);
                }
                state.next_id += 1;
                let id = state.next_id;
                let flight = self.spawn_fetch(id, key.clone(), tags, fetch());
                state.in_flight.insert(key.clone(), flight);
            }

            let flight = &state.in_flight[&key];
            flight.waiters.fetch_add(1, Ordering::SeqCst);
            (flight.fetch.clone(), WaiterGuard(flight.waiters.clone()))
        };

        match shared.await {
            Ok(fetched) => Ok(Cached {
                data: decode(fetched.value, &key)?,
                fetched_at: fetched.fetched_at,
                refresh_error: None,
            }),
            Err(e) => {
                let previous = {
                    let state = self.lock();
                    state.entries.get(&key).map(|entry| (entry.value.clone(), entry.fetched_at))
                };
                match previous {
                    Some((value, fetched_at)) => Ok(Cached {
                        data: decode(value, &key)?,
                        fetched_at,
                        refresh_error: Some(e),
                    }),
                    None => Err(e),
                }
            }
        }
    }

    /// Run the fetch as its own task so it completes even if every caller
    /// stops waiting; the task stores its result before waking the callers.
    fn spawn_fetch<T, Fut>(&self, id: u64, key: CacheKey, tags: &[Tag], fut: Fut) -> InFlight
    where
        T: Serialize + Send + 'static,
        Fut: Future<Output = ClientResult<T>> + Send + 'static,
    {
        let cache = self.clone();
        let handle = tokio::spawn(async move {
            let result = fut.await.and_then(|data| {
                serde_json::to_value(data).map_err(|e| ClientError::Service {
                    status: 200,
                    message: format!("Failed to store {}: {}", key, e),
                })
            });
            let result = result.map(|value| Fetched {
                value,
                fetched_at: cache.clock.now(),
            });
            cache.settle(&key, id, &result);
            result
        });

        let fetch = async move {
            handle
                .await
                .unwrap_or_else(|e| Err(ClientError::Transport(format!("Fetch task failed: {}", e))))
        }
        .boxed()
        .shared();

        InFlight {
            id,
            fetch,
            tags: tags.to_vec(),
            invalidated: false,
            waiters: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Record the outcome of fetch `id` for `key`
    fn settle(&self, key: &CacheKey, id: u64, result: &Result<Fetched, ClientError>) {
        let mut state = self.lock();
        if state.in_flight.get(key).map(|f| f.id) != Some(id) {
            // Cleared while running
            return;
        }
        let Some(flight) = state.in_flight.remove(key) else {
            return;
        };
        let watched = state.is_watched(key);
        let waiting = flight.waiters.load(Ordering::SeqCst) > 0;

        match result {
            Ok(fetched) => {
                if !watched && (!waiting || flight.invalidated) {
                    tracing::debug!("Discarding result for {}: nothing subscribed", key);
                    state.entries.remove(key);
                    return;
                }
                state.entries.insert(
                    key.clone(),
                    Entry {
                        value: fetched.value.clone(),
                        tags: flight.tags,
                        fetched_at: fetched.fetched_at,
                        stale: flight.invalidated,
                        last_error: None,
                    },
                );
            }
            Err(e) => {
                if let Some(entry) = state.entries.get_mut(key) {
                    tracing::warn!("Refetch of {} failed, keeping last value: {}", key, e);
                    entry.last_error = Some(e.clone());
                } else {
                    tracing::warn!("Fetch of {} failed: {}", key, e);
                }
            }
        }
    }

    /// Run an effectful call. The cache is not touched; callers invalidate
    /// once they have observed success.
    pub async fn mutate<T, Fut>(&self, fut: Fut) -> ClientResult<T>
    where
        Fut: Future<Output = ClientResult<T>>,
    {
        fut.await
    }

    /// Mark every entry carrying any of `tags` as stale.
    ///
    /// Subscribed entries stay (stale) and their subscribers are woken;
    /// the rest are dropped. Fetches already running for those tags are
    /// flagged so their results are not stored as fresh. `on_invalidate`
    /// listeners run after the cache lock is released.
    pub fn invalidate(&self, tags: &[Tag]) {
        let callbacks: Vec<(Tag, InvalidateCallback)> = {
            let mut state = self.lock();
            let state = &mut *state;

            let affected: Vec<CacheKey> = state
                .entries
                .iter()
                .filter(|(_, entry)| overlaps(&entry.tags, tags))
                .map(|(key, _)| key.clone())
                .collect();

            let mut notify = Vec::new();
            let mut dropped = 0;
            for key in affected {
                if state.is_watched(&key) {
                    if let Some(entry) = state.entries.get_mut(&key) {
                        entry.stale = true;
                    }
                    notify.push(key);
                } else {
                    state.entries.remove(&key);
                    dropped += 1;
                }
            }

            for (key, flight) in state.in_flight.iter_mut() {
                if overlaps(&flight.tags, tags) {
                    flight.invalidated = true;
                    if !notify.contains(key) && state.watches.contains_key(key) {
                        notify.push(key.clone());
                    }
                }
            }

            tracing::info!(
                "Invalidated {:?}: {} entries stale, {} dropped",
                tags,
                notify.len(),
                dropped
            );

            for key in &notify {
                if let Some(watch) = state.watches.get(key) {
                    watch.tx.send_modify(|generation| *generation += 1);
                }
            }

            state
                .listeners
                .iter()
                .filter(|l| tags.contains(&l.tag))
                .map(|l| (l.tag, l.callback.clone()))
                .collect()
        };

        for (tag, callback) in callbacks {
            callback(tag);
        }
    }

    /// Call `callback` every time `tag` is invalidated
    pub fn on_invalidate(&self, tag: Tag, callback: impl Fn(Tag) + Send + Sync + 'static) -> ListenerId {
        let mut state = self.lock();
        state.next_id += 1;
        let id = ListenerId(state.next_id);
        state.listeners.push(Listener {
            id,
            tag,
            callback: Arc::new(callback),
        });
        id
    }

    pub fn remove_listener(&self, id: ListenerId) {
        self.lock().listeners.retain(|l| l.id != id);
    }

    /// Subscribe to `key`, keeping its entry across invalidations
    pub fn subscribe(&self, key: CacheKey) -> Subscription {
        let rx = {
            let mut state = self.lock();
            let watch = state.watches.entry(key.clone()).or_insert_with(|| Watch {
                count: 0,
                tx: watch::channel(0).0,
            });
            watch.count += 1;
            watch.tx.subscribe()
        };
        Subscription::new(self.clone(), key, rx)
    }

    pub(crate) fn unsubscribe(&self, key: &CacheKey) {
        let mut state = self.lock();
        let remaining = match state.watches.get_mut(key) {
            Some(watch) => {
                watch.count = watch.count.saturating_sub(1);
                watch.count
            }
            None => return,
        };
        if remaining == 0 {
            state.watches.remove(key);
            if state.entries.get(key).map(|e| e.stale).unwrap_or(false) {
                tracing::debug!("Collecting stale entry {}", key);
                state.entries.remove(key);
            }
        }
    }

    /// Loading/stale/error flags for `key`
    pub fn state(&self, key: &CacheKey) -> EntryState {
        let state = self.lock();
        let now = self.clock.now();
        let entry = state.entries.get(key);
        EntryState {
            has_data: entry.is_some(),
            is_loading: state.in_flight.contains_key(key),
            is_stale: entry.map(|e| e.stale || self.is_expired(e, now)).unwrap_or(false),
            is_error: entry.map(|e| e.last_error.is_some()).unwrap_or(false),
        }
    }

    /// Last stored value for `key`, fresh or not
    pub fn peek<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let state = self.lock();
        state
            .entries
            .get(key)
            .and_then(|e| serde_json::from_value(e.value.clone()).ok())
    }

    /// Every stored value for `operation`, in no particular order
    pub fn peek_all<T: DeserializeOwned>(&self, operation: &str) -> Vec<T> {
        let state = self.lock();
        state
            .entries
            .iter()
            .filter(|(key, _)| key.operation() == operation)
            .filter_map(|(_, e)| serde_json::from_value(e.value.clone()).ok())
            .collect()
    }

    /// Drop every entry. Running fetches complete for their callers but are not stored.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.in_flight.clear();
        tracing::info!("Request cache cleared");
    }
}
