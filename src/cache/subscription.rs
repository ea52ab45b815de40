//! Subscriptions: the cache side of a mounted view

use tokio::sync::watch;

use super::{CacheKey, RequestCache};

/// Keeps a cache entry alive across invalidations and reports when it goes stale.
///
/// While at least one subscription exists for a key, invalidating the key
/// marks its entry stale instead of dropping it, so the subscriber can keep
/// rendering the last value while it refetches. Dropping the last
/// subscription collects a stale entry.
pub struct Subscription {
    cache: RequestCache,
    key: CacheKey,
    rx: watch::Receiver<u64>,
}

impl Subscription {
    pub(super) fn new(cache: RequestCache, key: CacheKey, rx: watch::Receiver<u64>) -> Self {
        Self { cache, key, rx }
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Wait until the entry is invalidated.
    ///
    /// Invalidations that happen before this is awaited are folded into one
    /// wake-up. Returns `false` if the cache went away.
    pub async fn invalidated(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// Whether an invalidation arrived that has not been awaited yet
    pub fn is_invalidated(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cache.unsubscribe(&self.key);
    }
}
