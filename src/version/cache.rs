//! In-memory caches with a time-to-live
//!
//! [`VersionCache`] is a single timestamped slot. [`FetchCache`] keys slots
//! holding shared in-flight fetches, so concurrent callers await one request
//! and a failed fetch is evicted instead of being remembered.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tracing::debug;

/// A value stamped with the moment it was stored
#[derive(Debug, Clone)]
pub struct VersionCache<T> {
    pub value: T,
    created_at: Option<Instant>,
}

impl<T> VersionCache<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            created_at: Some(Instant::now()),
        }
    }

    /// Replace the value and restamp it
    pub fn set(&mut self, value: T) {
        self.value = value;
        self.created_at = Some(Instant::now());
    }

    /// Whether the entry is younger than `lifetime`; an invalidated entry never is
    pub fn is_valid(&self, lifetime: Duration) -> bool {
        self.created_at
            .is_some_and(|created_at| created_at.elapsed() <= lifetime)
    }

    /// Expire the entry while keeping it in place
    pub fn invalidate(&mut self) {
        self.created_at = None;
    }
}

type SharedFetch<V> = Shared<BoxFuture<'static, Option<V>>>;

/// Keyed cache of fetch results, shared while in flight
pub struct FetchCache<K, V>
where
    V: Clone,
{
    entries: Mutex<HashMap<K, VersionCache<SharedFetch<V>>>>,
}

impl<K, V> Default for FetchCache<K, V>
where
    V: Clone,
{
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> FetchCache<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, VersionCache<SharedFetch<V>>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the fresh cached result for `key`, or start `fetch` and cache it.
    ///
    /// Callers arriving while the fetch runs await the same future. A `None`
    /// result is evicted so the next call retries.
    pub async fn get_or_fetch<F, Fut>(&self, key: K, lifetime: Duration, fetch: F) -> Option<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<V>> + Send + 'static,
    {
        let shared = {
            let mut entries = self.lock();
            match entries.get(&key) {
                Some(entry) if entry.is_valid(lifetime) => entry.value.clone(),
                _ => {
                    debug!("Cache miss for {:?}", key);
                    let shared = fetch().boxed().shared();
                    entries.insert(key.clone(), VersionCache::new(shared.clone()));
                    shared
                }
            }
        };

        let result = shared.clone().await;

        if result.is_none() {
            let mut entries = self.lock();
            // Only evict our own fetch; a newer one may have replaced it
            if entries
                .get(&key)
                .is_some_and(|entry| entry.value.ptr_eq(&shared))
            {
                debug!("Evicting failed fetch for {:?}", key);
                entries.remove(&key);
            }
        }

        result
    }

    /// Store an already known value
    pub fn insert(&self, key: K, value: V) {
        let ready = futures::future::ready(Some(value)).boxed().shared();
        self.lock().insert(key, VersionCache::new(ready));
    }

    /// Completed, fresh value for `key`, without waiting on an in-flight fetch
    pub fn get(&self, key: &K, lifetime: Duration) -> Option<V> {
        self.lock()
            .get(key)
            .filter(|entry| entry.is_valid(lifetime))
            .and_then(|entry| entry.value.peek().cloned().flatten())
    }

    /// Whether `key` holds a fresh entry (completed or in flight)
    pub fn is_fresh(&self, key: &K, lifetime: Duration) -> bool {
        self.lock()
            .get(key)
            .is_some_and(|entry| entry.is_valid(lifetime))
    }

    /// Expire every entry; each is replaced on its next lookup
    pub fn invalidate(&self) {
        for entry in self.lock().values_mut() {
            entry.invalidate();
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
