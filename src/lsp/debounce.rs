//! Trailing-edge debouncing of asynchronous work

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;

/// Runs only the last task scheduled for a key within the wait window.
///
/// Scheduling a key again aborts the pending task of that key and restarts
/// the wait. A task whose wait elapsed is detached and always completes.
pub struct Debouncer<K> {
    wait: Duration,
    pending: Mutex<HashMap<K, JoinHandle<()>>>,
}

impl<K> Debouncer<K>
where
    K: Eq + Hash + Clone + Send + 'static,
{
    pub fn new(wait: Duration) -> Self {
        Self {
            wait,
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn schedule<F>(&self, key: K, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let wait = self.wait;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            tokio::spawn(task);
        });

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.retain(|_, handle| !handle.is_finished());
        if let Some(previous) = pending.insert(key, handle) {
            previous.abort();
        }
    }

    /// Drop the pending task for `key`, if any
    pub fn cancel(&self, key: &K) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = pending.remove(key) {
            previous.abort();
        }
    }
}
