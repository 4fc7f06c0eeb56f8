//! Bounded concurrency with polling admission

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::config::LIMITER_POLL_INTERVAL_MS;

/// Caps the number of futures running through [`ConcurrencyLimiter::run`].
///
/// A waiting task re-checks the counter every poll interval; a limit of zero
/// admits everything immediately.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    limit: usize,
    running: Arc<AtomicUsize>,
    poll_interval: Duration,
}

/// Frees the slot when the admitted task finishes or is dropped
struct Slot {
    running: Arc<AtomicUsize>,
}

impl Drop for Slot {
    fn drop(&mut self) {
        self.running.fetch_sub(1, Ordering::AcqRel);
    }
}

impl ConcurrencyLimiter {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            running: Arc::new(AtomicUsize::new(0)),
            poll_interval: Duration::from_millis(LIMITER_POLL_INTERVAL_MS),
        }
    }

    /// Tasks currently admitted
    pub fn running(&self) -> usize {
        self.running.load(Ordering::Acquire)
    }

    async fn acquire(&self) -> Slot {
        loop {
            let current = self.running.load(Ordering::Acquire);
            if (self.limit == 0 || current < self.limit)
                && self
                    .running
                    .compare_exchange(current, current + 1, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
            {
                return Slot {
                    running: self.running.clone(),
                };
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Wait for a free slot, then run `task`
    pub async fn run<F, T>(&self, task: F) -> T
    where
        F: Future<Output = T>,
    {
        let _slot = self.acquire().await;
        task.await
    }
}
