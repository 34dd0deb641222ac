//! Per-key debouncing of asynchronous work.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::AbortHandle;

type Pending<K> = Arc<Mutex<HashMap<K, (u64, AbortHandle)>>>;

/// Runs the most recently scheduled task for each key once its delay has
/// passed without another schedule for the same key.
///
/// Keys are independent. A task that has started running is never cancelled.
pub struct Debouncer<K> {
    pending: Pending<K>,
    next_id: AtomicU64,
}

impl<K> Debouncer<K>
where
    K: Eq + Hash + Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        }
    }

    /// Schedules `task` to run after `delay`, replacing any pending task for
    /// `key`.
    pub fn schedule<F>(&self, key: K, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let pending = self.pending.clone();
        let task_key = key.clone();

        // Held until the handle is recorded so the task cannot observe the
        // map before its own entry exists.
        let mut guard = self.pending.lock();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut pending = pending.lock();
                match pending.get(&task_key) {
                    Some((current, _)) if *current == id => {
                        pending.remove(&task_key);
                    }
                    _ => return,
                }
            }
            task.await;
        });

        if let Some((_, previous)) = guard.insert(key, (id, handle.abort_handle())) {
            previous.abort();
        }
    }

    /// Drops the pending task for `key`, if any.
    pub fn cancel(&self, key: &K) {
        if let Some((_, handle)) = self.pending.lock().remove(key) {
            handle.abort();
        }
    }

    /// Whether a task for `key` is waiting for its delay.
    pub fn is_pending(&self, key: &K) -> bool {
        self.pending.lock().contains_key(key)
    }
}

impl<K> Default for Debouncer<K>
where
    K: Eq + Hash + Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
