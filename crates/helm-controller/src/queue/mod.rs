//! Deduplicating, rate-limited work queue.
//!
//! Keys are queued for processing rather than handled as soon as a
//! notification arrives. This bounds the amount of concurrent work and
//! guarantees that the same key is never processed by two workers at once:
//!
//! - `dirty` holds every key that needs processing, including keys that are
//!   currently being processed and were re-added meanwhile.
//! - `processing` holds keys handed out by [`WorkQueue::get`] and not yet
//!   marked done.
//! - `queue` is the delivery order; a key is in `queue` only if it is dirty
//!   and not processing.
//!
//! A key re-added while it is processing stays out of `queue` until the
//! worker marks it done, and is then delivered exactly once more.

mod rate_limiter;

pub use rate_limiter::{
    ItemExponentialBackoff, RateLimiter, DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY,
};

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::trace;

/// Bounds required of queue keys.
pub trait QueueKey: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static {}

impl<T> QueueKey for T where T: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static {}

#[derive(Debug)]
struct State<K> {
    queue: VecDeque<K>,
    dirty: HashSet<K>,
    processing: HashSet<K>,
    shutting_down: bool,
}

impl<K> Default for State<K> {
    fn default() -> Self {
        Self {
            queue: VecDeque::new(),
            dirty: HashSet::new(),
            processing: HashSet::new(),
            shutting_down: false,
        }
    }
}

struct Shared<K> {
    state: Mutex<State<K>>,
    notify: Notify,
    limiter: Box<dyn RateLimiter<K>>,
}

/// A work queue shared between notification handlers and workers.
///
/// Cloning is cheap and every clone refers to the same queue.
pub struct WorkQueue<K> {
    shared: Arc<Shared<K>>,
}

impl<K> Clone for WorkQueue<K> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<K: QueueKey> WorkQueue<K> {
    /// Creates a queue with the default exponential backoff.
    #[must_use]
    pub fn new() -> Self {
        Self::with_rate_limiter(ItemExponentialBackoff::default())
    }

    /// Creates a queue that uses `limiter` for [`WorkQueue::add_rate_limited`].
    pub fn with_rate_limiter(limiter: impl RateLimiter<K> + 'static) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                notify: Notify::new(),
                limiter: Box::new(limiter),
            }),
        }
    }

    /// Marks `key` as needing processing.
    ///
    /// Adding a key that is already pending is a no-op. Adding a key that is
    /// being processed defers it until the worker calls [`WorkQueue::done`].
    pub fn add(&self, key: K) {
        let mut state = self.shared.state.lock();
        if state.shutting_down || state.dirty.contains(&key) {
            return;
        }

        state.dirty.insert(key.clone());
        if state.processing.contains(&key) {
            trace!(key = ?key, "key is processing, deferring until done");
            return;
        }

        state.queue.push_back(key);
        drop(state);
        self.shared.notify.notify_one();
    }

    /// Waits for the next pending key.
    ///
    /// Returns `None` once the queue has been shut down. The returned item
    /// marks the key done when dropped.
    pub async fn get(&self) -> Option<QueueItem<K>> {
        loop {
            let notified = self.shared.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.shared.state.lock();
                if state.shutting_down {
                    return None;
                }
                if let Some(key) = state.queue.pop_front() {
                    state.dirty.remove(&key);
                    state.processing.insert(key.clone());
                    return Some(QueueItem {
                        queue: self.clone(),
                        key,
                    });
                }
            }

            notified.await;
        }
    }

    /// Marks `key` as no longer being processed.
    ///
    /// If the key was re-added while it was processing it is queued again.
    pub fn done(&self, key: &K) {
        let mut state = self.shared.state.lock();
        state.processing.remove(key);
        if state.dirty.contains(key) && !state.shutting_down {
            state.queue.push_back(key.clone());
            drop(state);
            self.shared.notify.notify_one();
        }
    }

    /// Re-adds `key` after its backoff delay has elapsed.
    ///
    /// Must be called from within a tokio runtime.
    pub fn add_rate_limited(&self, key: K) {
        let delay = self.shared.limiter.when(&key);
        if self.is_shutting_down() {
            return;
        }

        trace!(key = ?key, delay = ?delay, "scheduling retry");
        let queue = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.add(key);
        });
    }

    /// Resets the backoff history for `key`.
    pub fn forget(&self, key: &K) {
        self.shared.limiter.forget(key);
    }

    /// Number of times `key` has been requeued since it was last forgotten.
    pub fn num_requeues(&self, key: &K) -> u32 {
        self.shared.limiter.retries(key)
    }

    /// Number of keys waiting to be handed out.
    pub fn len(&self) -> usize {
        self.shared.state.lock().queue.len()
    }

    /// Returns true if no keys are waiting to be handed out.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stops accepting new keys and releases every blocked [`WorkQueue::get`].
    pub fn shut_down(&self) {
        self.shared.state.lock().shutting_down = true;
        self.shared.notify.notify_waiters();
    }

    /// Returns true once [`WorkQueue::shut_down`] has been called.
    pub fn is_shutting_down(&self) -> bool {
        self.shared.state.lock().shutting_down
    }
}

impl<K: QueueKey> Default for WorkQueue<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> fmt::Debug for WorkQueue<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkQueue").finish_non_exhaustive()
    }
}

/// A key handed out by [`WorkQueue::get`].
///
/// Dropping the item marks the key done, on every exit path.
#[derive(Debug)]
pub struct QueueItem<K: QueueKey> {
    queue: WorkQueue<K>,
    key: K,
}

impl<K: QueueKey> QueueItem<K> {
    /// The key being processed.
    #[must_use]
    pub const fn key(&self) -> &K {
        &self.key
    }
}

impl<K: QueueKey> Drop for QueueItem<K> {
    fn drop(&mut self) {
        self.queue.done(&self.key);
    }
}
