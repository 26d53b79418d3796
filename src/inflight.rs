//! In-flight request registry (single-flight deduplication).
//!
//! Concurrent callers with the same [`Fingerprint`] share one execution. The
//! registry only holds a weak reference to each shared operation, so:
//!
//! - the slot disappears the moment the operation settles, and the next call
//!   starts fresh work instead of replaying the old outcome
//! - when every waiter has gone away (cancelled), the operation is dropped and
//!   its slot removed
//! - one waiter going away never cancels the work for the others

use crate::cache::Fingerprint;
use crate::Result;
use futures::future::{BoxFuture, FutureExt, Shared, WeakShared};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Handle every waiter of one execution polls.
pub type SharedOutcome<T> = Shared<BoxFuture<'static, Result<T>>>;

struct Slot<T> {
    id: u64,
    handle: WeakShared<BoxFuture<'static, Result<T>>>,
}

type Slots<T> = Arc<Mutex<HashMap<Fingerprint, Slot<T>>>>;

fn lock<T>(slots: &Slots<T>) -> MutexGuard<'_, HashMap<Fingerprint, Slot<T>>> {
    slots.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Result of [`InFlightRegistry::register`].
pub struct Registration<T> {
    pub handle: SharedOutcome<T>,
    /// `true` when the caller attached to work someone else started.
    pub joined: bool,
}

/// Removes its slot when the wrapped operation completes or is dropped.
struct SlotGuard<T> {
    slots: Slots<T>,
    key: Fingerprint,
    id: u64,
}

impl<T> Drop for SlotGuard<T> {
    fn drop(&mut self) {
        let mut slots = lock(&self.slots);
        if slots.get(&self.key).map(|s| s.id) == Some(self.id) {
            slots.remove(&self.key);
        }
    }
}

pub struct InFlightRegistry<T> {
    slots: Slots<T>,
    next_id: AtomicU64,
}

impl<T> Default for InFlightRegistry<T> {
    fn default() -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> InFlightRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Existing live handle for `key`, if any.
    pub fn lookup(&self, key: &Fingerprint) -> Option<SharedOutcome<T>> {
        lock(&self.slots).get(key).and_then(|s| s.handle.upgrade())
    }

    /// Attach to the live execution for `key`, or start `make()` as the new one.
    ///
    /// `make` is only invoked when no live execution exists.
    pub fn register<F>(&self, key: &Fingerprint, make: F) -> Registration<T>
    where
        F: FnOnce() -> BoxFuture<'static, Result<T>>,
    {
        if let Some(handle) = self.lookup(key) {
            return Registration {
                handle,
                joined: true,
            };
        }

        let fut = make();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let guard = SlotGuard {
            slots: Arc::clone(&self.slots),
            key: key.clone(),
            id,
        };
        let handle = async move {
            let _guard = guard;
            fut.await
        }
        .boxed()
        .shared();

        let mut slots = lock(&self.slots);
        // Re-check: under a multi-threaded runtime another caller may have won.
        if let Some(existing) = slots.get(key).and_then(|s| s.handle.upgrade()) {
            drop(slots);
            return Registration {
                handle: existing,
                joined: true,
            };
        }
        if let Some(weak) = handle.downgrade() {
            slots.insert(key.clone(), Slot { id, handle: weak });
        }
        Registration {
            handle,
            joined: false,
        }
    }

    /// Forget `key` without touching the operation itself.
    pub fn resolve(&self, key: &Fingerprint) -> bool {
        lock(&self.slots).remove(key).is_some()
    }

    pub fn contains(&self, key: &Fingerprint) -> bool {
        self.lookup(key).is_some()
    }

    /// Number of live executions.
    pub fn len(&self) -> usize {
        lock(&self.slots)
            .values()
            .filter(|s| s.handle.upgrade().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
