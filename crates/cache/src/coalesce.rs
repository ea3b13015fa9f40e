use std::future::Future;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::CacheError;

/// State of one cache key. No slot at all means the key is absent (never
/// computed, or invalidated).
enum Slot {
    /// A computation is in flight. Waiters hold a clone of the receiver and
    /// wake when the computing caller drops the sender side.
    Pending(watch::Receiver<()>),
    /// The final postprocessed value. Never transitions back to Pending.
    Ready(String),
}

pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// Request-coalescing response cache.
///
/// Maps an opaque key to an already-postprocessed text value and guarantees
/// at most one in-flight computation per key: the first caller for an absent
/// key claims it and runs `compute_fn`; concurrent callers for the same key
/// block until that computation settles and never run their own. Unrelated
/// keys proceed fully in parallel, and the compute function always runs
/// outside the map's locks.
pub struct CoalescingCache {
    slots: DashMap<String, Slot>,
    max_entries: usize,
}

impl Default for CoalescingCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

impl CoalescingCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            slots: DashMap::new(),
            max_entries,
        }
    }

    /// Return the cached value for `key`, computing it at most once across
    /// concurrent callers.
    ///
    /// Blocking policy: a caller that finds the key in flight awaits the
    /// outcome rather than receiving a placeholder. If the computing caller
    /// fails, its error is returned to it alone, the key reverts to absent,
    /// and a woken waiter claims the key and runs its own `compute_fn`.
    pub async fn get_or_compute<F, Fut>(&self, key: &str, compute: F) -> Result<String, CacheError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<String>>,
    {
        let claim = loop {
            let mut rx = match self.slots.entry(key.to_owned()) {
                Entry::Occupied(slot) => match slot.get() {
                    Slot::Ready(text) => {
                        debug!(key, "cache hit");
                        return Ok(text.clone());
                    }
                    Slot::Pending(rx) => rx.clone(),
                },
                Entry::Vacant(vacant) => {
                    let (tx, rx) = watch::channel(());
                    vacant.insert(Slot::Pending(rx));
                    break tx;
                }
            };
            // The map guard is released here; block until the in-flight
            // computation settles, then re-check the slot.
            debug!(key, "coalesced onto in-flight computation");
            let _ = rx.changed().await;
        };

        debug!(key, "cache miss, computing");
        // Release the claim if the compute future fails or is dropped
        // mid-flight, so the key can never be stuck Pending.
        let release = PendingRelease {
            slots: &self.slots,
            key,
            armed: true,
        };

        let text = compute().await.map_err(|source| {
            warn!(key, error = %source, "computation failed, key released");
            CacheError::Upstream {
                key: key.to_owned(),
                source,
            }
        })?;

        self.evict_if_full();
        self.slots.insert(key.to_owned(), Slot::Ready(text.clone()));
        release.disarm();
        info!(key, bytes = text.len(), "stored computed value");

        // Dropping the sender wakes every waiter; they re-check and find
        // the Ready slot.
        drop(claim);
        Ok(text)
    }

    /// The stored value for `key`, if it is ready. Never blocks.
    pub fn get(&self, key: &str) -> Option<String> {
        match self.slots.get(key)?.value() {
            Slot::Ready(text) => Some(text.clone()),
            Slot::Pending(_) => None,
        }
    }

    /// Remove a ready entry. Returns `true` if one was removed, `false` if
    /// the key was absent, and `CacheError::Busy` if a computation for the
    /// key is in flight (the computation itself is untouched).
    pub fn invalidate(&self, key: &str) -> Result<bool, CacheError> {
        if self
            .slots
            .remove_if(key, |_, slot| matches!(slot, Slot::Ready(_)))
            .is_some()
        {
            debug!(key, "invalidated");
            return Ok(true);
        }
        if self.slots.contains_key(key) {
            return Err(CacheError::Busy {
                key: key.to_owned(),
            });
        }
        Ok(false)
    }

    /// Drop every ready entry. In-flight computations keep their slots.
    pub fn clear(&self) {
        self.slots.retain(|_, slot| matches!(slot, Slot::Pending(_)));
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats::default();
        for slot in self.slots.iter() {
            match slot.value() {
                Slot::Ready(_) => stats.ready += 1,
                Slot::Pending(_) => stats.pending += 1,
            }
        }
        stats
    }

    /// Evict a quarter of the ready entries when at capacity. Pending slots
    /// belong to in-flight callers and are never evicted.
    fn evict_if_full(&self) {
        if self.slots.len() < self.max_entries {
            return;
        }
        let to_remove: Vec<String> = self
            .slots
            .iter()
            .filter(|slot| matches!(slot.value(), Slot::Ready(_)))
            .take((self.max_entries / 4).max(1))
            .map(|slot| slot.key().clone())
            .collect();
        let evicted = to_remove.len();
        for key in to_remove {
            self.slots
                .remove_if(&key, |_, slot| matches!(slot, Slot::Ready(_)));
        }
        debug!(evicted, "cache at capacity, evicted ready entries");
    }
}

/// Removes a claimed Pending slot on drop unless disarmed. Covers both the
/// error path and cancellation of the compute future.
struct PendingRelease<'a> {
    slots: &'a DashMap<String, Slot>,
    key: &'a str,
    armed: bool,
}

impl PendingRelease<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PendingRelease<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.slots
                .remove_if(self.key, |_, slot| matches!(slot, Slot::Pending(_)));
        }
    }
}

#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct CacheStats {
    pub ready: usize,
    pub pending: usize,
}
