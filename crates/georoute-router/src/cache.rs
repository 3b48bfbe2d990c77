//! TTL cache of routing decisions.
//!
//! Entries are never mutated in place: a recomputation overwrites the whole
//! entry. Expired entries read as absent and are replaced on the next write
//! to the same key, or dropped by [`DecisionCache::purge_expired`]. Writes
//! also purge once the map grows past a threshold, so a router that never
//! runs the background loop stays bounded by its live entries.
//!
//! Invalidation bumps a generation counter. A decision computed before an
//! invalidation is refused by [`DecisionCache::put_if_generation`], so a
//! request racing `remove_region` cannot re-insert a stale decision.

use georoute_domain::{RoutingDecision, RoutingOptions};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

/// Entry count above which a write sweeps expired entries
pub const DEFAULT_PURGE_THRESHOLD: usize = 1024;

/// Cache key: client address plus every option that affects the outcome
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    address: String,
    options: RoutingOptions,
}

impl CacheKey {
    /// Build a key from a request, normalizing the options
    pub fn new(address: &str, options: &RoutingOptions) -> Self {
        Self {
            address: address.trim().to_string(),
            options: options.normalized(),
        }
    }

    /// Address part of the key
    pub fn address(&self) -> &str {
        &self.address
    }

    fn has_latency_ceiling(&self) -> bool {
        self.options.max_latency_ms.is_some()
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    decision: RoutingDecision,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    generation: u64,
}

impl CacheState {
    fn insert(&mut self, key: CacheKey, entry: CacheEntry, purge_threshold: usize) {
        self.entries.insert(key, entry);
        if self.entries.len() > purge_threshold {
            let now = Instant::now();
            self.entries.retain(|_, entry| entry.is_live(now));
        }
    }
}

/// Decision cache shared by all routing calls
#[derive(Debug)]
pub struct DecisionCache {
    state: RwLock<CacheState>,
    ttl: Duration,
    purge_threshold: usize,
}

impl DecisionCache {
    /// Create a cache whose entries live for `ttl`
    pub fn new(ttl: Duration) -> Self {
        Self {
            state: RwLock::new(CacheState::default()),
            ttl,
            purge_threshold: DEFAULT_PURGE_THRESHOLD,
        }
    }

    /// Sweep expired entries on write once more than `threshold` are stored
    pub fn with_purge_threshold(mut self, threshold: usize) -> Self {
        self.purge_threshold = threshold;
        self
    }

    fn read(&self) -> RwLockReadGuard<'_, CacheState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, CacheState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Default TTL
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached decision, if present and unexpired
    pub fn get(&self, key: &CacheKey) -> Option<RoutingDecision> {
        let now = Instant::now();
        self.read()
            .entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.decision.clone())
    }

    /// Insert or overwrite an entry
    pub fn put(&self, key: CacheKey, decision: RoutingDecision, ttl: Duration) {
        let entry = CacheEntry {
            decision,
            expires_at: Instant::now() + ttl,
        };
        self.write().insert(key, entry, self.purge_threshold);
    }

    /// Insert only if nothing was invalidated since `generation` was read
    ///
    /// Returns whether the entry was stored.
    pub fn put_if_generation(
        &self,
        generation: u64,
        key: CacheKey,
        decision: RoutingDecision,
        ttl: Duration,
    ) -> bool {
        let mut state = self.write();
        if state.generation != generation {
            return false;
        }
        state.insert(
            key,
            CacheEntry {
                decision,
                expires_at: Instant::now() + ttl,
            },
            self.purge_threshold,
        );
        true
    }

    /// Current invalidation generation
    pub fn generation(&self) -> u64 {
        self.read().generation
    }

    /// Remove every entry
    pub fn clear(&self) {
        let mut state = self.write();
        state.entries.clear();
        state.generation += 1;
    }

    /// Remove entries whose decision points at `region_id`
    ///
    /// Returns how many entries were dropped.
    pub fn invalidate_region(&self, region_id: &str) -> usize {
        let mut state = self.write();
        let before = state.entries.len();
        state
            .entries
            .retain(|_, entry| entry.decision.region != region_id);
        state.generation += 1;
        before - state.entries.len()
    }

    /// Drop entries a latency change of `region_id` may have made stale
    ///
    /// That is every entry keyed on a latency ceiling, since the region may
    /// now fit or exceed it, and every entry reporting `region_id`'s latency.
    pub fn invalidate_latency(&self, region_id: &str) -> usize {
        let mut state = self.write();
        let before = state.entries.len();
        state.entries.retain(|key, entry| {
            !key.has_latency_ceiling() && entry.decision.region != region_id
        });
        state.generation += 1;
        before - state.entries.len()
    }

    /// Drop expired entries, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut state = self.write();
        let before = state.entries.len();
        state.entries.retain(|_, entry| entry.is_live(now));
        before - state.entries.len()
    }

    /// Number of stored entries (expired ones included until purged)
    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.read().entries.is_empty()
    }
}
