//! Counters for routing activity

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters, updated concurrently by routing calls
#[derive(Debug, Default)]
pub struct RouterMetrics {
    requests: AtomicU64,
    cache_hits: AtomicU64,
    fallbacks: AtomicU64,
    resolution_failures: AtomicU64,
    rejected: AtomicU64,
}

/// Point-in-time copy of [`RouterMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Total `route_request` calls
    pub requests: u64,
    /// Calls answered from the cache
    pub cache_hits: u64,
    /// Decisions made by the unhealthy fallback path
    pub fallbacks: u64,
    /// Geolocation lookups that failed and were recovered
    pub resolution_failures: u64,
    /// Calls that failed with no healthy region
    pub rejected: u64,
}

impl RouterMetrics {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_fallback(&self) {
        self.fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_resolution_failure(&self) {
        self.resolution_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejection(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Read all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            resolution_failures: self.resolution_failures.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

impl MetricsSnapshot {
    /// Fraction of requests served from the cache
    pub fn cache_hit_ratio(&self) -> f64 {
        if self.requests == 0 {
            0.0
        } else {
            self.cache_hits as f64 / self.requests as f64
        }
    }

    /// One-line summary for logs
    pub fn summary(&self) -> String {
        format!(
            "{} requests, {} cache hits ({:.1}%), {} fallbacks, {} resolution failures, {} rejected",
            self.requests,
            self.cache_hits,
            self.cache_hit_ratio() * 100.0,
            self.fallbacks,
            self.resolution_failures,
            self.rejected
        )
    }
}
