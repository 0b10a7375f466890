//! Cache performance counters.
//!
//! Counters are plain atomics shared between the facade and the L1 tier;
//! `snapshot` is zero-copy safe to call from any thread at any time.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Live counters. One instance per facade, shared with the L1 tier so
/// evictions are attributed without callbacks.
#[derive(Debug, Default)]
pub struct CacheCounters {
    pub hits_l1: AtomicU64,
    pub hits_remote: AtomicU64,
    pub misses: AtomicU64,
    pub sets: AtomicU64,
    pub evictions_lru: AtomicU64,
    pub evictions_ttl: AtomicU64,
    pub compressions: AtomicU64,
    pub decryption_failures: AtomicU64,
    pub remote_errors: AtomicU64,
    pub bytes_stored: AtomicU64,
    pub tier_small: AtomicU64,
    pub tier_medium: AtomicU64,
    pub tier_large: AtomicU64,
    pub tier_xlarge: AtomicU64,
}

impl CacheCounters {
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(counter: &AtomicU64, delta: u64) {
        counter.fetch_add(delta, Ordering::Relaxed);
    }
}

/// Point-in-time snapshot of the counters.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CacheStats {
    pub hits_l1: u64,
    pub hits_remote: u64,
    pub misses: u64,
    pub sets: u64,
    pub evictions_lru: u64,
    pub evictions_ttl: u64,
    pub compressions: u64,
    pub decryption_failures: u64,
    pub remote_errors: u64,
    pub bytes_stored: u64,
    /// Keys currently being computed under single-flight.
    pub in_flight: u64,
    /// Current number of entries in the L1 tier.
    pub l1_size: u64,
    pub text_tiers: TextTierStats,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TextTierStats {
    pub small: u64,
    pub medium: u64,
    pub large: u64,
    pub xlarge: u64,
}

impl CacheCounters {
    pub fn snapshot(&self, in_flight: u64, l1_size: u64) -> CacheStats {
        CacheStats {
            hits_l1: self.hits_l1.load(Ordering::Relaxed),
            hits_remote: self.hits_remote.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            evictions_lru: self.evictions_lru.load(Ordering::Relaxed),
            evictions_ttl: self.evictions_ttl.load(Ordering::Relaxed),
            compressions: self.compressions.load(Ordering::Relaxed),
            decryption_failures: self.decryption_failures.load(Ordering::Relaxed),
            remote_errors: self.remote_errors.load(Ordering::Relaxed),
            bytes_stored: self.bytes_stored.load(Ordering::Relaxed),
            in_flight,
            l1_size,
            text_tiers: TextTierStats {
                small: self.tier_small.load(Ordering::Relaxed),
                medium: self.tier_medium.load(Ordering::Relaxed),
                large: self.tier_large.load(Ordering::Relaxed),
                xlarge: self.tier_xlarge.load(Ordering::Relaxed),
            },
        }
    }
}
