//! In-memory (L1) cache tier.
//!
//! A bounded map with LRU eviction by access order, where "access" covers
//! both reads and writes. Recency is tracked with a logical clock (one tick
//! per access) rather than wall time, so two touches in the same instant
//! still have a total order. TTL expiry is enforced lazily on read and
//! during eviction sweeps; both paths feed the shared counters.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use std::time::{Duration, Instant};

use dashmap::DashMap;

use super::stats::CacheCounters;

struct L1Entry {
    data: Vec<u8>,
    expires_at: Option<Instant>,
    last_accessed: u64,
}

impl L1Entry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| Instant::now() > exp)
    }
}

/// Bounded LRU tier shared behind the facade.
pub struct MemoryTier {
    data: DashMap<String, L1Entry>,
    max_entries: usize,
    clock: AtomicU64,
    counters: Arc<CacheCounters>,
}

impl MemoryTier {
    pub fn new(max_entries: usize, counters: Arc<CacheCounters>) -> Self {
        Self {
            data: DashMap::new(),
            max_entries: max_entries.max(1),
            clock: AtomicU64::new(0),
            counters,
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Read an entry, refreshing its recency. Expired entries are removed
    /// and metered as TTL evictions.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        let mut entry = self.data.get_mut(key)?;
        if entry.is_expired() {
            drop(entry);
            if self.data.remove(key).is_some() {
                CacheCounters::incr(&self.counters.evictions_ttl);
            }
            return None;
        }
        entry.last_accessed = self.tick();
        Some(entry.data.clone())
    }

    /// Insert or overwrite an entry. Inserting a new key at capacity first
    /// drops expired entries, then evicts by access order until under the
    /// bound.
    pub fn insert(&self, key: &str, data: Vec<u8>, ttl: Option<Duration>) {
        if !self.data.contains_key(key) {
            self.evict_if_needed();
        }
        let expires_at = ttl.map(|t| Instant::now() + t);
        self.data.insert(
            key.to_string(),
            L1Entry {
                data,
                expires_at,
                last_accessed: self.tick(),
            },
        );
    }

    pub fn remove(&self, key: &str) -> bool {
        self.data.remove(key).is_some()
    }

    /// Remove all keys matching a `*`-glob. Returns the number removed.
    pub fn remove_matching(&self, pattern: &str) -> u64 {
        let before = self.data.len();
        self.data.retain(|key, _| !glob_match(pattern, key));
        (before - self.data.len()) as u64
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    fn evict_if_needed(&self) {
        if self.data.len() < self.max_entries {
            return;
        }

        // Expired entries go first.
        let before = self.data.len();
        self.data.retain(|_, entry| !entry.is_expired());
        let expired = before - self.data.len();
        if expired > 0 {
            CacheCounters::add(&self.counters.evictions_ttl, expired as u64);
        }

        // Still full: evict the least recently accessed until one slot is
        // free for the incoming entry.
        while self.data.len() >= self.max_entries {
            let Some(oldest) = self
                .data
                .iter()
                .min_by_key(|entry| entry.last_accessed)
                .map(|entry| entry.key().clone())
            else {
                return;
            };
            if self.data.remove(&oldest).is_some() {
                CacheCounters::incr(&self.counters.evictions_lru);
            }
        }
    }
}

/// Match a glob pattern supporting `*` only (any run of characters).
pub(crate) fn glob_match(pattern: &str, candidate: &str) -> bool {
    let segments: Vec<&str> = pattern.split('*').collect();
    if segments.len() == 1 {
        return pattern == candidate;
    }

    let mut remaining = candidate;
    for (i, segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            continue;
        }
        if i == 0 {
            match remaining.strip_prefix(segment) {
                Some(rest) => remaining = rest,
                None => return false,
            }
        } else if i == segments.len() - 1 {
            return remaining.ends_with(segment);
        } else {
            match remaining.find(segment) {
                Some(pos) => remaining = &remaining[pos + segment.len()..],
                None => return false,
            }
        }
    }
    // Pattern ended with `*`
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tier(max: usize) -> (MemoryTier, Arc<CacheCounters>) {
        let counters = Arc::new(CacheCounters::default());
        (MemoryTier::new(max, counters.clone()), counters)
    }

    #[test]
    fn test_get_set_roundtrip() {
        let (tier, _) = tier(10);
        tier.insert("k", b"value".to_vec(), Some(Duration::from_secs(60)));
        assert_eq!(tier.get("k"), Some(b"value".to_vec()));
        assert_eq!(tier.get("missing"), None);
    }

    #[test]
    fn test_lru_eviction_respects_read_recency() {
        let (tier, counters) = tier(3);
        tier.insert("k1", b"v".to_vec(), None);
        tier.insert("k2", b"v".to_vec(), None);
        tier.insert("k3", b"v".to_vec(), None);

        // Reading k1 makes k2 the oldest.
        tier.get("k1");
        tier.insert("k4", b"v".to_vec(), None);

        assert!(tier.get("k2").is_none(), "k2 should be evicted");
        assert!(tier.get("k1").is_some());
        assert!(tier.get("k3").is_some());
        assert!(tier.get("k4").is_some());
        assert_eq!(counters.evictions_lru.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_overwrite_does_not_evict() {
        let (tier, counters) = tier(2);
        tier.insert("k1", b"a".to_vec(), None);
        tier.insert("k2", b"b".to_vec(), None);
        tier.insert("k1", b"c".to_vec(), None);

        assert_eq!(tier.get("k1"), Some(b"c".to_vec()));
        assert!(tier.get("k2").is_some());
        assert_eq!(counters.evictions_lru.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_expired_read_counts_ttl_eviction() {
        let (tier, counters) = tier(10);
        tier.insert("x", b"v".to_vec(), Some(Duration::from_millis(20)));
        std::thread::sleep(Duration::from_millis(40));
        assert!(tier.get("x").is_none());
        assert_eq!(counters.evictions_ttl.load(Ordering::Relaxed), 1);
        // A second read of the same key does not double count.
        assert!(tier.get("x").is_none());
        assert_eq!(counters.evictions_ttl.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_eviction_prefers_expired_entries() {
        let (tier, counters) = tier(3);
        tier.insert("gone1", b"v".to_vec(), Some(Duration::from_millis(10)));
        tier.insert("gone2", b"v".to_vec(), Some(Duration::from_millis(10)));
        tier.insert("keep", b"v".to_vec(), Some(Duration::from_secs(60)));
        std::thread::sleep(Duration::from_millis(30));

        tier.insert("new", b"v".to_vec(), Some(Duration::from_secs(60)));

        assert!(tier.get("keep").is_some());
        assert!(tier.get("new").is_some());
        assert_eq!(counters.evictions_ttl.load(Ordering::Relaxed), 2);
        assert_eq!(counters.evictions_lru.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_remove_matching_glob() {
        let (tier, _) = tier(10);
        tier.insert("v1|summarize|a||", b"v".to_vec(), None);
        tier.insert("v1|summarize|b||", b"v".to_vec(), None);
        tier.insert("v1|sentiment|a||", b"v".to_vec(), None);

        let removed = tier.remove_matching("v1|summarize|*");
        assert_eq!(removed, 2);
        assert_eq!(tier.len(), 1);
        assert!(tier.get("v1|sentiment|a||").is_some());
    }

    #[test]
    fn test_glob_match_semantics() {
        assert!(glob_match("v1|*", "v1|anything"));
        assert!(glob_match("*", "anything"));
        assert!(glob_match("exact", "exact"));
        assert!(!glob_match("exact", "exactly"));
        assert!(glob_match("a*c", "abc"));
        assert!(glob_match("a*c", "ac"));
        assert!(!glob_match("a*c", "ab"));
        assert!(glob_match("*tail", "long tail"));
        assert!(!glob_match("*tail", "tailless"));
        assert!(glob_match("a*b*c", "a-x-b-y-c"));
    }
}
