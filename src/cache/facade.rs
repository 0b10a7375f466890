//! Two-tier cache facade.
//!
//! Reads probe L1 first, then the remote tier; remote hits are decoded and
//! promoted into L1. Writes go to both tiers. Every remote error is logged,
//! metered, and swallowed — the facade degrades to L1-only behind a
//! lightweight internal circuit breaker (30 s cooldown) so a dead remote is
//! not hammered on every request.
//!
//! `get_or_compute` provides per-key single-flight: at most one producer
//! runs per key; concurrent callers for the same key block on its result
//! and are never re-queued, even when the producer fails.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::watch;

use super::{
    codec::Codec,
    error::CacheError,
    keys::{KeyGenerator, TextSizeTier},
    memory::{MemoryTier, glob_match},
    stats::{CacheCounters, CacheStats},
    traits::RemoteTier,
};
use crate::{
    config::CacheConfig,
    error::ServiceError,
    resilience::{BreakerConfig, CircuitBreaker},
};

/// Cooldown for the internal remote-health breaker.
const REMOTE_BREAKER_COOLDOWN_MS: u64 = 30_000;
const REMOTE_BREAKER_THRESHOLD: u32 = 3;

type FlightResult = Result<Value, ServiceError>;
type FlightReceiver = watch::Receiver<Option<FlightResult>>;

/// Producer output for [`CacheFacade::get_or_compute`].
///
/// Degraded results (typed fallbacks) must reach the caller and any
/// single-flight waiters without being written to either tier.
pub struct ComputedValue {
    pub value: Value,
    pub cacheable: bool,
}

impl ComputedValue {
    /// A real result: returned and cached.
    pub fn store(value: Value) -> Self {
        Self {
            value,
            cacheable: true,
        }
    }

    /// A degraded result: returned but never cached.
    pub fn transient(value: Value) -> Self {
        Self {
            value,
            cacheable: false,
        }
    }
}

pub struct CacheFacade {
    l1: MemoryTier,
    remote: Option<Arc<dyn RemoteTier>>,
    remote_breaker: CircuitBreaker,
    codec: Codec,
    keys: KeyGenerator,
    default_ttl: Duration,
    smart_promotion: bool,
    promotion_size_limit: Option<usize>,
    counters: Arc<CacheCounters>,
    flights: DashMap<String, FlightReceiver>,
    warned_prefixes: DashMap<String, ()>,
}

impl CacheFacade {
    /// Build a facade from resolved configuration and an optional remote
    /// tier (already connected).
    pub fn new(
        config: &CacheConfig,
        remote: Option<Arc<dyn RemoteTier>>,
    ) -> Result<Self, CacheError> {
        let counters = Arc::new(CacheCounters::default());
        let codec = Codec::new(
            config.compression_threshold,
            config.compression_level,
            config.encryption_key.as_deref(),
        )?;

        let (hash_threshold, tiers, smart_promotion) = match &config.ai {
            Some(ai) => (
                ai.text_hash_threshold,
                ai.text_size_tiers.clone(),
                ai.smart_promotion,
            ),
            None => (1_000, Default::default(), false),
        };

        Ok(Self {
            l1: MemoryTier::new(config.memory_cache_size, counters.clone()),
            remote,
            remote_breaker: CircuitBreaker::new(
                "cache-remote",
                BreakerConfig {
                    failure_threshold: REMOTE_BREAKER_THRESHOLD,
                    cooldown: Duration::from_millis(REMOTE_BREAKER_COOLDOWN_MS),
                    required_successes: 1,
                },
            ),
            codec,
            keys: KeyGenerator::new(hash_threshold, tiers),
            default_ttl: Duration::from_secs(config.default_ttl),
            smart_promotion,
            promotion_size_limit: config.compression_threshold,
            counters,
            flights: DashMap::new(),
            warned_prefixes: DashMap::new(),
        })
    }

    /// Deterministic key construction. See [`KeyGenerator::build`].
    pub fn build_key(
        &self,
        op_tag: &str,
        text: &str,
        options: &BTreeMap<String, Value>,
        question: Option<&str>,
    ) -> String {
        match self.keys.tier(text) {
            TextSizeTier::Small => CacheCounters::incr(&self.counters.tier_small),
            TextSizeTier::Medium => CacheCounters::incr(&self.counters.tier_medium),
            TextSizeTier::Large => CacheCounters::incr(&self.counters.tier_large),
            TextSizeTier::Xlarge => CacheCounters::incr(&self.counters.tier_xlarge),
        }
        self.keys.build(op_tag, text, options, question)
    }

    /// Look up a value. Never fails: remote trouble degrades to a miss.
    pub async fn get(&self, key: &str) -> Option<Value> {
        self.lookup(key, true).await
    }

    async fn lookup(&self, key: &str, count_miss: bool) -> Option<Value> {
        if let Some(bytes) = self.l1.get(key) {
            match serde_json::from_slice(&bytes) {
                Ok(value) => {
                    CacheCounters::incr(&self.counters.hits_l1);
                    return Some(value);
                }
                Err(e) => {
                    tracing::warn!(key, error = %e, "Corrupt L1 entry dropped");
                    self.l1.remove(key);
                }
            }
        }

        if let Some(value) = self.remote_lookup(key).await {
            CacheCounters::incr(&self.counters.hits_remote);
            return Some(value);
        }

        if count_miss {
            CacheCounters::incr(&self.counters.misses);
        }
        None
    }

    async fn remote_lookup(&self, key: &str) -> Option<Value> {
        let remote = self.remote.as_ref()?;
        if self.remote_breaker.try_acquire().is_err() {
            return None;
        }

        match remote.get(key).await {
            Ok(Some(blob)) => {
                self.remote_breaker.record_success();
                self.decode_remote(key, &blob).await
            }
            Ok(None) => {
                self.remote_breaker.record_success();
                None
            }
            Err(e) => {
                CacheCounters::incr(&self.counters.remote_errors);
                self.remote_breaker.record_failure();
                tracing::warn!(key, error = %e, "Remote cache read failed, degrading to L1");
                None
            }
        }
    }

    /// Decode a remote blob and promote it into L1. A decryption failure is
    /// a miss, not an error: blobs written before encryption was enabled
    /// stay readable and re-populate over time.
    async fn decode_remote(&self, key: &str, blob: &[u8]) -> Option<Value> {
        let payload = match self.codec.decode(blob) {
            Ok(payload) => payload,
            Err(CacheError::Decryption(reason)) => {
                CacheCounters::incr(&self.counters.decryption_failures);
                self.warn_once(key, &reason);
                return None;
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "Undecodable remote entry treated as miss");
                return None;
            }
        };

        let value: Value = match serde_json::from_slice(&payload) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, error = %e, "Remote entry is not valid JSON");
                return None;
            }
        };

        let skip_promotion = self.smart_promotion
            && self
                .promotion_size_limit
                .is_some_and(|limit| payload.len() > limit);
        if !skip_promotion {
            self.l1.insert(key, payload, Some(self.default_ttl));
        }

        Some(value)
    }

    /// One warning per key prefix (operation namespace), so a migration
    /// does not flood the logs.
    fn warn_once(&self, key: &str, reason: &str) {
        let prefix: String = key.splitn(3, '|').take(2).collect::<Vec<_>>().join("|");
        if self.warned_prefixes.insert(prefix.clone(), ()).is_none() {
            tracing::warn!(
                key_prefix = %prefix,
                reason,
                "Cache entries under this prefix cannot be decrypted; treating as misses"
            );
        }
    }

    /// Store a value in both tiers. Best-effort: failures are metered and
    /// swallowed, never surfaced.
    pub async fn set(&self, key: &str, value: &Value, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let payload = match serde_json::to_vec(value) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(key, error = %e, "Unserializable cache value dropped");
                return;
            }
        };

        CacheCounters::incr(&self.counters.sets);
        self.l1.insert(key, payload.clone(), Some(ttl));

        let Some(remote) = self.remote.as_ref() else {
            return;
        };
        if self.remote_breaker.try_acquire().is_err() {
            return;
        }

        let blob = match self.codec.encode(&payload) {
            Ok(blob) => blob,
            Err(e) => {
                tracing::error!(key, error = %e, "Cache encode failed; remote write skipped");
                return;
            }
        };
        if blob.compressed {
            CacheCounters::incr(&self.counters.compressions);
        }
        CacheCounters::add(&self.counters.bytes_stored, blob.bytes.len() as u64);

        match remote.set(key, &blob.bytes, ttl).await {
            Ok(()) => self.remote_breaker.record_success(),
            Err(e) => {
                CacheCounters::incr(&self.counters.remote_errors);
                self.remote_breaker.record_failure();
                tracing::warn!(key, error = %e, "Remote cache write failed");
            }
        }
    }

    /// Per-key single-flight compute-through.
    ///
    /// The first caller for a key runs `producer`; concurrent callers block
    /// on that result. A successful cacheable value is stored with `ttl`;
    /// a failure propagates to every waiter and nothing is cached.
    pub async fn get_or_compute<F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        producer: F,
    ) -> Result<Value, ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ComputedValue, ServiceError>>,
    {
        // Fast path: already cached. The miss is counted by the leader
        // only, so N concurrent callers record one miss, not N.
        if let Some(value) = self.lookup(key, false).await {
            return Ok(value);
        }

        let (tx, role_rx) = {
            use dashmap::mapref::entry::Entry;
            match self.flights.entry(key.to_string()) {
                Entry::Occupied(entry) => (None, entry.get().clone()),
                Entry::Vacant(vacant) => {
                    let (tx, rx) = watch::channel(None);
                    vacant.insert(rx.clone());
                    (Some(tx), rx)
                }
            }
        };

        match tx {
            Some(tx) => self.lead_flight(key, ttl, producer, tx).await,
            None => Self::join_flight(role_rx).await,
        }
    }

    async fn lead_flight<F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        producer: F,
        tx: watch::Sender<Option<FlightResult>>,
    ) -> Result<Value, ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ComputedValue, ServiceError>>,
    {
        // Ensure the flight entry is cleared even if the producer panics;
        // waiters then observe a closed channel.
        struct FlightGuard<'a> {
            flights: &'a DashMap<String, FlightReceiver>,
            key: &'a str,
        }
        impl Drop for FlightGuard<'_> {
            fn drop(&mut self) {
                self.flights.remove(self.key);
            }
        }
        let _guard = FlightGuard {
            flights: &self.flights,
            key,
        };

        // Another caller may have stored the value between our probe and
        // claiming the flight.
        if let Some(value) = self.lookup(key, false).await {
            let _ = tx.send(Some(Ok(value.clone())));
            return Ok(value);
        }

        CacheCounters::incr(&self.counters.misses);
        let result = match producer().await {
            Ok(computed) => {
                if computed.cacheable {
                    self.set(key, &computed.value, Some(ttl)).await;
                }
                Ok(computed.value)
            }
            Err(error) => Err(error),
        };
        let _ = tx.send(Some(result.clone()));
        result
    }

    async fn join_flight(mut rx: FlightReceiver) -> Result<Value, ServiceError> {
        loop {
            if let Some(result) = rx.borrow().clone() {
                return result;
            }
            if rx.changed().await.is_err() {
                // Leader dropped without publishing (panic or abort).
                if let Some(result) = rx.borrow().clone() {
                    return result;
                }
                return Err(ServiceError::Internal(
                    "cached computation was aborted".to_string(),
                ));
            }
        }
    }

    /// Remove all keys matching a `*`-glob from both tiers. Returns the
    /// number of L1 entries removed (the remote count is logged).
    pub async fn invalidate(&self, pattern: &str) -> u64 {
        let removed = self.l1.remove_matching(pattern);

        if let Some(remote) = self.remote.as_ref()
            && self.remote_breaker.try_acquire().is_ok()
        {
            match remote.delete_matching(pattern).await {
                Ok(count) => {
                    self.remote_breaker.record_success();
                    tracing::debug!(pattern, remote_removed = count, "Remote invalidation");
                }
                Err(e) => {
                    CacheCounters::incr(&self.counters.remote_errors);
                    self.remote_breaker.record_failure();
                    tracing::warn!(pattern, error = %e, "Remote invalidation failed");
                }
            }
        }

        tracing::info!(pattern, l1_removed = removed, "Cache invalidation");
        removed
    }

    /// Counter snapshot.
    pub fn stats(&self) -> CacheStats {
        self.counters
            .snapshot(self.flights.len() as u64, self.l1.len() as u64)
    }

    /// Remote-tier health for the health endpoint: `None` when no remote
    /// is configured.
    pub async fn remote_ok(&self) -> Option<bool> {
        let remote = self.remote.as_ref()?;
        if self.remote_breaker.try_acquire().is_err() {
            return Some(false);
        }
        match remote.ping().await {
            Ok(()) => {
                self.remote_breaker.record_success();
                Some(true)
            }
            Err(_) => {
                self.remote_breaker.record_failure();
                Some(false)
            }
        }
    }

    /// Whether glob invalidation would touch the given key. Exposed for
    /// operator tooling.
    pub fn pattern_matches(pattern: &str, key: &str) -> bool {
        glob_match(pattern, key)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::cache::error::CacheResult;
    use crate::config::CacheConfig;

    /// In-process remote tier used to observe at-rest bytes and inject
    /// failures.
    #[derive(Default)]
    struct FakeRemote {
        store: DashMap<String, Vec<u8>>,
        fail_reads: std::sync::atomic::AtomicBool,
        gets: AtomicU32,
    }

    #[async_trait]
    impl RemoteTier for FakeRemote {
        async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(CacheError::Internal("injected".into()));
            }
            Ok(self.store.get(key).map(|v| v.clone()))
        }

        async fn set(&self, key: &str, blob: &[u8], _ttl: Duration) -> CacheResult<()> {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(CacheError::Internal("injected".into()));
            }
            self.store.insert(key.to_string(), blob.to_vec());
            Ok(())
        }

        async fn delete_matching(&self, pattern: &str) -> CacheResult<u64> {
            let before = self.store.len();
            self.store.retain(|k, _| !glob_match(pattern, k));
            Ok((before - self.store.len()) as u64)
        }

        async fn ping(&self) -> CacheResult<()> {
            Ok(())
        }
    }

    fn facade_with(config: CacheConfig, remote: Option<Arc<FakeRemote>>) -> CacheFacade {
        CacheFacade::new(&config, remote.map(|r| r as Arc<dyn RemoteTier>)).unwrap()
    }

    fn small_config(memory_cache_size: usize) -> CacheConfig {
        let mut config = CacheConfig::default();
        config.memory_cache_size = memory_cache_size;
        config
    }

    #[tokio::test]
    async fn test_set_then_get_roundtrip() {
        let facade = facade_with(small_config(10), None);
        let value = json!({"result": "hello", "n": 3});
        facade.set("k", &value, None).await;
        assert_eq!(facade.get("k").await, Some(value));
        assert_eq!(facade.stats().hits_l1, 1);
        assert_eq!(facade.stats().sets, 1);
    }

    #[tokio::test]
    async fn test_lru_eviction_scenario() {
        let facade = facade_with(small_config(3), None);
        facade.set("k1", &json!(1), None).await;
        facade.set("k2", &json!(2), None).await;
        facade.set("k3", &json!(3), None).await;
        facade.get("k1").await;
        facade.set("k4", &json!(4), None).await;

        assert_eq!(facade.get("k2").await, None);
        assert_eq!(facade.get("k1").await, Some(json!(1)));
        assert_eq!(facade.get("k3").await, Some(json!(3)));
        assert_eq!(facade.get("k4").await, Some(json!(4)));
        assert_eq!(facade.stats().evictions_lru, 1);
    }

    #[tokio::test]
    async fn test_ttl_expiry_counts() {
        let facade = facade_with(small_config(10), None);
        facade
            .set("x", &json!("v"), Some(Duration::from_millis(30)))
            .await;
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(facade.get("x").await, None);
        let stats = facade.stats();
        assert_eq!(stats.evictions_ttl, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn test_remote_promotion_on_l1_miss() {
        let remote = Arc::new(FakeRemote::default());
        let facade = facade_with(small_config(10), Some(remote.clone()));
        facade.set("k", &json!("warm"), None).await;

        // Fresh facade sharing the remote: L1 cold, remote warm.
        let cold = facade_with(small_config(10), Some(remote.clone()));
        assert_eq!(cold.get("k").await, Some(json!("warm")));
        assert_eq!(cold.stats().hits_remote, 1);

        // Promoted: second read is an L1 hit without touching the remote.
        let gets_before = remote.gets.load(Ordering::SeqCst);
        assert_eq!(cold.get("k").await, Some(json!("warm")));
        assert_eq!(cold.stats().hits_l1, 1);
        assert_eq!(remote.gets.load(Ordering::SeqCst), gets_before);
    }

    #[tokio::test]
    async fn test_encryption_at_rest() {
        let mut config = small_config(10);
        config.encryption_key = Some(fernet::Fernet::generate_key());
        config.compression_threshold = None;
        let remote = Arc::new(FakeRemote::default());
        let facade = facade_with(config, Some(remote.clone()));

        let secret = "confidential content nobody should read at rest";
        facade.set("k", &json!({ "text": secret }), None).await;

        let blob = remote.store.get("k").map(|v| v.clone()).unwrap();
        for window in secret.as_bytes().windows(16) {
            assert!(
                !blob.windows(window.len()).any(|w| w == window),
                "plaintext visible in remote blob"
            );
        }
        assert_eq!(facade.get("k").await, Some(json!({ "text": secret })));
    }

    #[tokio::test]
    async fn test_decryption_failure_is_a_miss() {
        let key_a = fernet::Fernet::generate_key();
        let key_b = fernet::Fernet::generate_key();
        let remote = Arc::new(FakeRemote::default());

        let mut config = small_config(10);
        config.encryption_key = Some(key_a);
        let writer = facade_with(config, Some(remote.clone()));
        writer.set("k", &json!("secret"), None).await;

        let mut config = small_config(10);
        config.encryption_key = Some(key_b);
        let reader = facade_with(config, Some(remote.clone()));
        assert_eq!(reader.get("k").await, None);
        let stats = reader.stats();
        assert_eq!(stats.decryption_failures, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn test_remote_failure_degrades_to_l1() {
        let remote = Arc::new(FakeRemote::default());
        let facade = facade_with(small_config(10), Some(remote.clone()));
        facade.set("k", &json!("v"), None).await;

        remote.fail_reads.store(true, Ordering::SeqCst);

        // L1 still serves the key.
        assert_eq!(facade.get("k").await, Some(json!("v")));
        // Unknown keys are plain misses, not errors.
        assert_eq!(facade.get("unknown").await, None);
        assert!(facade.stats().remote_errors >= 1);
    }

    #[tokio::test]
    async fn test_remote_breaker_short_circuits_after_failures() {
        let remote = Arc::new(FakeRemote::default());
        let facade = facade_with(small_config(10), Some(remote.clone()));
        remote.fail_reads.store(true, Ordering::SeqCst);

        for _ in 0..REMOTE_BREAKER_THRESHOLD {
            facade.get("miss").await;
        }
        let gets_before = remote.gets.load(Ordering::SeqCst);
        facade.get("miss").await;
        assert_eq!(
            remote.gets.load(Ordering::SeqCst),
            gets_before,
            "breaker should skip remote I/O while open"
        );
    }

    #[tokio::test]
    async fn test_single_flight_producer_runs_once() {
        let facade = Arc::new(facade_with(small_config(10), None));
        let calls = Arc::new(AtomicU32::new(0));

        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let facade = facade.clone();
                let calls = calls.clone();
                tokio::spawn(async move {
                    facade
                        .get_or_compute("k", Duration::from_secs(60), move || async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            Ok(ComputedValue::store(json!(42)))
                        })
                        .await
                })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap(), json!(42));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1, "producer must run once");
        assert_eq!(facade.stats().misses, 1);
    }

    #[tokio::test]
    async fn test_single_flight_error_propagates_and_nothing_cached() {
        let facade = Arc::new(facade_with(small_config(10), None));
        let calls = Arc::new(AtomicU32::new(0));

        let tasks: Vec<_> = (0..5)
            .map(|_| {
                let facade = facade.clone();
                let calls = calls.clone();
                tokio::spawn(async move {
                    facade
                        .get_or_compute("k", Duration::from_secs(60), move || async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(30)).await;
                            Err::<ComputedValue, _>(ServiceError::TransientAi("boom".into()))
                        })
                        .await
                })
            })
            .collect();

        for task in tasks {
            let err = task.await.unwrap().unwrap_err();
            assert_eq!(err, ServiceError::TransientAi("boom".into()));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(facade.get("k").await, None);
    }

    #[tokio::test]
    async fn test_single_flight_cached_value_skips_producer() {
        let facade = facade_with(small_config(10), None);
        facade.set("k", &json!("cached"), None).await;

        let result = facade
            .get_or_compute("k", Duration::from_secs(60), || async {
                panic!("producer must not run for cached keys")
            })
            .await
            .unwrap();
        assert_eq!(result, json!("cached"));
    }

    #[tokio::test]
    async fn test_transient_computed_value_not_cached() {
        let facade = facade_with(small_config(10), None);

        let result = facade
            .get_or_compute("k", Duration::from_secs(60), || async {
                Ok(ComputedValue::transient(json!("degraded")))
            })
            .await
            .unwrap();
        assert_eq!(result, json!("degraded"));
        assert_eq!(facade.get("k").await, None, "transient values are not stored");
    }

    #[tokio::test]
    async fn test_invalidate_glob() {
        let facade = facade_with(small_config(10), None);
        facade.set("v1|summarize|a||", &json!(1), None).await;
        facade.set("v1|summarize|b||", &json!(2), None).await;
        facade.set("v1|qa|a||q", &json!(3), None).await;

        let removed = facade.invalidate("v1|summarize|*").await;
        assert_eq!(removed, 2);
        assert_eq!(facade.get("v1|qa|a||q").await, Some(json!(3)));
    }

    #[tokio::test]
    async fn test_smart_promotion_skips_large_entries() {
        let mut config = small_config(10);
        config.compression_threshold = Some(64);
        let mut ai = crate::config::AiCacheConfig::default();
        ai.smart_promotion = true;
        config.ai = Some(ai);

        let remote = Arc::new(FakeRemote::default());
        let writer = facade_with(small_config(10), Some(remote.clone()));
        let big = json!({ "text": "x".repeat(500) });
        let tiny = json!("t");
        writer.set("big", &big, None).await;
        writer.set("tiny", &tiny, None).await;

        let reader = facade_with(config, Some(remote.clone()));
        assert_eq!(reader.get("big").await, Some(big));
        assert_eq!(reader.get("tiny").await, Some(tiny.clone()));

        // The small entry was promoted, the large one was not.
        let gets_before = remote.gets.load(Ordering::SeqCst);
        reader.get("tiny").await;
        assert_eq!(remote.gets.load(Ordering::SeqCst), gets_before);
        reader.get("big").await;
        assert_eq!(remote.gets.load(Ordering::SeqCst), gets_before + 1);
    }
}
