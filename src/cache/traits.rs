use std::time::Duration;

use async_trait::async_trait;

use super::error::CacheResult;

/// Remote key-value tier behind the facade.
///
/// Implementations store opaque wire blobs (already compressed/encrypted by
/// the codec) under the facade's key namespace, with the store's native TTL.
#[async_trait]
pub trait RemoteTier: Send + Sync {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    async fn set(&self, key: &str, blob: &[u8], ttl: Duration) -> CacheResult<()>;

    /// Remove all keys matching a `*`-glob. Returns the number removed.
    async fn delete_matching(&self, pattern: &str) -> CacheResult<u64>;

    /// Cheap connectivity probe for health reporting.
    async fn ping(&self) -> CacheResult<()>;
}
