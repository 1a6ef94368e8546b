use async_trait::async_trait;

use crate::CoreResult;

/// Key/value store with per-entry expiry. Never a source of truth: losing
/// an entry only forces recomputation.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> CoreResult<Option<String>>;

    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> CoreResult<()>;
}
