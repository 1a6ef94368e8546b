use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::debug;
use relay_core::cache::CacheStore;
use relay_core::{CoreError, CoreResult};

use crate::error::StoreError;

/// Simulation cache backed by Redis string keys with expiry
#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
    timeout: Duration,
}

impl RedisClient {
    pub fn new(connection_string: &str, timeout: Duration) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client, timeout })
    }

    async fn bounded<T, F>(&self, op: F) -> CoreResult<T>
    where
        F: Future<Output = Result<T, redis::RedisError>>,
    {
        match tokio::time::timeout(self.timeout, op).await {
            Ok(result) => result.map_err(|e| CoreError::from(StoreError::from(e))),
            Err(_) => Err(StoreError::Timeout(self.timeout.as_secs()).into()),
        }
    }
}

#[async_trait]
impl CacheStore for RedisClient {
    async fn get(&self, key: &str) -> CoreResult<Option<String>> {
        let value = self
            .bounded(async {
                let mut conn = self.client.get_multiplexed_async_connection().await?;
                conn.get::<_, Option<String>>(key).await
            })
            .await?;
        debug!(key = %key, hit = value.is_some(), "Cache lookup");
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> CoreResult<()> {
        self.bounded(async {
            let mut conn = self.client.get_multiplexed_async_connection().await?;
            conn.set_ex::<_, _, ()>(key, value, ttl_seconds).await
        })
        .await
    }
}
