use super::{Result, SimilarityCache, SimilarityKey};
use crate::models::UserSimilarity;
use async_trait::async_trait;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::debug;

/// Redis key prefixes
const PAIR_KEY: &str = "user_sim:";
const USER_INDEX_KEY: &str = "user_sim_index:";

/// Redis-backed similarity cache.
///
/// Pairs are stored as JSON with `SET EX`. A per-user set indexes the
/// pair keys so all pairs of a user can be dropped when their interests change.
pub struct RedisSimilarityCache {
    redis_client: redis::Client,
    prefix: String,
}

impl RedisSimilarityCache {
    pub fn new(redis_client: redis::Client, prefix: impl Into<String>) -> Self {
        Self {
            redis_client,
            prefix: prefix.into(),
        }
    }

    fn pair_key(&self, key: &SimilarityKey) -> String {
        let (low, high) = key.users();
        format!("{}{}{}:{}:{}", self.prefix, PAIR_KEY, key.method(), low, high)
    }

    fn user_index_key(&self, user_id: &str) -> String {
        format!("{}{}{}", self.prefix, USER_INDEX_KEY, user_id)
    }
}

#[async_trait]
impl SimilarityCache for RedisSimilarityCache {
    async fn get(&self, key: &SimilarityKey) -> Result<Option<UserSimilarity>> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;

        let raw: Option<String> = conn.get(self.pair_key(key)).await?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &SimilarityKey, value: &UserSimilarity, ttl: Duration) -> Result<()> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;

        let pair_key = self.pair_key(key);
        let ttl_secs = ttl.as_secs().max(1);
        let json = serde_json::to_string(value)?;
        let _: () = conn.set_ex(&pair_key, json, ttl_secs).await?;

        let (low, high) = key.users();
        for user_id in [low, high] {
            let index_key = self.user_index_key(user_id);
            let _: () = conn.sadd(&index_key, &pair_key).await?;
            let _: () = conn.expire(&index_key, ttl_secs as i64).await?;
        }

        Ok(())
    }

    async fn invalidate(&self, key: &SimilarityKey) -> Result<()> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let _: () = conn.del(self.pair_key(key)).await?;
        Ok(())
    }

    async fn invalidate_user(&self, user_id: &str) -> Result<usize> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;

        let index_key = self.user_index_key(user_id);
        let pair_keys: Vec<String> = conn.smembers(&index_key).await?;
        if pair_keys.is_empty() {
            return Ok(0);
        }

        let removed: usize = conn.del(&pair_keys).await?;
        let _: () = conn.del(&index_key).await?;

        debug!(user_id = %user_id, removed = removed, "Invalidated cached similarities");
        Ok(removed)
    }
}
