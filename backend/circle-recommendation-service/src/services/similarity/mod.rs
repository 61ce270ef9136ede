// ============================================
// Similarity Index (ユーザー類似度)
// ============================================
//
// Each user becomes a sparse vector: one dimension per selected interest
// node, valued at that node's level weight. Similarity is cosine over
// these vectors.
//
// Results are cached per unordered user pair and method through the
// SimilarityCache port. A miss recomputes and stores; a hit is returned
// unchanged. Concurrent recomputation of the same pair is harmless
// (same inputs, last write wins).

mod memory_cache;
mod redis_cache;

pub use memory_cache::InMemorySimilarityCache;
pub use redis_cache::RedisSimilarityCache;

use crate::error::SimilarityError;
use crate::models::{InterestSelection, UserSimilarity, UserSnapshot};
use crate::utils::sparse_cosine;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub type Result<T> = std::result::Result<T, SimilarityError>;

pub type InterestVector = HashMap<String, f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimilarityMethod {
    Cosine,
}

impl SimilarityMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SimilarityMethod::Cosine => "cosine",
        }
    }
}

/// Cache key for an unordered user pair and a method
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SimilarityKey {
    low: String,
    high: String,
    method: &'static str,
}

impl SimilarityKey {
    pub fn new(a: &str, b: &str, method: SimilarityMethod) -> Result<Self> {
        if a == b {
            return Err(SimilarityError::SelfPair(a.to_string()));
        }
        let (low, high) = if a < b { (a, b) } else { (b, a) };
        Ok(Self {
            low: low.to_string(),
            high: high.to_string(),
            method: method.as_str(),
        })
    }

    pub fn users(&self) -> (&str, &str) {
        (&self.low, &self.high)
    }

    pub fn method(&self) -> &str {
        self.method
    }

    pub fn involves(&self, user_id: &str) -> bool {
        self.low == user_id || self.high == user_id
    }

    /// Flat string form, e.g. `user_sim:cosine:alice:bob`
    pub fn as_cache_key(&self) -> String {
        format!("user_sim:{}:{}:{}", self.method, self.low, self.high)
    }
}

/// Cache port for pairwise similarity
#[async_trait]
pub trait SimilarityCache: Send + Sync {
    async fn get(&self, key: &SimilarityKey) -> Result<Option<UserSimilarity>>;
    async fn set(&self, key: &SimilarityKey, value: &UserSimilarity, ttl: Duration) -> Result<()>;
    async fn invalidate(&self, key: &SimilarityKey) -> Result<()>;
    /// Drop every cached pair involving the user; returns how many were removed
    async fn invalidate_user(&self, user_id: &str) -> Result<usize>;
}

#[derive(Debug, Default)]
pub struct SimilarityStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
}

pub struct SimilarityIndex {
    cache: Arc<dyn SimilarityCache>,
    ttl: Duration,
    method: SimilarityMethod,
    stats: SimilarityStats,
}

impl SimilarityIndex {
    pub fn new(cache: Arc<dyn SimilarityCache>, ttl: Duration) -> Self {
        Self {
            cache,
            ttl,
            method: SimilarityMethod::Cosine,
            stats: SimilarityStats::default(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn stats(&self) -> (u64, u64) {
        (
            self.stats.hits.load(Ordering::Relaxed),
            self.stats.misses.load(Ordering::Relaxed),
        )
    }

    pub fn vector(selections: &[InterestSelection]) -> InterestVector {
        selections
            .iter()
            .map(|s| (s.node_id.clone(), s.level.weight()))
            .collect()
    }

    /// Similarity without the cache
    pub fn compute(a: &UserSnapshot, b: &UserSnapshot) -> f64 {
        sparse_cosine(&Self::vector(&a.selections), &Self::vector(&b.selections))
    }

    /// Cached similarity of two distinct users
    pub async fn similarity(&self, a: &UserSnapshot, b: &UserSnapshot) -> Result<f64> {
        let key = SimilarityKey::new(&a.user_id, &b.user_id, self.method)?;

        if let Some(cached) = self.cache.get(&key).await? {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(cached.score);
        }
        self.stats.misses.fetch_add(1, Ordering::Relaxed);

        let score = Self::compute(a, b);
        let (low, high) = key.users();
        let record = UserSimilarity {
            user_a: low.to_string(),
            user_b: high.to_string(),
            score,
            method: key.method().to_string(),
            computed_at: Utc::now(),
        };
        self.cache.set(&key, &record, self.ttl).await?;

        debug!(
            user_a = %record.user_a,
            user_b = %record.user_b,
            score = score,
            "Computed user similarity"
        );

        Ok(score)
    }

    /// Call when a user's interests change materially
    pub async fn invalidate_user(&self, user_id: &str) -> Result<usize> {
        self.cache.invalidate_user(user_id).await
    }
}
