use super::{Result, SimilarityCache, SimilarityKey};
use crate::models::UserSimilarity;
use async_trait::async_trait;
use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Process-local similarity cache; entries expire lazily on read
#[derive(Default)]
pub struct InMemorySimilarityCache {
    entries: DashMap<SimilarityKey, (UserSimilarity, Instant)>,
}

impl InMemorySimilarityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl SimilarityCache for InMemorySimilarityCache {
    async fn get(&self, key: &SimilarityKey) -> Result<Option<UserSimilarity>> {
        let expired = match self.entries.get(key) {
            Some(entry) => {
                let (value, expires_at) = entry.value();
                if Instant::now() < *expires_at {
                    return Ok(Some(value.clone()));
                }
                true
            }
            None => false,
        };

        if expired {
            self.entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &SimilarityKey, value: &UserSimilarity, ttl: Duration) -> Result<()> {
        self.entries
            .insert(key.clone(), (value.clone(), Instant::now() + ttl));
        Ok(())
    }

    async fn invalidate(&self, key: &SimilarityKey) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn invalidate_user(&self, user_id: &str) -> Result<usize> {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.involves(user_id));
        Ok(before - self.entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::similarity::SimilarityMethod;
    use chrono::Utc;

    fn record(score: f64) -> UserSimilarity {
        UserSimilarity {
            user_a: "a".to_string(),
            user_b: "b".to_string(),
            score,
            method: "cosine".to_string(),
            computed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_expired_entries_are_dropped() {
        let cache = InMemorySimilarityCache::new();
        let key = SimilarityKey::new("a", "b", SimilarityMethod::Cosine).unwrap();

        cache.set(&key, &record(0.5), Duration::from_millis(0)).await.unwrap();
        assert!(cache.get(&key).await.unwrap().is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_invalidate_user_only_touches_their_pairs() {
        let cache = InMemorySimilarityCache::new();
        let ttl = Duration::from_secs(60);
        let ab = SimilarityKey::new("a", "b", SimilarityMethod::Cosine).unwrap();
        let ac = SimilarityKey::new("a", "c", SimilarityMethod::Cosine).unwrap();
        let bc = SimilarityKey::new("b", "c", SimilarityMethod::Cosine).unwrap();
        for key in [&ab, &ac, &bc] {
            cache.set(key, &record(0.5), ttl).await.unwrap();
        }

        assert_eq!(cache.invalidate_user("a").await.unwrap(), 2);
        assert!(cache.get(&bc).await.unwrap().is_some());
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_single_key() {
        let cache = InMemorySimilarityCache::new();
        let key = SimilarityKey::new("a", "b", SimilarityMethod::Cosine).unwrap();
        cache.set(&key, &record(0.7), Duration::from_secs(60)).await.unwrap();
        cache.invalidate(&key).await.unwrap();
        assert!(cache.get(&key).await.unwrap().is_none());
    }
}
