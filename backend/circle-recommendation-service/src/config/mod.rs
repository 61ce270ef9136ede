use crate::error::{RecommendationError, Result};
use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub redis: RedisConfig,
    pub cache: CacheConfig,
    pub fusion: FusionConfig,
    pub behavioral: BehavioralConfig,
    pub collaborative: CollaborativeConfig,
    pub feedback: FeedbackConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    pub key_prefix: String,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackend {
    Memory,
    Redis,
}

impl FromStr for CacheBackend {
    type Err = RecommendationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(CacheBackend::Memory),
            "redis" => Ok(CacheBackend::Redis),
            other => Err(RecommendationError::Configuration(format!(
                "unknown similarity cache backend '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    pub similarity_ttl_secs: u64,
}

impl CacheConfig {
    pub fn similarity_ttl(&self) -> Duration {
        Duration::from_secs(self.similarity_ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Memory,
            similarity_ttl_secs: 1800, // 30 分
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FusionConfig {
    pub max_limit: usize,
    pub source_timeout_ms: u64,
    /// Each source is asked for `limit * candidate_multiplier` hits
    pub candidate_multiplier: usize,
    pub collaborative_base_score: f64,
    pub behavioral_base_score: f64,
    pub popularity_threshold: u32,
    pub popularity_bonus: f64,
    pub high_popularity_threshold: u32,
    pub high_popularity_bonus: f64,
    pub diversity_base_score: f64,
    pub new_group_days: i64,
    pub new_group_reason_weight: f64,
    pub exploration_rate: f64,
}

impl FusionConfig {
    pub fn source_timeout(&self) -> Duration {
        Duration::from_millis(self.source_timeout_ms)
    }

    /// Popularity bonus, independent of the weight policy
    pub fn popularity_bonus_for(&self, member_count: u32) -> f64 {
        if member_count > self.high_popularity_threshold {
            self.high_popularity_bonus
        } else if member_count > self.popularity_threshold {
            self.popularity_bonus
        } else {
            0.0
        }
    }
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            max_limit: 50,
            source_timeout_ms: 2000,
            candidate_multiplier: 2,
            collaborative_base_score: 0.8,
            behavioral_base_score: 0.7,
            popularity_threshold: 20,
            popularity_bonus: 0.10,
            high_popularity_threshold: 50,
            high_popularity_bonus: 0.15,
            diversity_base_score: 0.3,
            new_group_days: 30,
            new_group_reason_weight: 0.05,
            exploration_rate: 0.0, // disabled
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BehavioralConfig {
    pub window_days: i64,
    pub decay_days: f64,
    pub top_groups: usize,
}

impl Default for BehavioralConfig {
    fn default() -> Self {
        Self {
            window_days: 30,
            decay_days: 7.0,
            top_groups: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollaborativeConfig {
    pub min_similarity: f64,
    pub min_shared_categories: usize,
    /// Cap on users that pass the category pre-filter
    pub max_candidate_users: usize,
    /// Cap on similar users whose memberships are counted
    pub max_similar_users: usize,
}

impl Default for CollaborativeConfig {
    fn default() -> Self {
        Self {
            min_similarity: 0.3,
            min_shared_categories: 2,
            max_candidate_users: 100,
            max_similar_users: 20,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedbackConfig {
    pub window_days: i64,
    pub boost_rate: f64,
    pub dampen_rate: f64,
    pub min_factor: f64,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            window_days: 60,
            boost_rate: 0.1,
            dampen_rate: 0.1,
            min_factor: 0.1,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig {
                service_name: "circle-recommendation-service".to_string(),
            },
            redis: RedisConfig {
                url: "redis://localhost:6379".to_string(),
                key_prefix: "circle_rec:".to_string(),
            },
            cache: CacheConfig::default(),
            fusion: FusionConfig::default(),
            behavioral: BehavioralConfig::default(),
            collaborative: CollaborativeConfig::default(),
            feedback: FeedbackConfig::default(),
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: &str) -> Result<T> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse().map_err(|_| {
        RecommendationError::Configuration(format!("{} has an invalid value: {}", name, raw))
    })
}

/// Upper bound for lookback windows, in days
const MAX_WINDOW_DAYS: i64 = 3650;

fn window_days_or(name: &str, default: &str) -> Result<i64> {
    let days: i64 = env_or(name, default)?;
    if !(1..=MAX_WINDOW_DAYS).contains(&days) {
        return Err(RecommendationError::Configuration(format!(
            "{} must be between 1 and {}, got {}",
            name, MAX_WINDOW_DAYS, days
        )));
    }
    Ok(days)
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let fusion_defaults = FusionConfig::default();

        Ok(Config {
            service: ServiceConfig {
                service_name: env::var("SERVICE_NAME")
                    .unwrap_or_else(|_| "circle-recommendation-service".to_string()),
            },
            redis: RedisConfig {
                url: env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string()),
                key_prefix: env::var("REDIS_KEY_PREFIX")
                    .unwrap_or_else(|_| "circle_rec:".to_string()),
            },
            cache: CacheConfig {
                backend: env_or("SIMILARITY_CACHE_BACKEND", "memory")?,
                similarity_ttl_secs: env_or("SIMILARITY_CACHE_TTL_SECS", "1800")?,
            },
            fusion: FusionConfig {
                max_limit: env_or("MAX_LIMIT", "50")?,
                source_timeout_ms: env_or("SOURCE_TIMEOUT_MS", "2000")?,
                exploration_rate: env_or("EXPLORATION_RATE", "0.0")?,
                ..fusion_defaults
            },
            behavioral: BehavioralConfig {
                window_days: window_days_or("BEHAVIORAL_WINDOW_DAYS", "30")?,
                decay_days: env_or("BEHAVIORAL_DECAY_DAYS", "7")?,
                top_groups: env_or("BEHAVIORAL_TOP_GROUPS", "5")?,
            },
            collaborative: CollaborativeConfig {
                min_similarity: env_or("COLLAB_MIN_SIMILARITY", "0.3")?,
                min_shared_categories: env_or("COLLAB_MIN_SHARED_CATEGORIES", "2")?,
                max_candidate_users: env_or("COLLAB_MAX_CANDIDATE_USERS", "100")?,
                max_similar_users: env_or("COLLAB_MAX_SIMILAR_USERS", "20")?,
            },
            feedback: FeedbackConfig {
                window_days: window_days_or("FEEDBACK_WINDOW_DAYS", "60")?,
                ..FeedbackConfig::default()
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_popularity_bonus_thresholds() {
        let config = FusionConfig::default();
        assert_eq!(config.popularity_bonus_for(20), 0.0);
        assert!((config.popularity_bonus_for(21) - 0.10).abs() < 0.001);
        assert!((config.popularity_bonus_for(50) - 0.10).abs() < 0.001);
        assert!((config.popularity_bonus_for(51) - 0.15).abs() < 0.001);
    }

    #[test]
    fn test_cache_backend_parsing() {
        assert_eq!("Redis".parse::<CacheBackend>().unwrap(), CacheBackend::Redis);
        assert!("memcached".parse::<CacheBackend>().is_err());
    }

    #[test]
    fn test_env_or_reports_bad_values() {
        env::set_var("CIRCLE_REC_TEST_BAD_LIMIT", "many");
        let result: Result<usize> = env_or("CIRCLE_REC_TEST_BAD_LIMIT", "50");
        assert!(matches!(result, Err(RecommendationError::Configuration(_))));

        let fallback: usize = env_or("CIRCLE_REC_TEST_UNSET", "50").unwrap();
        assert_eq!(fallback, 50);
    }

    #[test]
    fn test_window_days_out_of_range_is_rejected() {
        env::set_var("CIRCLE_REC_TEST_HUGE_WINDOW", "9223372036854775807");
        let result = window_days_or("CIRCLE_REC_TEST_HUGE_WINDOW", "30");
        assert!(matches!(result, Err(RecommendationError::Configuration(_))));

        env::set_var("CIRCLE_REC_TEST_NEGATIVE_WINDOW", "-5");
        assert!(window_days_or("CIRCLE_REC_TEST_NEGATIVE_WINDOW", "30").is_err());

        assert_eq!(window_days_or("CIRCLE_REC_TEST_UNSET_WINDOW", "30").unwrap(), 30);
    }
}
