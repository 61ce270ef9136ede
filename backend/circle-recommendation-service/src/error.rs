use thiserror::Error;

pub type Result<T> = std::result::Result<T, RecommendationError>;

#[derive(Debug, Error)]
pub enum RecommendationError {
    #[error("Invalid algorithm '{0}'. Choose from: smart, content, collaborative, behavioral")]
    InvalidAlgorithm(String),

    #[error("Limit must be between 1 and {max}, got {got}")]
    InvalidLimit { got: usize, max: usize },

    #[error("Diversity factor must be within 0.0-1.0, got {0}")]
    InvalidDiversityFactor(f64),

    #[error("Invalid feedback: {0}")]
    InvalidFeedback(String),

    #[error("Request is for user '{requested}' but the snapshot belongs to '{snapshot}'")]
    UserMismatch { requested: String, snapshot: String },

    #[error("Taxonomy error: {0}")]
    Taxonomy(#[from] TaxonomyError),

    #[error("Similarity error: {0}")]
    Similarity(#[from] SimilarityError),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Redis error: {0}")]
    Redis(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Score source {source_name} failed: {message}")]
    SourceFault {
        source_name: &'static str,
        message: String,
    },

    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RecommendationError {
    /// Validation failures are the only errors the orchestrator lets reach the caller.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            RecommendationError::InvalidAlgorithm(_)
                | RecommendationError::InvalidLimit { .. }
                | RecommendationError::InvalidDiversityFactor(_)
                | RecommendationError::InvalidFeedback(_)
                | RecommendationError::UserMismatch { .. }
        )
    }
}

/// Errors raised while building or querying the interest taxonomy
#[derive(Debug, Error, PartialEq)]
pub enum TaxonomyError {
    #[error("Unknown interest node: {0}")]
    UnknownNode(String),

    #[error("Duplicate interest node: {0}")]
    DuplicateNode(String),

    #[error("Node {child} cannot be attached under {parent}: expected a {expected} parent")]
    InvalidParent {
        child: String,
        parent: String,
        expected: &'static str,
    },

    #[error("Intensity must be between 1 and 5, got {0}")]
    InvalidIntensity(u8),
}

/// Errors raised by the similarity index and its cache port
#[derive(Debug, Error)]
pub enum SimilarityError {
    #[error("Self-similarity is not defined for user {0}")]
    SelfPair(String),

    #[error("Similarity cache unavailable: {0}")]
    CacheUnavailable(String),
}

// Implement conversions from other error types
impl From<redis::RedisError> for RecommendationError {
    fn from(err: redis::RedisError) -> Self {
        RecommendationError::Redis(err.to_string())
    }
}

impl From<serde_json::Error> for RecommendationError {
    fn from(err: serde_json::Error) -> Self {
        RecommendationError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for RecommendationError {
    fn from(err: anyhow::Error) -> Self {
        RecommendationError::Internal(err.to_string())
    }
}

impl From<redis::RedisError> for SimilarityError {
    fn from(err: redis::RedisError) -> Self {
        SimilarityError::CacheUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for SimilarityError {
    fn from(err: serde_json::Error) -> Self {
        SimilarityError::CacheUnavailable(err.to_string())
    }
}
