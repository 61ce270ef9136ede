pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use error::{RecommendationError, Result};
pub use services::{
    FeedbackLearner, FusionOrchestrator, HierarchicalMatcher, InterestHierarchyIndex,
    KeywordClusters, ScoreSource, SimilarityCache, WeightPolicy,
};
