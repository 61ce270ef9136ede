pub mod behavioral;
pub mod collaborative;
pub mod diversity;
pub mod exploration;
pub mod feedback;
pub mod fusion;
pub mod matcher;
pub mod similarity;
pub mod taxonomy;
pub mod weights;

pub use behavioral::BehavioralScorer;
pub use collaborative::CollaborativeScorer;
pub use diversity::DiversityLayer;
pub use exploration::SeededExplorer;
pub use feedback::{FeedbackLearner, FeedbackSink, InMemoryFeedbackLog};
pub use fusion::{FusionOrchestrator, PreferencesReport, ScoreSource};
pub use matcher::HierarchicalMatcher;
pub use similarity::{InMemorySimilarityCache, RedisSimilarityCache, SimilarityCache, SimilarityIndex};
pub use taxonomy::{InterestHierarchyIndex, KeywordClusters};
pub use weights::WeightPolicy;
