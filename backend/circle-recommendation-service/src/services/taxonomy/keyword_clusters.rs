use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Topic clusters used by name-based fallback matching.
///
/// Two names are related when each contains a keyword of the same cluster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeywordClusters {
    clusters: Vec<(String, Vec<String>)>,
}

static DEFAULT_CLUSTERS: Lazy<KeywordClusters> = Lazy::new(|| {
    KeywordClusters::new()
        .with_cluster(
            "technology",
            &["technology", "tech", "programming", "ios", "app", "development", "web", "design", "code"],
        )
        .with_cluster(
            "art",
            &["art", "creative", "design", "illustration", "photo", "video", "music"],
        )
        .with_cluster(
            "sport",
            &["sport", "soccer", "football", "futsal", "exercise", "fitness"],
        )
        .with_cluster(
            "learning",
            &["learning", "reading", "study", "knowledge", "education"],
        )
});

impl Default for KeywordClusters {
    fn default() -> Self {
        DEFAULT_CLUSTERS.clone()
    }
}

impl KeywordClusters {
    /// Empty table; no names are related
    pub fn new() -> Self {
        Self {
            clusters: Vec::new(),
        }
    }

    pub fn with_cluster(mut self, name: &str, keywords: &[&str]) -> Self {
        self.clusters.push((
            name.to_string(),
            keywords.iter().map(|k| k.to_lowercase()).collect(),
        ));
        self
    }

    pub fn cluster_names(&self) -> impl Iterator<Item = &str> {
        self.clusters.iter().map(|(name, _)| name.as_str())
    }

    /// Both (lowercased) names fall into at least one common cluster
    pub fn related(&self, a: &str, b: &str) -> bool {
        self.clusters.iter().any(|(_, keywords)| {
            keywords.iter().any(|k| a.contains(k.as_str()))
                && keywords.iter().any(|k| b.contains(k.as_str()))
        })
    }
}
