// ============================================
// Feedback Learner (学習型調整)
// ============================================
//
// Folds the user's reactions to past recommendations (trailing 60 days)
// into per-node "preferred" and "disliked" totals, then re-orders a
// ranked list by a multiplicative factor per candidate:
//
//   preferred > disliked  →  × (1 + (preferred - disliked) × 0.1)
//   otherwise             →  × max(0.1, 1 - disliked × 0.1)
//
// The fused score is kept; only the ordering key changes.

mod sink;

pub use sink::{validate_feedback, AlgorithmMetrics, FeedbackSink, InMemoryFeedbackLog};

use crate::config::FeedbackConfig;
use crate::models::{Algorithm, CandidateGroup, GroupCatalog, RankedRecommendation, RecommendationFeedback};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct FeedbackPatterns {
    /// node id → accumulated positive weight
    pub preferred: HashMap<String, f64>,
    /// node id → accumulated |negative weight|
    pub disliked: HashMap<String, f64>,
    pub successful_algorithms: HashMap<Algorithm, f64>,
    pub feedback_count: usize,
}

impl FeedbackPatterns {
    pub fn is_empty(&self) -> bool {
        self.preferred.is_empty() && self.disliked.is_empty()
    }
}

pub struct FeedbackLearner {
    config: FeedbackConfig,
}

impl FeedbackLearner {
    pub fn new(config: FeedbackConfig) -> Self {
        Self { config }
    }

    /// Nodes a feedback record is attributed to: each declared tag and its category
    pub fn attribution_nodes(group: &CandidateGroup) -> Vec<String> {
        let mut nodes: Vec<String> = Vec::new();
        for path in group.interests.iter().filter_map(|i| i.path()) {
            for node in [path.leaf(), path.category.as_str()] {
                if !nodes.iter().any(|n| n == node) {
                    nodes.push(node.to_string());
                }
            }
        }
        nodes
    }

    pub fn patterns<'a>(
        &self,
        feedback: impl IntoIterator<Item = &'a RecommendationFeedback>,
        groups: &GroupCatalog,
        now: DateTime<Utc>,
    ) -> FeedbackPatterns {
        let window_start = now - Duration::days(self.config.window_days);
        let mut patterns = FeedbackPatterns::default();

        for record in feedback {
            if record.created_at < window_start {
                continue;
            }
            patterns.feedback_count += 1;

            let weight = record.kind.weight();
            if weight == 0.0 {
                continue;
            }

            if weight > 0.0 {
                *patterns
                    .successful_algorithms
                    .entry(record.algorithm)
                    .or_insert(0.0) += weight;
            }

            let Some(group) = groups.get(&record.group_id) else {
                debug!(group_id = %record.group_id, "Feedback for unknown group skipped");
                continue;
            };

            for node in Self::attribution_nodes(group) {
                let bucket = if weight > 0.0 {
                    &mut patterns.preferred
                } else {
                    &mut patterns.disliked
                };
                *bucket.entry(node).or_insert(0.0) += weight.abs();
            }
        }

        patterns
    }

    pub fn adjustment_factor(&self, patterns: &FeedbackPatterns, group: &CandidateGroup) -> f64 {
        let mut factor = 1.0;

        for node in Self::attribution_nodes(group) {
            let preferred = patterns.preferred.get(&node).copied().unwrap_or(0.0);
            let disliked = patterns.disliked.get(&node).copied().unwrap_or(0.0);

            if preferred > disliked {
                factor *= 1.0 + (preferred - disliked) * self.config.boost_rate;
            } else {
                factor *= (1.0 - disliked * self.config.dampen_rate).max(self.config.min_factor);
            }
        }

        factor.max(self.config.min_factor)
    }

    /// Set `adjusted_score` and re-sort; ties keep their incoming order
    pub fn adjust(
        &self,
        mut recommendations: Vec<RankedRecommendation>,
        patterns: &FeedbackPatterns,
        groups: &GroupCatalog,
    ) -> Vec<RankedRecommendation> {
        for rec in recommendations.iter_mut() {
            let factor = groups
                .get(&rec.group_id)
                .map(|g| self.adjustment_factor(patterns, g))
                .unwrap_or(1.0);
            rec.adjusted_score = rec.score * factor;
        }

        recommendations.sort_by(|a, b| {
            b.adjusted_score
                .partial_cmp(&a.adjusted_score)
                .unwrap_or(Ordering::Equal)
        });
        recommendations
    }
}
