use crate::error::{RecommendationError, Result};
use crate::models::{Algorithm, FeedbackKind, RecommendationFeedback};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::info;

/// Append-only destination for recommendation feedback
#[async_trait]
pub trait FeedbackSink: Send + Sync {
    async fn record(&self, feedback: RecommendationFeedback) -> Result<()>;
}

pub fn validate_feedback(feedback: &RecommendationFeedback) -> Result<()> {
    if feedback.user_id.trim().is_empty() || feedback.group_id.trim().is_empty() {
        return Err(RecommendationError::InvalidFeedback(
            "user_id and group_id are required".to_string(),
        ));
    }
    if !feedback.score_at_time.is_finite() || !(0.0..=1.0).contains(&feedback.score_at_time) {
        return Err(RecommendationError::InvalidFeedback(format!(
            "score_at_time must be within 0.0-1.0, got {}",
            feedback.score_at_time
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct AlgorithmMetrics {
    pub counts: HashMap<FeedbackKind, usize>,
    /// clicks / views
    pub click_through_rate: f64,
    /// join_success / views
    pub join_rate: f64,
}

/// In-memory feedback log
#[derive(Default)]
pub struct InMemoryFeedbackLog {
    records: RwLock<Vec<RecommendationFeedback>>,
}

impl InMemoryFeedbackLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn for_user(&self, user_id: &str) -> Vec<RecommendationFeedback> {
        self.records
            .read()
            .await
            .iter()
            .filter(|f| f.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Per-algorithm feedback counts and rates
    pub async fn metrics(&self) -> HashMap<Algorithm, AlgorithmMetrics> {
        let records = self.records.read().await;
        let mut metrics: HashMap<Algorithm, AlgorithmMetrics> = HashMap::new();

        for record in records.iter() {
            *metrics
                .entry(record.algorithm)
                .or_default()
                .counts
                .entry(record.kind)
                .or_insert(0) += 1;
        }

        for m in metrics.values_mut() {
            let views = m.counts.get(&FeedbackKind::View).copied().unwrap_or(0);
            if views > 0 {
                let clicks = m.counts.get(&FeedbackKind::Click).copied().unwrap_or(0);
                let joins = m.counts.get(&FeedbackKind::JoinSuccess).copied().unwrap_or(0);
                m.click_through_rate = clicks as f64 / views as f64;
                m.join_rate = joins as f64 / views as f64;
            }
        }

        metrics
    }
}

#[async_trait]
impl FeedbackSink for InMemoryFeedbackLog {
    async fn record(&self, feedback: RecommendationFeedback) -> Result<()> {
        validate_feedback(&feedback)?;

        info!(
            user_id = %feedback.user_id,
            group_id = %feedback.group_id,
            kind = feedback.kind.as_str(),
            algorithm = feedback.algorithm.as_str(),
            "Recorded recommendation feedback"
        );

        self.records.write().await.push(feedback);
        Ok(())
    }
}
