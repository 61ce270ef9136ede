// ============================================
// Weight Policy (動的重み計算)
// ============================================
//
// Baseline: hierarchical 0.70 / collaborative 0.15 / behavioral 0.10 / diversity 0.05
//
// Adjustments, each applied independently:
//   new user    (< 7 days)                : hier +0.15, collab -0.10, beh -0.05
//   active user (> 10 interactions / 7d)  : collab +0.08, hier -0.05, beh -0.03
//   sparse data (< 3 interests)           : div +0.05, collab -0.05
//
// Weights are additive and not renormalized; each is clamped at 0.

use crate::models::{Algorithm, FusionWeights, RecommendationContext, ScoreSourceKind};
use crate::utils::days_between;
use chrono::Duration;
use serde::Serialize;

/// Coarse user profile the policy is derived from
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct UserProfileSummary {
    pub days_since_joined: i64,
    pub interest_count: usize,
    pub recent_interaction_count: usize,
}

impl UserProfileSummary {
    pub fn from_context(ctx: &RecommendationContext) -> Self {
        let recent_start = ctx.now - Duration::days(7);
        Self {
            days_since_joined: days_between(ctx.user.registered_at, ctx.now),
            interest_count: ctx.user.selections.len(),
            recent_interaction_count: ctx
                .user_interactions()
                .filter(|e| e.occurred_at >= recent_start)
                .count(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct ProfileFlags {
    pub is_new_user: bool,
    pub is_active_user: bool,
    pub has_limited_data: bool,
}

impl FusionWeights {
    pub fn baseline() -> Self {
        Self {
            hierarchical: 0.70,
            collaborative: 0.15,
            behavioral: 0.10,
            diversity: 0.05,
        }
    }

    /// Weight 1.0 for one source, zero elsewhere (diversity included)
    pub fn single_source(source: ScoreSourceKind) -> Self {
        Self {
            hierarchical: if source == ScoreSourceKind::Hierarchical { 1.0 } else { 0.0 },
            collaborative: if source == ScoreSourceKind::Collaborative { 1.0 } else { 0.0 },
            behavioral: if source == ScoreSourceKind::Behavioral { 1.0 } else { 0.0 },
            diversity: 0.0,
        }
    }

    fn clamped(self) -> Self {
        Self {
            hierarchical: self.hierarchical.max(0.0),
            collaborative: self.collaborative.max(0.0),
            behavioral: self.behavioral.max(0.0),
            diversity: self.diversity.max(0.0),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WeightPolicy {
    pub baseline: FusionWeights,
    pub new_user_days: i64,
    pub active_interaction_threshold: usize,
    pub sparse_interest_threshold: usize,
}

impl Default for WeightPolicy {
    fn default() -> Self {
        Self {
            baseline: FusionWeights::baseline(),
            new_user_days: 7,
            active_interaction_threshold: 10,
            sparse_interest_threshold: 3,
        }
    }
}

impl WeightPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flags(&self, profile: &UserProfileSummary) -> ProfileFlags {
        ProfileFlags {
            is_new_user: profile.days_since_joined < self.new_user_days,
            is_active_user: profile.recent_interaction_count > self.active_interaction_threshold,
            has_limited_data: profile.interest_count < self.sparse_interest_threshold,
        }
    }

    pub fn weights(&self, profile: &UserProfileSummary) -> FusionWeights {
        let flags = self.flags(profile);
        let mut w = self.baseline;

        if flags.is_new_user {
            w.hierarchical += 0.15;
            w.collaborative -= 0.10;
            w.behavioral -= 0.05;
        }

        if flags.is_active_user {
            w.collaborative += 0.08;
            w.hierarchical -= 0.05;
            w.behavioral -= 0.03;
        }

        if flags.has_limited_data {
            w.diversity += 0.05;
            w.collaborative -= 0.05;
        }

        w.clamped()
    }

    pub fn for_algorithm(&self, algorithm: Algorithm, profile: &UserProfileSummary) -> FusionWeights {
        match algorithm {
            Algorithm::Smart => self.weights(profile),
            Algorithm::Content => FusionWeights::single_source(ScoreSourceKind::Hierarchical),
            Algorithm::Collaborative => FusionWeights::single_source(ScoreSourceKind::Collaborative),
            Algorithm::Behavioral => FusionWeights::single_source(ScoreSourceKind::Behavioral),
        }
    }
}
