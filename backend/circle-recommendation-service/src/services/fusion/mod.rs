// ============================================
// Fusion Orchestrator (スコア統合)
// ============================================
//
// One request runs six stages in order:
//   1. Gather    - every source with a positive weight, concurrently, each under a timeout
//   2. Fuse      - score × weight per source, plus the popularity bonus
//   3. Diversify - even share per primary category, bonus 0.3 × diversity weight
//   4. Rank      - fused score desc, member count desc, id asc; top `limit`
//   5. Adjust    - FeedbackLearner re-ordering
//   6. Explain   - up to five reasons per result
//
// Source faults never reach the caller. When nothing is gathered, every
// eligible group is ranked by popularity alone.

mod explain;
mod sources;

pub use explain::ReasonGenerator;
pub use sources::{BehavioralSource, CollaborativeSource, HierarchicalSource, ScoreSource};

#[cfg(test)]
pub use sources::MockScoreSource;

use crate::config::{Config, FusionConfig};
use crate::error::{RecommendationError, Result};
use crate::models::{
    CandidateGroup, FusionWeights, RankedRecommendation, RecommendationContext,
    RecommendationRequest, RecommendationResponse, ScoreBreakdown, ScoreSourceKind, SourceHit,
};
use crate::services::behavioral::BehavioralScorer;
use crate::services::collaborative::CollaborativeScorer;
use crate::services::diversity::{DiversityCandidate, DiversityLayer};
use crate::services::exploration::SeededExplorer;
use crate::services::feedback::{FeedbackLearner, FeedbackPatterns};
use crate::services::matcher::HierarchicalMatcher;
use crate::services::similarity::{SimilarityCache, SimilarityIndex};
use crate::services::taxonomy::{InterestHierarchyIndex, KeywordClusters};
use crate::services::weights::{ProfileFlags, UserProfileSummary, WeightPolicy};
use crate::utils::with_timeout;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Learned preferences and the weights the policy would use right now
#[derive(Debug, Clone, Serialize)]
pub struct PreferencesReport {
    pub user_id: String,
    pub profile: UserProfileSummary,
    pub flags: ProfileFlags,
    pub algorithm_weights: FusionWeights,
    pub patterns: FeedbackPatterns,
    pub generated_at: DateTime<Utc>,
}

/// A group being fused, with the hits that put it there
struct FusedCandidate<'a> {
    group: &'a CandidateGroup,
    breakdown: ScoreBreakdown,
    hits: Vec<SourceHit>,
}

impl<'a> FusedCandidate<'a> {
    fn new(group: &'a CandidateGroup) -> Self {
        Self {
            group,
            breakdown: ScoreBreakdown::default(),
            hits: Vec::new(),
        }
    }
}

#[derive(Default)]
struct GatherOutcome {
    hits: Vec<SourceHit>,
    degraded: Vec<ScoreSourceKind>,
}

pub struct FusionOrchestrator {
    sources: Vec<Box<dyn ScoreSource>>,
    policy: WeightPolicy,
    learner: FeedbackLearner,
    diversity: DiversityLayer,
    explorer: SeededExplorer,
    config: FusionConfig,
}

impl FusionOrchestrator {
    pub fn new(
        sources: Vec<Box<dyn ScoreSource>>,
        policy: WeightPolicy,
        learner: FeedbackLearner,
        config: FusionConfig,
    ) -> Self {
        Self {
            sources,
            policy,
            learner,
            diversity: DiversityLayer::new(config.diversity_base_score),
            explorer: SeededExplorer::new(config.exploration_rate),
            config,
        }
    }

    /// Wire the three built-in sources over a shared similarity cache
    pub fn from_config(
        config: &Config,
        taxonomy: Arc<InterestHierarchyIndex>,
        clusters: Arc<KeywordClusters>,
        cache: Arc<dyn SimilarityCache>,
    ) -> Self {
        let matcher = Arc::new(HierarchicalMatcher::new(taxonomy, clusters));
        let index = Arc::new(SimilarityIndex::new(cache, config.cache.similarity_ttl()));
        let collaborative = Arc::new(CollaborativeScorer::new(index, config.collaborative.clone()));
        let behavioral = Arc::new(BehavioralScorer::new(config.behavioral.clone()));

        let sources: Vec<Box<dyn ScoreSource>> = vec![
            Box::new(HierarchicalSource::new(matcher)),
            Box::new(CollaborativeSource::new(
                collaborative,
                config.fusion.collaborative_base_score,
            )),
            Box::new(BehavioralSource::new(
                behavioral,
                config.fusion.behavioral_base_score,
            )),
        ];

        Self::new(
            sources,
            WeightPolicy::default(),
            FeedbackLearner::new(config.feedback.clone()),
            config.fusion.clone(),
        )
    }

    /// Reject bad parameters before any scoring starts
    pub fn validate(&self, ctx: &RecommendationContext, request: &RecommendationRequest) -> Result<()> {
        if request.user_id != ctx.user.user_id {
            return Err(RecommendationError::UserMismatch {
                requested: request.user_id.clone(),
                snapshot: ctx.user.user_id.clone(),
            });
        }
        if request.limit == 0 || request.limit > self.config.max_limit {
            return Err(RecommendationError::InvalidLimit {
                got: request.limit,
                max: self.config.max_limit,
            });
        }
        if !request.diversity_factor.is_finite() || !(0.0..=1.0).contains(&request.diversity_factor) {
            return Err(RecommendationError::InvalidDiversityFactor(request.diversity_factor));
        }
        Ok(())
    }

    pub async fn recommend(
        &self,
        ctx: &RecommendationContext,
        request: &RecommendationRequest,
    ) -> Result<RecommendationResponse> {
        self.validate(ctx, request)?;
        let started = Instant::now();

        let profile = UserProfileSummary::from_context(ctx);
        let mut weights = self.policy.for_algorithm(request.algorithm, &profile);
        if request.diversity_factor == 0.0 {
            weights.diversity = 0.0;
        }

        let eligible: HashMap<&str, &CandidateGroup> = ctx
            .eligible_groups()
            .filter(|g| self.passes_filters(g, request, ctx.now))
            .map(|g| (g.id.as_str(), g))
            .collect();

        info!(
            user_id = %ctx.user.user_id,
            algorithm = request.algorithm.as_str(),
            limit = request.limit,
            eligible = eligible.len(),
            "Recommendation request started"
        );

        // 1. Gather
        let per_source_limit = request.limit * self.config.candidate_multiplier.max(1);
        let outcome = self.gather(ctx, &weights, per_source_limit).await;

        // 2. Fuse
        let mut fused: HashMap<&str, FusedCandidate> = HashMap::new();
        for hit in outcome.hits {
            let Some(group) = eligible.get(hit.group_id.as_str()).copied() else {
                continue;
            };
            let candidate = fused
                .entry(group.id.as_str())
                .or_insert_with(|| FusedCandidate::new(group));
            *candidate.breakdown.component_mut(hit.source) += hit.score * weights.for_source(hit.source);
            candidate.hits.push(hit);
        }

        let used_fallback = fused.is_empty() && !eligible.is_empty();
        if used_fallback {
            warn!(
                user_id = %ctx.user.user_id,
                degraded = outcome.degraded.len(),
                "No source produced candidates, ranking by popularity"
            );
            for group in eligible.values().copied() {
                fused.insert(group.id.as_str(), FusedCandidate::new(group));
            }
        }

        let mut ordered: Vec<FusedCandidate> = fused
            .into_values()
            .map(|mut candidate| {
                candidate.breakdown.popularity =
                    self.config.popularity_bonus_for(candidate.group.member_count);
                candidate.breakdown.recompute_total();
                candidate
            })
            .collect();
        sort_by_rank(&mut ordered);

        // 3. Diversify
        if weights.diversity > 0.0 {
            self.diversify(&mut ordered, weights.diversity, request.limit);
        }

        // 4. Rank
        let ranked = match request.exploration_seed {
            Some(seed) if self.explorer.is_enabled() => {
                self.explorer.explore(ordered, request.limit, seed)
            }
            _ => {
                ordered.truncate(request.limit);
                ordered
            }
        };

        for candidate in &ranked {
            debug!(
                group_id = %candidate.group.id,
                hierarchical = candidate.breakdown.hierarchical,
                collaborative = candidate.breakdown.collaborative,
                behavioral = candidate.breakdown.behavioral,
                diversity = candidate.breakdown.diversity,
                popularity = candidate.breakdown.popularity,
                total = candidate.breakdown.total,
                "Candidate fused"
            );
        }

        let recommendations: Vec<RankedRecommendation> = ranked
            .iter()
            .map(|candidate| RankedRecommendation {
                group_id: candidate.group.id.clone(),
                group_name: candidate.group.name.clone(),
                score: candidate.breakdown.total,
                adjusted_score: candidate.breakdown.total,
                breakdown: candidate.breakdown.clone(),
                reasons: Vec::new(),
                confidence: candidate.breakdown.total.clamp(0.0, 1.0),
            })
            .collect();

        // 5. Adjust
        let patterns = self.learner.patterns(ctx.user_feedback(), &ctx.groups, ctx.now);
        let mut recommendations = self.learner.adjust(recommendations, &patterns, &ctx.groups);

        // 6. Explain
        let generator = ReasonGenerator::new(&self.config);
        let by_id: HashMap<&str, &FusedCandidate> =
            ranked.iter().map(|c| (c.group.id.as_str(), c)).collect();
        for rec in recommendations.iter_mut() {
            if let Some(candidate) = by_id.get(rec.group_id.as_str()) {
                rec.reasons = generator.explain(
                    candidate.group,
                    &rec.breakdown,
                    &candidate.hits,
                    &ctx.groups,
                    ctx.now,
                );
            }
        }

        let computation_time_ms = started.elapsed().as_secs_f64() * 1000.0;

        info!(
            user_id = %ctx.user.user_id,
            algorithm = request.algorithm.as_str(),
            returned = recommendations.len(),
            used_fallback = used_fallback,
            degraded = outcome.degraded.len(),
            feedback_records = patterns.feedback_count,
            elapsed_ms = computation_time_ms,
            "Recommendation request completed"
        );

        Ok(RecommendationResponse {
            session_id: Uuid::new_v4().to_string(),
            algorithm: request.algorithm,
            recommendations,
            algorithm_weights: weights,
            total_candidates: eligible.len(),
            computation_time_ms,
            used_fallback,
            degraded_sources: outcome.degraded,
            generated_at: Utc::now(),
        })
    }

    /// Profile flags, policy weights and learned feedback patterns for a user
    pub fn user_preferences(&self, ctx: &RecommendationContext) -> PreferencesReport {
        let profile = UserProfileSummary::from_context(ctx);
        PreferencesReport {
            user_id: ctx.user.user_id.clone(),
            flags: self.policy.flags(&profile),
            algorithm_weights: self.policy.weights(&profile),
            patterns: self.learner.patterns(ctx.user_feedback(), &ctx.groups, ctx.now),
            profile,
            generated_at: Utc::now(),
        }
    }

    fn passes_filters(
        &self,
        group: &CandidateGroup,
        request: &RecommendationRequest,
        now: DateTime<Utc>,
    ) -> bool {
        if let Some(primary) = group.primary_category() {
            if request.exclude_categories.iter().any(|c| c == primary) {
                return false;
            }
        }
        if !request.include_new_groups && group.age_days(now) < self.config.new_group_days {
            return false;
        }
        true
    }

    async fn gather(
        &self,
        ctx: &RecommendationContext,
        weights: &FusionWeights,
        limit: usize,
    ) -> GatherOutcome {
        let timeout = self.config.source_timeout();
        let active: Vec<&dyn ScoreSource> = self
            .sources
            .iter()
            .map(|s| &**s)
            .filter(|s| weights.for_source(s.kind()) > 0.0)
            .collect();

        let results = join_all(active.iter().map(|source| async move {
            let started = Instant::now();
            let result = with_timeout(timeout, source.gather(ctx, limit)).await;
            (source.kind(), result, started.elapsed())
        }))
        .await;

        let mut outcome = GatherOutcome::default();
        for (kind, result, elapsed) in results {
            match result {
                Ok(hits) => {
                    debug!(
                        source = kind.as_str(),
                        hits = hits.len(),
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Score source gathered"
                    );
                    outcome.hits.extend(hits);
                }
                Err(RecommendationError::Timeout(after)) => {
                    warn!(
                        user_id = %ctx.user.user_id,
                        source = kind.as_str(),
                        timeout_ms = after.as_millis() as u64,
                        "Score source timed out, contributing nothing"
                    );
                    outcome.degraded.push(kind);
                }
                Err(e) => {
                    warn!(
                        user_id = %ctx.user.user_id,
                        source = kind.as_str(),
                        error = %e,
                        "Score source failed, contributing nothing"
                    );
                    outcome.degraded.push(kind);
                }
            }
        }

        outcome
    }

    fn diversify(&self, ordered: &mut [FusedCandidate], diversity_weight: f64, limit: usize) {
        let selected: HashSet<String> = {
            let candidates: Vec<DiversityCandidate> = ordered
                .iter()
                .map(|c| DiversityCandidate {
                    group_id: c.group.id.as_str(),
                    primary_category: c.group.primary_category(),
                })
                .collect();
            self.diversity.select(&candidates, limit).into_iter().collect()
        };

        let bonus = self.diversity.bonus(diversity_weight);
        for candidate in ordered.iter_mut() {
            if selected.contains(&candidate.group.id) {
                candidate.breakdown.diversity = bonus;
                candidate.breakdown.recompute_total();
            }
        }
        sort_by_rank(ordered);
    }
}

fn sort_by_rank(candidates: &mut [FusedCandidate]) {
    candidates.sort_by(|a, b| {
        b.breakdown
            .total
            .partial_cmp(&a.breakdown.total)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.group.member_count.cmp(&a.group.member_count))
            .then_with(|| a.group.id.cmp(&b.group.id))
    });
}
