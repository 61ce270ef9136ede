use crate::error::Result;
use crate::models::{HitEvidence, RecommendationContext, ScoreSourceKind, SourceHit};
use crate::services::behavioral::BehavioralScorer;
use crate::services::collaborative::CollaborativeScorer;
use crate::services::matcher::HierarchicalMatcher;
use async_trait::async_trait;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::debug;

/// One independent signal source consulted during the gather stage
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScoreSource: Send + Sync {
    /// Scored candidates for the context's user, at most `limit` of them
    async fn gather(&self, ctx: &RecommendationContext, limit: usize) -> Result<Vec<SourceHit>>;

    fn kind(&self) -> ScoreSourceKind;
}

// ============================================
// 階層マッチング
// ============================================

pub struct HierarchicalSource {
    matcher: Arc<HierarchicalMatcher>,
}

impl HierarchicalSource {
    pub fn new(matcher: Arc<HierarchicalMatcher>) -> Self {
        Self { matcher }
    }
}

#[async_trait]
impl ScoreSource for HierarchicalSource {
    async fn gather(&self, ctx: &RecommendationContext, limit: usize) -> Result<Vec<SourceHit>> {
        let selections = &ctx.user.selections;

        let mut hits: Vec<(SourceHit, u32)> = ctx
            .eligible_groups()
            .filter_map(|group| {
                let result = self.matcher.evaluate(selections, group);
                if result.score <= 0.0 {
                    return None;
                }
                Some((
                    SourceHit {
                        group_id: group.id.clone(),
                        source: ScoreSourceKind::Hierarchical,
                        score: result.score,
                        evidence: HitEvidence::InterestMatch {
                            matched: result.matched,
                            via_name_fallback: result.via_name_fallback,
                        },
                    },
                    group.member_count,
                ))
            })
            .collect();

        hits.sort_by(|(a, a_members), (b, b_members)| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b_members.cmp(a_members))
                .then_with(|| a.group_id.cmp(&b.group_id))
        });
        hits.truncate(limit);

        debug!(
            user_id = %ctx.user.user_id,
            selections = selections.len(),
            hits = hits.len(),
            "Hierarchical matching completed"
        );

        Ok(hits.into_iter().map(|(hit, _)| hit).collect())
    }

    fn kind(&self) -> ScoreSourceKind {
        ScoreSourceKind::Hierarchical
    }
}

// ============================================
// 協調フィルタリング
// ============================================

pub struct CollaborativeSource {
    scorer: Arc<CollaborativeScorer>,
    base_score: f64,
}

impl CollaborativeSource {
    pub fn new(scorer: Arc<CollaborativeScorer>, base_score: f64) -> Self {
        Self { scorer, base_score }
    }
}

#[async_trait]
impl ScoreSource for CollaborativeSource {
    async fn gather(&self, ctx: &RecommendationContext, limit: usize) -> Result<Vec<SourceHit>> {
        let hits = self.scorer.recommend(ctx, limit).await?;

        Ok(hits
            .into_iter()
            .map(|hit| SourceHit {
                group_id: hit.group_id,
                source: ScoreSourceKind::Collaborative,
                score: self.base_score,
                evidence: HitEvidence::SimilarUsers {
                    count: hit.similar_members,
                },
            })
            .collect())
    }

    fn kind(&self) -> ScoreSourceKind {
        ScoreSourceKind::Collaborative
    }
}

// ============================================
// 行動ベース
// ============================================

pub struct BehavioralSource {
    scorer: Arc<BehavioralScorer>,
    base_score: f64,
}

impl BehavioralSource {
    pub fn new(scorer: Arc<BehavioralScorer>, base_score: f64) -> Self {
        Self { scorer, base_score }
    }
}

#[async_trait]
impl ScoreSource for BehavioralSource {
    async fn gather(&self, ctx: &RecommendationContext, limit: usize) -> Result<Vec<SourceHit>> {
        Ok(self
            .scorer
            .recommend(ctx, limit)
            .into_iter()
            .map(|hit| SourceHit {
                group_id: hit.group_id,
                source: ScoreSourceKind::Behavioral,
                score: self.base_score,
                evidence: HitEvidence::ActivityPattern {
                    shared_interests: hit.shared_interests,
                    anchor_groups: hit.anchor_groups,
                },
            })
            .collect())
    }

    fn kind(&self) -> ScoreSourceKind {
        ScoreSourceKind::Behavioral
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BehavioralConfig;
    use crate::models::{
        CandidateGroup, GroupStatus, InteractionAction, InteractionEvent, UserSnapshot,
    };
    use crate::services::taxonomy::{InterestHierarchyIndex, KeywordClusters};
    use chrono::{Duration, Utc};
    use std::collections::HashSet;

    fn taxonomy() -> InterestHierarchyIndex {
        let mut index = InterestHierarchyIndex::new();
        index.add_category("tech", "Technology").unwrap();
        index.add_subcategory("prog", "Programming", "tech").unwrap();
        index.add_tag("rust", "Rust", "prog").unwrap();
        index.add_tag("go", "Go", "prog").unwrap();
        index.add_category("art", "Art").unwrap();
        index.add_subcategory("paint", "Painting", "art").unwrap();
        index.add_tag("oil", "Oil painting", "paint").unwrap();
        index
    }

    fn context(taxonomy: &InterestHierarchyIndex) -> RecommendationContext {
        let now = Utc::now();
        let group = |id: &str, tag: &str, members: u32| CandidateGroup {
            id: id.to_string(),
            name: id.to_string(),
            interests: vec![taxonomy.declare(tag).unwrap()],
            member_count: members,
            created_at: now - Duration::days(90),
            status: GroupStatus::Open,
        };

        RecommendationContext {
            user: UserSnapshot {
                user_id: "alice".to_string(),
                registered_at: now - Duration::days(100),
                selections: vec![taxonomy.select("rust", 5).unwrap()],
                joined_groups: HashSet::new(),
            },
            groups: vec![
                group("rustaceans", "rust", 10),
                group("gophers", "go", 40),
                group("painters", "oil", 25),
            ]
            .into(),
            community: Vec::new(),
            interactions: vec![InteractionEvent {
                user_id: "alice".to_string(),
                group_id: "gophers".to_string(),
                action: InteractionAction::PostMessage,
                occurred_at: now - Duration::days(1),
                duration_secs: None,
            }],
            feedback: Vec::new(),
            now,
        }
    }

    #[tokio::test]
    async fn test_hierarchical_source_keeps_positive_matches() {
        let taxonomy = Arc::new(taxonomy());
        let ctx = context(&taxonomy);
        let source = HierarchicalSource::new(Arc::new(HierarchicalMatcher::new(
            taxonomy,
            Arc::new(KeywordClusters::default()),
        )));

        let hits = source.gather(&ctx, 10).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.group_id.as_str()).collect();
        assert_eq!(ids, vec!["rustaceans", "gophers"]);
        assert!((hits[0].score - 1.0).abs() < 0.001);
        assert!(hits.iter().all(|h| h.source == ScoreSourceKind::Hierarchical));
    }

    #[tokio::test]
    async fn test_hierarchical_source_respects_limit() {
        let taxonomy = Arc::new(taxonomy());
        let ctx = context(&taxonomy);
        let source = HierarchicalSource::new(Arc::new(HierarchicalMatcher::new(
            taxonomy,
            Arc::new(KeywordClusters::default()),
        )));

        assert_eq!(source.gather(&ctx, 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_behavioral_source_uses_base_score() {
        let taxonomy = taxonomy();
        let ctx = context(&taxonomy);
        let source = BehavioralSource::new(Arc::new(BehavioralScorer::new(BehavioralConfig::default())), 0.7);

        let hits = source.gather(&ctx, 10).await.unwrap();
        // gophers is the anchor; rustaceans shares no declared interest with it
        assert!(hits.is_empty());
        assert_eq!(source.kind(), ScoreSourceKind::Behavioral);
    }
}
