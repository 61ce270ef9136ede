// ============================================
// Collaborative Scorer (協調フィルタリング)
// ============================================
//
// 1. Pre-filter: users sharing >= 2 top-level categories with the target
// 2. Cosine similarity via SimilarityIndex, keep >= min_similarity
// 3. Recommend open groups joined by the most similar users,
//    tie-broken by member count

use crate::config::CollaborativeConfig;
use crate::error::SimilarityError;
use crate::models::{RecommendationContext, SimilarUser, UserSnapshot};
use crate::services::similarity::SimilarityIndex;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub struct CollaborativeHit {
    pub group_id: String,
    /// Similar users who are members of the group
    pub similar_members: usize,
}

pub struct CollaborativeScorer {
    index: Arc<SimilarityIndex>,
    config: CollaborativeConfig,
}

impl CollaborativeScorer {
    pub fn new(index: Arc<SimilarityIndex>, config: CollaborativeConfig) -> Self {
        Self { index, config }
    }

    /// Cheap category-overlap pre-filter
    pub fn prefilter<'a>(&self, user: &UserSnapshot, community: &'a [UserSnapshot]) -> Vec<&'a UserSnapshot> {
        let user_categories = user.categories();
        let required = self.config.min_shared_categories.max(1);
        if user_categories.len() < required {
            return Vec::new();
        }

        let mut candidates: Vec<(&UserSnapshot, usize)> = community
            .iter()
            .filter(|other| other.user_id != user.user_id)
            .map(|other| {
                let shared = other
                    .categories()
                    .iter()
                    .filter(|c| user_categories.contains(*c))
                    .count();
                (other, shared)
            })
            .filter(|(_, shared)| *shared >= required)
            .collect();

        candidates.sort_by(|(a, a_shared), (b, b_shared)| {
            b_shared.cmp(a_shared).then_with(|| a.user_id.cmp(&b.user_id))
        });
        candidates.truncate(self.config.max_candidate_users);
        candidates.into_iter().map(|(u, _)| u).collect()
    }

    pub async fn find_similar_users(
        &self,
        user: &UserSnapshot,
        community: &[UserSnapshot],
    ) -> Result<Vec<SimilarUser>, SimilarityError> {
        let candidates = self.prefilter(user, community);
        let mut similar = Vec::new();

        for candidate in candidates {
            let similarity = self.index.similarity(user, candidate).await?;
            if similarity >= self.config.min_similarity {
                similar.push(SimilarUser {
                    user_id: candidate.user_id.clone(),
                    similarity,
                });
            }
        }

        similar.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        similar.truncate(self.config.max_similar_users);

        debug!(
            user_id = %user.user_id,
            similar_users = similar.len(),
            "Similar users resolved"
        );

        Ok(similar)
    }

    pub async fn recommend(
        &self,
        ctx: &RecommendationContext,
        limit: usize,
    ) -> Result<Vec<CollaborativeHit>, SimilarityError> {
        let similar = self.find_similar_users(&ctx.user, &ctx.community).await?;
        if similar.is_empty() {
            return Ok(Vec::new());
        }

        let members: HashMap<&str, &UserSnapshot> = ctx
            .community
            .iter()
            .map(|u| (u.user_id.as_str(), u))
            .collect();

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for similar_user in &similar {
            let Some(snapshot) = members.get(similar_user.user_id.as_str()) else {
                continue;
            };
            for group_id in &snapshot.joined_groups {
                *counts.entry(group_id.as_str()).or_insert(0) += 1;
            }
        }

        let mut hits: Vec<(CollaborativeHit, u32)> = ctx
            .eligible_groups()
            .filter_map(|g| {
                counts.get(g.id.as_str()).map(|count| {
                    (
                        CollaborativeHit {
                            group_id: g.id.clone(),
                            similar_members: *count,
                        },
                        g.member_count,
                    )
                })
            })
            .collect();

        hits.sort_by(|(a, a_members), (b, b_members)| {
            b.similar_members
                .cmp(&a.similar_members)
                .then_with(|| b_members.cmp(a_members))
                .then_with(|| a.group_id.cmp(&b.group_id))
        });
        hits.truncate(limit);

        info!(
            user_id = %ctx.user.user_id,
            similar_users = similar.len(),
            hits = hits.len(),
            "Collaborative scoring completed"
        );

        Ok(hits.into_iter().map(|(hit, _)| hit).collect())
    }
}
