// ============================================
// Behavioral Scorer (行動ベース推薦)
// ============================================
//
// engagement(group) = Σ action_weight × exp(-days_ago / 7)
//
// over the trailing 30-day window. The five most engaged groups become
// anchors; other open groups sharing declared interests with them are
// recommended, ranked by overlap count then member count.

use crate::config::BehavioralConfig;
use crate::models::{InteractionEvent, RecommendationContext};
use crate::utils::{day_decay, days_between};
use chrono::{DateTime, Duration, Utc};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct BehavioralHit {
    pub group_id: String,
    /// Declared interests shared with the anchor groups
    pub shared_interests: usize,
    /// Engaged groups this recommendation overlaps with
    pub anchor_groups: Vec<String>,
}

pub struct BehavioralScorer {
    config: BehavioralConfig,
}

impl BehavioralScorer {
    pub fn new(config: BehavioralConfig) -> Self {
        Self { config }
    }

    /// Decayed, action-weighted engagement per group within the window
    pub fn engagement_scores<'a>(
        &self,
        events: impl IntoIterator<Item = &'a InteractionEvent>,
        now: DateTime<Utc>,
    ) -> HashMap<String, f64> {
        let window_start = now - Duration::days(self.config.window_days);
        let mut scores: HashMap<String, f64> = HashMap::new();

        for event in events {
            if event.occurred_at < window_start {
                continue;
            }
            let days_ago = days_between(event.occurred_at, now);
            let contribution = event.action.weight() * day_decay(days_ago, self.config.decay_days);
            *scores.entry(event.group_id.clone()).or_insert(0.0) += contribution;
        }

        scores
    }

    /// Highest-engagement groups, ties broken by group id
    pub fn top_groups(&self, scores: &HashMap<String, f64>) -> Vec<(String, f64)> {
        let mut ranked: Vec<(String, f64)> = scores
            .iter()
            .map(|(id, score)| (id.clone(), *score))
            .collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        ranked.truncate(self.config.top_groups);
        ranked
    }

    pub fn recommend(&self, ctx: &RecommendationContext, limit: usize) -> Vec<BehavioralHit> {
        let scores = self.engagement_scores(ctx.user_interactions(), ctx.now);
        if scores.is_empty() {
            return Vec::new();
        }

        let anchors = self.top_groups(&scores);
        let anchor_ids: HashSet<&str> = anchors.iter().map(|(id, _)| id.as_str()).collect();

        // (anchor id, its declared interest keys)
        let anchor_keys: Vec<(&str, HashSet<String>)> = anchors
            .iter()
            .filter_map(|(id, _)| ctx.groups.get(id).map(|g| (id.as_str(), g.overlap_keys())))
            .collect();
        let all_keys: HashSet<&String> = anchor_keys.iter().flat_map(|(_, keys)| keys).collect();

        let mut hits: Vec<(BehavioralHit, u32)> = ctx
            .eligible_groups()
            .filter(|g| !anchor_ids.contains(g.id.as_str()))
            .filter_map(|g| {
                let keys = g.overlap_keys();
                let shared = keys.iter().filter(|k| all_keys.contains(k)).count();
                if shared == 0 {
                    return None;
                }
                let anchor_groups = anchor_keys
                    .iter()
                    .filter(|(_, anchor)| !anchor.is_disjoint(&keys))
                    .map(|(id, _)| id.to_string())
                    .collect();
                Some((
                    BehavioralHit {
                        group_id: g.id.clone(),
                        shared_interests: shared,
                        anchor_groups,
                    },
                    g.member_count,
                ))
            })
            .collect();

        hits.sort_by(|(a, a_members), (b, b_members)| {
            b.shared_interests
                .cmp(&a.shared_interests)
                .then_with(|| b_members.cmp(a_members))
                .then_with(|| a.group_id.cmp(&b.group_id))
        });
        hits.truncate(limit);

        debug!(
            user_id = %ctx.user.user_id,
            anchors = anchors.len(),
            hits = hits.len(),
            "Behavioral scoring completed"
        );

        hits.into_iter().map(|(hit, _)| hit).collect()
    }
}
