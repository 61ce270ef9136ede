use crate::config::FusionConfig;
use crate::models::{
    CandidateGroup, GroupCatalog, HitEvidence, Reason, ReasonKind, ScoreBreakdown, SourceHit,
};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;

const MAX_REASONS: usize = 5;
const MAX_NAMED_INTERESTS: usize = 3;

const STRONG_MATCH: f64 = 0.8;
const GOOD_MATCH: f64 = 0.5;

/// Builds the human-readable reasons attached to each recommendation
pub struct ReasonGenerator<'a> {
    config: &'a FusionConfig,
}

impl<'a> ReasonGenerator<'a> {
    pub fn new(config: &'a FusionConfig) -> Self {
        Self { config }
    }

    /// Reasons ordered by contribution, at most five
    pub fn explain(
        &self,
        group: &CandidateGroup,
        breakdown: &ScoreBreakdown,
        hits: &[SourceHit],
        catalog: &GroupCatalog,
        now: DateTime<Utc>,
    ) -> Vec<Reason> {
        let mut reasons = Vec::new();

        for hit in hits {
            match &hit.evidence {
                HitEvidence::InterestMatch { matched, .. } if breakdown.hierarchical > 0.0 => {
                    reasons.push(self.reason(
                        ReasonKind::InterestMatch,
                        interest_text(hit.score, matched),
                        breakdown.hierarchical,
                        breakdown.total,
                    ));
                }
                HitEvidence::SimilarUsers { count } if breakdown.collaborative > 0.0 => {
                    let text = if *count == 1 {
                        "1 person with similar interests is a member".to_string()
                    } else {
                        format!("{} people with similar interests are members", count)
                    };
                    reasons.push(self.reason(
                        ReasonKind::SimilarUsers,
                        text,
                        breakdown.collaborative,
                        breakdown.total,
                    ));
                }
                HitEvidence::ActivityPattern { anchor_groups, .. } if breakdown.behavioral > 0.0 => {
                    reasons.push(self.reason(
                        ReasonKind::ActivityPattern,
                        activity_text(anchor_groups, catalog),
                        breakdown.behavioral,
                        breakdown.total,
                    ));
                }
                _ => {}
            }
        }

        if breakdown.popularity > 0.0 {
            let text = if group.member_count > self.config.high_popularity_threshold {
                format!("Very active circle ({} members)", group.member_count)
            } else {
                format!("Active circle ({} members)", group.member_count)
            };
            reasons.push(self.reason(ReasonKind::Popularity, text, breakdown.popularity, breakdown.total));
        }

        let age = group.age_days(now);
        if age < self.config.new_group_days {
            let text = match age {
                0 => "New circle, created today".to_string(),
                1 => "New circle, created 1 day ago".to_string(),
                days => format!("New circle, created {} days ago", days),
            };
            reasons.push(self.reason(
                ReasonKind::NewGroup,
                text,
                self.config.new_group_reason_weight,
                breakdown.total,
            ));
        }

        reasons.sort_by(|a, b| {
            b.weight
                .partial_cmp(&a.weight)
                .unwrap_or(Ordering::Equal)
                .then_with(|| kind_rank(a.kind).cmp(&kind_rank(b.kind)))
        });
        reasons.truncate(MAX_REASONS);
        reasons
    }

    fn reason(&self, kind: ReasonKind, text: String, weight: f64, total: f64) -> Reason {
        let contribution_pct = if total > 0.0 {
            weight / total * 100.0
        } else {
            0.0
        };
        Reason {
            kind,
            text,
            weight,
            contribution_pct,
        }
    }
}

fn kind_rank(kind: ReasonKind) -> u8 {
    match kind {
        ReasonKind::InterestMatch => 0,
        ReasonKind::SimilarUsers => 1,
        ReasonKind::ActivityPattern => 2,
        ReasonKind::Popularity => 3,
        ReasonKind::NewGroup => 4,
    }
}

fn interest_text(match_score: f64, matched: &[String]) -> String {
    let names: Vec<&str> = matched
        .iter()
        .take(MAX_NAMED_INTERESTS)
        .map(|m| m.as_str())
        .collect();

    if names.is_empty() {
        return "Related to your interests".to_string();
    }

    if match_score > STRONG_MATCH {
        format!("Strongly matches your interests: {}", names.join(", "))
    } else if match_score > GOOD_MATCH {
        format!("Recommended for people interested in {}", names.join(", "))
    } else {
        format!("Related to your interest in {}", names[0])
    }
}

fn activity_text(anchor_groups: &[String], catalog: &GroupCatalog) -> String {
    let names: Vec<&str> = anchor_groups
        .iter()
        .filter_map(|id| catalog.get(id).map(|g| g.name.as_str()))
        .take(2)
        .collect();

    if names.is_empty() {
        "Matches your recent activity".to_string()
    } else {
        format!("Similar to circles you are active in: {}", names.join(", "))
    }
}
