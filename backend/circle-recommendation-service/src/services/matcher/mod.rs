// ============================================
// Hierarchical Matcher (階層型マッチング)
// ============================================
//
// Scores one group against one user's interest selections.
//
// Level weights: category 0.3, subcategory 0.5, tag 0.8
//
// Partial matches decay with specificity:
//   subcategory selection → category match        × 0.5
//   tag selection         → subcategory match     × 0.6
//   tag selection         → category match        × 0.3
//
// score = Σ matched contribution / Σ selection weights  ∈ [0, 1]
//
// When no structural match exists, unresolved legacy interest names are
// compared instead (exact 3, substring 2, keyword cluster 1), normalized by
// the number of name pairs and scaled by 0.3 so the fallback never beats a
// real match. Resolved interests never take the name path.

use crate::models::{CandidateGroup, InterestLevel, InterestSelection};
use crate::services::taxonomy::{InterestHierarchyIndex, KeywordClusters};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

const SUBCATEGORY_TO_CATEGORY: f64 = 0.5;
const TAG_TO_SUBCATEGORY: f64 = 0.6;
const TAG_TO_CATEGORY: f64 = 0.3;

const EXACT_NAME_POINTS: f64 = 3.0;
const SUBSTRING_NAME_POINTS: f64 = 2.0;
const CLUSTER_NAME_POINTS: f64 = 1.0;
const NAME_FALLBACK_SCALE: f64 = 0.3;

#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub score: f64,
    /// Names of the group interests that produced the match
    pub matched: Vec<String>,
    pub via_name_fallback: bool,
}

impl MatchResult {
    fn none() -> Self {
        Self {
            score: 0.0,
            matched: Vec::new(),
            via_name_fallback: false,
        }
    }
}

/// Group-side node sets, split by level
struct GroupNodes<'a> {
    categories: HashSet<&'a str>,
    subcategories: HashSet<&'a str>,
    tags: HashSet<&'a str>,
}

impl<'a> GroupNodes<'a> {
    fn from_group(group: &'a CandidateGroup) -> Self {
        let mut nodes = Self {
            categories: HashSet::new(),
            subcategories: HashSet::new(),
            tags: HashSet::new(),
        };
        for path in group.interests.iter().filter_map(|i| i.path()) {
            nodes.categories.insert(path.category.as_str());
            if let Some(sub) = path.subcategory.as_deref() {
                nodes.subcategories.insert(sub);
            }
            if let Some(tag) = path.tag.as_deref() {
                nodes.tags.insert(tag);
            }
        }
        nodes
    }
}

pub struct HierarchicalMatcher {
    taxonomy: Arc<InterestHierarchyIndex>,
    clusters: Arc<KeywordClusters>,
}

impl HierarchicalMatcher {
    pub fn new(taxonomy: Arc<InterestHierarchyIndex>, clusters: Arc<KeywordClusters>) -> Self {
        Self { taxonomy, clusters }
    }

    pub fn score(&self, selections: &[InterestSelection], group: &CandidateGroup) -> f64 {
        self.evaluate(selections, group).score
    }

    /// Score with the matched group interests attached
    pub fn evaluate(&self, selections: &[InterestSelection], group: &CandidateGroup) -> MatchResult {
        if selections.is_empty() {
            return MatchResult::none();
        }

        let structural = self.structural_match(selections, group);
        if structural.score > 0.0 {
            return structural;
        }

        let fallback = self.name_match(selections, group);
        if fallback.score > 0.0 {
            debug!(
                group_id = %group.id,
                score = fallback.score,
                "Structural match empty, used name fallback"
            );
        }
        fallback
    }

    fn structural_match(&self, selections: &[InterestSelection], group: &CandidateGroup) -> MatchResult {
        let nodes = GroupNodes::from_group(group);
        let mut total = 0.0;
        let mut max_possible = 0.0;
        let mut matched: Vec<String> = Vec::new();

        for selection in selections {
            let weight = selection.level.weight();
            max_possible += weight;

            let path = &selection.path;
            let category_hit = nodes.categories.contains(path.category.as_str());
            let subcategory_hit = path
                .subcategory
                .as_deref()
                .map(|s| nodes.subcategories.contains(s))
                .unwrap_or(false);
            let tag_hit = path
                .tag
                .as_deref()
                .map(|t| nodes.tags.contains(t))
                .unwrap_or(false);

            // (contribution, matched node id)
            let hit: Option<(f64, &str)> = match selection.level {
                InterestLevel::Category => {
                    category_hit.then(|| (weight, path.category.as_str()))
                }
                InterestLevel::Subcategory => {
                    if subcategory_hit {
                        path.subcategory.as_deref().map(|s| (weight, s))
                    } else if category_hit {
                        Some((weight * SUBCATEGORY_TO_CATEGORY, path.category.as_str()))
                    } else {
                        None
                    }
                }
                InterestLevel::Tag => {
                    if tag_hit {
                        path.tag.as_deref().map(|t| (weight, t))
                    } else if subcategory_hit {
                        path.subcategory
                            .as_deref()
                            .map(|s| (weight * TAG_TO_SUBCATEGORY, s))
                    } else if category_hit {
                        Some((weight * TAG_TO_CATEGORY, path.category.as_str()))
                    } else {
                        None
                    }
                }
            };

            if let Some((contribution, node_id)) = hit {
                total += contribution;
                let name = self.taxonomy.name(node_id).unwrap_or(node_id).to_string();
                if !matched.contains(&name) {
                    matched.push(name);
                }
            }
        }

        let score = if max_possible > 0.0 {
            (total / max_possible).clamp(0.0, 1.0)
        } else {
            0.0
        };

        MatchResult {
            score,
            matched,
            via_name_fallback: false,
        }
    }

    fn name_match(&self, selections: &[InterestSelection], group: &CandidateGroup) -> MatchResult {
        let user_names: HashSet<String> = selections
            .iter()
            .flat_map(|s| self.taxonomy.path_names(&s.path))
            .collect();
        let group_names: Vec<(String, &str)> = group
            .interests
            .iter()
            .filter(|i| i.path().is_none())
            .map(|i| (i.name().to_lowercase(), i.name()))
            .collect();

        let comparisons = user_names.len() * group_names.len();
        if comparisons == 0 {
            return MatchResult::none();
        }

        let mut points = 0.0;
        let mut matched: Vec<String> = Vec::new();

        for (group_name, display_name) in &group_names {
            let mut group_hit = false;
            for user_name in &user_names {
                let pair_points = if user_name == group_name {
                    EXACT_NAME_POINTS
                } else if user_name.contains(group_name.as_str())
                    || group_name.contains(user_name.as_str())
                {
                    SUBSTRING_NAME_POINTS
                } else if self.clusters.related(user_name, group_name) {
                    CLUSTER_NAME_POINTS
                } else {
                    0.0
                };
                if pair_points > 0.0 {
                    points += pair_points;
                    group_hit = true;
                }
            }
            if group_hit && !matched.iter().any(|m| m.as_str() == *display_name) {
                matched.push(display_name.to_string());
            }
        }

        MatchResult {
            score: (points / comparisons as f64).min(1.0) * NAME_FALLBACK_SCALE,
            matched,
            via_name_fallback: true,
        }
    }
}
