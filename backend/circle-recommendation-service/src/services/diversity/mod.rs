use std::collections::HashMap;
use tracing::debug;

/// Diversity Layer - カテゴリ多様性保証
///
/// Groups candidates by primary category and picks an even share from
/// each: `max(1, limit / category_count)`. Picked candidates receive a
/// fixed bonus of `base_score × diversity_weight`.
pub struct DiversityLayer {
    base_score: f64, // 多様性の基準スコア
}

/// A candidate as seen by the diversity stage, in ranked order
#[derive(Debug, Clone, Copy)]
pub struct DiversityCandidate<'a> {
    pub group_id: &'a str,
    pub primary_category: Option<&'a str>,
}

impl DiversityLayer {
    pub fn new(base_score: f64) -> Self {
        Self { base_score }
    }

    pub fn bonus(&self, diversity_weight: f64) -> f64 {
        self.base_score * diversity_weight
    }

    pub fn per_category_cap(limit: usize, category_count: usize) -> usize {
        if category_count == 0 {
            return limit;
        }
        (limit / category_count).max(1)
    }

    /// Pick at most `limit` candidates, capped per category.
    /// Candidates without a category are never picked.
    pub fn select(&self, candidates: &[DiversityCandidate<'_>], limit: usize) -> Vec<String> {
        if candidates.is_empty() || limit == 0 {
            return Vec::new();
        }

        // カテゴリ別にグループ化 (first-seen order)
        let mut order: Vec<&str> = Vec::new();
        let mut groups: HashMap<&str, Vec<&str>> = HashMap::new();
        for candidate in candidates {
            if let Some(category) = candidate.primary_category {
                groups
                    .entry(category)
                    .or_insert_with(|| {
                        order.push(category);
                        Vec::new()
                    })
                    .push(candidate.group_id);
            }
        }

        let cap = Self::per_category_cap(limit, order.len());
        let mut selected: Vec<String> = Vec::new();
        for category in &order {
            if let Some(members) = groups.get(category) {
                selected.extend(members.iter().take(cap).map(|id| id.to_string()));
            }
        }
        selected.truncate(limit);

        debug!(
            categories = order.len(),
            per_category = cap,
            selected = selected.len(),
            "Diversity selection completed"
        );

        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates<'a>(items: &'a [(&'a str, Option<&'a str>)]) -> Vec<DiversityCandidate<'a>> {
        items
            .iter()
            .map(|(id, cat)| DiversityCandidate {
                group_id: *id,
                primary_category: *cat,
            })
            .collect()
    }

    #[test]
    fn test_even_split_across_categories() {
        let items = [
            ("t1", Some("tech")),
            ("t2", Some("tech")),
            ("t3", Some("tech")),
            ("a1", Some("art")),
            ("s1", Some("sport")),
        ];
        let layer = DiversityLayer::new(0.3);
        let selected = layer.select(&candidates(&items), 6);
        assert_eq!(selected, vec!["t1", "t2", "a1", "s1"]);
    }

    #[test]
    fn test_cap_is_at_least_one() {
        let items = [
            ("t1", Some("tech")),
            ("a1", Some("art")),
            ("s1", Some("sport")),
            ("f1", Some("food")),
        ];
        let layer = DiversityLayer::new(0.3);
        let selected = layer.select(&candidates(&items), 2);
        assert_eq!(selected, vec!["t1", "a1"]);
    }

    #[test]
    fn test_respects_limit_and_category_ceiling() {
        let items: Vec<(String, Option<&str>)> = (0..20)
            .map(|i| (format!("g{}", i), Some(if i % 3 == 0 { "a" } else { "b" })))
            .collect();
        let refs: Vec<(&str, Option<&str>)> = items.iter().map(|(id, c)| (id.as_str(), *c)).collect();
        let layer = DiversityLayer::new(0.3);

        for limit in 1..=12 {
            let selected = layer.select(&candidates(&refs), limit);
            assert!(selected.len() <= limit);
            let ceiling = (limit + 1) / 2;
            let from_a = selected
                .iter()
                .filter(|id| refs.iter().any(|(g, c)| *g == id.as_str() && *c == Some("a")))
                .count();
            assert!(from_a <= ceiling);
            assert!(selected.len() - from_a <= ceiling);
        }
    }

    #[test]
    fn test_uncategorized_never_selected() {
        let items = [("legacy", None), ("t1", Some("tech"))];
        let layer = DiversityLayer::new(0.3);
        assert_eq!(layer.select(&candidates(&items), 5), vec!["t1"]);
    }

    #[test]
    fn test_bonus() {
        assert!((DiversityLayer::new(0.3).bonus(0.05) - 0.015).abs() < 1e-9);
    }
}
