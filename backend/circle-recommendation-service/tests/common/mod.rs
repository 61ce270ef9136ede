#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use circle_recommendation_service::{
    config::Config,
    models::{
        CandidateGroup, GroupStatus, InterestSelection, RecommendationContext, UserSnapshot,
    },
    services::InMemorySimilarityCache,
    FusionOrchestrator, InterestHierarchyIndex, KeywordClusters,
};
use std::collections::HashSet;
use std::sync::Arc;

/// テスト用の興味分類
pub fn taxonomy() -> InterestHierarchyIndex {
    let mut index = InterestHierarchyIndex::new();

    index.add_category("tech", "Technology").unwrap();
    index.add_subcategory("prog", "Programming", "tech").unwrap();
    index.add_tag("rust", "Rust", "prog").unwrap();
    index.add_tag("go", "Go", "prog").unwrap();
    index.add_tag("python", "Python", "prog").unwrap();
    index.add_subcategory("web", "Web Development", "tech").unwrap();
    index.add_tag("react", "React", "web").unwrap();

    index.add_category("art", "Art").unwrap();
    index.add_subcategory("paint", "Painting", "art").unwrap();
    index.add_tag("oil", "Oil painting", "paint").unwrap();
    index.add_tag("watercolor", "Watercolor", "paint").unwrap();

    index.add_category("sport", "Sport").unwrap();
    index.add_subcategory("ball", "Ball games", "sport").unwrap();
    index.add_tag("soccer", "Soccer", "ball").unwrap();
    index.add_tag("futsal", "Futsal", "ball").unwrap();

    index.add_category("learning", "Learning").unwrap();
    index.add_subcategory("lang", "Languages", "learning").unwrap();
    index.add_tag("english", "English", "lang").unwrap();

    index
}

pub fn now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-06-01T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

pub fn group(
    taxonomy: &InterestHierarchyIndex,
    id: &str,
    tags: &[&str],
    members: u32,
    age_days: i64,
) -> CandidateGroup {
    CandidateGroup {
        id: id.to_string(),
        name: format!("Circle {}", id),
        interests: tags.iter().map(|t| taxonomy.declare(t).unwrap()).collect(),
        member_count: members,
        created_at: now() - Duration::days(age_days),
        status: GroupStatus::Open,
    }
}

pub fn selections(taxonomy: &InterestHierarchyIndex, nodes: &[&str]) -> Vec<InterestSelection> {
    nodes.iter().map(|n| taxonomy.select(n, 3).unwrap()).collect()
}

pub fn user(id: &str, registered_days_ago: i64, selections: Vec<InterestSelection>) -> UserSnapshot {
    UserSnapshot {
        user_id: id.to_string(),
        registered_at: now() - Duration::days(registered_days_ago),
        selections,
        joined_groups: HashSet::new(),
    }
}

pub fn context(user: UserSnapshot, groups: Vec<CandidateGroup>) -> RecommendationContext {
    RecommendationContext {
        user,
        groups: groups.into(),
        community: Vec::new(),
        interactions: Vec::new(),
        feedback: Vec::new(),
        now: now(),
    }
}

pub fn orchestrator(config: &Config, taxonomy: InterestHierarchyIndex) -> FusionOrchestrator {
    FusionOrchestrator::from_config(
        config,
        Arc::new(taxonomy),
        Arc::new(KeywordClusters::default()),
        Arc::new(InMemorySimilarityCache::new()),
    )
}
