mod common;

use chrono::Duration;
use circle_recommendation_service::{
    config::Config,
    models::{
        Algorithm, FeedbackKind, GroupStatus, ReasonKind, RecommendationFeedback,
        RecommendationRequest,
    },
    services::{FeedbackSink, InMemoryFeedbackLog, SimilarityIndex},
    RecommendationError,
};
use common::*;

// ============================================
// Scenario A: exact tag match with the content algorithm
// ============================================

#[tokio::test]
async fn test_exact_tag_match_ranks_first() {
    let taxonomy = taxonomy();
    let alice = user("alice", 100, selections(&taxonomy, &["rust"]));
    let ctx = context(
        alice,
        vec![
            group(&taxonomy, "g-rust", &["rust"], 10, 200),
            group(&taxonomy, "g-soccer", &["soccer"], 10, 200),
            group(&taxonomy, "g-oil", &["oil"], 10, 200),
        ],
    );
    let orchestrator = orchestrator(&Config::default(), taxonomy);

    let request = RecommendationRequest::new("alice").with_algorithm(Algorithm::Content);
    let response = orchestrator.recommend(&ctx, &request).await.unwrap();

    let top = &response.recommendations[0];
    assert_eq!(top.group_id, "g-rust");
    assert!((top.breakdown.hierarchical - 1.0).abs() < 0.001);
    assert_eq!(top.breakdown.collaborative, 0.0);
    assert_eq!(top.breakdown.behavioral, 0.0);
    assert_eq!(top.reasons[0].kind, ReasonKind::InterestMatch);
    assert!(top.reasons[0].text.contains("Rust"));
    assert!((top.confidence - 1.0).abs() < 0.001);
    assert_eq!(response.total_candidates, 3);
    assert!(!response.used_fallback);
}

// ============================================
// Scenario B: user with no data at all
// ============================================

#[tokio::test]
async fn test_cold_start_user_gets_popularity_ranking() {
    let taxonomy = taxonomy();
    let mut bob = user("bob", 2, Vec::new());
    bob.joined_groups.insert("g-joined".to_string());

    let mut closed = group(&taxonomy, "g-closed", &["rust"], 80, 200);
    closed.status = GroupStatus::Closed;

    let ctx = context(
        bob,
        vec![
            group(&taxonomy, "g-rust", &["rust"], 60, 200),
            group(&taxonomy, "g-go", &["go"], 45, 200),
            group(&taxonomy, "g-react", &["react"], 25, 200),
            group(&taxonomy, "g-oil", &["oil"], 30, 200),
            group(&taxonomy, "g-soccer", &["soccer"], 12, 200),
            group(&taxonomy, "g-futsal", &["futsal"], 8, 200),
            group(&taxonomy, "g-english", &["english"], 55, 200),
            group(&taxonomy, "g-joined", &["python"], 90, 200),
            closed,
        ],
    );
    let orchestrator = orchestrator(&Config::default(), taxonomy);

    let request = RecommendationRequest::new("bob").with_limit(5);
    let response = orchestrator.recommend(&ctx, &request).await.unwrap();

    assert!(response.used_fallback);
    assert_eq!(response.total_candidates, 7);
    assert_eq!(response.recommendations.len(), 5);
    assert!(response
        .recommendations
        .iter()
        .all(|r| r.group_id != "g-closed" && r.group_id != "g-joined"));
    assert!(response
        .recommendations
        .iter()
        .all(|r| r.breakdown.hierarchical == 0.0 && r.breakdown.collaborative == 0.0));
}

// ============================================
// Scenario C: users sharing 3 of 4 tags are similar
// ============================================

#[tokio::test]
async fn test_similar_users_drive_collaborative_results() {
    let taxonomy = taxonomy();
    let alice = user("alice", 100, selections(&taxonomy, &["rust", "go", "oil", "react"]));
    let mut bea = user("bea", 100, selections(&taxonomy, &["rust", "go", "oil", "watercolor"]));
    bea.joined_groups.insert("g-paint-club".to_string());

    let similarity = SimilarityIndex::compute(&alice, &bea);
    assert!(similarity >= 0.3);
    assert!((similarity - 0.75).abs() < 0.001);

    let mut ctx = context(
        alice,
        vec![
            group(&taxonomy, "g-paint-club", &["watercolor"], 8, 200),
            group(&taxonomy, "g-rust", &["rust"], 10, 200),
        ],
    );
    ctx.community.push(bea);
    let orchestrator = orchestrator(&Config::default(), taxonomy);

    let request = RecommendationRequest::new("alice").with_algorithm(Algorithm::Collaborative);
    let response = orchestrator.recommend(&ctx, &request).await.unwrap();

    assert_eq!(response.recommendations.len(), 1);
    let rec = &response.recommendations[0];
    assert_eq!(rec.group_id, "g-paint-club");
    assert!((rec.breakdown.collaborative - 0.8).abs() < 0.001);
    assert_eq!(rec.reasons[0].kind, ReasonKind::SimilarUsers);
    assert_eq!(rec.reasons[0].text, "1 person with similar interests is a member");
}

// ============================================
// Scenario D: negative feedback on a tag lowers its siblings
// ============================================

#[tokio::test]
async fn test_not_interested_feedback_lowers_related_groups() {
    let taxonomy = taxonomy();
    let carol = user("carol", 100, selections(&taxonomy, &["soccer", "rust"]));
    let groups = vec![
        group(&taxonomy, "g1", &["soccer"], 12, 200),
        group(&taxonomy, "g2", &["soccer"], 15, 200),
        group(&taxonomy, "g3", &["rust"], 10, 200),
    ];
    let orchestrator = orchestrator(&Config::default(), taxonomy);
    let request = RecommendationRequest::new("carol").with_algorithm(Algorithm::Content);
    let position = |recs: &[circle_recommendation_service::models::RankedRecommendation]| {
        recs.iter().position(|r| r.group_id == "g2").unwrap()
    };

    let baseline_ctx = context(carol.clone(), groups.clone());
    let baseline = orchestrator.recommend(&baseline_ctx, &request).await.unwrap();

    let log = InMemoryFeedbackLog::new();
    log.record(RecommendationFeedback {
        user_id: "carol".to_string(),
        group_id: "g1".to_string(),
        kind: FeedbackKind::NotInterested,
        algorithm: Algorithm::Content,
        reasons_shown: vec![ReasonKind::InterestMatch],
        score_at_time: 0.5,
        session_id: Some(baseline.session_id.clone()),
        created_at: now() - Duration::days(1),
    })
    .await
    .unwrap();

    let mut ctx = context(carol, groups);
    ctx.feedback = log.for_user("carol").await;
    let adjusted = orchestrator.recommend(&ctx, &request).await.unwrap();

    assert!(position(&adjusted.recommendations) > position(&baseline.recommendations));
    let g2 = adjusted
        .recommendations
        .iter()
        .find(|r| r.group_id == "g2")
        .unwrap();
    assert!(g2.adjusted_score < g2.score);
    assert!((g2.score - 0.5).abs() < 0.001);
}

// ============================================
// Determinism and validation
// ============================================

#[tokio::test]
async fn test_identical_inputs_give_identical_rankings() {
    let taxonomy = taxonomy();
    let alice = user("alice", 100, selections(&taxonomy, &["rust", "go", "oil"]));
    let mut bea = user("bea", 100, selections(&taxonomy, &["rust", "go", "watercolor"]));
    bea.joined_groups.insert("g-water".to_string());

    let mut ctx = context(
        alice,
        vec![
            group(&taxonomy, "g-rust", &["rust"], 30, 200),
            group(&taxonomy, "g-go", &["go"], 30, 200),
            group(&taxonomy, "g-water", &["watercolor"], 55, 10),
            group(&taxonomy, "g-oil", &["oil", "watercolor"], 5, 200),
            group(&taxonomy, "g-soccer", &["soccer"], 70, 200),
        ],
    );
    ctx.community.push(bea);
    let orchestrator = orchestrator(&Config::default(), taxonomy);
    let request = RecommendationRequest::new("alice");

    let first = orchestrator.recommend(&ctx, &request).await.unwrap();
    let second = orchestrator.recommend(&ctx, &request).await.unwrap();

    assert_eq!(first.recommendations, second.recommendations);
    assert_eq!(first.algorithm_weights, second.algorithm_weights);
    assert_ne!(first.session_id, second.session_id);
}

#[tokio::test]
async fn test_invalid_requests_are_rejected() {
    let taxonomy = taxonomy();
    let ctx = context(user("alice", 100, Vec::new()), Vec::new());
    let orchestrator = orchestrator(&Config::default(), taxonomy);

    let err = orchestrator
        .recommend(&ctx, &RecommendationRequest::new("alice").with_limit(0))
        .await
        .unwrap_err();
    assert!(matches!(err, RecommendationError::InvalidLimit { got: 0, max: 50 }));

    let err = orchestrator
        .recommend(&ctx, &RecommendationRequest::new("alice").with_diversity_factor(-0.1))
        .await
        .unwrap_err();
    assert!(err.is_validation());

    let err = "fancy".parse::<Algorithm>().unwrap_err();
    assert!(matches!(err, RecommendationError::InvalidAlgorithm(_)));
}

#[tokio::test]
async fn test_empty_catalog_is_not_an_error() {
    let taxonomy = taxonomy();
    let ctx = context(user("alice", 100, selections(&taxonomy, &["rust"])), Vec::new());
    let orchestrator = orchestrator(&Config::default(), taxonomy);

    let response = orchestrator
        .recommend(&ctx, &RecommendationRequest::new("alice"))
        .await
        .unwrap();
    assert!(response.recommendations.is_empty());
    assert_eq!(response.total_candidates, 0);
    assert!(!response.used_fallback);
}

#[tokio::test]
async fn test_new_groups_can_be_excluded() {
    let taxonomy = taxonomy();
    let alice = user("alice", 100, selections(&taxonomy, &["rust"]));
    let ctx = context(
        alice,
        vec![
            group(&taxonomy, "g-old", &["rust"], 10, 200),
            group(&taxonomy, "g-new", &["rust"], 10, 5),
        ],
    );
    let orchestrator = orchestrator(&Config::default(), taxonomy);

    let response = orchestrator
        .recommend(&ctx, &RecommendationRequest::new("alice"))
        .await
        .unwrap();
    let new_group = response
        .recommendations
        .iter()
        .find(|r| r.group_id == "g-new")
        .unwrap();
    assert!(new_group.reasons.iter().any(|r| r.kind == ReasonKind::NewGroup));

    let mut request = RecommendationRequest::new("alice");
    request.include_new_groups = false;
    let response = orchestrator.recommend(&ctx, &request).await.unwrap();
    assert_eq!(response.total_candidates, 1);
    assert_eq!(response.recommendations[0].group_id, "g-old");
}

#[tokio::test]
async fn test_user_preferences_reflect_feedback() {
    let taxonomy = taxonomy();
    let dan = user("dan", 3, selections(&taxonomy, &["soccer"]));
    let mut ctx = context(dan, vec![group(&taxonomy, "g-ball", &["soccer"], 20, 200)]);
    ctx.feedback.push(RecommendationFeedback {
        user_id: "dan".to_string(),
        group_id: "g-ball".to_string(),
        kind: FeedbackKind::JoinSuccess,
        algorithm: Algorithm::Smart,
        reasons_shown: Vec::new(),
        score_at_time: 0.6,
        session_id: None,
        created_at: now() - Duration::days(2),
    });
    let orchestrator = orchestrator(&Config::default(), taxonomy);

    let report = orchestrator.user_preferences(&ctx);

    assert!(report.flags.is_new_user);
    assert!(report.flags.has_limited_data);
    assert_eq!(report.patterns.feedback_count, 1);
    assert!((report.patterns.preferred["soccer"] - 5.0).abs() < 0.001);
    assert!((report.patterns.preferred["sport"] - 5.0).abs() < 0.001);
    assert!((report.patterns.successful_algorithms[&Algorithm::Smart] - 5.0).abs() < 0.001);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["user_id"], "dan");
}

#[tokio::test]
async fn test_response_serializes_rounded_scores() {
    let taxonomy = taxonomy();
    let alice = user("alice", 100, selections(&taxonomy, &["rust", "oil", "soccer"]));
    let ctx = context(alice, vec![group(&taxonomy, "g-rust", &["rust"], 10, 200)]);
    let orchestrator = orchestrator(&Config::default(), taxonomy);

    let response = orchestrator
        .recommend(&ctx, &RecommendationRequest::new("alice"))
        .await
        .unwrap();
    let json = serde_json::to_value(&response).unwrap();

    let score = json["recommendations"][0]["score"].as_f64().unwrap();
    assert_eq!(score, (score * 1000.0).round() / 1000.0);
    assert_eq!(json["algorithm"], "smart");
}
