use crate::error::RecommendationError;
use crate::utils::round3;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;

// ============================================
// Interest taxonomy (興味関心の階層)
// ============================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum InterestLevel {
    Category,    // 大分類
    Subcategory, // 中分類
    Tag,         // タグ
}

impl InterestLevel {
    /// Matching weight; more specific selections dominate
    pub fn weight(&self) -> f64 {
        match self {
            InterestLevel::Category => 0.3,
            InterestLevel::Subcategory => 0.5,
            InterestLevel::Tag => 0.8,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InterestLevel::Category => "category",
            InterestLevel::Subcategory => "subcategory",
            InterestLevel::Tag => "tag",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InterestNode {
    pub id: String,
    pub name: String,
    pub level: InterestLevel,
    pub parent: Option<String>,
}

/// Resolved position of a node in the taxonomy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct InterestPath {
    pub category: String,
    pub subcategory: Option<String>,
    pub tag: Option<String>,
}

impl InterestPath {
    pub fn level(&self) -> InterestLevel {
        if self.tag.is_some() {
            InterestLevel::Tag
        } else if self.subcategory.is_some() {
            InterestLevel::Subcategory
        } else {
            InterestLevel::Category
        }
    }

    /// Id of the most specific node on the path
    pub fn leaf(&self) -> &str {
        self.tag
            .as_deref()
            .or(self.subcategory.as_deref())
            .unwrap_or(&self.category)
    }
}

/// One interest a user opted into
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InterestSelection {
    pub node_id: String,
    pub level: InterestLevel,
    pub path: InterestPath,
    pub intensity: u8,
}

/// An interest declared by a group.
///
/// Resolved entries carry the full taxonomy path captured at ingestion.
/// Unresolved entries are legacy free-text names and only take part in
/// name-based fallback matching.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeclaredInterest {
    Resolved { path: InterestPath, name: String },
    Unresolved { name: String },
}

impl DeclaredInterest {
    pub fn name(&self) -> &str {
        match self {
            DeclaredInterest::Resolved { name, .. } | DeclaredInterest::Unresolved { name } => name,
        }
    }

    pub fn path(&self) -> Option<&InterestPath> {
        match self {
            DeclaredInterest::Resolved { path, .. } => Some(path),
            DeclaredInterest::Unresolved { .. } => None,
        }
    }

    pub fn category(&self) -> Option<&str> {
        self.path().map(|p| p.category.as_str())
    }

    /// Identity used when comparing declared interests between groups
    pub fn overlap_key(&self) -> String {
        match self {
            DeclaredInterest::Resolved { path, .. } => path.leaf().to_string(),
            DeclaredInterest::Unresolved { name } => format!("name:{}", name.to_lowercase()),
        }
    }
}

// ============================================
// Groups (サークル)
// ============================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GroupStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateGroup {
    pub id: String,
    pub name: String,
    pub interests: Vec<DeclaredInterest>,
    pub member_count: u32,
    pub created_at: DateTime<Utc>,
    pub status: GroupStatus,
}

impl CandidateGroup {
    pub fn is_open(&self) -> bool {
        self.status == GroupStatus::Open
    }

    pub fn age_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_days().max(0)
    }

    pub fn categories(&self) -> HashSet<&str> {
        self.interests.iter().filter_map(|i| i.category()).collect()
    }

    /// Most represented top-level category; ties resolve to the smallest id
    pub fn primary_category(&self) -> Option<&str> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for category in self.interests.iter().filter_map(|i| i.category()) {
            *counts.entry(category).or_insert(0) += 1;
        }

        counts
            .into_iter()
            .max_by(|(a_id, a_count), (b_id, b_count)| {
                a_count.cmp(b_count).then_with(|| b_id.cmp(a_id))
            })
            .map(|(id, _)| id)
    }

    pub fn overlap_keys(&self) -> HashSet<String> {
        self.interests.iter().map(|i| i.overlap_key()).collect()
    }
}

/// Group lookup by id, serialized as a plain list
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<CandidateGroup>", into = "Vec<CandidateGroup>")]
pub struct GroupCatalog {
    groups: HashMap<String, CandidateGroup>,
}

impl GroupCatalog {
    pub fn get(&self, group_id: &str) -> Option<&CandidateGroup> {
        self.groups.get(group_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CandidateGroup> {
        self.groups.values()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl From<Vec<CandidateGroup>> for GroupCatalog {
    fn from(groups: Vec<CandidateGroup>) -> Self {
        Self {
            groups: groups.into_iter().map(|g| (g.id.clone(), g)).collect(),
        }
    }
}

impl From<GroupCatalog> for Vec<CandidateGroup> {
    fn from(catalog: GroupCatalog) -> Self {
        let mut groups: Vec<CandidateGroup> = catalog.groups.into_values().collect();
        groups.sort_by(|a, b| a.id.cmp(&b.id));
        groups
    }
}

// ============================================
// Interaction log (行動履歴)
// ============================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum InteractionAction {
    ViewCircle,
    ViewProfile,
    JoinRequest,
    JoinApproved,
    JoinRejected,
    LeaveCircle,
    PostMessage,
    ReactToPost,
    CreateEvent,
    JoinEvent,
}

impl InteractionAction {
    pub fn weight(&self) -> f64 {
        match self {
            InteractionAction::ViewCircle => 1.0,
            InteractionAction::JoinRequest => 5.0,
            InteractionAction::JoinApproved => 10.0,
            InteractionAction::PostMessage => 8.0,
            InteractionAction::ReactToPost => 3.0,
            InteractionAction::JoinEvent => 6.0,
            _ => 1.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionAction::ViewCircle => "view_circle",
            InteractionAction::ViewProfile => "view_profile",
            InteractionAction::JoinRequest => "join_request",
            InteractionAction::JoinApproved => "join_approved",
            InteractionAction::JoinRejected => "join_rejected",
            InteractionAction::LeaveCircle => "leave_circle",
            InteractionAction::PostMessage => "post_message",
            InteractionAction::ReactToPost => "react_to_post",
            InteractionAction::CreateEvent => "create_event",
            InteractionAction::JoinEvent => "join_event",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionEvent {
    pub user_id: String,
    pub group_id: String,
    pub action: InteractionAction,
    pub occurred_at: DateTime<Utc>,
    pub duration_secs: Option<u32>,
}

// ============================================
// Feedback (推薦フィードバック)
// ============================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    View,
    Click,
    JoinRequest,
    JoinSuccess,
    Dismiss,
    NotInterested,
    Bookmark,
    Share,
}

impl FeedbackKind {
    /// Signed learning weight; zero for neutral kinds
    pub fn weight(&self) -> f64 {
        match self {
            FeedbackKind::Click => 1.0,
            FeedbackKind::JoinRequest => 3.0,
            FeedbackKind::JoinSuccess => 5.0,
            FeedbackKind::Bookmark => 2.0,
            FeedbackKind::Dismiss => -1.0,
            FeedbackKind::NotInterested => -2.0,
            FeedbackKind::View | FeedbackKind::Share => 0.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackKind::View => "view",
            FeedbackKind::Click => "click",
            FeedbackKind::JoinRequest => "join_request",
            FeedbackKind::JoinSuccess => "join_success",
            FeedbackKind::Dismiss => "dismiss",
            FeedbackKind::NotInterested => "not_interested",
            FeedbackKind::Bookmark => "bookmark",
            FeedbackKind::Share => "share",
        }
    }
}

impl FromStr for FeedbackKind {
    type Err = RecommendationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "view" => Ok(FeedbackKind::View),
            "click" => Ok(FeedbackKind::Click),
            "join_request" => Ok(FeedbackKind::JoinRequest),
            "join_success" => Ok(FeedbackKind::JoinSuccess),
            "dismiss" => Ok(FeedbackKind::Dismiss),
            "not_interested" => Ok(FeedbackKind::NotInterested),
            "bookmark" => Ok(FeedbackKind::Bookmark),
            "share" => Ok(FeedbackKind::Share),
            other => Err(RecommendationError::InvalidFeedback(format!(
                "unknown feedback kind '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationFeedback {
    pub user_id: String,
    pub group_id: String,
    pub kind: FeedbackKind,
    pub algorithm: Algorithm,
    #[serde(default)]
    pub reasons_shown: Vec<ReasonKind>,
    pub score_at_time: f64,
    pub session_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ============================================
// Users
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSnapshot {
    pub user_id: String,
    pub registered_at: DateTime<Utc>,
    #[serde(default)]
    pub selections: Vec<InterestSelection>,
    #[serde(default)]
    pub joined_groups: HashSet<String>,
}

impl UserSnapshot {
    pub fn categories(&self) -> HashSet<&str> {
        self.selections
            .iter()
            .map(|s| s.path.category.as_str())
            .collect()
    }

    pub fn has_joined(&self, group_id: &str) -> bool {
        self.joined_groups.contains(group_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserSimilarity {
    pub user_a: String,
    pub user_b: String,
    pub score: f64,
    pub method: String,
    pub computed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimilarUser {
    pub user_id: String,
    pub similarity: f64,
}

// ============================================
// Request / context
// ============================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    Smart,
    Content,
    Collaborative,
    Behavioral,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Smart => "smart",
            Algorithm::Content => "content",
            Algorithm::Collaborative => "collaborative",
            Algorithm::Behavioral => "behavioral",
        }
    }
}

impl FromStr for Algorithm {
    type Err = RecommendationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "smart" => Ok(Algorithm::Smart),
            "content" => Ok(Algorithm::Content),
            "collaborative" => Ok(Algorithm::Collaborative),
            "behavioral" => Ok(Algorithm::Behavioral),
            other => Err(RecommendationError::InvalidAlgorithm(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationRequest {
    pub user_id: String,
    pub algorithm: Algorithm,
    pub limit: usize,
    pub diversity_factor: f64,
    #[serde(default)]
    pub exclude_categories: Vec<String>,
    #[serde(default = "default_true")]
    pub include_new_groups: bool,
    #[serde(default)]
    pub exploration_seed: Option<u64>,
}

fn default_true() -> bool {
    true
}

impl RecommendationRequest {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            algorithm: Algorithm::Smart,
            limit: 10,
            diversity_factor: 0.3,
            exclude_categories: Vec::new(),
            include_new_groups: true,
            exploration_seed: None,
        }
    }

    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_diversity_factor(mut self, factor: f64) -> Self {
        self.diversity_factor = factor;
        self
    }

    pub fn excluding_categories(mut self, categories: Vec<String>) -> Self {
        self.exclude_categories = categories;
        self
    }

    pub fn with_exploration_seed(mut self, seed: u64) -> Self {
        self.exploration_seed = Some(seed);
        self
    }
}

/// Read-only data snapshot for one recommendation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationContext {
    pub user: UserSnapshot,
    pub groups: GroupCatalog,
    /// Other users, used for collaborative filtering
    #[serde(default)]
    pub community: Vec<UserSnapshot>,
    #[serde(default)]
    pub interactions: Vec<InteractionEvent>,
    #[serde(default)]
    pub feedback: Vec<RecommendationFeedback>,
    pub now: DateTime<Utc>,
}

impl RecommendationContext {
    /// Open groups the user has not joined
    pub fn eligible_groups(&self) -> impl Iterator<Item = &CandidateGroup> {
        self.groups
            .iter()
            .filter(move |g| g.is_open() && !self.user.has_joined(&g.id))
    }

    pub fn user_interactions(&self) -> impl Iterator<Item = &InteractionEvent> {
        self.interactions
            .iter()
            .filter(move |e| e.user_id == self.user.user_id)
    }

    pub fn user_feedback(&self) -> impl Iterator<Item = &RecommendationFeedback> {
        self.feedback
            .iter()
            .filter(move |f| f.user_id == self.user.user_id)
    }
}

// ============================================
// Scoring output
// ============================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ScoreSourceKind {
    Hierarchical,  // 階層マッチング
    Collaborative, // 協調フィルタリング
    Behavioral,    // 行動ベース
}

impl ScoreSourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreSourceKind::Hierarchical => "hierarchical",
            ScoreSourceKind::Collaborative => "collaborative",
            ScoreSourceKind::Behavioral => "behavioral",
        }
    }
}

/// Evidence a source attaches to a hit, used when explaining results
#[derive(Debug, Clone, PartialEq)]
pub enum HitEvidence {
    InterestMatch {
        matched: Vec<String>,
        via_name_fallback: bool,
    },
    SimilarUsers {
        count: usize,
    },
    ActivityPattern {
        shared_interests: usize,
        anchor_groups: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceHit {
    pub group_id: String,
    pub source: ScoreSourceKind,
    pub score: f64,
    pub evidence: HitEvidence,
}

/// Fixed-shape fusion weights
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FusionWeights {
    #[serde(serialize_with = "round3")]
    pub hierarchical: f64,
    #[serde(serialize_with = "round3")]
    pub collaborative: f64,
    #[serde(serialize_with = "round3")]
    pub behavioral: f64,
    #[serde(serialize_with = "round3")]
    pub diversity: f64,
}

impl FusionWeights {
    pub fn for_source(&self, source: ScoreSourceKind) -> f64 {
        match source {
            ScoreSourceKind::Hierarchical => self.hierarchical,
            ScoreSourceKind::Collaborative => self.collaborative,
            ScoreSourceKind::Behavioral => self.behavioral,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScoreBreakdown {
    #[serde(serialize_with = "round3")]
    pub hierarchical: f64,
    #[serde(serialize_with = "round3")]
    pub collaborative: f64,
    #[serde(serialize_with = "round3")]
    pub behavioral: f64,
    #[serde(serialize_with = "round3")]
    pub diversity: f64,
    #[serde(serialize_with = "round3")]
    pub popularity: f64,
    #[serde(serialize_with = "round3")]
    pub total: f64,
}

impl ScoreBreakdown {
    pub fn component_mut(&mut self, source: ScoreSourceKind) -> &mut f64 {
        match source {
            ScoreSourceKind::Hierarchical => &mut self.hierarchical,
            ScoreSourceKind::Collaborative => &mut self.collaborative,
            ScoreSourceKind::Behavioral => &mut self.behavioral,
        }
    }

    pub fn recompute_total(&mut self) {
        self.total = self.hierarchical
            + self.collaborative
            + self.behavioral
            + self.diversity
            + self.popularity;
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ReasonKind {
    InterestMatch,
    SimilarUsers,
    ActivityPattern,
    Popularity,
    NewGroup,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reason {
    pub kind: ReasonKind,
    pub text: String,
    #[serde(serialize_with = "round3")]
    pub weight: f64,
    #[serde(serialize_with = "round3")]
    pub contribution_pct: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankedRecommendation {
    pub group_id: String,
    pub group_name: String,
    #[serde(serialize_with = "round3")]
    pub score: f64,
    /// Score after feedback adjustment; ordering key only
    #[serde(serialize_with = "round3")]
    pub adjusted_score: f64,
    pub breakdown: ScoreBreakdown,
    pub reasons: Vec<Reason>,
    #[serde(serialize_with = "round3")]
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub session_id: String,
    pub algorithm: Algorithm,
    pub recommendations: Vec<RankedRecommendation>,
    pub algorithm_weights: FusionWeights,
    pub total_candidates: usize,
    pub computation_time_ms: f64,
    pub used_fallback: bool,
    pub degraded_sources: Vec<ScoreSourceKind>,
    pub generated_at: DateTime<Utc>,
}
