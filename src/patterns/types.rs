use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use crate::feasibility::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternOrigin {
    Static,
    Learned,
}

/// A class of known-to-fail proposals with the descriptors used to spot it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailurePattern {
    pub id: String,
    /// Situations the failure happens in ("개인 계정", "고객" ...)
    #[serde(default)]
    pub context: Vec<String>,
    #[serde(default)]
    pub actions: Vec<String>,
    /// Spellings of the tool or platform involved
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub intents: Vec<String>,
    pub reason: String,
    #[serde(default)]
    pub alternatives: Vec<String>,
    pub severity: Severity,
    pub confidence: f32,
    #[serde(default)]
    pub examples: Vec<String>,
    pub origin: PatternOrigin,
    pub created_at: DateTime<Utc>,
}

/// One observed bad proposal, merged with near-duplicates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnedFailureCase {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub user_input: String,
    pub proposed_solution: String,
    #[serde(default)]
    pub matched_patterns: Vec<String>,
    pub validation_score: u8,
    pub frequency: u32,
    /// Set once the case has been turned into a pattern; never cleared
    #[serde(default)]
    pub promoted: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternMatch {
    pub pattern: FailurePattern,
    /// In (cutoff, 1]
    pub match_score: f32,
    pub match_reasons: Vec<String>,
}

/// What `save_failure_case` did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LearnOutcome {
    Appended { case_id: String },
    Merged { case_id: String, frequency: u32 },
    Promoted { case_id: String, pattern_id: String },
    /// The store could not be read or written; nothing was persisted
    StoreUnavailable,
}
