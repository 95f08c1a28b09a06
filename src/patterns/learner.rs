//! Learning from low-scoring proposals
//!
//! Near-duplicate cases are merged into one row whose frequency grows; at the
//! promotion frequency the case becomes a learned `FailurePattern`. Promotion
//! is one-way. Store failures are logged and reported as
//! `LearnOutcome::StoreUnavailable`, never raised.

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::catalog::static_patterns;
use super::store::PatternStore;
use super::types::{FailurePattern, LearnOutcome, LearnedFailureCase, PatternOrigin, Severity};
use crate::config::Tuning;
use crate::error::Result;
use crate::feasibility::{match_rules, rule_for_platform};
use crate::registry::tools_in_text;
use crate::utils::{normalize, word_similarity};

/// Jaro-Winkler similarity at which two examples count as the same request
const EXAMPLE_SIMILARITY: f64 = 0.9;
const FALLBACK_KEYWORDS: usize = 6;

pub struct FailureLearner {
    store: Arc<dyn PatternStore>,
    tuning: Tuning,
    // Serialises the load-modify-save cycle across concurrent requests
    lock: Mutex<()>,
}

impl FailureLearner {
    pub fn new(store: Arc<dyn PatternStore>, tuning: Tuning) -> Self {
        Self {
            store,
            tuning,
            lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<dyn PatternStore> {
        &self.store
    }

    pub async fn save_failure_case(
        &self,
        user_input: &str,
        proposed_solution: &str,
        matched_patterns: &[String],
        validation_score: u8,
    ) -> LearnOutcome {
        let _guard = self.lock.lock().await;
        match self
            .record(user_input, proposed_solution, matched_patterns, validation_score)
            .await
        {
            Ok(outcome) => {
                debug!(?outcome, "Failure case recorded");
                outcome
            }
            Err(e) => {
                warn!(error = %e, "Failure case not persisted");
                LearnOutcome::StoreUnavailable
            }
        }
    }

    async fn record(
        &self,
        user_input: &str,
        proposed_solution: &str,
        matched_patterns: &[String],
        validation_score: u8,
    ) -> Result<LearnOutcome> {
        let mut cases = self.store.load_cases().await?;

        let existing = cases
            .iter()
            .position(|c| word_similarity(&c.user_input, user_input) > self.tuning.merge_similarity);

        let idx = match existing {
            Some(idx) => {
                let case = &mut cases[idx];
                case.frequency = case.frequency.saturating_add(1);
                case.timestamp = Utc::now();
                case.proposed_solution = proposed_solution.to_string();
                case.validation_score = case.validation_score.min(validation_score);
                for id in matched_patterns {
                    if !case.matched_patterns.contains(id) {
                        case.matched_patterns.push(id.clone());
                    }
                }
                idx
            }
            None => {
                cases.push(LearnedFailureCase {
                    id: uuid::Uuid::new_v4().to_string(),
                    timestamp: Utc::now(),
                    user_input: user_input.to_string(),
                    proposed_solution: proposed_solution.to_string(),
                    matched_patterns: matched_patterns.to_vec(),
                    validation_score,
                    frequency: 1,
                    promoted: false,
                });
                cases.len() - 1
            }
        };

        let case = cases[idx].clone();
        let mut outcome = if existing.is_some() {
            LearnOutcome::Merged {
                case_id: case.id.clone(),
                frequency: case.frequency,
            }
        } else {
            LearnOutcome::Appended {
                case_id: case.id.clone(),
            }
        };

        if !case.promoted && case.frequency >= self.tuning.promotion_frequency {
            let mut learned = self.store.load_patterns().await?;
            let already_known = static_patterns()
                .iter()
                .chain(learned.iter())
                .any(|p| p.examples.iter().any(|ex| self.similar_example(ex, &case.user_input)));

            if already_known {
                debug!(case_id = %case.id, "Promotion skipped; a pattern already covers this request");
            } else {
                let pattern = self.promote(&case, &learned);
                info!(
                    case_id = %case.id,
                    pattern_id = %pattern.id,
                    confidence = pattern.confidence,
                    "Failure case promoted to pattern"
                );
                outcome = LearnOutcome::Promoted {
                    case_id: case.id.clone(),
                    pattern_id: pattern.id.clone(),
                };
                learned.push(pattern);
                self.store.save_patterns(&learned).await?;
            }
            cases[idx].promoted = true;
        }

        self.store.save_cases(&cases).await?;
        Ok(outcome)
    }

    fn similar_example(&self, a: &str, b: &str) -> bool {
        let (na, nb) = (normalize(a), normalize(b));
        strsim::jaro_winkler(&na, &nb) >= EXAMPLE_SIMILARITY
            || word_similarity(&na, &nb) > self.tuning.merge_similarity
    }

    /// Build a pattern from the case, preferring the restriction table, then
    /// the best pattern the case was matched against.
    fn promote(&self, case: &LearnedFailureCase, learned: &[FailurePattern]) -> FailurePattern {
        let text = format!("{} {}", case.user_input, case.proposed_solution);
        let inherited = case.matched_patterns.iter().find_map(|id| {
            static_patterns()
                .iter()
                .chain(learned.iter())
                .find(|p| &p.id == id)
        });

        let mut tools: Vec<String> = Vec::new();
        let mut actions: Vec<String> = Vec::new();
        let mut reason = None;
        let mut alternatives = Vec::new();
        let mut severity = Severity::Medium;

        if let Some(m) = match_rules(&text).first() {
            tools.extend(m.rule.platforms.iter().map(|s| s.to_string()));
            actions.push(m.action.to_string());
            reason = Some(m.rule.reason.to_string());
            alternatives.extend(m.rule.alternatives.iter().map(|s| s.to_string()));
            severity = m.rule.severity;
        } else if let Some((rule, platform)) = rule_for_platform(&text) {
            tools.push(platform.to_string());
            alternatives.extend(rule.alternatives.iter().map(|s| s.to_string()));
        }
        for tool in tools_in_text(&text) {
            let name = normalize(tool.name);
            if !tools.contains(&name) {
                tools.push(name);
            }
        }

        let (mut context, intents) = match inherited {
            Some(p) => {
                for t in &p.tools {
                    if !tools.contains(t) {
                        tools.push(t.clone());
                    }
                }
                for a in &p.actions {
                    if !actions.contains(a) {
                        actions.push(a.clone());
                    }
                }
                if reason.is_none() {
                    reason = Some(p.reason.clone());
                    severity = p.severity;
                }
                if alternatives.is_empty() {
                    alternatives = p.alternatives.clone();
                }
                (p.context.clone(), p.intents.clone())
            }
            None => (Vec::new(), Vec::new()),
        };

        // Nothing recognisable: fall back to the request's own words so the
        // pattern can still catch rephrasings of it
        if tools.is_empty() && actions.is_empty() {
            let mut words: Vec<String> = normalize(&case.user_input)
                .split_whitespace()
                .filter(|w| w.chars().count() >= 2)
                .map(str::to_string)
                .collect();
            words.dedup();
            words.truncate(FALLBACK_KEYWORDS);
            actions = words.clone();
            if context.is_empty() {
                context = words;
            }
        }

        FailurePattern {
            id: format!("learned_{}", &uuid::Uuid::new_v4().simple().to_string()[..8]),
            context,
            actions,
            tools,
            intents,
            reason: reason.unwrap_or_else(|| {
                format!(
                    "비슷한 요청이 {}회 낮은 검증 점수를 받았습니다",
                    case.frequency
                )
            }),
            alternatives,
            severity,
            confidence: self.tuning.promoted_confidence(case.frequency),
            examples: vec![case.user_input.clone()],
            origin: PatternOrigin::Learned,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::store::MemoryStore;

    fn learner() -> (FailureLearner, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (FailureLearner::new(store.clone(), Tuning::default()), store)
    }

    #[tokio::test]
    async fn identical_input_merges_into_one_case() {
        let (learner, store) = learner();
        let input = "매주 월요일 거래처 엑셀 파일을 모아서 요약 메일 보내기";
        let first = learner.save_failure_case(input, "1. a", &[], 4).await;
        let second = learner.save_failure_case(input, "1. b", &[], 2).await;
        assert!(matches!(first, LearnOutcome::Appended { .. }));
        assert!(matches!(second, LearnOutcome::Merged { frequency: 2, .. }));

        let cases = store.load_cases().await.unwrap();
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].frequency, 2);
        assert_eq!(cases[0].validation_score, 2);
        assert_eq!(cases[0].proposed_solution, "1. b");
    }

    #[tokio::test]
    async fn third_occurrence_promotes_once() {
        let (learner, store) = learner();
        let input = "라인 메신저로 고객 단체방에 매일 재고 현황 자동 공유";
        for _ in 0..2 {
            learner.save_failure_case(input, "1. 라인 전송", &[], 3).await;
        }
        let third = learner.save_failure_case(input, "1. 라인 전송", &[], 3).await;
        assert!(matches!(third, LearnOutcome::Promoted { .. }));
        let fourth = learner.save_failure_case(input, "1. 라인 전송", &[], 3).await;
        assert!(matches!(fourth, LearnOutcome::Merged { frequency: 4, .. }));

        let patterns = store.load_patterns().await.unwrap();
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].origin, PatternOrigin::Learned);
        assert!((patterns[0].confidence - 0.8).abs() < 1e-6);
        assert!(store.load_cases().await.unwrap()[0].promoted);
    }

    #[tokio::test]
    async fn known_example_is_not_promoted_again() {
        let (learner, store) = learner();
        // Same wording as a static kakao example
        let input = "카카오톡으로 매일 매출 알림 보내기";
        let ids = vec!["kakao_personal_api".to_string()];
        let mut last = LearnOutcome::StoreUnavailable;
        for _ in 0..3 {
            last = learner.save_failure_case(input, "1. 카카오톡 전송", &ids, 2).await;
        }
        assert!(matches!(last, LearnOutcome::Merged { frequency: 3, .. }));
        assert!(store.load_patterns().await.unwrap().is_empty());
    }

    #[test]
    fn promoted_pattern_takes_rule_descriptors() {
        let (learner, _) = learner();
        let case = LearnedFailureCase {
            id: "c1".to_string(),
            timestamp: Utc::now(),
            user_input: "왓츠앱으로 고객에게 자동 메시지 전송".to_string(),
            proposed_solution: String::new(),
            matched_patterns: vec![],
            validation_score: 2,
            frequency: 3,
            promoted: false,
        };
        let p = learner.promote(&case, &[]);
        assert!(p.tools.iter().any(|t| t == "whatsapp"));
        assert!(p.alternatives.iter().any(|a| a.contains("텔레그램")));
        assert_eq!(p.examples, vec![case.user_input.clone()]);
    }
}
