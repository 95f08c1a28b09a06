//! Contextual failure-pattern matching
//!
//! A pattern's score is its confidence times a weighted sum of four overlap
//! components (tool, action, context, intent). Each component is a saturating
//! hit ratio: the number of descriptors found in the candidate text, capped,
//! over the number needed for a full score. Tools are spellings of one
//! platform, so a single tool hit saturates that component. Context also
//! counts terms implied by the text (a KakaoTalk request implies a personal
//! account). Adding text can only add hits, so scores never drop when the
//! candidate text grows.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

use super::catalog::static_patterns;
use super::store::PatternStore;
use super::types::{FailurePattern, PatternMatch};
use crate::config::Tuning;
use crate::utils::normalize;

/// Trigger -> context terms it implies
const IMPLIED_CONTEXT: &[(&str, &[&str])] = &[
    ("카카오톡", &["개인 계정", "채팅방"]),
    ("카톡", &["개인 계정", "채팅방"]),
    ("친구", &["개인 계정"]),
    ("가족", &["개인 계정"]),
    ("내 계정", &["개인 계정"]),
    ("단톡", &["단톡방", "채팅방"]),
    ("손님", &["고객"]),
    ("회원", &["고객"]),
    ("구매자", &["고객"]),
    ("쇼핑몰", &["상품", "가격"]),
    ("최저가", &["가격"]),
    ("할인", &["가격"]),
    ("통장", &["계좌", "거래내역"]),
    ("카드값", &["거래내역"]),
    ("월급", &["계좌"]),
    ("인플루언서", &["팔로워"]),
    ("구글 드라이브", &["클라우드"]),
    ("원드라이브", &["클라우드"]),
    ("공짜", &["무료"]),
];

/// Context terms implied by `text` (already normalised).
pub fn implied_context(text: &str) -> Vec<&'static str> {
    let mut implied = Vec::new();
    for (trigger, terms) in IMPLIED_CONTEXT.iter() {
        if text.contains(trigger) {
            for term in *terms {
                if !implied.contains(term) {
                    implied.push(*term);
                }
            }
        }
    }
    implied
}

fn hits<'a>(text: &str, descriptors: &'a [String]) -> Vec<&'a str> {
    descriptors
        .iter()
        .map(|d| d.as_str())
        .filter(|d| !d.is_empty() && text.contains(&normalize(d)))
        .collect()
}

fn saturating_ratio(hit_count: usize, total: usize, saturation: usize) -> f32 {
    let needed = total.min(saturation);
    if needed == 0 {
        return 0.0;
    }
    hit_count.min(needed) as f32 / needed as f32
}

/// Score one pattern against normalised candidate text. Pure.
pub fn score_pattern(
    pattern: &FailurePattern,
    text: &str,
    implied: &[&str],
    tuning: &Tuning,
) -> (f32, Vec<String>) {
    let sat = tuning.overlap_saturation;
    let mut reasons = Vec::new();

    let tool_hits = hits(text, &pattern.tools);
    let tool = saturating_ratio(tool_hits.len(), pattern.tools.len(), 1);
    if !tool_hits.is_empty() {
        reasons.push(format!("도구 일치: {}", tool_hits.join(", ")));
    }

    let action_hits = hits(text, &pattern.actions);
    let action = saturating_ratio(action_hits.len(), pattern.actions.len(), sat);
    if !action_hits.is_empty() {
        reasons.push(format!("동작 일치: {}", action_hits.join(", ")));
    }

    let mut context_hits = hits(text, &pattern.context);
    for term in implied {
        if let Some(d) = pattern.context.iter().find(|c| c.as_str() == *term)
            && !context_hits.contains(&d.as_str())
        {
            context_hits.push(d.as_str());
        }
    }
    let context = saturating_ratio(context_hits.len(), pattern.context.len(), sat);
    if !context_hits.is_empty() {
        reasons.push(format!("맥락 일치: {}", context_hits.join(", ")));
    }

    let intent_hits = hits(text, &pattern.intents);
    let intent = saturating_ratio(intent_hits.len(), pattern.intents.len(), sat);
    if !intent_hits.is_empty() {
        reasons.push(format!("의도 일치: {}", intent_hits.join(", ")));
    }

    let weighted = tuning.tool_weight * tool
        + tuning.action_weight * action
        + tuning.context_weight * context
        + tuning.intent_weight * intent;
    let score = (pattern.confidence.clamp(0.0, 1.0) * weighted).clamp(0.0, 1.0);
    (score, reasons)
}

/// Match `patterns` against the candidate, keeping scores above the cutoff, best first.
pub fn match_patterns(
    patterns: &[FailurePattern],
    user_input: &str,
    proposed_solution: &str,
    answers: &BTreeMap<String, String>,
    tuning: &Tuning,
) -> Vec<PatternMatch> {
    let answer_text = answers.values().cloned().collect::<Vec<_>>().join(" ");
    let text = normalize(&format!("{user_input} {proposed_solution} {answer_text}"));
    let implied = implied_context(&text);

    let mut matches: Vec<PatternMatch> = patterns
        .iter()
        .filter_map(|pattern| {
            let (score, reasons) = score_pattern(pattern, &text, &implied, tuning);
            (score > tuning.match_cutoff).then(|| PatternMatch {
                pattern: pattern.clone(),
                match_score: score,
                match_reasons: reasons,
            })
        })
        .collect();
    matches.sort_by(|a, b| b.match_score.total_cmp(&a.match_score));
    matches
}

pub struct PatternMatcher {
    store: Arc<dyn PatternStore>,
    tuning: Tuning,
}

impl PatternMatcher {
    pub fn new(store: Arc<dyn PatternStore>, tuning: Tuning) -> Self {
        Self { store, tuning }
    }

    /// Static patterns plus whatever the store holds. A store failure leaves
    /// the static set.
    pub async fn all_patterns(&self) -> Vec<FailurePattern> {
        let mut patterns = static_patterns().to_vec();
        match self.store.load_patterns().await {
            Ok(learned) => patterns.extend(learned),
            Err(e) => warn!(error = %e, "Learned patterns unavailable; using static set"),
        }
        patterns
    }

    pub async fn find_contextual_patterns(
        &self,
        user_input: &str,
        proposed_solution: &str,
        answers: &BTreeMap<String, String>,
    ) -> Vec<PatternMatch> {
        let patterns = self.all_patterns().await;
        let matches = match_patterns(&patterns, user_input, proposed_solution, answers, &self.tuning);
        tracing::debug!(
            candidates = patterns.len(),
            matched = matches.len(),
            "Failure pattern scan"
        );
        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_answers() -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    #[test]
    fn kakao_request_matches_kakao_pattern_first() {
        let t = Tuning::default();
        let m = match_patterns(
            static_patterns(),
            "카카오톡으로 자동 알림 보내기",
            "1. 카카오톡 메시지 자동 전송",
            &no_answers(),
            &t,
        );
        assert!(!m.is_empty());
        assert_eq!(m[0].pattern.id, "kakao_personal_api");
        assert!(m[0].match_score > t.match_cutoff && m[0].match_score <= 1.0);
        assert!(m[0].match_reasons.iter().any(|r| r.contains("개인 계정")));
        // Descending
        assert!(m.windows(2).all(|w| w[0].match_score >= w[1].match_score));
    }

    #[test]
    fn unrelated_text_matches_nothing() {
        let m = match_patterns(
            static_patterns(),
            "구글 시트에 매출 합계 정리",
            "",
            &no_answers(),
            &Tuning::default(),
        );
        assert!(m.is_empty());
    }

    #[test]
    fn answers_contribute_context() {
        let t = Tuning::default();
        let base = match_patterns(static_patterns(), "쿠팡 크롤링", "", &no_answers(), &t);
        let mut answers = BTreeMap::new();
        answers.insert("목적".to_string(), "최저가 가격 모니터링".to_string());
        let richer = match_patterns(static_patterns(), "쿠팡 크롤링", "", &answers, &t);
        let score = |ms: &[PatternMatch]| {
            ms.iter()
                .find(|m| m.pattern.id == "marketplace_scraping")
                .map(|m| m.match_score)
                .unwrap_or(0.0)
        };
        assert!(score(&richer) > score(&base));
    }

    #[test]
    fn saturation_caps_components() {
        assert_eq!(saturating_ratio(5, 6, 2), 1.0);
        assert_eq!(saturating_ratio(1, 6, 2), 0.5);
        assert_eq!(saturating_ratio(1, 1, 2), 1.0);
        assert_eq!(saturating_ratio(0, 0, 2), 0.0);
    }
}
