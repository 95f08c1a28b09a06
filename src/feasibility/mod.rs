//! Feasibility scoring: restriction rules + one LLM judgement + registry signals
//!
//! The score starts from the LLM verdict (realistic or not), loses points for
//! estimated monthly cost, for a tool stack dominated by complex tools, and
//! for any restriction rule that fired, and is clamped to 1..=10. Without a
//! usable LLM verdict the scorer falls back to the rule table alone. Either
//! way a report is always produced.

pub mod rules;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::clients::CompletionOptions;
use crate::config::Tuning;
use crate::deserializers::{de_bool_forgiving, de_option_confidence, de_string_forgiving, de_string_list};
use crate::json_recovery;
use crate::pipeline::budget::Budget;
use crate::pipeline::invoke::LlmGateway;
use crate::pipeline::metrics::{MetricsRecorder, Stage};
use crate::pipeline::types::answers_text;
use crate::prompts::{PromptCache, ids};
use crate::registry::{DomainSignals, Priority, detect_domain, domain_signals, get_optimal_ai_tools};

pub use rules::{
    RULES, RULES_VERSION, RestrictionRule, RuleMatch, Severity, match_rules, rule_by_id,
    rule_for_platform,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreSource {
    /// LLM verdict combined with rules and registry signals
    Combined,
    RulesOnly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeasibilityReport {
    pub score: u8,
    pub is_realistic: bool,
    pub impossible_elements: Vec<String>,
    pub cost_warnings: Vec<String>,
    pub recommended_approach: String,
    pub alternatives: Vec<String>,
    pub domain: String,
    pub source: ScoreSource,
    pub matched_rules: Vec<String>,
    pub rules_version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reasoning: String,
}

/// Structured verdict requested from the judge model
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LlmJudgement {
    #[serde(deserialize_with = "de_bool_forgiving")]
    is_realistic: bool,
    #[serde(default, deserialize_with = "de_string_forgiving")]
    reasoning: String,
    #[serde(default, deserialize_with = "de_string_list")]
    issues: Vec<String>,
    #[serde(default, deserialize_with = "de_string_list")]
    alternatives: Vec<String>,
    #[serde(default, deserialize_with = "de_option_confidence")]
    confidence: Option<f32>,
}

/// Pure scoring rule. Cost penalties use the highest threshold exceeded.
pub fn compute_score(
    llm_realistic: bool,
    monthly_cost_usd: f32,
    complexity_dominates: bool,
    rule_fired: bool,
    tuning: &Tuning,
) -> u8 {
    let base = if llm_realistic {
        tuning.realistic_base
    } else {
        tuning.unrealistic_base
    };
    let mut score = base as i64;

    if let Some(p) = tuning
        .cost_penalties
        .iter()
        .filter(|p| monthly_cost_usd > p.over_usd)
        .max_by(|a, b| a.over_usd.total_cmp(&b.over_usd))
    {
        score -= p.penalty as i64;
    }
    if complexity_dominates {
        score -= tuning.complexity_penalty as i64;
    }
    if rule_fired {
        score -= tuning.restriction_penalty as i64;
    }
    score.clamp(1, 10) as u8
}

pub struct FeasibilityScorer {
    gateway: LlmGateway,
    prompts: Arc<PromptCache>,
}

impl FeasibilityScorer {
    pub fn new(gateway: LlmGateway, prompts: Arc<PromptCache>) -> Self {
        Self { gateway, prompts }
    }

    /// Score a request. Never fails: LLM problems degrade to rules-only scoring.
    pub async fn assess(
        &self,
        input: &str,
        answers: &BTreeMap<String, String>,
        budget: &Budget,
        metrics: &MetricsRecorder,
    ) -> FeasibilityReport {
        let config = self.gateway.config();
        let tuning = &config.tuning;
        let context = answers.values().cloned().collect::<Vec<_>>().join(" ");
        let full_text = format!("{input} {context}");

        let domain = detect_domain(input, &context);
        let signals = domain_signals(domain.domain).including_mentions(&full_text);
        let fired = match_rules(&full_text);

        let judgement = self
            .judge(input, answers, domain.domain.label, &fired, budget, metrics)
            .await;

        let mut report = match judgement {
            Some(j) => combined_report(&j, &signals, &fired, tuning),
            None => rules_only_report(&signals, &fired, tuning),
        };
        report.domain = domain.id().to_string();
        if report.recommended_approach.is_empty() {
            let rec = get_optimal_ai_tools(domain.domain, Priority::Ease, false);
            let names: Vec<_> = rec.ranked_names().into_iter().take(2).collect();
            report.recommended_approach = format!(
                "{} 조합으로 작은 단계부터 자동화하세요",
                names.join(" + ")
            );
        }

        info!(
            score = report.score,
            realistic = report.is_realistic,
            domain = %report.domain,
            rules = report.matched_rules.len(),
            source = ?report.source,
            "Feasibility assessed"
        );
        report
    }

    async fn judge(
        &self,
        input: &str,
        answers: &BTreeMap<String, String>,
        domain_label: &str,
        fired: &[RuleMatch],
        budget: &Budget,
        metrics: &MetricsRecorder,
    ) -> Option<LlmJudgement> {
        let prompt = self.prompts.get(ids::FEASIBILITY_JUDGE)?;
        let restrictions = if fired.is_empty() {
            "(없음)".to_string()
        } else {
            fired
                .iter()
                .map(|m| format!("- {}", m.impossible_element()))
                .collect::<Vec<_>>()
                .join("\n")
        };
        let answers = answers_text(answers);
        let messages = prompt.messages(&[
            ("input", input),
            ("answers", answers.as_str()),
            ("domain", domain_label),
            ("restrictions", restrictions.as_str()),
        ]);

        let config = self.gateway.config();
        let options = CompletionOptions {
            max_tokens: config.llm.judge_max_tokens,
            temperature: 0.0,
            json_mode: true,
        };
        let recorded = self
            .gateway
            .complete(
                budget,
                metrics,
                Stage::Feasibility,
                &config.llm.judge_model,
                &messages,
                options,
            )
            .await
            .ok()?;

        match json_recovery::parse_as::<LlmJudgement>(&recorded.value.text) {
            Ok(j) => Some(j),
            Err(e) => {
                warn!(error = %e, "Feasibility judgement unreadable; scoring from rules only");
                metrics.fail_record(recorded.record, e.to_string());
                None
            }
        }
    }

    /// Convenience entry point with a fresh budget, for one-off scoring.
    pub async fn score(&self, input: &str, answers: &BTreeMap<String, String>) -> FeasibilityReport {
        let tuning = &self.gateway.config().tuning;
        let budget = Budget::from_tuning(tuning);
        let metrics = MetricsRecorder::new(tuning.version.clone());
        self.assess(input, answers, &budget, &metrics).await
    }
}

/// Rules and registry signals only, with no model call. Used when the
/// pipeline has to produce output without any collaborator.
pub fn assess_rules_only(
    input: &str,
    answers: &BTreeMap<String, String>,
    tuning: &Tuning,
) -> FeasibilityReport {
    let context = answers.values().cloned().collect::<Vec<_>>().join(" ");
    let full_text = format!("{input} {context}");
    let domain = detect_domain(input, &context);
    let signals = domain_signals(domain.domain).including_mentions(&full_text);
    let mut report = rules_only_report(&signals, &match_rules(&full_text), tuning);
    report.domain = domain.id().to_string();
    report
}

fn push_unique(out: &mut Vec<String>, item: impl Into<String>) {
    let item = item.into();
    let trimmed = item.trim();
    if !trimmed.is_empty() && !out.iter().any(|x| x == trimmed) {
        out.push(trimmed.to_string());
    }
}

fn rule_findings(fired: &[RuleMatch]) -> (Vec<String>, Vec<String>, Vec<String>) {
    let mut impossible = Vec::new();
    let mut alternatives = Vec::new();
    let mut ids = Vec::new();
    for m in fired {
        push_unique(&mut impossible, m.impossible_element());
        for alt in m.rule.alternatives {
            push_unique(&mut alternatives, *alt);
        }
        ids.push(m.rule.id.to_string());
    }
    (impossible, alternatives, ids)
}

fn cost_warnings(signals: &DomainSignals, tuning: &Tuning) -> Vec<String> {
    let mut warnings = Vec::new();
    let lowest_threshold = tuning
        .cost_penalties
        .iter()
        .map(|p| p.over_usd)
        .fold(f32::INFINITY, f32::min);
    if signals.monthly_cost_usd > lowest_threshold {
        warnings.push(format!(
            "예상 월 비용 약 ${:.0} ({})",
            signals.monthly_cost_usd,
            signals.tools.join(", ")
        ));
    }
    if signals.complexity_dominates() {
        warnings.push(format!(
            "설정 난이도가 높은 도구 비중이 큽니다 (고급 {}개 / 입문 {}개)",
            signals.complex_tools, signals.beginner_tools
        ));
    }
    warnings
}

fn blocking_rule_approach(fired: &[RuleMatch]) -> Option<String> {
    let m = fired.iter().max_by_key(|m| m.rule.severity)?;
    Some(format!(
        "{}은(는) 불가능하므로 {} 방식으로 대체하세요",
        m.rule.integration,
        m.rule.alternatives.join(" / ")
    ))
}

fn combined_report(
    judgement: &LlmJudgement,
    signals: &DomainSignals,
    fired: &[RuleMatch],
    tuning: &Tuning,
) -> FeasibilityReport {
    let score = compute_score(
        judgement.is_realistic,
        signals.monthly_cost_usd,
        signals.complexity_dominates(),
        !fired.is_empty(),
        tuning,
    );
    let blocked = fired.iter().any(|m| m.rule.severity.is_blocking());
    let is_realistic =
        judgement.is_realistic && score >= tuning.realistic_min_score && !blocked;

    let (mut impossible, mut alternatives, matched_rules) = rule_findings(fired);
    if !judgement.is_realistic {
        for issue in &judgement.issues {
            push_unique(&mut impossible, issue.as_str());
        }
    }
    for alt in &judgement.alternatives {
        push_unique(&mut alternatives, alt.as_str());
    }

    let recommended_approach = blocking_rule_approach(fired)
        .or_else(|| {
            (!judgement.reasoning.trim().is_empty()).then(|| judgement.reasoning.trim().to_string())
        })
        .unwrap_or_default();

    tracing::debug!(confidence = ?judgement.confidence, "LLM feasibility verdict");
    FeasibilityReport {
        score,
        is_realistic,
        impossible_elements: impossible,
        cost_warnings: cost_warnings(signals, tuning),
        recommended_approach,
        alternatives,
        domain: String::new(),
        source: ScoreSource::Combined,
        matched_rules,
        rules_version: RULES_VERSION.to_string(),
        reasoning: judgement.reasoning.clone(),
    }
}

fn rules_only_report(
    signals: &DomainSignals,
    fired: &[RuleMatch],
    tuning: &Tuning,
) -> FeasibilityReport {
    let base = if fired.is_empty() {
        tuning.rules_only_default
    } else {
        tuning.rules_only_restricted
    };
    let score = base.clamp(1, 10);
    let (impossible, alternatives, matched_rules) = rule_findings(fired);
    FeasibilityReport {
        score,
        is_realistic: fired.is_empty() && score >= tuning.realistic_min_score,
        impossible_elements: impossible,
        cost_warnings: cost_warnings(signals, tuning),
        recommended_approach: blocking_rule_approach(fired).unwrap_or_default(),
        alternatives,
        domain: String::new(),
        source: ScoreSource::RulesOnly,
        matched_rules,
        rules_version: RULES_VERSION.to_string(),
        reasoning: String::new(),
    }
}
