//! Step B: flow verification and correction
//!
//! Each step is broken into `{tool, action}` candidates. Unique candidates
//! are validated concurrently (once per request), a step whose candidates are
//! all non-viable is rewritten in place, and the step count and order never
//! change. If no validation could reach either collaborator the original flow
//! is returned and the outage is flagged.

use async_trait::async_trait;
use chrono::Datelike;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::budget::Budget;
use super::extraction::{Candidate, extract_candidates};
use super::invoke::LlmGateway;
use super::metrics::{Flag, MetricsRecorder, Stage};
use super::rewrite::rewrite_step;
use super::types::{Flow, StepValidation, ValidationStatus};
use crate::clients::{CompletionOptions, SearchHit};
use crate::config::Tuning;
use crate::deserializers::{de_bool_forgiving, de_string_forgiving, de_string_list};
use crate::error::{FlowcraftError, Result};
use crate::feasibility::rule_for_platform;
use crate::json_recovery;
use crate::prompts::{PromptCache, ids};
use crate::rag::RetrievalAdapter;
use crate::utils::{contains_any, normalize, truncate_chars};

const NEGATIVE_WORDS: &[&str] = &[
    "불가능", "지원하지 않", "지원 안", "지원 중단", "서비스 종료", "종료되", "금지", "차단",
    "막혔", "not supported", "unsupported", "deprecated", "discontinued", "no longer", "banned",
];
const LIMITATION_WORDS: &[&str] = &[
    "제한", "유료", "승인", "심사", "사업자", "limited", "limit", "approval", "paid plan",
];
const POSITIVE_WORDS: &[&str] = &[
    "가능", "지원", "연동", "무료", "방법", "available", "supported", "integration", "how to",
];

const EVIDENCE_SNIPPET_CHARS: usize = 300;

/// Keyword evidence from retrieval snippets: each snippet contributes the
/// negative, limitation and positive weights for the classes it mentions.
///
/// Negative phrases contain positive words ("불가능", "not supported"), so a
/// snippet that reads negative never also scores positive.
pub fn score_evidence(hits: &[SearchHit], tuning: &Tuning) -> i32 {
    hits.iter()
        .map(|hit| {
            let text = normalize(&format!("{} {}", hit.title, hit.content));
            let negative = contains_any(&text, NEGATIVE_WORDS);
            let mut score = 0;
            if negative {
                score += tuning.negative_weight;
            }
            if contains_any(&text, LIMITATION_WORDS) {
                score += tuning.limitation_weight;
            }
            if !negative && contains_any(&text, POSITIVE_WORDS) {
                score += tuning.positive_weight;
            }
            score
        })
        .sum()
}

/// Decides whether one tool/action pair works today.
///
/// `Err` means neither collaborator could be reached for this candidate.
#[async_trait]
pub trait MethodValidator: Send + Sync {
    async fn validate(
        &self,
        candidate: &Candidate,
        step: &str,
        budget: &Budget,
        metrics: &MetricsRecorder,
    ) -> Result<StepValidation>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MethodVerdict {
    #[serde(deserialize_with = "de_bool_forgiving")]
    is_viable: bool,
    #[serde(default, deserialize_with = "de_string_forgiving")]
    reasoning: String,
    #[serde(default, deserialize_with = "de_string_list")]
    issues: Vec<String>,
    #[serde(default, deserialize_with = "de_string_list")]
    alternatives: Vec<String>,
}

/// Retrieval evidence plus one authoritative LLM judgement
pub struct LiveValidator {
    rag: Arc<RetrievalAdapter>,
    gateway: LlmGateway,
    prompts: Arc<PromptCache>,
}

impl LiveValidator {
    pub fn new(rag: Arc<RetrievalAdapter>, gateway: LlmGateway, prompts: Arc<PromptCache>) -> Self {
        Self {
            rag,
            gateway,
            prompts,
        }
    }

    fn queries(tool: &str, action: &str) -> [String; 2] {
        let year = chrono::Utc::now().year();
        [
            format!("{tool} {action} 자동화 가능 여부 {year}"),
            format!("{tool} API {action} 지원 중단 제한"),
        ]
    }

    /// Search (at most `max_queries_per_method` queries, stopping early once
    /// the evidence is decisive), then ask the judge model.
    pub async fn validate_method_current_status(
        &self,
        tool: &str,
        action: &str,
        step: &str,
        budget: &Budget,
        metrics: &MetricsRecorder,
    ) -> Result<StepValidation> {
        let tuning = &self.gateway.config().tuning;

        let mut hits: Vec<SearchHit> = Vec::new();
        let mut evidence = 0;
        let mut issued = 0;
        for query in Self::queries(tool, action)
            .iter()
            .take(tuning.max_queries_per_method)
        {
            if budget.check(Stage::Verify).is_err() {
                debug!(tool, action, issued, "Budget spent; no further validation queries");
                break;
            }
            let found = self
                .rag
                .search_within(query, &self.rag.default_options(), budget, Stage::Verify)
                .await;
            issued += 1;
            evidence += score_evidence(&found, tuning);
            hits.extend(found);
            if evidence.abs() >= tuning.early_exit_evidence {
                debug!(tool, action, evidence, "Evidence decisive; skipping remaining queries");
                break;
            }
        }
        metrics.count_validation_queries(issued);

        let verdict = self
            .judge(tool, action, step, &hits, evidence, budget, metrics)
            .await;

        let rule = rule_for_platform(tool).map(|(rule, _)| rule);
        match verdict {
            Ok(v) => {
                let mut alternatives = v.alternatives;
                if !v.is_viable
                    && alternatives.is_empty()
                    && let Some(rule) = rule
                {
                    alternatives = rule.alternatives.iter().map(|s| s.to_string()).collect();
                }
                Ok(StepValidation {
                    tool: tool.to_string(),
                    action: action.to_string(),
                    is_viable: v.is_viable,
                    issues: v.issues,
                    alternatives,
                    status: if v.is_viable {
                        ValidationStatus::Viable
                    } else {
                        ValidationStatus::NonViable
                    },
                    evidence_score: evidence,
                    reasoning: v.reasoning,
                })
            }
            Err(e) if hits.is_empty() && e.is_unavailable() => Err(e),
            Err(e) => {
                // Keyword evidence and the restriction table decide
                let blocked = rule.is_some_and(|r| r.severity.is_blocking());
                let is_viable = !blocked && evidence >= 0;
                debug!(tool, action, evidence, blocked, error = %e, "Judge unavailable; keyword verdict");
                let mut issues = Vec::new();
                let mut alternatives = Vec::new();
                if let Some(rule) = rule
                    && !is_viable
                {
                    issues.push(rule.reason.to_string());
                    alternatives = rule.alternatives.iter().map(|s| s.to_string()).collect();
                }
                Ok(StepValidation {
                    tool: tool.to_string(),
                    action: action.to_string(),
                    is_viable,
                    issues,
                    alternatives,
                    status: if is_viable {
                        ValidationStatus::Viable
                    } else {
                        ValidationStatus::NonViable
                    },
                    evidence_score: evidence,
                    reasoning: String::new(),
                })
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn judge(
        &self,
        tool: &str,
        action: &str,
        step: &str,
        hits: &[SearchHit],
        evidence: i32,
        budget: &Budget,
        metrics: &MetricsRecorder,
    ) -> Result<MethodVerdict> {
        let prompt = self
            .prompts
            .get(ids::METHOD_VALIDATION)
            .ok_or_else(|| FlowcraftError::Internal {
                message: format!("prompt {} missing", ids::METHOD_VALIDATION),
            })?;
        let digest = if hits.is_empty() {
            "(검색 결과 없음)".to_string()
        } else {
            hits.iter()
                .take(self.gateway.config().search.digest_results)
                .map(|h| format!("- {}: {}", h.title, truncate_chars(&h.content, EVIDENCE_SNIPPET_CHARS)))
                .collect::<Vec<_>>()
                .join("\n")
        };
        let evidence = evidence.to_string();
        let messages = prompt.messages(&[
            ("tool", tool),
            ("action", action),
            ("step", step),
            ("evidence", digest.as_str()),
            ("evidence_score", evidence.as_str()),
        ]);

        let config = self.gateway.config();
        let options = CompletionOptions {
            max_tokens: config.llm.judge_max_tokens,
            temperature: 0.0,
            json_mode: true,
        };
        let recorded = self
            .gateway
            .complete(budget, metrics, Stage::Verify, &config.llm.judge_model, &messages, options)
            .await?;
        json_recovery::parse_as::<MethodVerdict>(&recorded.value.text).map_err(|e| {
            metrics.fail_record(recorded.record, e.to_string());
            FlowcraftError::malformed(e.to_string())
        })
    }
}

#[async_trait]
impl MethodValidator for LiveValidator {
    async fn validate(
        &self,
        candidate: &Candidate,
        step: &str,
        budget: &Budget,
        metrics: &MetricsRecorder,
    ) -> Result<StepValidation> {
        self.validate_method_current_status(&candidate.tool, &candidate.action, step, budget, metrics)
            .await
    }
}

/// Verified flow with the evidence behind each step
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Verification {
    pub flow: Flow,
    /// Per step, one validation per candidate
    pub validations: Vec<Vec<StepValidation>>,
    /// 0-based indices of rewritten steps
    pub rewritten: Vec<usize>,
    pub outage: bool,
}

impl Verification {
    fn unchanged(flow: &Flow, outage: bool) -> Self {
        Self {
            flow: flow.clone(),
            validations: vec![Vec::new(); flow.steps.len()],
            rewritten: Vec::new(),
            outage,
        }
    }
}

pub struct FlowVerifier {
    validator: Arc<dyn MethodValidator>,
    tuning: Tuning,
}

impl FlowVerifier {
    pub fn new(validator: Arc<dyn MethodValidator>, tuning: Tuning) -> Self {
        Self { validator, tuning }
    }

    pub async fn verify(&self, flow: &Flow, budget: &Budget, metrics: &MetricsRecorder) -> Verification {
        if let Err(e) = budget.check(Stage::Verify) {
            warn!(error = %e, "Skipping verification");
            metrics.flag(Flag::BudgetExhausted);
            return Verification::unchanged(flow, false);
        }

        let per_step: Vec<Vec<Candidate>> = flow.steps.iter().map(|s| extract_candidates(s)).collect();

        // Unique candidates in first-seen order; the first `max_validations`
        // are checked and the rest stay unverified.
        let mut unique: Vec<(&Candidate, &str)> = Vec::new();
        let mut seen: HashSet<(String, String)> = HashSet::new();
        for (step, candidates) in flow.steps.iter().zip(&per_step) {
            for c in candidates.iter().filter(|c| c.tier.needs_validation()) {
                if seen.insert(c.key()) {
                    unique.push((c, step.as_str()));
                }
            }
        }
        let (checked, overflow) = unique.split_at(unique.len().min(self.tuning.max_validations));
        if !overflow.is_empty() {
            debug!(skipped = overflow.len(), "Validation cap reached; remaining candidates unverified");
        }

        let results = join_all(
            checked
                .iter()
                .map(|(c, step)| self.validator.validate(c, step, budget, metrics)),
        )
        .await;

        let attempted = results.len();
        let mut memo: HashMap<(String, String), StepValidation> = HashMap::new();
        let mut failures = 0;
        for ((c, _), result) in checked.iter().zip(results) {
            let validation = match result {
                Ok(v) => v,
                Err(e) => {
                    warn!(tool = %c.tool, action = %c.action, error = %e, "Validation unavailable");
                    failures += 1;
                    StepValidation::unverified(&c.tool, &c.action)
                }
            };
            memo.insert(c.key(), validation);
        }

        if attempted > 0 && failures == attempted {
            warn!(attempted, "Verification outage; keeping the draft flow");
            metrics.flag(Flag::VerificationOutage);
            return Verification::unchanged(flow, true);
        }

        let mut verified = flow.clone();
        let mut validations = Vec::with_capacity(flow.steps.len());
        let mut rewritten = Vec::new();
        for (idx, candidates) in per_step.iter().enumerate() {
            let step_validations: Vec<StepValidation> = candidates
                .iter()
                .map(|c| {
                    memo.get(&c.key())
                        .cloned()
                        .unwrap_or_else(|| StepValidation::unverified(&c.tool, &c.action))
                })
                .collect();
            let problematic = !step_validations.is_empty()
                && step_validations
                    .iter()
                    .all(|v| v.status == ValidationStatus::NonViable);
            if problematic {
                let replacement = rewrite_step(&flow.steps[idx], &step_validations);
                if replacement != flow.steps[idx] {
                    debug!(step = idx + 1, from = %flow.steps[idx], to = %replacement, "Step rewritten");
                    verified.steps[idx] = replacement;
                    rewritten.push(idx);
                } else {
                    debug!(step = idx + 1, "Non-viable step left as drafted; no substitution applies");
                }
            }
            validations.push(step_validations);
        }

        info!(
            steps = verified.steps.len(),
            validated = attempted,
            rewritten = rewritten.len(),
            "Flow verified"
        );
        Verification {
            flow: verified,
            validations,
            rewritten,
            outage: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Marks candidates whose tool is in `bad` as non-viable and counts calls
    struct Scripted {
        bad: Vec<&'static str>,
        calls: Mutex<Vec<String>>,
        fail_all: bool,
    }

    impl Scripted {
        fn new(bad: &[&'static str]) -> Self {
            Self {
                bad: bad.to_vec(),
                calls: Mutex::new(Vec::new()),
                fail_all: false,
            }
        }
    }

    #[async_trait]
    impl MethodValidator for Scripted {
        async fn validate(
            &self,
            candidate: &Candidate,
            _step: &str,
            _budget: &Budget,
            _metrics: &MetricsRecorder,
        ) -> Result<StepValidation> {
            self.calls.lock().unwrap().push(candidate.tool.clone());
            if self.fail_all {
                return Err(FlowcraftError::Transport {
                    service: "search".into(),
                    message: "down".into(),
                });
            }
            let viable = !self.bad.contains(&candidate.tool.as_str());
            Ok(StepValidation {
                tool: candidate.tool.clone(),
                action: candidate.action.clone(),
                is_viable: viable,
                issues: vec![],
                alternatives: vec![],
                status: if viable {
                    ValidationStatus::Viable
                } else {
                    ValidationStatus::NonViable
                },
                evidence_score: 0,
                reasoning: String::new(),
            })
        }
    }

    fn flow() -> Flow {
        Flow::new(
            "알림",
            "",
            vec![
                "1. 구글 시트에 주문 정리".into(),
                "2. 카카오톡 메시지 자동 전송".into(),
                "3. 카카오톡 전송 결과 확인".into(),
                "4. 결과를 정리하기".into(),
            ],
        )
    }

    fn ctx() -> (Budget, MetricsRecorder) {
        let t = Tuning::default();
        (Budget::from_tuning(&t), MetricsRecorder::new(t.version.clone()))
    }

    #[tokio::test]
    async fn rewrites_only_problem_steps_and_keeps_shape() {
        let validator = Arc::new(Scripted::new(&["카카오톡"]));
        let verifier = FlowVerifier::new(validator.clone(), Tuning::default());
        let (budget, metrics) = ctx();
        let original = flow();
        let out = verifier.verify(&original, &budget, &metrics).await;

        assert_eq!(out.flow.steps.len(), original.steps.len());
        assert_eq!(out.flow.steps[0], original.steps[0]);
        assert!(out.flow.steps[1].starts_with("2. "));
        assert!(!out.flow.steps[1].contains("카카오톡"));
        assert_eq!(out.rewritten, vec![1, 2]);
        assert!(!out.outage);
        // 카카오톡 validated once for both steps (different actions would differ)
        let calls = validator.calls.lock().unwrap().clone();
        assert_eq!(calls.iter().filter(|t| *t == "카카오톡").count(), 1);
    }

    #[tokio::test]
    async fn cap_leaves_overflow_unverified() {
        let validator = Arc::new(Scripted::new(&["카카오톡"]));
        let mut tuning = Tuning::default();
        tuning.max_validations = 1;
        let verifier = FlowVerifier::new(validator.clone(), tuning);
        let (budget, metrics) = ctx();
        let out = verifier.verify(&flow(), &budget, &metrics).await;
        assert_eq!(validator.calls.lock().unwrap().len(), 1);
        // Google Sheets was validated first; the kakao steps were never checked
        assert!(out.rewritten.is_empty());
        assert_eq!(out.validations[1][0].status, ValidationStatus::Unverified);
    }

    #[tokio::test]
    async fn total_outage_returns_original() {
        let mut scripted = Scripted::new(&[]);
        scripted.fail_all = true;
        let verifier = FlowVerifier::new(Arc::new(scripted), Tuning::default());
        let (budget, metrics) = ctx();
        let original = flow();
        let out = verifier.verify(&original, &budget, &metrics).await;
        assert!(out.outage);
        assert_eq!(out.flow, original);
        assert!(metrics.snapshot().flags.verification_outage);
    }

    #[test]
    fn evidence_weights() {
        let t = Tuning::default();
        let hit = |content: &str| SearchHit {
            url: "u".into(),
            title: String::new(),
            content: content.into(),
            score: 0.5,
        };
        assert_eq!(score_evidence(&[hit("API is deprecated")], &t), -3);
        assert_eq!(score_evidence(&[hit("연동 방법 안내")], &t), 2);
        assert_eq!(score_evidence(&[hit("유료 플랜에서만 연동 가능")], &t), 1);
    }

    #[test]
    fn negative_phrases_do_not_count_as_positive() {
        let t = Tuning::default();
        let hit = |content: &str| SearchHit {
            url: "u".into(),
            title: String::new(),
            content: content.into(),
            score: 0.5,
        };
        assert_eq!(score_evidence(&[hit("카카오톡 자동 발송은 불가능합니다")], &t), -3);
        assert_eq!(score_evidence(&[hit("개인 계정 API를 지원하지 않습니다")], &t), -3);
        assert_eq!(score_evidence(&[hit("personal messaging is not supported")], &t), -3);
        assert_eq!(
            score_evidence(&[hit("자동화 불가능"), hit("연동 방법")], &t),
            -1
        );
    }

    #[tokio::test]
    async fn crawl_step_is_rewritten_and_reported() {
        let validator = Arc::new(Scripted::new(&["웹사이트"]));
        let verifier = FlowVerifier::new(validator, Tuning::default());
        let (budget, metrics) = ctx();
        let original = Flow::new(
            "가격 비교",
            "",
            vec![
                "1. 경쟁사 웹 페이지 가격을 크롤링".into(),
                "2. 구글 시트에 가격 기록".into(),
            ],
        );
        let out = verifier.verify(&original, &budget, &metrics).await;
        assert_eq!(out.rewritten, vec![0]);
        assert_ne!(out.flow.steps[0], original.steps[0]);
        assert!(out.flow.steps[0].starts_with("1. "));
        assert!(!out.flow.steps[0].contains("크롤링"));
        assert_eq!(out.flow.steps[1], original.steps[1]);
    }

    #[tokio::test]
    async fn spent_budget_sends_no_validation_queries() {
        use crate::clients::{ClientError, OfflineLlm, SearchClient, SearchOptions};
        use crate::config::{Config, SearchConfig};
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::time::Duration;

        struct Counting(AtomicUsize);

        #[async_trait]
        impl SearchClient for Counting {
            async fn search(
                &self,
                _query: &str,
                _options: &SearchOptions,
            ) -> std::result::Result<Vec<SearchHit>, ClientError> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(Vec::new())
            }
        }

        let search = Arc::new(Counting(AtomicUsize::new(0)));
        let rag = Arc::new(RetrievalAdapter::new(search.clone(), &SearchConfig::default()));
        let gateway = LlmGateway::new(Arc::new(OfflineLlm), Arc::new(Config::default()));
        let validator = LiveValidator::new(rag, gateway, Arc::new(PromptCache::builtin()));

        let budget = Budget::new(Duration::ZERO, 10_000);
        let metrics = MetricsRecorder::new(Tuning::default().version);
        let out = validator
            .validate_method_current_status("카카오톡", "전송", "2. 카카오톡 전송", &budget, &metrics)
            .await;

        assert!(matches!(out, Err(FlowcraftError::BudgetExhausted { .. })));
        assert_eq!(search.0.load(Ordering::SeqCst), 0);
        assert_eq!(metrics.snapshot().validation_queries, 0);
    }
}
