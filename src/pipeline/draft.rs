//! Step A: draft flow generation
//!
//! Primary model, then the secondary model (skipped for trivial inputs), then
//! a deterministic template. The first strategy that yields a non-empty step
//! list wins, and whatever wins is normalised to the configured step bounds.

use futures_util::FutureExt;
use std::sync::Arc;
use tracing::{info, warn};

use super::budget::Budget;
use super::invoke::LlmGateway;
use super::metrics::{Flag, MetricsRecorder, Stage};
use super::rewrite::ordinal_prefix;
use super::strategy::{Strategy, first_success};
use super::types::{Flow, PlanRequest};
use crate::clients::CompletionOptions;
use crate::config::Tuning;
use crate::error::{FlowcraftError, Result};
use crate::feasibility::FeasibilityReport;
use crate::json_recovery;
use crate::prompts::{PromptCache, ids};
use crate::utils::{contains_any, normalize, truncate_chars};

const TEMPLATE_STRATEGY: &str = "template";
const SUBTITLE_CHARS: usize = 40;

const ANALYSIS_STEPS: &[&str] = &[
    "분석할 데이터를 Google Sheets 한 곳에 모으기",
    "Google Apps Script 시간 트리거로 매일 데이터 정리 자동 실행",
    "피벗 테이블과 차트로 핵심 지표 요약 시트 만들기",
    "요약 결과를 Gmail로 자동 발송하기",
];

const MONITORING_STEPS: &[&str] = &[
    "모니터링할 대상과 알림 조건 정하기",
    "확인 대상 목록을 Google Sheets에 정리하기",
    "Google Apps Script 시간 트리거로 주기적으로 상태 확인",
    "조건을 만족하면 Slack 웹훅으로 알림 보내기",
];

const GENERIC_STEPS: &[&str] = &[
    "반복 업무의 입력과 결과물을 정리하기",
    "업무 데이터를 모으는 Google Sheets 양식 만들기",
    "Zapier 또는 Make로 반복 작업 연결하기",
    "결과를 Gmail로 받아보고 주간 점검하기",
];

/// Closing steps appended to drafts that come back too short
const PADDING_STEPS: &[&str] = &[
    "테스트 데이터로 한 번 실행해 결과 확인하기",
    "일주일 동안 실행 결과를 점검하고 설정 보완하기",
    "잘 동작하면 다른 반복 업무에도 같은 방식 적용하기",
];

/// Deterministic flow chosen by keywords in the input.
pub fn template_flow(input: &str, tuning: &Tuning) -> Flow {
    let text = normalize(input);
    let (title, steps) = if contains_any(&text, &["분석", "데이터"]) {
        ("데이터 분석 자동화", ANALYSIS_STEPS)
    } else if contains_any(&text, &["알림", "모니터링"]) {
        ("모니터링 알림 자동화", MONITORING_STEPS)
    } else {
        ("반복 업무 자동화", GENERIC_STEPS)
    };
    let flow = Flow::new(
        title,
        truncate_chars(input.trim(), SUBTITLE_CHARS),
        steps
            .iter()
            .enumerate()
            .map(|(i, s)| format!("{}. {}", i + 1, s))
            .collect(),
    );
    normalize_flow(flow, tuning)
}

/// Trim steps, drop blanks, truncate above `max_steps` and pad below
/// `min_steps`. Padding follows the draft's numbering style.
pub fn normalize_flow(mut flow: Flow, tuning: &Tuning) -> Flow {
    flow.title = flow.title.trim().to_string();
    if flow.title.is_empty() {
        flow.title = "자동화 계획".to_string();
    }
    flow.subtitle = flow.subtitle.trim().to_string();

    let mut steps: Vec<String> = flow
        .steps
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    steps.truncate(tuning.max_steps);

    let numbered = steps.first().is_some_and(|s| ordinal_prefix(s).is_some());
    let mut pad = PADDING_STEPS.iter().cycle();
    while steps.len() < tuning.min_steps {
        let Some(text) = pad.next() else { break };
        if numbered {
            steps.push(format!("{}. {}", steps.len() + 1, text));
        } else {
            steps.push(text.to_string());
        }
    }

    flow.steps = steps;
    flow
}

pub struct DraftGenerator {
    gateway: LlmGateway,
    prompts: Arc<PromptCache>,
}

impl DraftGenerator {
    pub fn new(gateway: LlmGateway, prompts: Arc<PromptCache>) -> Self {
        Self { gateway, prompts }
    }

    /// Produce a draft flow. Never fails: the template is the last strategy.
    pub async fn generate(
        &self,
        request: &PlanRequest,
        report: &FeasibilityReport,
        tools: &[String],
        budget: &Budget,
        metrics: &MetricsRecorder,
    ) -> Flow {
        let config = self.gateway.config();
        let tuning = &config.tuning;
        let trivial = request.input.trim().chars().count() < tuning.trivial_input_chars;

        let mut strategies: Vec<Strategy<'_, Flow>> = vec![Strategy::new("primary", move || {
            self.draft_with(&config.llm.primary_model, request, report, tools, budget, metrics)
                .boxed()
        })];
        if !trivial {
            strategies.push(Strategy::new("secondary", move || {
                self.draft_with(&config.llm.secondary_model, request, report, tools, budget, metrics)
                    .boxed()
            }));
        }
        strategies.push(Strategy::new(TEMPLATE_STRATEGY, move || {
            async move { Ok(template_flow(&request.input, tuning)) }.boxed()
        }));

        let (winner, flow) = match first_success(strategies).await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "Every draft strategy failed; using template");
                (TEMPLATE_STRATEGY, template_flow(&request.input, tuning))
            }
        };
        if winner == TEMPLATE_STRATEGY {
            metrics.flag(Flag::FallbackFlow);
        }
        let flow = normalize_flow(flow, tuning);
        info!(strategy = winner, steps = flow.steps.len(), "Draft flow ready");
        flow
    }

    async fn draft_with(
        &self,
        model: &str,
        request: &PlanRequest,
        report: &FeasibilityReport,
        tools: &[String],
        budget: &Budget,
        metrics: &MetricsRecorder,
    ) -> Result<Flow> {
        let prompt = self
            .prompts
            .get(ids::DRAFT_FLOW)
            .ok_or_else(|| FlowcraftError::Internal {
                message: format!("prompt {} missing", ids::DRAFT_FLOW),
            })?;
        let tuning = &self.gateway.config().tuning;

        let mut constraints: Vec<String> = report.impossible_elements.clone();
        constraints.extend(report.cost_warnings.iter().cloned());
        let constraints = if constraints.is_empty() {
            "(없음)".to_string()
        } else {
            constraints
                .iter()
                .map(|c| format!("- {c}"))
                .collect::<Vec<_>>()
                .join("\n")
        };
        let answers = request.answers_text();
        let score = report.score.to_string();
        let tools = if tools.is_empty() {
            "(없음)".to_string()
        } else {
            tools.join(", ")
        };
        let min_steps = tuning.min_steps.to_string();
        let max_steps = tuning.max_steps.to_string();
        let messages = prompt.messages(&[
            ("input", request.input.as_str()),
            ("answers", answers.as_str()),
            ("score", score.as_str()),
            ("constraints", constraints.as_str()),
            ("tools", tools.as_str()),
            ("min_steps", min_steps.as_str()),
            ("max_steps", max_steps.as_str()),
        ]);

        let options = CompletionOptions {
            max_tokens: self.gateway.config().llm.draft_max_tokens,
            temperature: 0.4,
            json_mode: true,
        };
        let recorded = self
            .gateway
            .complete(budget, metrics, Stage::Draft, model, &messages, options)
            .await?;

        let flow = match json_recovery::parse_as::<Flow>(&recorded.value.text) {
            Ok(flow) => flow,
            Err(e) => {
                metrics.fail_record(recorded.record, e.to_string());
                return Err(FlowcraftError::malformed(e.to_string()));
            }
        };
        if flow.steps.iter().all(|s| s.trim().is_empty()) {
            metrics.fail_record(recorded.record, "empty steps");
            return Err(FlowcraftError::malformed("draft has no steps"));
        }
        Ok(flow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_choice_follows_keywords() {
        let t = Tuning::default();
        assert_eq!(template_flow("매출 데이터 주간 분석", &t).title, "데이터 분석 자동화");
        assert_eq!(template_flow("서버 다운 알림 받기", &t).title, "모니터링 알림 자동화");
        assert_eq!(template_flow("회의록 공유", &t).title, "반복 업무 자동화");
        let flow = template_flow("회의록 공유", &t);
        assert!((t.min_steps..=t.max_steps).contains(&flow.steps.len()));
        assert!(flow.steps[0].starts_with("1. "));
    }

    #[test]
    fn normalisation_truncates_and_pads() {
        let t = Tuning::default();
        let long = Flow::new("", "", (1..=10).map(|i| format!("{i}. 단계")).collect());
        let flow = normalize_flow(long, &t);
        assert_eq!(flow.steps.len(), 7);
        assert_eq!(flow.title, "자동화 계획");

        let short = Flow::new("t", "", vec!["1. 시작".into(), "  ".into()]);
        let flow = normalize_flow(short, &t);
        assert_eq!(flow.steps.len(), 3);
        assert!(flow.steps[1].starts_with("2. "));
        assert!(flow.steps[2].starts_with("3. "));
    }
}
