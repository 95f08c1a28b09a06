//! End-to-end scenarios through the coordinator and its stages

mod common;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

use common::{DRAFT, GUIDE, JUDGE, ScriptedLlm, ScriptedSearch, test_config};
use flowcraft::clients::{OfflineLlm, OfflineSearch};
use flowcraft::patterns::{MemoryStore, PatternStore};
use flowcraft::pipeline::{
    Budget, Candidate, Card, Flow, GuideSynthesizer, LlmGateway, MethodValidator,
    MetricsRecorder, PlanCoordinator, PlanRequest, StepValidation, ValidationStatus,
    cards_satisfy_invariants,
};
use flowcraft::prompts::PromptCache;
use flowcraft::rag::RetrievalAdapter;

/// Marks every candidate of a step mentioning `blocked` as non-viable
struct BlockingValidator {
    blocked: &'static str,
    alternative: &'static str,
}

#[async_trait]
impl MethodValidator for BlockingValidator {
    async fn validate(
        &self,
        candidate: &Candidate,
        step: &str,
        _budget: &Budget,
        _metrics: &MetricsRecorder,
    ) -> flowcraft::Result<StepValidation> {
        let mut v = StepValidation::unverified(&candidate.tool, &candidate.action);
        if step.contains(self.blocked) {
            v.is_viable = false;
            v.status = ValidationStatus::NonViable;
            v.issues = vec!["개인 계정 메시지 API 없음".to_string()];
            v.alternatives = vec![self.alternative.to_string()];
        } else {
            v.status = ValidationStatus::Viable;
        }
        Ok(v)
    }
}

fn offline_coordinator() -> PlanCoordinator {
    let store: Arc<dyn PatternStore> = Arc::new(MemoryStore::new());
    PlanCoordinator::new(test_config(), Arc::new(OfflineLlm), Arc::new(OfflineSearch), store)
}

fn flow_steps(cards: &[Card]) -> Vec<String> {
    cards
        .iter()
        .find_map(|c| match c {
            Card::Flow(f) => Some(f.steps.clone()),
            _ => None,
        })
        .expect("flow card")
}

#[tokio::test]
async fn kakao_request_is_unrealistic_with_alternatives() {
    // Even a model that calls it realistic is overruled by the blocking rule
    let llm = ScriptedLlm::new().on(
        JUDGE,
        r#"{"isRealistic": true, "reasoning": "가능", "issues": [], "alternatives": [], "confidence": 0.6}"#,
    );
    let store: Arc<dyn PatternStore> = Arc::new(MemoryStore::new());
    let coordinator = PlanCoordinator::new(
        test_config(),
        Arc::new(llm),
        Arc::new(ScriptedSearch::empty()),
        store,
    );

    let report = coordinator
        .scorer()
        .score("카카오톡으로 자동 알림 보내기", &BTreeMap::new())
        .await;

    assert!(!report.is_realistic);
    assert!((1..=10).contains(&report.score));
    assert!(
        report
            .impossible_elements
            .iter()
            .any(|e| e.contains("카카오") && e.contains("API"))
    );
    assert!(
        report
            .alternatives
            .iter()
            .any(|a| a.contains("이메일") || a.contains("텔레그램"))
    );
    assert!(report.matched_rules.iter().any(|r| r == "kakao_personal_messaging"));
}

#[tokio::test]
async fn kakao_request_offline_scores_from_rules() {
    let coordinator = offline_coordinator();
    let report = coordinator
        .scorer()
        .score("카카오톡으로 자동 알림 보내기", &BTreeMap::new())
        .await;
    assert!(!report.is_realistic);
    assert!(report.score <= 5);
    assert!(!report.impossible_elements.is_empty());
}

#[tokio::test]
async fn non_viable_step_is_rewritten_in_place() {
    let draft = r#"{"title": "주문 알림", "subtitle": "새 주문 알림 받기", "steps": [
        "1. Google Sheets에 주문 목록 정리",
        "2. Google Apps Script로 새 주문 확인",
        "3. 카카오톡 메시지 자동 전송"
    ]}"#;
    let llm = ScriptedLlm::new().on(DRAFT, draft);
    let store: Arc<dyn PatternStore> = Arc::new(MemoryStore::new());
    let coordinator = PlanCoordinator::new(
        test_config(),
        Arc::new(llm),
        Arc::new(ScriptedSearch::empty()),
        store,
    )
    .with_validator(Arc::new(BlockingValidator {
        blocked: "카카오톡",
        alternative: "텔레그램 봇",
    }))
    .without_learning();

    let output = coordinator
        .plan(PlanRequest::new("새 주문이 들어오면 알림 받고 싶어요"))
        .await;

    let steps = flow_steps(&output.cards);
    assert_eq!(steps.len(), 3);
    assert_eq!(steps[0], "1. Google Sheets에 주문 목록 정리");
    assert_eq!(steps[1], "2. Google Apps Script로 새 주문 확인");
    assert!(!steps[2].contains("카카오톡"));
    assert!(
        ["이메일", "Gmail", "Slack", "텔레그램"]
            .iter()
            .any(|s| steps[2].contains(s))
    );
    assert!(steps[2].starts_with("3. "));
    assert!(!output.metrics.flags.fallback_flow);
    assert!(output.metrics.flags.fallback_guides);
}

#[tokio::test]
async fn two_guides_cover_a_four_step_flow() {
    let config = test_config();
    let llm = ScriptedLlm::new().on(
        GUIDE,
        r#"{"cards": [
            {"type": "guide", "stepIndex": 1, "title": "시트 만들기", "subSteps": ["새 시트 열기"], "commonMistakes": [], "tips": []},
            {"type": "guide", "stepIndex": 3, "title": "트리거 설정", "subSteps": ["트리거 추가"], "commonMistakes": [], "tips": []},
            {"type": "faq", "items": [{"question": "비용은?", "answer": "무료"}]}
        ]}"#,
    );
    let gateway = LlmGateway::new(Arc::new(llm), config.clone());
    let rag = Arc::new(RetrievalAdapter::new(
        Arc::new(ScriptedSearch::empty()),
        &config.search,
    ));
    let synthesizer = GuideSynthesizer::new(gateway, Arc::new(PromptCache::builtin()), rag);

    let flow = Flow::new(
        "보고서 자동화",
        "",
        vec![
            "1. Google Sheets 만들기".into(),
            "2. 데이터 붙여넣기".into(),
            "3. Apps Script 트리거 설정".into(),
            "4. Gmail로 발송".into(),
        ],
    );
    let budget = Budget::from_tuning(&config.tuning);
    let metrics = MetricsRecorder::new(config.tuning.version.clone());
    let cards = synthesizer
        .synthesize("주간 보고서 자동화", &flow, &[], &budget, &metrics)
        .await;

    let guides: Vec<_> = cards
        .iter()
        .filter_map(|c| match c {
            Card::Guide(g) => Some(g),
            _ => None,
        })
        .collect();
    assert_eq!(guides.len(), 4);
    let indices: Vec<_> = guides.iter().map(|g| g.step_index).collect();
    assert_eq!(indices, vec![Some(1), Some(2), Some(3), Some(4)]);
    assert_eq!(guides[0].title, "시트 만들기");
    assert_eq!(guides[2].title, "트리거 설정");
    assert!(matches!(cards[0], Card::Flow(_)));
    assert!(cards.iter().any(|c| matches!(c, Card::Faq(_))));
    assert!(!metrics.snapshot().flags.fallback_guides);
}

#[tokio::test]
async fn offline_pipeline_always_returns_a_valid_plan() {
    let coordinator = offline_coordinator().without_learning();
    let tuning = coordinator.config().tuning.clone();

    for input in [
        "",
        "메일",
        "매주 월요일 매출 데이터를 정리해서 팀장님께 보고",
        "카카오톡으로 고객에게 자동 알림 보내기",
        "서버가 다운되면 모니터링 알림 받기",
    ] {
        let output = coordinator.plan(PlanRequest::new(input)).await;
        assert!(!output.cards.is_empty(), "no cards for {input:?}");
        assert!(cards_satisfy_invariants(&output.cards, &tuning));

        let flows = output.flow_cards().count();
        assert_eq!(flows, 1);
        let steps = flow_steps(&output.cards);
        assert!((3..=7).contains(&steps.len()), "{} steps for {input:?}", steps.len());
        assert_eq!(output.guide_cards().count(), steps.len());
        assert!(output.metrics.flags.fallback_flow);
        assert!(output.metrics.success);
    }
}

#[tokio::test]
async fn kakao_plan_leads_with_analysis_and_learns() {
    let store = Arc::new(MemoryStore::new());
    let coordinator = PlanCoordinator::new(
        test_config(),
        Arc::new(OfflineLlm),
        Arc::new(OfflineSearch),
        store.clone(),
    );

    let output = coordinator
        .plan(PlanRequest::new("카카오톡으로 고객에게 자동 알림 보내기"))
        .await;
    match &output.cards[0] {
        Card::NeedsAnalysis(card) => {
            assert!(!card.is_realistic);
            assert!(!card.alternatives.is_empty());
        }
        other => panic!("expected analysis card first, got {}", other.kind()),
    }

    let outcomes = coordinator.flush_learning().await;
    assert_eq!(outcomes.len(), 1);
    assert_eq!(store.load_cases().await.unwrap().len(), 1);
}
