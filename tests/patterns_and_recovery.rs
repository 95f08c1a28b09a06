//! Pattern store, learner, scoring bounds and JSON recovery properties

use std::sync::Arc;

use flowcraft::config::Tuning;
use flowcraft::feasibility::compute_score;
use flowcraft::json_recovery::{self, RepairLevel};
use flowcraft::patterns::matcher::{implied_context, score_pattern};
use flowcraft::patterns::{
    FailureLearner, JsonFileStore, LearnOutcome, PatternStore, static_patterns,
};
use flowcraft::pipeline::{
    AnalysisCard, Card, ExpansionCard, FaqCard, FaqItem, FlowCard, GuideCard,
};
use flowcraft::utils::normalize;

#[tokio::test]
async fn identical_cases_merge_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonFileStore::new(dir.path()));
    let learner = FailureLearner::new(store.clone(), Tuning::default());

    let first = learner
        .save_failure_case("카카오톡 단체방 자동 공지", "1. 카카오톡 봇 만들기", &[], 3)
        .await;
    let second = learner
        .save_failure_case("카카오톡 단체방 자동 공지", "1. 카카오톡 봇 만들기", &[], 4)
        .await;

    let LearnOutcome::Appended { case_id } = first else {
        panic!("first save should append, got {first:?}");
    };
    assert_eq!(
        second,
        LearnOutcome::Merged {
            case_id: case_id.clone(),
            frequency: 2
        }
    );

    // A fresh store over the same directory sees one merged case
    let reopened = JsonFileStore::new(dir.path());
    let cases = reopened.load_cases().await.unwrap();
    assert_eq!(cases.len(), 1);
    assert_eq!(cases[0].id, case_id);
    assert_eq!(cases[0].frequency, 2);
    assert_eq!(cases[0].validation_score, 3);
}

#[tokio::test]
async fn missing_and_corrupt_tables_read_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path().join("not-yet-created"));
    assert!(store.load_cases().await.unwrap().is_empty());
    assert!(store.load_patterns().await.unwrap().is_empty());

    let store = JsonFileStore::new(dir.path());
    std::fs::write(dir.path().join("failure_patterns.json"), "[{\"id\": ").unwrap();
    assert!(store.load_patterns().await.unwrap().is_empty());
}

#[test]
fn score_stays_in_range_for_any_signals() {
    let t = Tuning::default();
    for realistic in [true, false] {
        for cost in [0.0_f32, 19.0, 51.0, 150.0, 10_000.0, f32::MAX] {
            for complex in [true, false] {
                for rule in [true, false] {
                    let s = compute_score(realistic, cost, complex, rule, &t);
                    assert!((1..=10).contains(&s), "{s} for {realistic} {cost} {complex} {rule}");
                }
            }
        }
    }
    assert_eq!(compute_score(false, 10_000.0, true, true, &t), 1);
}

#[test]
fn exact_tool_name_never_lowers_match_score() {
    let t = Tuning::default();
    let base = "고객에게 매일 자동으로 메시지 보내기";
    for pattern in static_patterns() {
        let Some(tool) = pattern.tools.first() else {
            continue;
        };
        let without = normalize(base);
        let with = normalize(&format!("{base} {tool}"));
        let (before, _) = score_pattern(pattern, &without, &implied_context(&without), &t);
        let (after, reasons) = score_pattern(pattern, &with, &implied_context(&with), &t);
        assert!(after >= before, "{}: {after} < {before}", pattern.id);
        assert!(reasons.iter().any(|r| r.contains(tool.as_str())));
    }
}

fn sample_cards() -> Vec<Card> {
    vec![
        Card::NeedsAnalysis(AnalysisCard {
            title: "자동화 분석".into(),
            summary: "실현 가능성 3/10".into(),
            feasibility_score: 3,
            is_realistic: false,
            concerns: vec!["카카오톡 개인 메시지 API 없음".into()],
            alternatives: vec!["텔레그램 봇".into()],
        }),
        Card::Flow(FlowCard {
            title: "주간 보고 \"자동화\"".into(),
            subtitle: "매주 월요일".into(),
            steps: vec!["1. 시트 정리".into(), "2. 요약".into(), "3. 메일 발송".into()],
        }),
        Card::Guide(GuideCard {
            step_index: Some(1),
            title: "시트 정리".into(),
            sub_steps: vec!["새 시트 열기".into()],
            common_mistakes: vec![],
            tips: vec!["필터 사용".into()],
        }),
        Card::Faq(FaqCard {
            items: vec![FaqItem {
                question: "비용은?".into(),
                answer: "무료입니다".into(),
            }],
        }),
        Card::Expansion(ExpansionCard {
            title: "확장".into(),
            ideas: vec!["Slack 연동".into()],
        }),
    ]
}

#[test]
fn serialised_cards_parse_back_unchanged() {
    let cards = sample_cards();
    let text = serde_json::to_string_pretty(&cards).unwrap();
    let parsed: Vec<Card> = json_recovery::parse_as(&text).unwrap();
    assert_eq!(parsed, cards);

    let fenced = format!("결과입니다:\n```json\n{text}\n```");
    let parsed: Vec<Card> = json_recovery::parse_as(&fenced).unwrap();
    assert_eq!(parsed, cards);
}

#[test]
fn missing_closers_are_repaired() {
    let wrapped = serde_json::json!({ "cards": sample_cards() }).to_string();
    // Drop the final `]}`
    let truncated = &wrapped[..wrapped.len() - 2];
    let (value, level) = json_recovery::parse_with_level(truncated).unwrap();
    assert_eq!(level, RepairLevel::Balanced);
    let cards: Vec<Card> = serde_json::from_value(value["cards"].clone()).unwrap();
    assert_eq!(cards, sample_cards());

    let one_short = &wrapped[..wrapped.len() - 1];
    assert!(json_recovery::parse(one_short).is_ok());
}
