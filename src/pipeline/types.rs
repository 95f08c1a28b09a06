use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::metrics::PipelineMetrics;
use crate::deserializers::{de_option_usize_forgiving, de_string_forgiving, de_string_list};
use crate::feasibility::FeasibilityReport;
use crate::registry::Priority;

/// Ordered skeleton of an automation plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flow {
    #[serde(default, deserialize_with = "de_string_forgiving")]
    pub title: String,
    #[serde(default, deserialize_with = "de_string_forgiving")]
    pub subtitle: String,
    #[serde(default, deserialize_with = "de_string_list")]
    pub steps: Vec<String>,
}

impl Flow {
    pub fn new(title: impl Into<String>, subtitle: impl Into<String>, steps: Vec<String>) -> Self {
        Self {
            title: title.into(),
            subtitle: subtitle.into(),
            steps,
        }
    }

    /// Steps numbered `1. ...` for prompts
    pub fn numbered_steps(&self) -> String {
        self.steps
            .iter()
            .enumerate()
            .map(|(i, s)| {
                if super::rewrite::ordinal_prefix(s).is_some() {
                    s.clone()
                } else {
                    format!("{}. {}", i + 1, s)
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn to_card(&self) -> Card {
        Card::Flow(FlowCard {
            title: self.title.clone(),
            subtitle: self.subtitle.clone(),
            steps: self.steps.clone(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Viable,
    NonViable,
    /// Not checked (validation cap or no candidate); treated as viable
    Unverified,
}

/// Verdict for one `{tool, action}` candidate extracted from a step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepValidation {
    pub tool: String,
    pub action: String,
    pub is_viable: bool,
    pub issues: Vec<String>,
    pub alternatives: Vec<String>,
    pub status: ValidationStatus,
    /// Summed keyword evidence from retrieval snippets
    pub evidence_score: i32,
    #[serde(default)]
    pub reasoning: String,
}

impl StepValidation {
    pub fn unverified(tool: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            action: action.into(),
            is_viable: true,
            issues: Vec::new(),
            alternatives: Vec::new(),
            status: ValidationStatus::Unverified,
            evidence_score: 0,
            reasoning: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowCard {
    #[serde(default, deserialize_with = "de_string_forgiving")]
    pub title: String,
    #[serde(default, deserialize_with = "de_string_forgiving")]
    pub subtitle: String,
    #[serde(default, deserialize_with = "de_string_list")]
    pub steps: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuideCard {
    /// 1-based flow step this guide covers; absent on a monolithic guide
    #[serde(
        default,
        deserialize_with = "de_option_usize_forgiving",
        skip_serializing_if = "Option::is_none"
    )]
    pub step_index: Option<usize>,
    #[serde(default, deserialize_with = "de_string_forgiving")]
    pub title: String,
    #[serde(default, deserialize_with = "de_string_list")]
    pub sub_steps: Vec<String>,
    #[serde(default, deserialize_with = "de_string_list")]
    pub common_mistakes: Vec<String>,
    #[serde(default, deserialize_with = "de_string_list")]
    pub tips: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaqItem {
    #[serde(default, deserialize_with = "de_string_forgiving")]
    pub question: String,
    #[serde(default, deserialize_with = "de_string_forgiving")]
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaqCard {
    #[serde(default)]
    pub items: Vec<FaqItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpansionCard {
    #[serde(default, deserialize_with = "de_string_forgiving")]
    pub title: String,
    #[serde(default, deserialize_with = "de_string_list")]
    pub ideas: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisCard {
    pub title: String,
    pub summary: String,
    pub feasibility_score: u8,
    pub is_realistic: bool,
    #[serde(default)]
    pub concerns: Vec<String>,
    #[serde(default)]
    pub alternatives: Vec<String>,
}

impl AnalysisCard {
    pub fn from_report(report: &FeasibilityReport) -> Self {
        let summary = if report.is_realistic {
            format!("실현 가능성 {}/10: {}", report.score, report.recommended_approach)
        } else {
            format!(
                "실현 가능성 {}/10: 일부 요구사항은 그대로 자동화하기 어렵습니다. {}",
                report.score, report.recommended_approach
            )
        };
        let mut concerns = report.impossible_elements.clone();
        concerns.extend(report.cost_warnings.iter().cloned());
        Self {
            title: "자동화 분석".to_string(),
            summary,
            feasibility_score: report.score,
            is_realistic: report.is_realistic,
            concerns,
            alternatives: report.alternatives.clone(),
        }
    }
}

/// Presentation card. Serialised with a `type` discriminator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Card {
    Flow(FlowCard),
    Guide(GuideCard),
    Faq(FaqCard),
    Expansion(ExpansionCard),
    NeedsAnalysis(AnalysisCard),
}

impl Card {
    pub fn kind(&self) -> &'static str {
        match self {
            Card::Flow(_) => "flow",
            Card::Guide(_) => "guide",
            Card::Faq(_) => "faq",
            Card::Expansion(_) => "expansion",
            Card::NeedsAnalysis(_) => "needs_analysis",
        }
    }
}

/// One user request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRequest {
    pub input: String,
    /// Follow-up question -> answer
    #[serde(default)]
    pub answers: BTreeMap<String, String>,
    #[serde(default)]
    pub priority: Option<Priority>,
}

impl PlanRequest {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            ..Self::default()
        }
    }

    pub fn with_answer(mut self, question: impl Into<String>, answer: impl Into<String>) -> Self {
        self.answers.insert(question.into(), answer.into());
        self
    }

    /// Answers rendered one per line, or `(없음)` when there are none
    pub fn answers_text(&self) -> String {
        answers_text(&self.answers)
    }
}

pub fn answers_text(answers: &BTreeMap<String, String>) -> String {
    if answers.is_empty() {
        return "(없음)".to_string();
    }
    answers
        .iter()
        .map(|(q, a)| format!("- {q}: {a}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutput {
    pub cards: Vec<Card>,
    pub metrics: PipelineMetrics,
}

impl PipelineOutput {
    pub fn flow_cards(&self) -> impl Iterator<Item = &FlowCard> {
        self.cards.iter().filter_map(|c| match c {
            Card::Flow(f) => Some(f),
            _ => None,
        })
    }

    pub fn guide_cards(&self) -> impl Iterator<Item = &GuideCard> {
        self.cards.iter().filter_map(|c| match c {
            Card::Guide(g) => Some(g),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cards_serialize_with_type_tag() {
        let card = Card::Guide(GuideCard {
            step_index: Some(2),
            title: "웹훅 연결".into(),
            sub_steps: vec!["a".into()],
            common_mistakes: vec![],
            tips: vec![],
        });
        let v = serde_json::to_value(&card).unwrap();
        assert_eq!(v["type"], "guide");
        assert_eq!(v["stepIndex"], 2);
        assert!(v.get("subSteps").is_some());

        let analysis = Card::NeedsAnalysis(AnalysisCard {
            title: "t".into(),
            summary: "s".into(),
            feasibility_score: 3,
            is_realistic: false,
            concerns: vec![],
            alternatives: vec![],
        });
        assert_eq!(serde_json::to_value(&analysis).unwrap()["type"], "needs_analysis");
    }

    #[test]
    fn lenient_card_fields() {
        let card: Card = serde_json::from_value(json!({
            "type": "guide",
            "stepIndex": "3",
            "subSteps": "only one",
            "tips": [{"text": "tip"}]
        }))
        .unwrap();
        let Card::Guide(guide) = card else {
            panic!("expected guide");
        };
        assert_eq!(guide.step_index, Some(3));
        assert_eq!(guide.sub_steps, vec!["only one"]);
        assert_eq!(guide.tips, vec!["tip"]);
        assert!(guide.title.is_empty());
    }

    #[test]
    fn numbered_steps_keeps_existing_prefixes() {
        let flow = Flow::new("t", "", vec!["1. 시작".into(), "정리".into()]);
        assert_eq!(flow.numbered_steps(), "1. 시작\n2. 정리");
    }
}
