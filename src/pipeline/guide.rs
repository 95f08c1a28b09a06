//! Step C: guide synthesis
//!
//! One model call returns the card set. Whatever comes back, the output is a
//! flow card echoing the verified flow, exactly one guide per flow step, then
//! at most one FAQ and one expansion card.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::budget::Budget;
use super::invoke::LlmGateway;
use super::metrics::{Flag, MetricsRecorder, Stage};
use super::rewrite::step_body;
use super::types::{Card, ExpansionCard, FaqCard, Flow, GuideCard};
use crate::clients::CompletionOptions;
use crate::error::{FlowcraftError, Result};
use crate::json_recovery;
use crate::prompts::{PromptCache, ids};
use crate::rag::RetrievalAdapter;

/// Generic guide for a step the model did not cover.
pub fn generic_guide(index: usize, step: &str) -> GuideCard {
    let body = step_body(step).trim();
    GuideCard {
        step_index: Some(index + 1),
        title: body.to_string(),
        sub_steps: vec![
            format!("'{body}'에 필요한 계정과 권한을 준비합니다"),
            "작은 샘플 데이터로 먼저 한 번 실행해 봅니다".to_string(),
            "결과를 확인한 뒤 설정을 저장합니다".to_string(),
        ],
        common_mistakes: vec!["권한이나 공유 설정을 빠뜨려 자동 실행이 실패하는 경우".to_string()],
        tips: vec!["처음 며칠은 결과를 직접 확인하면서 설정을 다듬으세요".to_string()],
    }
}

/// Cards found in a model response. Accepts `{"cards": [...]}`, a bare array,
/// or a single card object; items that do not read as a card are skipped.
fn cards_from_value(value: Value) -> Vec<Card> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("cards").or_else(|| map.remove("guides")) {
            Some(Value::Array(items)) => items,
            _ => vec![Value::Object(map)],
        },
        _ => Vec::new(),
    };

    items
        .into_iter()
        .filter_map(|mut item| {
            // Guides sometimes arrive without their discriminator
            if let Value::Object(map) = &mut item
                && !map.contains_key("type")
                && (map.contains_key("subSteps") || map.contains_key("stepIndex"))
            {
                map.insert("type".to_string(), Value::String("guide".to_string()));
            }
            match serde_json::from_value::<Card>(item) {
                Ok(card) => Some(card),
                Err(e) => {
                    debug!(error = %e, "Skipping unreadable card");
                    None
                }
            }
        })
        .collect()
}

/// Part `index` of `items` cut into `parts` contiguous runs whose lengths
/// differ by at most one, the longer runs first.
fn split_evenly<T: Clone>(items: &[T], parts: usize, index: usize) -> Vec<T> {
    if parts == 0 || index >= parts || items.is_empty() {
        return Vec::new();
    }
    let (base, rem) = (items.len() / parts, items.len() % parts);
    let start = index * base + index.min(rem);
    let len = base + usize::from(index < rem);
    items[start..start + len].to_vec()
}

/// Spread one guide that covers the whole flow across the steps, in order.
/// A guide with an index but more sub-steps than the flow has steps is
/// treated the same way.
fn redistribute(guide: &GuideCard, flow: &Flow) -> Vec<Option<GuideCard>> {
    let n = flow.steps.len();
    (0..n)
        .map(|i| {
            let sub_steps = split_evenly(&guide.sub_steps, n, i);
            if sub_steps.is_empty() {
                return None;
            }
            Some(GuideCard {
                step_index: Some(i + 1),
                title: step_body(&flow.steps[i]).trim().to_string(),
                sub_steps,
                common_mistakes: split_evenly(&guide.common_mistakes, n, i),
                tips: split_evenly(&guide.tips, n, i),
            })
        })
        .collect()
}

/// Exactly one guide per step: indexed guides go to their step, unindexed or
/// conflicting ones fill the remaining gaps in order, extras are dropped and
/// uncovered steps get a generic guide.
pub fn assign_guides(guides: Vec<GuideCard>, flow: &Flow) -> Vec<GuideCard> {
    let n = flow.steps.len();
    let mut slots: Vec<Option<GuideCard>> = vec![None; n];

    let monolithic = guides.len() == 1
        && (guides[0].step_index.is_none() || guides[0].sub_steps.len() > n);
    if n > 1 && monolithic {
        slots = redistribute(&guides[0], flow);
    } else {
        let mut unplaced = Vec::new();
        for guide in guides {
            match guide.step_index {
                Some(i) if (1..=n).contains(&i) && slots[i - 1].is_none() => slots[i - 1] = Some(guide),
                _ => unplaced.push(guide),
            }
        }
        let mut unplaced = unplaced.into_iter();
        for slot in slots.iter_mut().filter(|s| s.is_none()) {
            match unplaced.next() {
                Some(guide) => *slot = Some(guide),
                None => break,
            }
        }
        let dropped = unplaced.count();
        if dropped > 0 {
            debug!(dropped, "Dropping guides beyond the flow's step count");
        }
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(i, slot)| match slot {
            Some(mut guide) => {
                guide.step_index = Some(i + 1);
                if guide.title.trim().is_empty() {
                    guide.title = step_body(&flow.steps[i]).trim().to_string();
                }
                if guide.sub_steps.is_empty() {
                    guide.sub_steps = generic_guide(i, &flow.steps[i]).sub_steps;
                }
                guide
            }
            None => generic_guide(i, &flow.steps[i]),
        })
        .collect()
}

/// Final card list for a verified flow and whatever the model produced.
pub fn assemble_cards(flow: &Flow, parsed: Vec<Card>) -> Vec<Card> {
    let mut guides = Vec::new();
    let mut faq: Option<FaqCard> = None;
    let mut expansion: Option<ExpansionCard> = None;
    for card in parsed {
        match card {
            Card::Guide(g) => guides.push(g),
            Card::Faq(f) if faq.is_none() && !f.items.is_empty() => faq = Some(f),
            Card::Expansion(e) if expansion.is_none() && !e.ideas.is_empty() => expansion = Some(e),
            // The echo is always rebuilt from the verified flow
            _ => {}
        }
    }

    let mut cards = vec![flow.to_card()];
    cards.extend(assign_guides(guides, flow).into_iter().map(Card::Guide));
    cards.extend(faq.map(Card::Faq));
    cards.extend(expansion.map(Card::Expansion));
    cards
}

pub struct GuideSynthesizer {
    gateway: LlmGateway,
    prompts: Arc<PromptCache>,
    rag: Arc<RetrievalAdapter>,
}

impl GuideSynthesizer {
    pub fn new(gateway: LlmGateway, prompts: Arc<PromptCache>, rag: Arc<RetrievalAdapter>) -> Self {
        Self {
            gateway,
            prompts,
            rag,
        }
    }

    /// Build the card set for `flow`. Never returns zero guides.
    pub async fn synthesize(
        &self,
        input: &str,
        flow: &Flow,
        tools: &[String],
        budget: &Budget,
        metrics: &MetricsRecorder,
    ) -> Vec<Card> {
        let parsed = match self.request_cards(input, flow, tools, budget, metrics).await {
            Ok(cards) => {
                if !cards.iter().any(|c| matches!(c, Card::Guide(_))) {
                    warn!("Guide response had no guide cards; using generic guides");
                    metrics.flag(Flag::FallbackGuides);
                }
                cards
            }
            Err(e) => {
                warn!(error = %e, "Guide synthesis failed; using generic guides");
                metrics.flag(Flag::FallbackGuides);
                Vec::new()
            }
        };

        let cards = assemble_cards(flow, parsed);
        info!(cards = cards.len(), steps = flow.steps.len(), "Guides ready");
        cards
    }

    async fn request_cards(
        &self,
        input: &str,
        flow: &Flow,
        tools: &[String],
        budget: &Budget,
        metrics: &MetricsRecorder,
    ) -> Result<Vec<Card>> {
        let prompt = self
            .prompts
            .get(ids::GUIDE_CARDS)
            .ok_or_else(|| FlowcraftError::Internal {
                message: format!("prompt {} missing", ids::GUIDE_CARDS),
            })?;
        if let Err(e) = budget.check(Stage::Guide) {
            metrics.flag(Flag::BudgetExhausted);
            return Err(e);
        }

        let context = if tools.is_empty() {
            String::new()
        } else {
            self.rag.targeted_context(tools, input, budget).await.digest
        };
        let context = if context.trim().is_empty() {
            "(없음)".to_string()
        } else {
            context
        };
        let steps = flow.numbered_steps();
        let step_count = flow.steps.len().to_string();
        let messages = prompt.messages(&[
            ("input", input),
            ("title", flow.title.as_str()),
            ("steps", steps.as_str()),
            ("step_count", step_count.as_str()),
            ("context", context.as_str()),
        ]);

        let config = self.gateway.config();
        let options = CompletionOptions {
            max_tokens: config.llm.guide_max_tokens,
            temperature: 0.3,
            json_mode: true,
        };
        let recorded = self
            .gateway
            .complete(budget, metrics, Stage::Guide, &config.llm.guide_model, &messages, options)
            .await?;

        let (value, level) = json_recovery::parse_with_level(&recorded.value.text).map_err(|e| {
            metrics.fail_record(recorded.record, e.to_string());
            FlowcraftError::malformed(e.to_string())
        })?;
        debug!(?level, "Guide response parsed");
        Ok(cards_from_value(value))
    }
}
