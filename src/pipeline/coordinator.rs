//! Request orchestration: feasibility, draft, verification, guides, learning
//!
//! Every stage is total, so a request always produces cards. The only extra
//! guard is a last-resort deterministic output for a panic or a final card
//! set that breaks the flow/guide invariants.

use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::budget::Budget;
use super::draft::{DraftGenerator, template_flow};
use super::guide::{GuideSynthesizer, assemble_cards};
use super::invoke::LlmGateway;
use super::metrics::{Flag, MetricsRecorder, Stage, StageRecord};
use super::types::{AnalysisCard, Card, Flow, PipelineOutput, PlanRequest};
use super::verifier::{FlowVerifier, LiveValidator, MethodValidator};
use crate::clients::{LlmClient, SearchClient};
use crate::config::{Config, Tuning};
use crate::feasibility::{FeasibilityReport, FeasibilityScorer, assess_rules_only};
use crate::patterns::{FailureLearner, LearnOutcome, PatternMatch, PatternMatcher, PatternStore};
use crate::prompts::{PromptCache, PromptRegistry};
use crate::rag::RetrievalAdapter;
use crate::registry::{
    DomainProfile, GENERAL_AUTOMATION, get_optimal_ai_tools, peer_recommended_tools, tools_in_text,
};

/// Tools offered to the draft prompt
const DRAFT_TOOL_LIMIT: usize = 6;
/// Pattern matches reported on the analysis card
const REPORTED_MATCHES: usize = 2;

pub struct PlanCoordinator {
    config: Arc<Config>,
    prompts: Arc<PromptCache>,
    gateway: LlmGateway,
    rag: Arc<RetrievalAdapter>,
    scorer: FeasibilityScorer,
    drafter: DraftGenerator,
    verifier: FlowVerifier,
    guides: GuideSynthesizer,
    matcher: PatternMatcher,
    learner: Option<Arc<FailureLearner>>,
    pending: Mutex<Vec<JoinHandle<LearnOutcome>>>,
}

impl PlanCoordinator {
    pub fn new(
        config: Arc<Config>,
        llm: Arc<dyn LlmClient>,
        search: Arc<dyn SearchClient>,
        store: Arc<dyn PatternStore>,
    ) -> Self {
        let prompts = Arc::new(PromptCache::new(
            PromptRegistry::new(),
            config.prompts.dir.clone(),
        ));
        let gateway = LlmGateway::new(llm, config.clone());
        let rag = Arc::new(RetrievalAdapter::new(search, &config.search));
        let validator: Arc<dyn MethodValidator> = Arc::new(LiveValidator::new(
            rag.clone(),
            gateway.clone(),
            prompts.clone(),
        ));
        let tuning = config.tuning.clone();

        Self {
            scorer: FeasibilityScorer::new(gateway.clone(), prompts.clone()),
            drafter: DraftGenerator::new(gateway.clone(), prompts.clone()),
            verifier: FlowVerifier::new(validator, tuning.clone()),
            guides: GuideSynthesizer::new(gateway.clone(), prompts.clone(), rag.clone()),
            matcher: PatternMatcher::new(store.clone(), tuning.clone()),
            learner: Some(Arc::new(FailureLearner::new(store, tuning))),
            pending: Mutex::new(Vec::new()),
            config,
            prompts,
            gateway,
            rag,
        }
    }

    /// Replace the step validator (tests script verification through this).
    pub fn with_validator(mut self, validator: Arc<dyn MethodValidator>) -> Self {
        self.verifier = FlowVerifier::new(validator, self.config.tuning.clone());
        self
    }

    /// Never write failure cases.
    pub fn without_learning(mut self) -> Self {
        self.learner = None;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn scorer(&self) -> &FeasibilityScorer {
        &self.scorer
    }

    pub fn matcher(&self) -> &PatternMatcher {
        &self.matcher
    }

    pub fn retrieval(&self) -> &RetrievalAdapter {
        &self.rag
    }

    pub fn prompts(&self) -> &PromptCache {
        &self.prompts
    }

    pub fn gateway(&self) -> &LlmGateway {
        &self.gateway
    }

    /// Run one request end to end.
    pub async fn plan(&self, request: PlanRequest) -> PipelineOutput {
        let started = Instant::now();
        let tuning = &self.config.tuning;
        let budget = Budget::from_tuning(tuning);
        let metrics = MetricsRecorder::new(tuning.version.clone());
        info!(chars = request.input.chars().count(), answers = request.answers.len(), "Plan requested");

        let run = AssertUnwindSafe(self.run(&request, &budget, &metrics))
            .catch_unwind()
            .await;
        let cards = match run {
            Ok(cards) if cards_satisfy_invariants(&cards, tuning) => cards,
            Ok(cards) => {
                warn!(cards = cards.len(), "Pipeline output broke card invariants; using fallback output");
                self.catastrophic_output(&request, &metrics)
            }
            Err(_) => {
                error!("Pipeline panicked; using fallback output");
                self.catastrophic_output(&request, &metrics)
            }
        };

        let success = !metrics.snapshot().flags.catastrophic_fallback;
        let metrics = metrics.finish(started.elapsed().as_millis() as u64, success);
        info!(
            request_id = %metrics.request_id,
            cards = cards.len(),
            tokens = metrics.total_tokens,
            latency_ms = metrics.latency_ms,
            cost_usd = metrics.total_cost_usd,
            degraded = metrics.flags.any(),
            "Plan completed"
        );
        PipelineOutput { cards, metrics }
    }

    async fn run(&self, request: &PlanRequest, budget: &Budget, metrics: &MetricsRecorder) -> Vec<Card> {
        let report = self
            .scorer
            .assess(&request.input, &request.answers, budget, metrics)
            .await;

        let tools = self.draft_tools(request, &report, budget).await;
        let draft = self
            .drafter
            .generate(request, &report, &tools, budget, metrics)
            .await;

        let verification = self.verifier.verify(&draft, budget, metrics).await;
        let flow = verification.flow;

        let verified_tools: Vec<String> = tools_in_text(&flow.steps.join(" "))
            .iter()
            .map(|t| t.name.to_string())
            .collect();
        let mut cards = self
            .guides
            .synthesize(&request.input, &flow, &verified_tools, budget, metrics)
            .await;

        let matches = self.learn_from(request, &flow, &cards, &report, metrics).await;
        if needs_analysis(&report, &matches) {
            cards.insert(0, Card::NeedsAnalysis(analysis_card(&report, &matches)));
        }
        cards
    }

    /// Peer-recommended tools first, then the domain's ranked registry tools.
    async fn draft_tools(
        &self,
        request: &PlanRequest,
        report: &FeasibilityReport,
        budget: &Budget,
    ) -> Vec<String> {
        let domain = DomainProfile::by_id(&report.domain).unwrap_or(&GENERAL_AUTOMATION);
        let peers = peer_recommended_tools(&self.rag, domain, &request.input, budget).await;
        let ranked = get_optimal_ai_tools(domain, request.priority.unwrap_or_default(), false);

        let mut tools: Vec<String> = Vec::new();
        for name in peers
            .iter()
            .map(|t| t.name)
            .chain(ranked.ranked_names())
        {
            if tools.len() >= DRAFT_TOOL_LIMIT {
                break;
            }
            if !tools.iter().any(|t| t == name) {
                tools.push(name.to_string());
            }
        }
        tools
    }

    /// Match failure patterns against the final guide text and, on a match or
    /// a low feasibility score, record the case in the background.
    async fn learn_from(
        &self,
        request: &PlanRequest,
        flow: &Flow,
        cards: &[Card],
        report: &FeasibilityReport,
        metrics: &MetricsRecorder,
    ) -> Vec<PatternMatch> {
        let guide_text = guide_text(flow, cards);
        let matches = self
            .matcher
            .find_contextual_patterns(&request.input, &guide_text, &request.answers)
            .await;

        let low_score = report.score < self.config.tuning.learn_below_score;
        let Some(learner) = &self.learner else {
            return matches;
        };
        if matches.is_empty() && !low_score {
            return matches;
        }

        let learner = learner.clone();
        let input = request.input.clone();
        let solution = flow.steps.join("\n");
        let ids: Vec<String> = matches.iter().map(|m| m.pattern.id.clone()).collect();
        let score = report.score;
        metrics.record(StageRecord {
            stage: Stage::Learn,
            model: None,
            tokens: 0,
            latency_ms: 0,
            success: true,
            note: Some(format!("queued ({} pattern matches, score {score})", ids.len())),
        });
        let handle = tokio::spawn(async move {
            learner.save_failure_case(&input, &solution, &ids, score).await
        });
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
        matches
    }

    /// Wait for every queued learner write.
    pub async fn flush_learning(&self) -> Vec<LearnOutcome> {
        let handles = std::mem::take(&mut *self.pending.lock().unwrap_or_else(|e| e.into_inner()));
        let mut outcomes = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => warn!(error = %e, "Learner task failed"),
            }
        }
        outcomes
    }

    fn catastrophic_output(&self, request: &PlanRequest, metrics: &MetricsRecorder) -> Vec<Card> {
        metrics.flag(Flag::CatastrophicFallback);
        let tuning = &self.config.tuning;
        let report = assess_rules_only(&request.input, &request.answers, tuning);
        let flow = template_flow(&request.input, tuning);
        let mut cards = vec![Card::NeedsAnalysis(AnalysisCard::from_report(&report))];
        cards.extend(assemble_cards(&flow, Vec::new()));
        cards
    }
}

fn guide_text(flow: &Flow, cards: &[Card]) -> String {
    let mut parts: Vec<&str> = flow.steps.iter().map(String::as_str).collect();
    for card in cards {
        if let Card::Guide(g) = card {
            parts.push(&g.title);
            parts.extend(g.sub_steps.iter().map(String::as_str));
        }
    }
    parts.join("\n")
}

fn needs_analysis(report: &FeasibilityReport, matches: &[PatternMatch]) -> bool {
    !report.is_realistic
        || !report.impossible_elements.is_empty()
        || matches.iter().any(|m| m.pattern.severity.is_blocking())
}

fn analysis_card(report: &FeasibilityReport, matches: &[PatternMatch]) -> AnalysisCard {
    let mut card = AnalysisCard::from_report(report);
    for m in matches.iter().take(REPORTED_MATCHES) {
        card.concerns.push(format!(
            "{} (유사 실패 사례 일치도 {:.0}%)",
            m.pattern.reason,
            m.match_score * 100.0
        ));
        for alt in &m.pattern.alternatives {
            if !card.alternatives.contains(alt) {
                card.alternatives.push(alt.clone());
            }
        }
    }
    card
}

/// Non-empty, a first flow card with an in-bounds step count, and exactly one
/// guide per step numbered 1..=n.
pub fn cards_satisfy_invariants(cards: &[Card], tuning: &Tuning) -> bool {
    let Some(flow) = cards.iter().find_map(|c| match c {
        Card::Flow(f) => Some(f),
        _ => None,
    }) else {
        return false;
    };
    let n = flow.steps.len();
    if !(tuning.min_steps..=tuning.max_steps).contains(&n) {
        return false;
    }
    let indices: Vec<Option<usize>> = cards
        .iter()
        .filter_map(|c| match c {
            Card::Guide(g) => Some(g.step_index),
            _ => None,
        })
        .collect();
    indices.len() == n && indices.iter().enumerate().all(|(i, idx)| *idx == Some(i + 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::guide::generic_guide;
    use crate::clients::{OfflineLlm, OfflineSearch};
    use crate::patterns::MemoryStore;
    use crate::pipeline::types::FlowCard;
    use std::time::Duration;

    async fn settle(coordinator: &PlanCoordinator) {
        for _ in 0..200 {
            let done = coordinator
                .pending
                .lock()
                .unwrap()
                .iter()
                .all(|h| h.is_finished());
            if done {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn finished_learner_tasks_are_dropped() {
        let coordinator = PlanCoordinator::new(
            Arc::new(Config::default()),
            Arc::new(OfflineLlm),
            Arc::new(OfflineSearch),
            Arc::new(MemoryStore::new()),
        );
        for _ in 0..3 {
            coordinator
                .plan(PlanRequest::new("카카오톡으로 자동 알림 보내기"))
                .await;
            settle(&coordinator).await;
        }
        assert_eq!(coordinator.pending.lock().unwrap().len(), 1);
        assert_eq!(coordinator.flush_learning().await.len(), 1);
    }

    #[test]
    fn invariant_check() {
        let t = Tuning::default();
        let steps: Vec<String> = (1..=3).map(|i| format!("{i}. s")).collect();
        let mut cards = vec![Card::Flow(FlowCard {
            title: "t".into(),
            subtitle: String::new(),
            steps: steps.clone(),
        })];
        assert!(!cards_satisfy_invariants(&cards, &t));
        cards.extend(steps.iter().enumerate().map(|(i, s)| Card::Guide(generic_guide(i, s))));
        assert!(cards_satisfy_invariants(&cards, &t));
        assert!(!cards_satisfy_invariants(&cards[1..], &t));
    }

    #[test]
    fn analysis_card_lists_pattern_alternatives() {
        let report = assess_rules_only("카카오톡으로 자동 알림 보내기", &Default::default(), &Tuning::default());
        let matches = crate::patterns::match_patterns(
            crate::patterns::static_patterns(),
            "카카오톡으로 자동 알림 보내기",
            "",
            &Default::default(),
            &Tuning::default(),
        );
        assert!(needs_analysis(&report, &matches));
        let card = analysis_card(&report, &matches);
        assert!(card.alternatives.iter().any(|a| a.contains("텔레그램")));
        assert!(card.concerns.iter().any(|c| c.contains("일치도")));
    }
}
