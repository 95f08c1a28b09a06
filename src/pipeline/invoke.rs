//! Budget-aware LLM calls with per-attempt metrics

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::budget::Budget;
use super::metrics::{Flag, MetricsRecorder, Stage, StageRecord};
use crate::clients::{ChatMessage, Completion, CompletionOptions, LlmClient};
use crate::config::Config;
use crate::error::{FlowcraftError, Result};

/// A completion plus the index of the metrics record it produced
#[derive(Debug, Clone)]
pub struct Recorded<T> {
    pub value: T,
    pub record: usize,
}

/// The one path every stage takes to the LLM.
///
/// Checks the request budget, clamps the output budget and timeout to what is
/// left, races the call against cancellation, and records tokens, latency and
/// cost for success and failure alike.
#[derive(Clone)]
pub struct LlmGateway {
    llm: Arc<dyn LlmClient>,
    config: Arc<Config>,
}

impl LlmGateway {
    pub fn new(llm: Arc<dyn LlmClient>, config: Arc<Config>) -> Self {
        Self { llm, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn complete(
        &self,
        budget: &Budget,
        metrics: &MetricsRecorder,
        stage: Stage,
        model: &str,
        messages: &[ChatMessage],
        mut options: CompletionOptions,
    ) -> Result<Recorded<Completion>> {
        if let Err(e) = budget.check(stage) {
            metrics.flag(Flag::BudgetExhausted);
            metrics.record(StageRecord {
                stage,
                model: Some(model.to_string()),
                tokens: 0,
                latency_ms: 0,
                success: false,
                note: Some("budget exhausted".to_string()),
            });
            return Err(e);
        }

        let remaining = u32::try_from(budget.remaining_tokens()).unwrap_or(u32::MAX);
        options.max_tokens = options.max_tokens.min(remaining).max(1);
        let timeout =
            Duration::from_millis(self.config.llm.timeout_ms).min(budget.remaining_time());

        let started = Instant::now();
        let outcome = tokio::select! {
            _ = budget.cancelled() => Err(FlowcraftError::BudgetExhausted {
                stage: stage.as_str().to_string(),
            }),
            res = tokio::time::timeout(timeout, self.llm.complete(model, messages, &options)) => {
                match res {
                    Ok(Ok(completion)) => Ok(completion),
                    Ok(Err(e)) => Err(FlowcraftError::from(e)),
                    Err(_) => Err(FlowcraftError::Timeout {
                        operation: format!("{} completion", stage.as_str()),
                        timeout_ms: timeout.as_millis() as u64,
                    }),
                }
            }
        };
        let latency_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(completion) => {
                budget.consume(completion.total_tokens);
                let billed_model = if completion.model.is_empty() {
                    model.to_string()
                } else {
                    completion.model.clone()
                };
                metrics.add_cost(
                    &billed_model,
                    self.config.token_cost(&billed_model, completion.total_tokens),
                );
                let record = metrics.record(StageRecord {
                    stage,
                    model: Some(billed_model),
                    tokens: completion.total_tokens,
                    latency_ms,
                    success: true,
                    note: None,
                });
                debug!(
                    stage = stage.as_str(),
                    model,
                    tokens = completion.total_tokens,
                    latency_ms,
                    "LLM call completed"
                );
                Ok(Recorded {
                    value: completion,
                    record,
                })
            }
            Err(e) => {
                if matches!(e, FlowcraftError::BudgetExhausted { .. }) {
                    metrics.flag(Flag::BudgetExhausted);
                }
                warn!(stage = stage.as_str(), model, error = %e, "LLM call failed");
                metrics.record(StageRecord {
                    stage,
                    model: Some(model.to_string()),
                    tokens: 0,
                    latency_ms,
                    success: false,
                    note: Some(e.to_string()),
                });
                Err(e)
            }
        }
    }
}
