//! Per-request metrics: stage records, token/cost totals and degradation flags

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Feasibility,
    Draft,
    Verify,
    Guide,
    Learn,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Feasibility => "feasibility",
            Stage::Draft => "draft",
            Stage::Verify => "verify",
            Stage::Guide => "guide",
            Stage::Learn => "learn",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageRecord {
    pub stage: Stage,
    pub model: Option<String>,
    pub tokens: u64,
    pub latency_ms: u64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    FallbackFlow,
    VerificationOutage,
    FallbackGuides,
    BudgetExhausted,
    CatastrophicFallback,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineFlags {
    pub fallback_flow: bool,
    pub verification_outage: bool,
    pub fallback_guides: bool,
    pub budget_exhausted: bool,
    pub catastrophic_fallback: bool,
}

impl PipelineFlags {
    pub fn any(&self) -> bool {
        self.fallback_flow
            || self.verification_outage
            || self.fallback_guides
            || self.budget_exhausted
            || self.catastrophic_fallback
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineMetrics {
    pub request_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub tuning_version: String,
    pub total_tokens: u64,
    pub latency_ms: u64,
    pub stages: Vec<StageRecord>,
    /// USD per model
    pub cost_breakdown: BTreeMap<String, f64>,
    pub total_cost_usd: f64,
    pub success: bool,
    pub flags: PipelineFlags,
    /// Retrieval queries issued during verification
    pub validation_queries: usize,
}

impl PipelineMetrics {
    pub fn new(tuning_version: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            started_at: Utc::now(),
            tuning_version: tuning_version.into(),
            total_tokens: 0,
            latency_ms: 0,
            stages: Vec::new(),
            cost_breakdown: BTreeMap::new(),
            total_cost_usd: 0.0,
            success: false,
            flags: PipelineFlags::default(),
            validation_queries: 0,
        }
    }

    pub fn stage_records(&self, stage: Stage) -> impl Iterator<Item = &StageRecord> {
        self.stages.iter().filter(move |r| r.stage == stage)
    }
}

/// Shared, lock-guarded metrics for one request.
///
/// Verification records from concurrent tasks, so every mutation goes
/// through `&self`.
#[derive(Debug)]
pub struct MetricsRecorder {
    inner: Mutex<PipelineMetrics>,
}

impl MetricsRecorder {
    pub fn new(tuning_version: impl Into<String>) -> Self {
        Self {
            inner: Mutex::new(PipelineMetrics::new(tuning_version)),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut PipelineMetrics) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }

    /// Append a record and return its index.
    pub fn record(&self, record: StageRecord) -> usize {
        self.with(|m| {
            m.total_tokens += record.tokens;
            m.stages.push(record);
            m.stages.len() - 1
        })
    }

    /// Mark an earlier record as failed, e.g. when the call succeeded but its
    /// output was unusable.
    pub fn fail_record(&self, index: usize, note: impl Into<String>) {
        let note = note.into();
        self.with(|m| {
            if let Some(rec) = m.stages.get_mut(index) {
                rec.success = false;
                rec.note = Some(note);
            }
        });
    }

    pub fn add_cost(&self, model: &str, usd: f64) {
        if usd <= 0.0 {
            return;
        }
        self.with(|m| {
            *m.cost_breakdown.entry(model.to_string()).or_insert(0.0) += usd;
            m.total_cost_usd += usd;
        });
    }

    pub fn flag(&self, flag: Flag) {
        self.with(|m| match flag {
            Flag::FallbackFlow => m.flags.fallback_flow = true,
            Flag::VerificationOutage => m.flags.verification_outage = true,
            Flag::FallbackGuides => m.flags.fallback_guides = true,
            Flag::BudgetExhausted => m.flags.budget_exhausted = true,
            Flag::CatastrophicFallback => m.flags.catastrophic_fallback = true,
        });
    }

    pub fn count_validation_queries(&self, n: usize) {
        self.with(|m| m.validation_queries += n);
    }

    pub fn snapshot(&self) -> PipelineMetrics {
        self.with(|m| m.clone())
    }

    pub fn finish(self, latency_ms: u64, success: bool) -> PipelineMetrics {
        let mut metrics = self.inner.into_inner().unwrap_or_else(|e| e.into_inner());
        metrics.latency_ms = latency_ms;
        metrics.success = success;
        metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(stage: Stage, tokens: u64, success: bool) -> StageRecord {
        StageRecord {
            stage,
            model: Some("m".into()),
            tokens,
            latency_ms: 5,
            success,
            note: None,
        }
    }

    #[test]
    fn totals_and_flags_accumulate() {
        let recorder = MetricsRecorder::new("test");
        recorder.record(rec(Stage::Draft, 100, true));
        let idx = recorder.record(rec(Stage::Draft, 50, true));
        recorder.fail_record(idx, "empty steps");
        recorder.add_cost("gpt-4o", 0.01);
        recorder.add_cost("gpt-4o", 0.02);
        recorder.flag(Flag::FallbackGuides);

        let m = recorder.finish(42, true);
        assert_eq!(m.total_tokens, 150);
        assert_eq!(m.stage_records(Stage::Draft).filter(|r| !r.success).count(), 1);
        assert!((m.cost_breakdown["gpt-4o"] - 0.03).abs() < 1e-9);
        assert!(m.flags.fallback_guides && m.flags.any());
        assert_eq!(m.latency_ms, 42);
    }
}
