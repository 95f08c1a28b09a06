//! The three-stage plan pipeline and the plumbing every stage shares

pub mod budget;
pub mod coordinator;
pub mod draft;
pub mod extraction;
pub mod guide;
pub mod invoke;
pub mod metrics;
pub mod rewrite;
pub mod strategy;
pub mod types;
pub mod verifier;

pub use budget::Budget;
pub use coordinator::{PlanCoordinator, cards_satisfy_invariants};
pub use draft::{DraftGenerator, normalize_flow, template_flow};
pub use extraction::{Candidate, Tier, extract_candidates};
pub use guide::{GuideSynthesizer, assemble_cards, assign_guides};
pub use invoke::LlmGateway;
pub use metrics::{MetricsRecorder, PipelineFlags, PipelineMetrics, Stage, StageRecord};
pub use rewrite::{ordinal_prefix, rewrite_step};
pub use strategy::{Strategy, first_success};
pub use types::{
    AnalysisCard, Card, ExpansionCard, FaqCard, FaqItem, Flow, FlowCard, GuideCard,
    PipelineOutput, PlanRequest, StepValidation, ValidationStatus,
};
pub use verifier::{FlowVerifier, LiveValidator, MethodValidator, Verification};
