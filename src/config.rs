use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Main configuration structure loaded from flowcraft.toml and environment variables
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub search: SearchConfig,
    pub tuning: Tuning,
    pub store: StoreConfig,
    pub prompts: PromptConfig,
    /// Runtime configuration loaded from environment variables
    #[serde(skip)]
    pub runtime: RuntimeConfig,
}

/// LLM endpoint, model ladder and per-stage output budgets
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    /// First draft attempt and feasibility judgement
    pub primary_model: String,
    /// Second draft attempt; skipped for trivial inputs
    pub secondary_model: String,
    pub guide_model: String,
    pub judge_model: String,
    pub timeout_ms: u64,
    pub draft_max_tokens: u32,
    pub judge_max_tokens: u32,
    pub guide_max_tokens: u32,
    /// USD per 1K tokens, keyed by model name
    pub price_per_1k_tokens: BTreeMap<String, f64>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        let mut prices = BTreeMap::new();
        prices.insert("gpt-4o-mini".to_string(), 0.0006);
        prices.insert("gpt-4o".to_string(), 0.01);
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            primary_model: "gpt-4o-mini".to_string(),
            secondary_model: "gpt-4o".to_string(),
            guide_model: "gpt-4o-mini".to_string(),
            judge_model: "gpt-4o-mini".to_string(),
            timeout_ms: 45_000,
            draft_max_tokens: 1_200,
            judge_max_tokens: 600,
            // Guide detail dominates output volume
            guide_max_tokens: 8_000,
            price_per_1k_tokens: prices,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SearchConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    pub max_results: usize,
    pub requests_per_second: u32,
    pub cache_capacity: usize,
    /// Results rendered into the downstream prompt digest
    pub digest_results: usize,
    pub digest_chars: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.tavily.com".to_string(),
            timeout_ms: 10_000,
            max_results: 5,
            requests_per_second: 5,
            cache_capacity: 256,
            digest_results: 3,
            digest_chars: 900,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct CostPenalty {
    pub over_usd: f32,
    pub penalty: i32,
}

/// Every threshold and weight the pipeline uses, versioned as one object.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Tuning {
    pub version: String,

    // Failure pattern matching
    pub match_cutoff: f32,
    pub tool_weight: f32,
    pub action_weight: f32,
    pub context_weight: f32,
    pub intent_weight: f32,
    /// Hits at which a match component saturates to 1.0
    pub overlap_saturation: usize,

    // Learning
    pub merge_similarity: f32,
    pub promotion_frequency: u32,
    pub promotion_base_confidence: f32,
    pub promotion_confidence_step: f32,
    pub promotion_max_confidence: f32,
    pub learn_below_score: u8,

    // Feasibility scoring
    /// The highest threshold exceeded applies
    pub cost_penalties: Vec<CostPenalty>,
    pub complexity_penalty: i32,
    pub restriction_penalty: i32,
    pub realistic_base: i32,
    pub unrealistic_base: i32,
    pub realistic_min_score: u8,
    pub rules_only_default: u8,
    pub rules_only_restricted: u8,

    // Verification
    pub max_queries_per_method: usize,
    pub early_exit_evidence: i32,
    pub max_validations: usize,
    pub negative_weight: i32,
    pub limitation_weight: i32,
    pub positive_weight: i32,

    // Drafting
    pub trivial_input_chars: usize,
    pub min_steps: usize,
    pub max_steps: usize,

    // Request budget
    pub request_deadline_ms: u64,
    pub request_token_budget: u64,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            version: "2025.1".to_string(),
            match_cutoff: 0.3,
            tool_weight: 0.4,
            action_weight: 0.3,
            context_weight: 0.2,
            intent_weight: 0.1,
            overlap_saturation: 2,
            merge_similarity: 0.8,
            promotion_frequency: 3,
            promotion_base_confidence: 0.5,
            promotion_confidence_step: 0.1,
            promotion_max_confidence: 0.9,
            learn_below_score: 5,
            cost_penalties: vec![
                CostPenalty {
                    over_usd: 100.0,
                    penalty: 4,
                },
                CostPenalty {
                    over_usd: 50.0,
                    penalty: 2,
                },
                CostPenalty {
                    over_usd: 20.0,
                    penalty: 1,
                },
            ],
            complexity_penalty: 2,
            restriction_penalty: 3,
            realistic_base: 8,
            unrealistic_base: 3,
            realistic_min_score: 5,
            rules_only_default: 7,
            rules_only_restricted: 3,
            max_queries_per_method: 2,
            early_exit_evidence: 6,
            max_validations: 12,
            negative_weight: -3,
            limitation_weight: -1,
            positive_weight: 2,
            trivial_input_chars: 12,
            min_steps: 3,
            max_steps: 7,
            request_deadline_ms: 180_000,
            request_token_budget: 60_000,
        }
    }
}

impl Tuning {
    /// Validate the tuning values
    pub fn validate(&self) -> anyhow::Result<()> {
        let weight_sum =
            self.tool_weight + self.action_weight + self.context_weight + self.intent_weight;
        if (weight_sum - 1.0).abs() > 1e-3 {
            anyhow::bail!("pattern match weights must sum to 1.0 (got {weight_sum})");
        }
        if !(0.0..1.0).contains(&self.match_cutoff) {
            anyhow::bail!("match_cutoff must be in [0, 1)");
        }
        if !(0.0..=1.0).contains(&self.merge_similarity) {
            anyhow::bail!("merge_similarity must be in [0, 1]");
        }
        if self.promotion_frequency == 0 {
            anyhow::bail!("promotion_frequency must be at least 1");
        }
        if self.overlap_saturation == 0 {
            anyhow::bail!("overlap_saturation must be at least 1");
        }
        if self.min_steps == 0 || self.min_steps > self.max_steps {
            anyhow::bail!(
                "step bounds incoherent: min_steps={} max_steps={}",
                self.min_steps,
                self.max_steps
            );
        }
        if !(1..=10).contains(&self.realistic_min_score) {
            anyhow::bail!("realistic_min_score must be in [1, 10]");
        }
        if self.max_queries_per_method == 0 {
            anyhow::bail!("max_queries_per_method must be at least 1");
        }
        Ok(())
    }

    pub fn promoted_confidence(&self, frequency: u32) -> f32 {
        (self.promotion_base_confidence + self.promotion_confidence_step * frequency as f32)
            .min(self.promotion_max_confidence)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding the failure case/pattern files
    pub dir: Option<PathBuf>,
}

impl StoreConfig {
    pub fn resolve_dir(&self) -> PathBuf {
        if let Some(dir) = &self.dir {
            return dir.clone();
        }
        dirs::data_dir()
            .map(|d| d.join("flowcraft"))
            .unwrap_or_else(|| PathBuf::from(".flowcraft"))
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PromptConfig {
    /// Optional directory of `<prompt-id>.txt` template overrides
    pub dir: Option<PathBuf>,
}

/// Runtime configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub llm_api_key: Option<String>,
    pub search_api_key: Option<String>,
    pub log_level: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            llm_api_key: None,
            search_api_key: None,
            log_level: "flowcraft=info".to_string(),
        }
    }
}

impl RuntimeConfig {
    pub fn load_from_env() -> Self {
        let mut rt = Self::default();
        rt.llm_api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());
        rt.search_api_key = std::env::var("TAVILY_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());
        if let Ok(level) = std::env::var("FLOWCRAFT_LOG") {
            rt.log_level = level;
        }
        rt
    }
}

impl Config {
    /// Load configuration from TOML file and environment variables
    /// Uses FLOWCRAFT_CONFIG environment variable or defaults to "flowcraft.toml"
    pub fn load() -> anyhow::Result<Self> {
        crate::load_env();

        let config_path =
            std::env::var("FLOWCRAFT_CONFIG").unwrap_or_else(|_| "flowcraft.toml".to_string());

        let mut config: Config = if let Ok(content) = std::fs::read_to_string(&config_path) {
            toml::from_str(&content)?
        } else {
            tracing::debug!("Config file {} not found, using defaults", config_path);
            Self::default()
        };

        // Env-first overrides
        if let Ok(url) = std::env::var("FLOWCRAFT_LLM_BASE_URL") {
            config.llm.base_url = url;
        }
        if let Ok(model) = std::env::var("FLOWCRAFT_PRIMARY_MODEL") {
            config.llm.primary_model = model;
        }
        if let Ok(model) = std::env::var("FLOWCRAFT_SECONDARY_MODEL") {
            config.llm.secondary_model = model;
        }
        if let Ok(dir) = std::env::var("FLOWCRAFT_STORE_DIR") {
            config.store.dir = Some(PathBuf::from(dir));
        }

        config.runtime = RuntimeConfig::load_from_env();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.tuning.validate()?;
        if self.search.max_results == 0 {
            anyhow::bail!("search.max_results must be at least 1");
        }
        if self.search.requests_per_second == 0 {
            anyhow::bail!("search.requests_per_second must be at least 1");
        }
        if !self.llm.base_url.starts_with("http://") && !self.llm.base_url.starts_with("https://")
        {
            tracing::warn!(
                "LLM base URL '{}' doesn't start with http:// or https://",
                self.llm.base_url
            );
        }
        Ok(())
    }

    /// Estimated USD cost of `tokens` on `model`; unknown models cost nothing.
    pub fn token_cost(&self, model: &str, tokens: u64) -> f64 {
        self.llm
            .price_per_1k_tokens
            .get(model)
            .map(|per_k| per_k * tokens as f64 / 1000.0)
            .unwrap_or(0.0)
    }
}
