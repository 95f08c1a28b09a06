//! Versioned prompt registry and the injectable template cache
//!
//! Every LLM call in the pipeline renders one of the prompts registered here.
//! Each prompt carries a version and a lineage record with a blake3 checksum
//! of its template, so metrics and logs can say exactly which text produced
//! an output. `PromptCache` sits in front of the registry, resolves optional
//! on-disk overrides once, and can be invalidated.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use crate::clients::ChatMessage;

pub mod ids {
    pub const DRAFT_FLOW: &str = "draft-flow-v1";
    pub const FEASIBILITY_JUDGE: &str = "feasibility-judge-v1";
    pub const METHOD_VALIDATION: &str = "method-validation-v1";
    pub const GUIDE_CARDS: &str = "guide-cards-v1";
}

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{\s*([a-z_]+)\s*\}\}").unwrap());

/// Represents a prompt's evolution history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptLineage {
    /// Built-in prompt this one replaces, for file overrides
    pub parent_id: Option<String>,
    /// blake3 of the template text
    pub checksum: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub change_rationale: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prompt {
    /// Stable identifier (format: purpose-name-v1)
    pub id: String,
    pub one_liner: String,
    pub version: String,
    /// Placeholder name -> description
    pub inputs: HashMap<String, String>,
    pub system: String,
    pub template: String,
    pub lineage: PromptLineage,
}

impl Prompt {
    pub fn new(
        id: impl Into<String>,
        one_liner: impl Into<String>,
        system: impl Into<String>,
        template: impl Into<String>,
        inputs: &[(&str, &str)],
        parent_id: Option<String>,
        change_rationale: Option<String>,
    ) -> Self {
        let template = template.into();
        let checksum = blake3_checksum(&template);
        Self {
            id: id.into(),
            one_liner: one_liner.into(),
            version: "1.0.0".to_string(),
            inputs: inputs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            system: system.into(),
            template,
            lineage: PromptLineage {
                parent_id,
                checksum,
                created_at: chrono::Utc::now(),
                change_rationale,
            },
        }
    }

    /// Substitute `{{name}}` placeholders. Unknown placeholders render empty.
    pub fn render(&self, vars: &[(&str, &str)]) -> String {
        PLACEHOLDER
            .replace_all(&self.template, |caps: &regex::Captures| {
                let name = &caps[1];
                match vars.iter().find(|(k, _)| *k == name) {
                    Some((_, value)) => value.to_string(),
                    None => {
                        tracing::warn!(prompt = %self.id, placeholder = name, "Unbound prompt placeholder");
                        String::new()
                    }
                }
            })
            .into_owned()
    }

    /// System + rendered user message, ready for `LlmClient::complete`.
    pub fn messages(&self, vars: &[(&str, &str)]) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(self.system.clone()),
            ChatMessage::user(self.render(vars)),
        ]
    }

    pub fn short_checksum(&self) -> &str {
        let end = self.lineage.checksum.len().min(12);
        &self.lineage.checksum[..end]
    }
}

fn blake3_checksum(content: &str) -> String {
    blake3::hash(content.as_bytes()).to_hex().to_string()
}

/// Registry of all known prompts with their metadata
#[derive(Debug, Default)]
pub struct PromptRegistry {
    prompts: HashMap<String, Arc<Prompt>>,
}

impl PromptRegistry {
    /// Create new registry with core prompts
    pub fn new() -> Self {
        let mut registry = Self::default();
        registry.register_core_prompts();
        registry
    }

    pub fn register(&mut self, prompt: Prompt) {
        self.prompts.insert(prompt.id.clone(), Arc::new(prompt));
    }

    pub fn get(&self, id: &str) -> Option<Arc<Prompt>> {
        self.prompts.get(id).cloned()
    }

    pub fn list(&self) -> Vec<Arc<Prompt>> {
        let mut all: Vec<_> = self.prompts.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    fn register_core_prompts(&mut self) {
        const PLANNER_SYSTEM: &str = "너는 반복 업무 자동화를 설계하는 전문가다. \
            개인 계정 API가 막힌 플랫폼이나 약관상 금지된 자동화는 제안하지 않는다. \
            항상 설명 없이 JSON 객체 하나만 출력한다.";
        const JUDGE_SYSTEM: &str = "너는 자동화 도구의 현재 지원 여부를 냉정하게 판정하는 검증자다. \
            확실하지 않으면 보수적으로 판단한다. 항상 JSON 객체 하나만 출력한다.";

        self.register(Prompt::new(
            ids::DRAFT_FLOW,
            "Draft a 3-7 step automation flow",
            PLANNER_SYSTEM,
            "사용자의 반복 업무를 자동화하는 계획 초안을 작성하세요.\n\n\
             업무 설명:\n{{input}}\n\n\
             추가 답변:\n{{answers}}\n\n\
             실현 가능성: {{score}}/10\n\
             주의할 제약:\n{{constraints}}\n\n\
             추천 도구: {{tools}}\n\n\
             규칙:\n\
             - 단계는 {{min_steps}}~{{max_steps}}개, 각 단계는 한 문장\n\
             - 각 단계는 \"1. \"처럼 번호로 시작\n\
             - 구체적인 도구 이름을 단계 안에 적기\n\n\
             JSON 형식:\n\
             {\"title\": \"...\", \"subtitle\": \"...\", \"steps\": [\"1. ...\", \"2. ...\"]}",
            &[
                ("input", "Task description"),
                ("answers", "Follow-up answers, one per line"),
                ("score", "Feasibility score 1-10"),
                ("constraints", "Impossible elements and warnings"),
                ("tools", "Recommended registry tools"),
                ("min_steps", "Lower step bound"),
                ("max_steps", "Upper step bound"),
            ],
            None,
            None,
        ));

        self.register(Prompt::new(
            ids::FEASIBILITY_JUDGE,
            "Judge whether an automation request is realistic",
            JUDGE_SYSTEM,
            "다음 자동화 요청이 개인 또는 소규모 팀이 무료/저가 도구로 실제 구현 가능한지 판단하세요.\n\n\
             요청:\n{{input}}\n\n\
             추가 답변:\n{{answers}}\n\n\
             감지된 분야: {{domain}}\n\
             알려진 플랫폼 제약:\n{{restrictions}}\n\n\
             JSON 형식:\n\
             {\"isRealistic\": true, \"reasoning\": \"...\", \"issues\": [\"...\"], \
             \"alternatives\": [\"...\"], \"confidence\": 0.0}",
            &[
                ("input", "Task description"),
                ("answers", "Follow-up answers"),
                ("domain", "Detected domain label"),
                ("restrictions", "Restriction rules that fired"),
            ],
            None,
            None,
        ));

        self.register(Prompt::new(
            ids::METHOD_VALIDATION,
            "Decide whether a tool/action pair works today",
            JUDGE_SYSTEM,
            "도구 \"{{tool}}\"로 \"{{action}}\" 작업을 현재 자동화할 수 있는지 판정하세요.\n\n\
             단계 원문: {{step}}\n\n\
             검색 근거:\n{{evidence}}\n\n\
             키워드 근거 점수: {{evidence_score}}\n\n\
             JSON 형식:\n\
             {\"isViable\": true, \"reasoning\": \"...\", \"issues\": [\"...\"], \"alternatives\": [\"...\"]}",
            &[
                ("tool", "Extracted tool name"),
                ("action", "Extracted action"),
                ("step", "Original step text"),
                ("evidence", "Retrieval digest"),
                ("evidence_score", "Keyword evidence score"),
            ],
            None,
            None,
        ));

        self.register(Prompt::new(
            ids::GUIDE_CARDS,
            "Expand a verified flow into per-step guide cards",
            PLANNER_SYSTEM,
            "아래 검증된 자동화 흐름의 각 단계에 대한 상세 가이드를 작성하세요.\n\n\
             원래 요청:\n{{input}}\n\n\
             흐름 제목: {{title}}\n\
             단계:\n{{steps}}\n\n\
             참고 자료:\n{{context}}\n\n\
             규칙:\n\
             - 단계마다 guide 카드 하나 (stepIndex는 1부터), 총 {{step_count}}개\n\
             - subSteps는 클릭 수준으로 구체적으로, commonMistakes와 tips 포함\n\
             - 마지막에 faq 카드와 expansion 카드를 선택적으로 추가\n\n\
             JSON 형식:\n\
             {\"cards\": [\
             {\"type\": \"flow\", \"title\": \"...\", \"subtitle\": \"...\", \"steps\": [\"...\"]}, \
             {\"type\": \"guide\", \"stepIndex\": 1, \"title\": \"...\", \"subSteps\": [\"...\"], \
             \"commonMistakes\": [\"...\"], \"tips\": [\"...\"]}, \
             {\"type\": \"faq\", \"items\": [{\"question\": \"...\", \"answer\": \"...\"}]}, \
             {\"type\": \"expansion\", \"title\": \"...\", \"ideas\": [\"...\"]}]}",
            &[
                ("input", "Task description"),
                ("title", "Flow title"),
                ("steps", "Numbered verified steps"),
                ("step_count", "Number of steps"),
                ("context", "Retrieval digest for the verified tools"),
            ],
            None,
            None,
        ));
    }
}

/// Resolved-prompt cache owned by the coordinator.
///
/// Lookups check the cache, then `<dir>/<id>.txt`, then the built-in registry.
#[derive(Debug)]
pub struct PromptCache {
    registry: PromptRegistry,
    override_dir: Option<PathBuf>,
    resolved: RwLock<HashMap<String, Arc<Prompt>>>,
}

impl PromptCache {
    pub fn new(registry: PromptRegistry, override_dir: Option<PathBuf>) -> Self {
        Self {
            registry,
            override_dir,
            resolved: RwLock::new(HashMap::new()),
        }
    }

    pub fn builtin() -> Self {
        Self::new(PromptRegistry::new(), None)
    }

    pub fn get(&self, id: &str) -> Option<Arc<Prompt>> {
        if let Some(hit) = self
            .resolved
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
        {
            return Some(hit.clone());
        }

        let base = self.registry.get(id)?;
        let prompt = match self.load_override(&base) {
            Some(p) => Arc::new(p),
            None => base,
        };
        self.resolved
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id.to_string(), prompt.clone());
        Some(prompt)
    }

    fn load_override(&self, base: &Prompt) -> Option<Prompt> {
        let path = self.override_dir.as_ref()?.join(format!("{}.txt", base.id));
        let template = match std::fs::read_to_string(&path) {
            Ok(t) if !t.trim().is_empty() => t,
            Ok(_) => return None,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Prompt override unreadable; using built-in");
                return None;
            }
        };
        let inputs: Vec<(&str, &str)> = base
            .inputs
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let prompt = Prompt::new(
            base.id.clone(),
            base.one_liner.clone(),
            base.system.clone(),
            template,
            &inputs,
            Some(base.id.clone()),
            Some(format!("file override {}", path.display())),
        );
        tracing::info!(prompt = %prompt.id, checksum = prompt.short_checksum(), "Loaded prompt override");
        Some(prompt)
    }

    /// Drop every resolved prompt; the next lookup re-reads overrides.
    pub fn invalidate(&self) {
        self.resolved
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}
