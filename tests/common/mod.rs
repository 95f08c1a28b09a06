//! In-process collaborators for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use flowcraft::clients::{
    ChatMessage, ClientError, Completion, CompletionOptions, LlmClient, SearchClient, SearchHit,
    SearchOptions,
};
use flowcraft::config::Config;

/// Phrases that identify each built-in prompt in the rendered user message
pub const DRAFT: &str = "계획 초안";
pub const JUDGE: &str = "실제 구현 가능한지";
pub const METHOD: &str = "현재 자동화할 수 있는지";
pub const GUIDE: &str = "상세 가이드";

/// LLM that answers by the first rule whose needle appears in the prompt.
/// Prompts with no rule fail with a transport error.
#[derive(Default)]
pub struct ScriptedLlm {
    rules: Vec<(String, String)>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, needle: &str, response: impl Into<String>) -> Self {
        self.rules.push((needle.to_string(), response.into()));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(
        &self,
        model: &str,
        messages: &[ChatMessage],
        _options: &CompletionOptions,
    ) -> Result<Completion, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let prompt = messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        self.prompts.lock().unwrap().push(prompt.clone());

        self.rules
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map(|(_, response)| Completion {
                text: response.clone(),
                total_tokens: 100,
                model: model.to_string(),
            })
            .ok_or_else(|| ClientError::Transport("no scripted response".to_string()))
    }
}

/// Search that returns the same hits for every query
#[derive(Default)]
pub struct ScriptedSearch {
    hits: Vec<SearchHit>,
    calls: AtomicUsize,
}

impl ScriptedSearch {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_hits(snippets: &[&str]) -> Self {
        let hits = snippets
            .iter()
            .enumerate()
            .map(|(i, s)| SearchHit {
                url: format!("https://example.test/{i}"),
                title: format!("result {i}"),
                content: s.to_string(),
                score: 0.5,
            })
            .collect();
        Self {
            hits,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchClient for ScriptedSearch {
    async fn search(
        &self,
        _query: &str,
        _options: &SearchOptions,
    ) -> Result<Vec<SearchHit>, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.hits.clone())
    }
}

pub fn test_config() -> Arc<Config> {
    Arc::new(Config::default())
}
