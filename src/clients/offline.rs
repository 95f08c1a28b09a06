//! Clients used when no credentials are configured.
//!
//! Every call fails softly, which drives each pipeline stage to its
//! deterministic fallback.

use async_trait::async_trait;

use crate::clients::traits::{
    ChatMessage, ClientError, Completion, CompletionOptions, LlmClient, SearchClient, SearchHit,
    SearchOptions,
};

#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineLlm;

#[async_trait]
impl LlmClient for OfflineLlm {
    async fn complete(
        &self,
        _model: &str,
        _messages: &[ChatMessage],
        _options: &CompletionOptions,
    ) -> Result<Completion, ClientError> {
        Err(ClientError::NotConfigured("LLM service".to_string()))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineSearch;

#[async_trait]
impl SearchClient for OfflineSearch {
    async fn search(
        &self,
        _query: &str,
        _options: &SearchOptions,
    ) -> Result<Vec<SearchHit>, ClientError> {
        Err(ClientError::NotConfigured("search service".to_string()))
    }
}
