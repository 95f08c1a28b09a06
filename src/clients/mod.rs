pub mod offline;
pub mod openai;
pub mod tavily;
pub mod traits;

use std::sync::Arc;

pub use offline::{OfflineLlm, OfflineSearch};
pub use openai::OpenAiClient;
pub use tavily::TavilyClient;
pub use traits::{
    ChatMessage, ClientError, Completion, CompletionOptions, LlmClient, Role, SearchClient,
    SearchDepth, SearchHit, SearchOptions,
};

use crate::config::Config;

/// Build the collaborators from configuration, falling back to offline
/// clients when a key is missing or `offline` is requested.
pub fn build_clients(config: &Config, offline: bool) -> (Arc<dyn LlmClient>, Arc<dyn SearchClient>) {
    let llm: Arc<dyn LlmClient> = match (&config.runtime.llm_api_key, offline) {
        (Some(key), false) => {
            match OpenAiClient::new(&config.llm.base_url, key.clone(), config.llm.timeout_ms) {
                Ok(client) => Arc::new(client),
                Err(e) => {
                    tracing::warn!("LLM client unavailable, running offline: {}", e);
                    Arc::new(OfflineLlm)
                }
            }
        }
        _ => {
            tracing::info!("No LLM credentials (or offline mode); using deterministic fallbacks");
            Arc::new(OfflineLlm)
        }
    };

    let search: Arc<dyn SearchClient> = match (&config.runtime.search_api_key, offline) {
        (Some(key), false) => {
            match TavilyClient::new(&config.search.base_url, key.clone(), config.search.timeout_ms)
            {
                Ok(client) => Arc::new(client),
                Err(e) => {
                    tracing::warn!("Search client unavailable, running offline: {}", e);
                    Arc::new(OfflineSearch)
                }
            }
        }
        _ => Arc::new(OfflineSearch),
    };

    (llm, search)
}
