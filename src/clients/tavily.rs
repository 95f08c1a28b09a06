//! Tavily-style web search client

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clients::traits::{ClientError, SearchClient, SearchHit, SearchOptions};

pub struct TavilyClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout_ms: u64,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
    search_depth: &'static str,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

impl TavilyClient {
    pub fn new(base_url: &str, api_key: String, timeout_ms: u64) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| ClientError::Transport(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            timeout_ms,
        })
    }
}

#[async_trait]
impl SearchClient for TavilyClient {
    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchHit>, ClientError> {
        let url = format!("{}/search", self.base_url);
        let body = SearchRequest {
            api_key: &self.api_key,
            query,
            max_results: options.max_results,
            search_depth: options.depth.as_str(),
        };
        debug!("search request (query_chars={}, max={})", query.chars().count(), options.max_results);

        let resp = self.client.post(&url).json(&body).send().await.map_err(|e| {
            if e.is_timeout() {
                ClientError::Timeout {
                    timeout_ms: self.timeout_ms,
                }
            } else {
                ClientError::Transport(e.to_string())
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: SearchResponse = resp
            .json()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))?;
        Ok(parsed.results)
    }
}
