//! Retrieval adapter in front of the web-search collaborator
//!
//! Results are deduplicated by URL and cached in a bounded LRU keyed by a
//! blake3 hash of the query and its options. Requests pass a rate limiter
//! before reaching the search service. Any transport error or timeout reads
//! as "no results", as does a request whose budget has run out.

use chrono::Datelike;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use lru::LruCache;
use serde::Serialize;
use std::collections::HashSet;
use std::num::{NonZeroU32, NonZeroUsize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::clients::{SearchClient, SearchDepth, SearchHit, SearchOptions};
use crate::config::SearchConfig;
use crate::pipeline::budget::Budget;
use crate::pipeline::metrics::Stage;
use crate::utils::{normalize, truncate_chars};

const MAX_QUERY_CHARS: usize = 200;
const USER_TEXT_CHARS: usize = 60;

/// Digest of a targeted lookup, ready to splice into a prompt
#[derive(Debug, Clone, Default, Serialize)]
pub struct RetrievalDigest {
    pub query: String,
    pub hits: Vec<SearchHit>,
    pub digest: String,
}

impl RetrievalDigest {
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

pub struct RetrievalAdapter {
    client: Arc<dyn SearchClient>,
    cache: Mutex<LruCache<String, Vec<SearchHit>>>,
    limiter: DefaultDirectRateLimiter,
    timeout: Duration,
    config: SearchConfig,
}

impl RetrievalAdapter {
    pub fn new(client: Arc<dyn SearchClient>, config: &SearchConfig) -> Self {
        let capacity = NonZeroUsize::new(config.cache_capacity).unwrap_or(NonZeroUsize::MIN);
        let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
        Self {
            client,
            cache: Mutex::new(LruCache::new(capacity)),
            limiter: RateLimiter::direct(Quota::per_second(per_second)),
            timeout: Duration::from_millis(config.timeout_ms),
            config: config.clone(),
        }
    }

    pub fn default_options(&self) -> SearchOptions {
        SearchOptions {
            max_results: self.config.max_results,
            depth: SearchDepth::Basic,
        }
    }

    /// Search, returning deduplicated hits or `[]` on any failure.
    pub async fn search(&self, query: &str, options: &SearchOptions) -> Vec<SearchHit> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }

        let key = cache_key(query, options);
        if let Some(hits) = self.cache.lock().await.get(&key) {
            debug!(query, "Retrieval cache hit");
            return hits.clone();
        }

        self.limiter.until_ready().await;
        let hits = match tokio::time::timeout(self.timeout, self.client.search(query, options)).await
        {
            Ok(Ok(hits)) => dedup_by_url(hits, options.max_results),
            Ok(Err(e)) => {
                warn!(query, error = %e, "Retrieval failed; continuing without results");
                return Vec::new();
            }
            Err(_) => {
                warn!(
                    query,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Retrieval timed out; continuing without results"
                );
                return Vec::new();
            }
        };

        debug!(query, results = hits.len(), "Retrieval completed");
        self.cache.lock().await.put(key, hits.clone());
        hits
    }

    /// `search` on behalf of a request: nothing is issued once `budget` is
    /// exhausted, and the call is abandoned on cancellation or the deadline.
    pub async fn search_within(
        &self,
        query: &str,
        options: &SearchOptions,
        budget: &Budget,
        stage: Stage,
    ) -> Vec<SearchHit> {
        if let Err(e) = budget.check(stage) {
            debug!(query, error = %e, "Skipping retrieval");
            return Vec::new();
        }
        tokio::select! {
            _ = budget.cancelled() => {
                debug!(query, "Retrieval cancelled");
                Vec::new()
            }
            _ = tokio::time::sleep(budget.remaining_time()) => {
                warn!(query, stage = stage.as_str(), "Request deadline hit during retrieval");
                Vec::new()
            }
            hits = self.search(query, options) => hits,
        }
    }

    /// One bounded query built from the verified tool names, the start of the
    /// user's text and freshness qualifiers, rendered into a short digest.
    pub async fn targeted_context(
        &self,
        tools: &[String],
        user_text: &str,
        budget: &Budget,
    ) -> RetrievalDigest {
        let query = targeted_query(tools, user_text, chrono::Utc::now().year());
        let hits = self
            .search_within(&query, &self.default_options(), budget, Stage::Guide)
            .await;
        let digest = render_digest(&hits, self.config.digest_results, self.config.digest_chars);
        RetrievalDigest {
            query,
            hits,
            digest,
        }
    }

    pub async fn clear_cache(&self) {
        self.cache.lock().await.clear();
    }

    pub async fn cached_queries(&self) -> usize {
        self.cache.lock().await.len()
    }
}

fn cache_key(query: &str, options: &SearchOptions) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(normalize(query).as_bytes());
    hasher.update(&(options.max_results as u64).to_le_bytes());
    hasher.update(options.depth.as_str().as_bytes());
    hasher.finalize().to_hex().to_string()
}

fn dedup_by_url(hits: Vec<SearchHit>, max_results: usize) -> Vec<SearchHit> {
    let mut seen = HashSet::new();
    hits.into_iter()
        .filter(|h| {
            let url = h.url.trim().trim_end_matches('/').to_lowercase();
            !url.is_empty() && seen.insert(url)
        })
        .take(max_results.max(1))
        .collect()
}

fn targeted_query(tools: &[String], user_text: &str, year: i32) -> String {
    let tool_part = tools
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    let user_part: String = user_text.trim().chars().take(USER_TEXT_CHARS).collect();
    let query = format!("{tool_part} {user_part} {year} 최신 자동화 방법")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    query.chars().take(MAX_QUERY_CHARS).collect()
}

fn render_digest(hits: &[SearchHit], max_results: usize, max_chars: usize) -> String {
    let shown = hits.len().min(max_results);
    if shown == 0 {
        return String::new();
    }
    let per_hit = (max_chars / shown).max(80);
    hits.iter()
        .take(shown)
        .map(|h| {
            let content = h.content.split_whitespace().collect::<Vec<_>>().join(" ");
            format!("- {} ({}): {}", h.title.trim(), h.url, truncate_chars(&content, per_hit))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::ClientError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSearch {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl SearchClient for CountingSearch {
        async fn search(
            &self,
            query: &str,
            _options: &SearchOptions,
        ) -> Result<Vec<SearchHit>, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ClientError::Transport("connection reset".into()));
            }
            let hit = |url: &str| SearchHit {
                url: url.to_string(),
                title: format!("about {query}"),
                content: "Slack webhook works".to_string(),
                score: 0.5,
            };
            Ok(vec![
                hit("https://a.example/x"),
                hit("https://a.example/x/"),
                hit("https://b.example/y"),
            ])
        }
    }

    fn adapter(fail: bool) -> (Arc<CountingSearch>, RetrievalAdapter) {
        let client = Arc::new(CountingSearch {
            calls: AtomicUsize::new(0),
            fail,
        });
        let config = SearchConfig {
            requests_per_second: 100,
            ..SearchConfig::default()
        };
        (client.clone(), RetrievalAdapter::new(client, &config))
    }

    #[tokio::test]
    async fn dedups_and_caches() {
        let (client, rag) = adapter(false);
        let opts = rag.default_options();
        let hits = rag.search("slack webhook", &opts).await;
        assert_eq!(hits.len(), 2);
        let again = rag.search("  Slack   Webhook ", &opts).await;
        assert_eq!(again.len(), 2);
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);

        rag.clear_cache().await;
        assert_eq!(rag.cached_queries().await, 0);
        rag.search("slack webhook", &opts).await;
        assert_eq!(client.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn transport_errors_read_as_empty() {
        let (client, rag) = adapter(true);
        let opts = rag.default_options();
        assert!(rag.search("anything", &opts).await.is_empty());
        // Failures are not cached
        assert!(rag.search("anything", &opts).await.is_empty());
        assert_eq!(client.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn targeted_context_renders_digest() {
        let (_, rag) = adapter(false);
        let budget = Budget::new(Duration::from_secs(30), 10_000);
        let ctx = rag
            .targeted_context(&["Slack".to_string()], "매일 아침 매출 알림", &budget)
            .await;
        assert!(ctx.query.starts_with("Slack 매일 아침 매출 알림"));
        assert!(ctx.query.contains("최신"));
        assert_eq!(ctx.digest.lines().count(), 2);
    }

    #[tokio::test]
    async fn exhausted_or_cancelled_budget_issues_no_search() {
        let (client, rag) = adapter(false);
        let opts = rag.default_options();

        let expired = Budget::new(Duration::ZERO, 10_000);
        assert!(rag.search_within("slack", &opts, &expired, Stage::Verify).await.is_empty());

        let cancelled = Budget::new(Duration::from_secs(30), 10_000);
        cancelled.cancel();
        assert!(rag.search_within("slack", &opts, &cancelled, Stage::Guide).await.is_empty());
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);

        let live = Budget::new(Duration::from_secs(30), 10_000);
        assert_eq!(rag.search_within("slack", &opts, &live, Stage::Verify).await.len(), 2);
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn query_is_bounded() {
        let long = "가".repeat(500);
        let q = targeted_query(&["Zapier".to_string()], &long, 2026);
        assert!(q.chars().count() <= MAX_QUERY_CHARS);
        assert!(q.starts_with("Zapier "));
    }
}
