//! Peer search: which registry tools do people actually use for this kind of task?

use super::{DomainProfile, ToolEntry, tools_in_text};
use crate::pipeline::budget::Budget;
use crate::pipeline::metrics::Stage;
use crate::rag::RetrievalAdapter;

const MIN_PEER_TOOLS: usize = 3;
const PEER_QUERY_INPUT_CHARS: usize = 40;

/// Issue one retrieval query and collect registry tools named in the results.
/// Pads from the domain's static list when fewer than three are found.
pub async fn peer_recommended_tools(
    rag: &RetrievalAdapter,
    domain: &DomainProfile,
    user_input: &str,
    budget: &Budget,
) -> Vec<&'static ToolEntry> {
    let input: String = user_input.trim().chars().take(PEER_QUERY_INPUT_CHARS).collect();
    let query = format!("{} 자동화 추천 도구 {}", domain.label, input);
    let hits = rag
        .search_within(&query, &rag.default_options(), budget, Stage::Draft)
        .await;

    let mut found: Vec<&'static ToolEntry> = Vec::new();
    for hit in &hits {
        for tool in tools_in_text(&format!("{} {}", hit.title, hit.content)) {
            if !found.iter().any(|t| t.name == tool.name) {
                found.push(tool);
            }
        }
    }
    let from_peers = found.len();

    for tool in domain.tool_entries() {
        if found.len() >= MIN_PEER_TOOLS {
            break;
        }
        if !found.iter().any(|t| t.name == tool.name) {
            found.push(tool);
        }
    }

    tracing::debug!(
        domain = domain.id,
        from_peers,
        total = found.len(),
        "Peer tool search finished"
    );
    found
}
