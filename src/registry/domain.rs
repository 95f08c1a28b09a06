//! Domain detection from free-text task descriptions
//!
//! Each domain profile carries weighted keywords. The input and any follow-up
//! context are scanned, every matched keyword adds its weight, and the highest
//! total wins. Ties go to the profile listed first in the table, and no match
//! at all yields `general_automation`.

use serde::Serialize;

use super::catalog::{DOMAINS, GENERAL_AUTOMATION};
use super::DomainProfile;
use crate::utils::normalize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainMatch {
    pub domain: &'static DomainProfile,
    pub score: u32,
    pub matched_keywords: Vec<&'static str>,
}

impl DomainMatch {
    pub fn id(&self) -> &'static str {
        self.domain.id
    }
}

fn score_profile(profile: &'static DomainProfile, text: &str) -> DomainMatch {
    let mut score = 0;
    let mut matched = Vec::new();
    for (keyword, weight) in profile.keywords {
        if text.contains(keyword) {
            score += weight;
            matched.push(*keyword);
        }
    }
    DomainMatch {
        domain: profile,
        score,
        matched_keywords: matched,
    }
}

/// Detect the task domain from the input plus follow-up context.
pub fn detect_domain(input: &str, context: &str) -> DomainMatch {
    let text = normalize(&format!("{input} {context}"));

    let mut best: Option<DomainMatch> = None;
    for profile in DOMAINS {
        let candidate = score_profile(profile, &text);
        // Strictly greater keeps the earlier profile on ties
        if candidate.score > best.as_ref().map_or(0, |b| b.score) {
            best = Some(candidate);
        }
    }

    let best = best.unwrap_or(DomainMatch {
        domain: &GENERAL_AUTOMATION,
        score: 0,
        matched_keywords: Vec::new(),
    });
    tracing::debug!(
        domain = best.domain.id,
        score = best.score,
        "Detected task domain"
    );
    best
}
