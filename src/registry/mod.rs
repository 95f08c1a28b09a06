//! Tool registry, domain detection and tool recommendations

pub mod catalog;
pub mod domain;
pub mod peer;

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::utils::normalize;

pub use catalog::{DOMAINS, GENERAL_AUTOMATION, TOOLS};
pub use domain::{DomainMatch, detect_domain};
pub use peer::peer_recommended_tools;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Pricing {
    Free,
    Freemium,
    Paid,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolEntry {
    pub name: &'static str,
    /// Lowercase spellings searched for in free text
    #[serde(skip)]
    pub aliases: &'static [&'static str],
    pub capabilities: &'static [&'static str],
    pub pricing: Pricing,
    /// Typical paid-plan cost for a small team
    pub monthly_usd: f32,
    pub difficulty: Difficulty,
    pub setup_minutes: u32,
}

impl ToolEntry {
    pub fn is_complex(&self) -> bool {
        self.difficulty != Difficulty::Beginner
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DomainProfile {
    pub id: &'static str,
    pub label: &'static str,
    #[serde(skip)]
    pub keywords: &'static [(&'static str, u32)],
    /// Ordered by relevance; the head of the list is the core stack
    pub tools: &'static [&'static str],
}

impl DomainProfile {
    pub fn by_id(id: &str) -> Option<&'static DomainProfile> {
        if id == GENERAL_AUTOMATION.id {
            return Some(&GENERAL_AUTOMATION);
        }
        DOMAINS.iter().find(|d| d.id == id)
    }

    pub fn tool_entries(&self) -> impl Iterator<Item = &'static ToolEntry> + '_ {
        self.tools.iter().filter_map(|name| find_tool(name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Cost,
    #[default]
    Ease,
    Power,
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cost" | "cheap" => Ok(Priority::Cost),
            "ease" | "easy" => Ok(Priority::Ease),
            "power" | "powerful" => Ok(Priority::Power),
            other => Err(format!("unknown priority '{other}' (expected cost|ease|power)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    Primary,
    Secondary,
    Fallback,
}

// Allow-lists per priority: membership decides the tier
const COST_PRIMARY: &[Pricing] = &[Pricing::Free];
const COST_SECONDARY: &[Pricing] = &[Pricing::Freemium];
const EASE_PRIMARY: &[Difficulty] = &[Difficulty::Beginner];
const EASE_SECONDARY: &[Difficulty] = &[Difficulty::Intermediate];
const POWER_PRIMARY: &[Difficulty] = &[Difficulty::Advanced, Difficulty::Intermediate];
const POWER_SECONDARY: &[Pricing] = &[Pricing::Paid, Pricing::Freemium];

fn tier_for(priority: Priority, tool: &ToolEntry) -> Tier {
    let (primary, secondary) = match priority {
        Priority::Cost => (
            COST_PRIMARY.contains(&tool.pricing),
            COST_SECONDARY.contains(&tool.pricing),
        ),
        Priority::Ease => (
            EASE_PRIMARY.contains(&tool.difficulty),
            EASE_SECONDARY.contains(&tool.difficulty),
        ),
        Priority::Power => (
            POWER_PRIMARY.contains(&tool.difficulty),
            POWER_SECONDARY.contains(&tool.pricing),
        ),
    };
    if primary {
        Tier::Primary
    } else if secondary {
        Tier::Secondary
    } else {
        Tier::Fallback
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolRecommendation {
    pub domain: &'static str,
    pub priority: Priority,
    pub primary: Vec<&'static ToolEntry>,
    pub secondary: Vec<&'static ToolEntry>,
    pub fallback: Vec<&'static ToolEntry>,
}

impl ToolRecommendation {
    /// Tool names in tier order
    pub fn ranked_names(&self) -> Vec<&'static str> {
        self.primary
            .iter()
            .chain(&self.secondary)
            .chain(&self.fallback)
            .map(|t| t.name)
            .collect()
    }
}

/// Partition the domain's tools into primary/secondary/fallback for `priority`.
/// Advanced tools are left out entirely unless `include_advanced` is set.
pub fn get_optimal_ai_tools(
    domain: &DomainProfile,
    priority: Priority,
    include_advanced: bool,
) -> ToolRecommendation {
    let mut rec = ToolRecommendation {
        domain: domain.id,
        priority,
        primary: Vec::new(),
        secondary: Vec::new(),
        fallback: Vec::new(),
    };
    for tool in domain.tool_entries() {
        if tool.difficulty == Difficulty::Advanced && !include_advanced {
            continue;
        }
        match tier_for(priority, tool) {
            Tier::Primary => rec.primary.push(tool),
            Tier::Secondary => rec.secondary.push(tool),
            Tier::Fallback => rec.fallback.push(tool),
        }
    }
    rec
}

pub fn find_tool(name: &str) -> Option<&'static ToolEntry> {
    let needle = normalize(name);
    TOOLS
        .iter()
        .find(|t| normalize(t.name) == needle || t.aliases.contains(&needle.as_str()))
}

/// Registry tools mentioned anywhere in `text`, in registry order.
pub fn tools_in_text(text: &str) -> Vec<&'static ToolEntry> {
    let haystack = normalize(text);
    TOOLS
        .iter()
        .filter(|t| t.aliases.iter().any(|a| haystack.contains(a)))
        .collect()
}

/// Number of leading domain tools treated as the stack a user would assemble
const CORE_STACK_SIZE: usize = 3;

/// Cost and complexity aggregate over a tool stack, consumed by the scorer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainSignals {
    pub domain: &'static str,
    pub tools: Vec<&'static str>,
    pub monthly_cost_usd: f32,
    pub complex_tools: usize,
    pub beginner_tools: usize,
}

impl DomainSignals {
    fn from_tools(domain: &'static str, tools: &[&'static ToolEntry]) -> Self {
        Self {
            domain,
            tools: tools.iter().map(|t| t.name).collect(),
            monthly_cost_usd: tools.iter().map(|t| t.monthly_usd).sum(),
            complex_tools: tools.iter().filter(|t| t.is_complex()).count(),
            beginner_tools: tools.iter().filter(|t| !t.is_complex()).count(),
        }
    }

    /// Add registry tools the user named explicitly.
    pub fn including_mentions(self, text: &str) -> Self {
        let mut tools: Vec<&'static ToolEntry> =
            self.tools.iter().filter_map(|n| find_tool(n)).collect();
        for tool in tools_in_text(text) {
            if !tools.iter().any(|t| t.name == tool.name) {
                tools.push(tool);
            }
        }
        Self::from_tools(self.domain, &tools)
    }

    pub fn complexity_dominates(&self) -> bool {
        self.complex_tools > self.beginner_tools
    }
}

/// Cost/complexity signals of the domain's core tool stack.
pub fn domain_signals(domain: &DomainProfile) -> DomainSignals {
    let core: Vec<&'static ToolEntry> = domain.tool_entries().take(CORE_STACK_SIZE).collect();
    DomainSignals::from_tools(domain.id, &core)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_domain_tool_is_registered() {
        for domain in DOMAINS.iter().chain(std::iter::once(&GENERAL_AUTOMATION)) {
            for name in domain.tools {
                assert!(find_tool(name).is_some(), "{} lists unknown tool {name}", domain.id);
            }
        }
    }

    #[test]
    fn advanced_tools_excluded_unless_requested() {
        let data = DomainProfile::by_id("data_analysis").unwrap();
        let rec = get_optimal_ai_tools(data, Priority::Ease, false);
        let names = rec.ranked_names();
        assert!(!names.contains(&"Python"));
        assert!(!names.contains(&"Tableau"));
        assert_eq!(rec.primary.first().map(|t| t.name), Some("Google Sheets"));

        let rec = get_optimal_ai_tools(data, Priority::Power, true);
        assert!(rec.primary.iter().any(|t| t.name == "Python"));
    }

    #[test]
    fn cost_priority_puts_free_tools_first() {
        let monitoring = DomainProfile::by_id("monitoring_alerts").unwrap();
        let rec = get_optimal_ai_tools(monitoring, Priority::Cost, false);
        assert!(rec.primary.iter().all(|t| t.pricing == Pricing::Free));
        assert!(rec.secondary.iter().all(|t| t.pricing == Pricing::Freemium));
    }

    #[test]
    fn tools_are_found_in_free_text() {
        let found = tools_in_text("슬랙으로 보내고 Google Sheets에 기록");
        let names: Vec<_> = found.iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["Google Sheets", "Slack"]);
        assert_eq!(find_tool("zapier").map(|t| t.name), Some("Zapier"));
    }

    #[test]
    fn signals_include_mentioned_tools() {
        let data = DomainProfile::by_id("data_analysis").unwrap();
        let base = domain_signals(data);
        assert_eq!(base.monthly_cost_usd, 0.0);
        let with = base.including_mentions("Tableau 대시보드");
        assert!(with.monthly_cost_usd >= 75.0);
        assert!(with.tools.contains(&"Tableau"));
    }

    #[test]
    fn priority_parses() {
        assert_eq!("Cost".parse::<Priority>(), Ok(Priority::Cost));
        assert!("speed".parse::<Priority>().is_err());
    }
}
