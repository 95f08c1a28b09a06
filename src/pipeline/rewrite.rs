//! Rewriting problematic steps in place
//!
//! Only the unsupported fragment changes. The ordinal prefix ("1. ",
//! "2단계: ", "Step 3:") and the rest of the sentence are kept as written.

use once_cell::sync::Lazy;
use regex::{NoExpand, Regex};

use super::extraction::CRAWL_WORDS;
use super::types::{StepValidation, ValidationStatus};
use crate::feasibility::{RestrictionRule, rule_for_platform};
use crate::registry::{find_tool, tools_in_text};

/// Free tool substituted when nothing more specific is known
pub const GENERIC_ALTERNATIVE: &str = "이메일 (Gmail)";

/// What a crawl step becomes when the crawled site is not named in the text
pub const CRAWL_REPLACEMENT: &str = "RSS/공식 API로 수집";

static CRAWL_FRAGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:크롤링|스크래핑|crawl\w*|scrap\w*|긁어\S*)").unwrap()
});

static ORDINAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:\d+\s*단계\s*[:.)]?|step\s*\d+\s*[:.)]?|\d+\s*[.)])\s*").unwrap()
});

/// The ordinal prefix of a step, including trailing whitespace.
pub fn ordinal_prefix(step: &str) -> Option<&str> {
    ORDINAL.find(step).map(|m| m.as_str())
}

/// Step text without its ordinal prefix.
pub fn step_body(step: &str) -> &str {
    match ordinal_prefix(step) {
        Some(prefix) => &step[prefix.len()..],
        None => step,
    }
}

/// Case-insensitive replace of every variant, longest first so "카카오톡"
/// is replaced whole rather than as "카카오" + "톡".
fn replace_variants(text: &str, variants: &[&str], replacement: &str) -> Option<String> {
    let mut sorted: Vec<&str> = variants.iter().copied().filter(|v| !v.is_empty()).collect();
    sorted.sort_by_key(|v| std::cmp::Reverse(v.chars().count()));
    if sorted.is_empty() {
        return None;
    }
    let alternation = sorted
        .iter()
        .map(|v| regex::escape(v))
        .collect::<Vec<_>>()
        .join("|");
    let re = Regex::new(&format!("(?i){alternation}")).ok()?;
    if !re.is_match(text) {
        return None;
    }
    Some(re.replace_all(text, NoExpand(replacement)).into_owned())
}

fn substitute_for(validation: &StepValidation) -> String {
    let from_alternatives = validation
        .alternatives
        .iter()
        .flat_map(|alt| tools_in_text(alt))
        .find(|tool| !tool.aliases.iter().any(|a| validation.tool.to_lowercase().contains(a)));
    match from_alternatives {
        Some(tool) => tool.name.to_string(),
        None => GENERIC_ALTERNATIVE.to_string(),
    }
}

/// Rewrite one step given the validations of its candidates. Viable and
/// unverified candidates are left alone.
pub fn rewrite_step(step: &str, validations: &[StepValidation]) -> String {
    let prefix = ordinal_prefix(step).unwrap_or("");
    let mut body = step[prefix.len()..].to_string();
    let mut applied: Vec<&'static str> = Vec::new();

    for v in validations
        .iter()
        .filter(|v| v.status == ValidationStatus::NonViable)
    {
        let rule: Option<&'static RestrictionRule> = rule_for_platform(&v.tool)
            .or_else(|| rule_for_platform(&body))
            .map(|(rule, _)| rule);

        let substitute = match rule {
            Some(rule) if applied.contains(&rule.id) => continue,
            Some(rule) => {
                applied.push(rule.id);
                rule.replacement.to_string()
            }
            None => substitute_for(v),
        };
        let by_name = match rule {
            Some(rule) => replace_variants(&body, rule.platforms, &substitute),
            None => replace_variants(&body, &[v.tool.as_str()], &substitute),
        };

        body = match by_name
            .or_else(|| replace_aliases(&body, &v.tool, &substitute))
            .or_else(|| replace_action(&body, &v.action, &substitute))
        {
            Some(text) => text,
            None => {
                tracing::debug!(
                    tool = %v.tool,
                    step,
                    "Unsupported fragment not found in step text; noting the substitute"
                );
                format!("{body} ({substitute} 활용)")
            }
        };
    }

    format!("{prefix}{body}")
}

/// The tool under any registry spelling ("구글 시트" for "Google Sheets").
fn replace_aliases(body: &str, tool: &str, substitute: &str) -> Option<String> {
    let entry = find_tool(tool)?;
    let mut variants: Vec<&str> = entry.aliases.to_vec();
    variants.push(entry.name);
    replace_variants(body, &variants, substitute)
}

/// The action fragment, when the tool itself is implicit. Crawling becomes
/// collection through feeds or an official API; any other action is routed
/// through the substitute.
fn replace_action(body: &str, action: &str, substitute: &str) -> Option<String> {
    if is_crawl_action(action) && CRAWL_FRAGMENT.is_match(body) {
        return Some(CRAWL_FRAGMENT.replace(body, NoExpand(CRAWL_REPLACEMENT)).into_owned());
    }
    let action = action.trim();
    if action.is_empty() {
        return None;
    }
    let at = body.to_lowercase().find(&action.to_lowercase())?;
    // Lowercasing Hangul and ASCII keeps byte offsets stable
    if !body.is_char_boundary(at) || !body.is_char_boundary(at + action.len()) {
        return None;
    }
    Some(format!(
        "{}{substitute}로 {}",
        &body[..at],
        &body[at..]
    ))
}

fn is_crawl_action(action: &str) -> bool {
    let action = action.to_lowercase();
    CRAWL_WORDS.iter().any(|w| action.contains(w))
}
