//! Text normalisation and overlap helpers shared by the matchers

use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;

/// NFC-normalise, lowercase and collapse whitespace.
///
/// Hangul typed on some platforms arrives decomposed (NFD); every keyword
/// comparison in the crate goes through this first.
pub fn normalize(text: &str) -> String {
    text.nfc()
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Alphanumeric word tokens of normalised text.
pub fn word_set(text: &str) -> HashSet<String> {
    normalize(text)
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Jaccard overlap of the two word sets. Identical (including empty) inputs score 1.0.
pub fn word_similarity(a: &str, b: &str) -> f32 {
    let wa = word_set(a);
    let wb = word_set(b);
    if wa.is_empty() && wb.is_empty() {
        return if normalize(a) == normalize(b) { 1.0 } else { 0.0 };
    }
    let inter = wa.intersection(&wb).count();
    let union = wa.union(&wb).count();
    inter as f32 / union.max(1) as f32
}

/// First needle contained in the (already normalised) haystack.
pub fn first_hit<'a>(haystack: &str, needles: &[&'a str]) -> Option<&'a str> {
    needles.iter().copied().find(|n| haystack.contains(n))
}

pub fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    first_hit(haystack, needles).is_some()
}

pub fn truncate_chars(input: &str, max: usize) -> String {
    let mut out = String::new();
    for (idx, ch) in input.chars().enumerate() {
        if idx >= max {
            out.push_str("...");
            break;
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_composes_hangul() {
        let decomposed: String = "카카오톡".nfd().collect();
        assert_ne!(decomposed, "카카오톡");
        assert_eq!(normalize(&decomposed), "카카오톡");
        assert_eq!(normalize("  Slack   ALERT "), "slack alert");
    }

    #[test]
    fn similarity_bounds() {
        assert_eq!(word_similarity("매일 매출 보고서", "매일 매출 보고서"), 1.0);
        assert_eq!(word_similarity("", ""), 1.0);
        assert_eq!(word_similarity("alpha", "beta"), 0.0);
        let partial = word_similarity("send daily report", "send weekly report");
        assert!(partial > 0.0 && partial < 1.0);
    }

    #[test]
    fn truncation_marks_cut() {
        assert_eq!(truncate_chars("abcdef", 3), "abc...");
        assert_eq!(truncate_chars("ab", 3), "ab");
    }
}
