//! Self-healing parser for near-valid JSON emitted by LLMs
//!
//! Repair happens in three levels, each tried only if the previous one fails:
//! 1. strict `serde_json` parse
//! 2. cleaning: code fences stripped, the first JSON value cut out of any
//!    surrounding prose, typographic quote delimiters normalised, trailing
//!    commas removed
//! 3. balancing: unterminated strings closed and missing `}`/`]` appended
//!
//! Balancing is best-effort. It can produce valid JSON with the wrong shape
//! (for example an array closed where the model meant to close an object);
//! callers validate shape themselves and fall back on mismatch.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::utils::truncate_chars;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairLevel {
    Strict,
    Cleaned,
    Balanced,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecoveryFailure {
    #[error("empty model output")]
    Empty,
    #[error("no JSON value found in model output")]
    NoJson,
    #[error("unrecoverable JSON ({message}) near: {snippet}")]
    Unparseable { message: String, snippet: String },
    #[error("JSON does not match expected shape: {0}")]
    Shape(String),
}

/// Parse model output into a JSON value, repairing what can be repaired.
pub fn parse(text: &str) -> Result<Value, RecoveryFailure> {
    parse_with_level(text).map(|(value, _)| value)
}

/// Parse and deserialize into `T`. A shape mismatch is a `RecoveryFailure::Shape`.
pub fn parse_as<T: DeserializeOwned>(text: &str) -> Result<T, RecoveryFailure> {
    let value = parse(text)?;
    serde_json::from_value(value).map_err(|e| RecoveryFailure::Shape(e.to_string()))
}

pub fn parse_with_level(text: &str) -> Result<(Value, RepairLevel), RecoveryFailure> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(RecoveryFailure::Empty);
    }
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Ok((value, RepairLevel::Strict));
    }

    let unfenced = strip_code_fences(trimmed);
    let region = extract_json_region(&unfenced).ok_or(RecoveryFailure::NoJson)?;
    let cleaned = remove_trailing_commas(&normalize_quotes(region));
    if let Ok(value) = serde_json::from_str::<Value>(&cleaned) {
        return Ok((value, RepairLevel::Cleaned));
    }

    let balanced = remove_trailing_commas(&balance_brackets(&cleaned));
    match serde_json::from_str::<Value>(&balanced) {
        Ok(value) => Ok((value, RepairLevel::Balanced)),
        Err(e) => Err(RecoveryFailure::Unparseable {
            message: e.to_string(),
            snippet: truncate_chars(&cleaned, 120),
        }),
    }
}

/// Content of the first fenced block, or the input when there is no fence.
/// An unclosed fence (truncated output) yields everything after the opener.
fn strip_code_fences(text: &str) -> String {
    let Some(open) = text.find("```") else {
        return text.to_string();
    };
    let after_open = &text[open + 3..];
    // Skip the info string (`json`, `JSON`, ...) up to the end of the line
    let body_start = after_open.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_open[body_start..];
    match body.find("```") {
        Some(close) => body[..close].trim().to_string(),
        None => body.trim().to_string(),
    }
}

/// Slice from the first `{`/`[` to the point where that value closes, or to
/// the end of input if it never does.
fn extract_json_region(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let mut depth: i32 = 0;
    let mut in_string = false;
    let mut escape = false;

    for (idx, ch) in text[start..].char_indices() {
        if in_string {
            if escape {
                escape = false;
                continue;
            }
            match ch {
                '\\' => escape = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + idx + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    Some(&text[start..])
}

/// Replace typographic double quotes used as string delimiters with `"`.
/// Typographic quotes inside a plain-quoted string are content and kept.
fn normalize_quotes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    // None: outside string; Some(true): opened by a smart quote
    let mut open: Option<bool> = None;
    let mut escape = false;

    for ch in text.chars() {
        match open {
            None => match ch {
                '"' => {
                    open = Some(false);
                    out.push('"');
                }
                '\u{201C}' | '\u{201D}' => {
                    open = Some(true);
                    out.push('"');
                }
                _ => out.push(ch),
            },
            Some(smart) => {
                if escape {
                    escape = false;
                    out.push(ch);
                    continue;
                }
                match ch {
                    '\\' => {
                        escape = true;
                        out.push(ch);
                    }
                    '"' if !smart => {
                        open = None;
                        out.push('"');
                    }
                    '"' | '\u{201C}' | '\u{201D}' if smart => {
                        open = None;
                        out.push('"');
                    }
                    _ => out.push(ch),
                }
            }
        }
    }
    out
}

/// Drop commas that directly precede `}` or `]` (outside strings).
fn remove_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escape = false;

    for (i, &ch) in chars.iter().enumerate() {
        if in_string {
            out.push(ch);
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => {
                in_string = true;
                out.push(ch);
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(ch);
                }
            }
            _ => out.push(ch),
        }
    }
    out
}

/// Close an unterminated string and append the closers still owed, in
/// stack order. Mismatched closers close the inner levels first; stray
/// closers with no opener are dropped.
fn balance_brackets(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escape = false;

    for ch in text.chars() {
        if in_string {
            out.push(ch);
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => {
                in_string = true;
                out.push(ch);
            }
            '{' => {
                stack.push('}');
                out.push(ch);
            }
            '[' => {
                stack.push(']');
                out.push(ch);
            }
            '}' | ']' => {
                if stack.last() == Some(&ch) {
                    stack.pop();
                    out.push(ch);
                } else if stack.contains(&ch) {
                    while let Some(closer) = stack.pop() {
                        out.push(closer);
                        if closer == ch {
                            break;
                        }
                    }
                }
            }
            _ => out.push(ch),
        }
    }

    if in_string {
        if escape {
            out.pop();
        }
        out.push('"');
    }
    let trimmed_len = out.trim_end().len();
    out.truncate(trimmed_len);
    if out.ends_with(':') {
        out.push_str(" null");
    }
    while out.ends_with(',') {
        out.pop();
    }
    while let Some(closer) = stack.pop() {
        out.push(closer);
    }
    out
}
