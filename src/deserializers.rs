//! Forgiving deserializers for LLM-produced JSON.
//!
//! Models drift from the requested schema in predictable ways: a list comes
//! back as a single string, booleans arrive as `"yes"`, step indices as
//! `"2"`. These functions accept the common variants so a near-miss doesn't
//! throw away an otherwise usable response.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Object keys that carry the human text of a list element.
const TEXT_KEYS: &[&str] = &["text", "title", "description", "content", "name", "step"];

fn value_to_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => {
            let s = s.trim().to_string();
            (!s.is_empty()).then_some(s)
        }
        Value::Object(map) => TEXT_KEYS
            .iter()
            .find_map(|k| map.get(*k).and_then(Value::as_str))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
        other => Some(other.to_string()),
    }
}

/// Deserializes a list of strings with support for string, array, or null values.
///
/// # Accepted Formats
///
/// * **Null / missing**: `null` → `[]`
/// * **String**: `"one"` → `["one"]`
/// * **Array**: `["a", "b"]` → `["a", "b"]`
/// * **Array of objects**: `[{"title": "a"}]` → `["a"]` (first of text/title/description/content/name/step)
/// * **Numbers**: converted with `to_string`
///
/// Blank elements are dropped.
pub fn de_string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    let v = Option::<Value>::deserialize(deserializer)?;
    match v {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(s)) => Ok(value_to_text(Value::String(s)).into_iter().collect()),
        Some(Value::Array(items)) => Ok(items.into_iter().filter_map(value_to_text).collect()),
        Some(obj @ Value::Object(_)) => Ok(value_to_text(obj).into_iter().collect()),
        Some(other) => Err(D::Error::custom(format!(
            "invalid type for string list: {}",
            other
        ))),
    }
}

/// Deserializes a string, rendering numbers/bools and mapping null to empty.
pub fn de_string_forgiving<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<Value>::deserialize(deserializer)?;
    Ok(v.and_then(value_to_text).unwrap_or_default())
}

/// Deserializes a boolean verdict.
///
/// Accepts `true`/`false`, numbers (non-zero is true), and strings such as
/// `"yes"`, `"no"`, `"viable"`, `"가능"`, `"불가능"` (case-insensitive).
pub fn de_bool_forgiving<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    let v = Value::deserialize(deserializer)?;
    match v {
        Value::Bool(b) => Ok(b),
        Value::Number(n) => Ok(n.as_f64().is_some_and(|f| f != 0.0)),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "y" | "viable" | "realistic" | "possible" | "가능" | "예" | "네" => {
                Ok(true)
            }
            "false" | "no" | "n" | "not viable" | "unrealistic" | "impossible" | "불가능"
            | "아니오" | "아니요" => Ok(false),
            other => Err(D::Error::custom(format!("unrecognised boolean '{}'", other))),
        },
        other => Err(D::Error::custom(format!("invalid type for bool: {}", other))),
    }
}

/// Deserializes a 0.0-1.0 confidence.
///
/// Accepts floats, percentages (`80` → 0.8), numeric strings, and
/// `"low"`/`"medium"`/`"high"`. Missing or unreadable values become `None`.
pub fn de_option_confidence<'de, D>(deserializer: D) -> Result<Option<f32>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<Value>::deserialize(deserializer)?;
    let raw = match v {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => match s.trim().trim_end_matches('%').to_lowercase().as_str() {
            "low" => Some(0.3),
            "medium" => Some(0.6),
            "high" => Some(0.9),
            other => other.parse::<f64>().ok(),
        },
        _ => None,
    };
    Ok(raw.filter(|f| f.is_finite()).map(|f| {
        let f = if f > 1.0 { f / 100.0 } else { f };
        f.clamp(0.0, 1.0) as f32
    }))
}

/// Deserializes Option<usize> accepting integers, floats (rounded), and numeric strings.
/// Examples: 5, 5.0, "5", "5.7" -> 6, "Step 3" -> 3
pub fn de_option_usize_forgiving<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<Value>::deserialize(deserializer)?;
    let Some(v) = v else { return Ok(None) };
    Ok(match v {
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                Some(u as usize)
            } else if let Some(i) = n.as_i64() {
                Some(i.max(0) as usize)
            } else {
                n.as_f64()
                    .filter(|f| f.is_finite())
                    .map(|f| f.round().max(0.0) as usize)
            }
        }
        Value::String(s) => {
            let digits: String = s
                .chars()
                .skip_while(|c| !c.is_ascii_digit())
                .take_while(|c| c.is_ascii_digit() || *c == '.')
                .collect();
            digits
                .parse::<usize>()
                .ok()
                .or_else(|| digits.parse::<f64>().ok().map(|f| f.round().max(0.0) as usize))
        }
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize, Debug)]
    struct Probe {
        #[serde(default, deserialize_with = "de_string_list")]
        items: Vec<String>,
        #[serde(default, deserialize_with = "de_option_usize_forgiving")]
        index: Option<usize>,
        #[serde(default, deserialize_with = "de_option_confidence")]
        confidence: Option<f32>,
    }

    #[derive(Deserialize, Debug)]
    struct Verdict {
        #[serde(deserialize_with = "de_bool_forgiving")]
        ok: bool,
    }

    #[test]
    fn string_list_variants() {
        let p: Probe = serde_json::from_value(json!({"items": "only"})).unwrap();
        assert_eq!(p.items, vec!["only"]);
        let p: Probe =
            serde_json::from_value(json!({"items": [{"title": "a"}, " ", 3, {"x": 1}]})).unwrap();
        assert_eq!(p.items, vec!["a", "3"]);
        let p: Probe = serde_json::from_value(json!({})).unwrap();
        assert!(p.items.is_empty());
    }

    #[test]
    fn usize_and_confidence_variants() {
        let p: Probe =
            serde_json::from_value(json!({"index": "Step 3", "confidence": 85})).unwrap();
        assert_eq!(p.index, Some(3));
        assert_eq!(p.confidence, Some(0.85));
        let p: Probe = serde_json::from_value(json!({"index": 2.6, "confidence": "high"})).unwrap();
        assert_eq!(p.index, Some(3));
        assert_eq!(p.confidence, Some(0.9));
    }

    #[test]
    fn bool_variants() {
        let v: Verdict = serde_json::from_value(json!({"ok": "불가능"})).unwrap();
        assert!(!v.ok);
        let v: Verdict = serde_json::from_value(json!({"ok": "Yes"})).unwrap();
        assert!(v.ok);
        assert!(serde_json::from_value::<Verdict>(json!({"ok": "maybe"})).is_err());
    }
}
