/*!
 * Extraction of translated units from raw model output.
 *
 * Models are asked for a JSON array of `{"number", "text"}` objects, but the
 * output is not always valid JSON: it can be truncated, wrapped in prose or
 * fenced as markdown. Extraction therefore runs in two stages: a strict JSON
 * parse, then a permissive scan for JSON-shaped fragments. It never fails;
 * the worst outcome is an empty list.
 */

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::units::TranslatedUnit;

/// Matches one `{"number": N, "text": "..."}` fragment anywhere in the text
static FRAGMENT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\{\s*"number"\s*:\s*(\d+)\s*,\s*"text"\s*:\s*"((?:[^"\\]|\\.)*)"\s*\}"#)
        .unwrap_or_else(|e| panic!("invalid fragment pattern: {}", e))
});

/// Outcome of parsing a model response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// The response was a well-formed JSON array
    Structured(Vec<TranslatedUnit>),
    /// The response was recovered from JSON-shaped fragments
    Fallback(Vec<TranslatedUnit>),
    /// Nothing usable was found
    Empty,
}

impl Extraction {
    /// Consume the outcome into its list of units
    pub fn into_units(self) -> Vec<TranslatedUnit> {
        match self {
            Self::Structured(units) | Self::Fallback(units) => units,
            Self::Empty => Vec::new(),
        }
    }

    /// Whether no unit was recovered
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Structured(units) | Self::Fallback(units) => units.is_empty(),
            Self::Empty => true,
        }
    }
}

/// Parse raw model text into translated units
pub fn extract_translations(raw: &str) -> Vec<TranslatedUnit> {
    parse_response(raw).into_units()
}

/// Parse raw model text, keeping track of which strategy succeeded
pub fn parse_response(raw: &str) -> Extraction {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Extraction::Empty;
    }

    if let Some(units) = parse_structured(unwrap_code_fence(trimmed)) {
        return Extraction::Structured(units);
    }

    let units = parse_fragments(trimmed);
    if units.is_empty() {
        debug!("No translation fragments found in model response");
        Extraction::Empty
    } else {
        debug!("Recovered {} translation fragments from malformed response", units.len());
        Extraction::Fallback(units)
    }
}

/// Strict path: the whole text must be a JSON array
pub fn parse_structured(text: &str) -> Option<Vec<TranslatedUnit>> {
    let value: Value = serde_json::from_str(text).ok()?;
    let items = value.as_array()?;

    Some(items.iter().filter_map(unit_from_value).collect())
}

/// Permissive path: collect every JSON-shaped fragment in the text
pub fn parse_fragments(text: &str) -> Vec<TranslatedUnit> {
    FRAGMENT_PATTERN
        .captures_iter(text)
        .filter_map(|caps| {
            let number = caps.get(1)?.as_str().parse::<u32>().ok()?;
            let text = unescape(caps.get(2)?.as_str());
            Some(TranslatedUnit::new(number, text))
        })
        .collect()
}

fn unit_from_value(value: &Value) -> Option<TranslatedUnit> {
    let object = value.as_object()?;
    let number = number_from_value(object.get("number")?)?;
    let text = match object.get("text")? {
        Value::String(s) => s.clone(),
        Value::Null => return None,
        other => other.to_string(),
    };
    Some(TranslatedUnit::new(number, text))
}

fn number_from_value(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    }
}

fn unescape(escaped: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{}\"", escaped))
        .unwrap_or_else(|_| escaped.replace("\\\"", "\"").replace("\\n", "\n"))
}

/// Strip a surrounding markdown code fence, if any
fn unwrap_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}
