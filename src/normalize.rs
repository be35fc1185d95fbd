use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

pub const DEFAULT_TITLE: &str = "ChatGPT Conversation";
pub const DEFAULT_AI_NAME: &str = "ChatGPT";
pub const DEFAULT_HUMAN_AUTHOR: &str = "User";

/// Collapse internal whitespace runs to single spaces and trim the ends.
pub fn trim_internal(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut pending_space = false;
    for ch in value.chars() {
        if ch.is_whitespace() {
            pending_space = !out.is_empty();
        } else {
            if pending_space {
                out.push(' ');
                pending_space = false;
            }
            out.push(ch);
        }
    }
    out
}

pub fn normalize_conversation_id(value: &str) -> Option<String> {
    let trimmed = trim_internal(value);
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_ascii_lowercase())
}

/// A title equal to the platform's own brand text is absence of data, not a
/// resolved value; the cascade must keep searching past it.
pub fn normalize_title(value: &str) -> Option<String> {
    let trimmed = trim_internal(value);
    if trimmed.is_empty() {
        return None;
    }
    let stripped = strip_brand_suffix(&trimmed);
    let candidate = if stripped.is_empty() { trimmed } else { stripped };
    let lowered = candidate.to_ascii_lowercase();
    if lowered == "chatgpt"
        || lowered == "openai"
        || lowered == DEFAULT_TITLE.to_ascii_lowercase()
    {
        return None;
    }
    Some(candidate)
}

fn strip_brand_suffix(value: &str) -> String {
    for suffix in ["| ChatGPT", "| OpenAI", "|ChatGPT", "|OpenAI"] {
        let lowered = value.to_ascii_lowercase();
        let lowered_suffix = suffix.to_ascii_lowercase();
        if lowered.ends_with(&lowered_suffix) {
            let cut = value.len() - suffix.len();
            return value[..cut].trim_end().to_string();
        }
    }
    value.to_string()
}

/// Human author values that spell the platform name would silently duplicate
/// the AI slot; reject them.
pub fn normalize_human_author(value: &str) -> Option<String> {
    let trimmed = trim_internal(value);
    if trimmed.is_empty() {
        return None;
    }
    let lowered = trimmed.to_ascii_lowercase();
    if lowered == "chatgpt" || lowered == "chat gpt" || lowered == "openai" {
        return None;
    }
    Some(trimmed)
}

pub fn normalize_ai_model(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = trim_internal(s);
            (!trimmed.is_empty()).then_some(trimmed)
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => items.first().and_then(normalize_ai_model),
        Value::Object(map) => {
            for key in ["aiModel", "model", "displayName", "name", "label", "version"] {
                if let Some(found) = map.get(key).and_then(normalize_ai_model) {
                    return Some(found);
                }
            }
            map.get("data").and_then(normalize_ai_model)
        }
        _ => None,
    }
}

/// Best-effort date normalization: anything parseable becomes a timestamp
/// with the local UTC offset; otherwise the trimmed input is kept verbatim.
pub fn normalize_date(value: &str) -> Option<String> {
    let trimmed = trim_internal(value);
    if trimmed.is_empty() {
        return None;
    }
    if let Some(ms) = parse_time_str_ms(&trimmed) {
        return Some(format_offset_ms(ms, local_offset()));
    }
    Some(trimmed)
}

/// Interpret a JSON timestamp candidate as milliseconds since the epoch.
/// Numbers below 1e12 are unix seconds (possibly fractional), larger numbers
/// are already milliseconds; strings may carry either shape or a datetime.
pub fn parse_time_ms(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_f64().and_then(numeric_to_ms),
        Value::String(s) => parse_time_str_ms(s),
        _ => None,
    }
}

pub fn parse_time_str_ms(value: &str) -> Option<i64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(numeric) = trimmed.parse::<f64>() {
        return numeric_to_ms(numeric);
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.timestamp_millis());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(Utc.from_utc_datetime(&naive).timestamp_millis());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&naive).timestamp_millis());
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        let midnight = date.and_hms_opt(0, 0, 0)?;
        return Some(Utc.from_utc_datetime(&midnight).timestamp_millis());
    }
    None
}

fn numeric_to_ms(value: f64) -> Option<i64> {
    if !value.is_finite() {
        return None;
    }
    let ms = if value.abs() < 1e12 {
        value * 1000.0
    } else {
        value
    };
    if ms.abs() > i64::MAX as f64 {
        return None;
    }
    Some(ms as i64)
}

/// Render a millisecond timestamp as ISO-8601 with an explicit UTC offset,
/// e.g. `2025-09-25T20:45:49-04:00`.
pub fn format_offset_ms(ms: i64, offset: FixedOffset) -> String {
    match offset.timestamp_millis_opt(ms) {
        chrono::LocalResult::Single(dt) | chrono::LocalResult::Ambiguous(dt, _) => {
            dt.format("%Y-%m-%dT%H:%M:%S%:z").to_string()
        }
        chrono::LocalResult::None => String::new(),
    }
}

pub fn local_offset() -> FixedOffset {
    *Local::now().offset()
}

pub fn now_local_iso() -> String {
    Local::now().format("%Y-%m-%dT%H:%M:%S%:z").to_string()
}
