use chrono::FixedOffset;
use serde_json::Value;
use std::collections::HashSet;

use crate::normalize::{self, DEFAULT_AI_NAME, DEFAULT_HUMAN_AUTHOR, DEFAULT_TITLE, parse_time_ms};

/// A self-contained document synthesized from a conversation payload, used
/// as the capture target when the live page cannot be snapshotted.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub html: String,
    pub title: String,
    pub message_count: usize,
}

const STYLE: &str = r#"
    :root {
      color-scheme: light dark;
      --bubble-radius: 14px;
      --assistant-bg: rgba(52, 152, 219, 0.12);
      --user-bg: rgba(155, 89, 182, 0.12);
      --system-bg: rgba(127, 140, 141, 0.15);
      --border-color: rgba(0,0,0,0.08);
      --font-body: -apple-system, BlinkMacSystemFont, "Segoe UI", sans-serif;
      --font-mono: "Fira Code", "Menlo", "Consolas", monospace;
    }
    body {
      margin: 0 auto;
      padding: 32px 24px 64px;
      max-width: 860px;
      font-family: var(--font-body);
      line-height: 1.6;
      background: #f9f9fb;
      color: #111;
    }
    header { margin-bottom: 32px; }
    header h1 { margin: 0; font-size: 1.8rem; font-weight: 600; }
    header p { margin: 4px 0 0; color: #555; }
    .conversation { display: flex; flex-direction: column; gap: 18px; }
    .message {
      border-radius: var(--bubble-radius);
      padding: 18px 20px;
      border: 1px solid var(--border-color);
      background: white;
      box-shadow: 0 1px 3px rgba(0,0,0,0.04);
    }
    .message.role-assistant { background: var(--assistant-bg); border-color: rgba(41, 128, 185, 0.25); }
    .message.role-user { background: var(--user-bg); border-color: rgba(142, 68, 173, 0.25); }
    .message.role-system { background: var(--system-bg); border-color: rgba(127, 140, 141, 0.25); }
    .message-meta {
      font-size: 0.9rem;
      font-weight: 600;
      margin-bottom: 12px;
      display: flex;
      justify-content: space-between;
      flex-wrap: wrap;
      gap: 6px;
      color: #2c3e50;
    }
    .message-body p { margin: 0 0 12px; white-space: pre-wrap; }
    .message-body pre {
      background: rgba(0,0,0,0.06);
      border-radius: 10px;
      padding: 14px;
      overflow-x: auto;
      font-family: var(--font-mono);
      font-size: 0.92rem;
      margin: 0 0 12px;
      white-space: pre;
    }
    .message-body code { font-family: var(--font-mono); }
    .message-body img { max-width: 100%; border-radius: 10px; margin: 12px 0; }
    footer { margin-top: 36px; font-size: 0.85rem; color: #7f8c8d; text-align: center; }
"#;

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// The payload sometimes nests the record under `conversation`; accept both.
fn conversation_record(payload: &Value) -> Option<&Value> {
    if payload.get("mapping").map(Value::is_object).unwrap_or(false) {
        return Some(payload);
    }
    let nested = payload.get("conversation")?;
    nested
        .get("mapping")
        .map(Value::is_object)
        .unwrap_or(false)
        .then_some(nested)
}

fn message_timestamp_ms(message: &Value) -> i64 {
    for candidate in [
        message.get("update_time"),
        message.get("create_time"),
        message.get("metadata").and_then(|meta| meta.get("timestamp")),
    ] {
        if let Some(ms) = candidate.and_then(parse_time_ms) {
            return ms;
        }
    }
    0
}

fn message_id(message: &Value) -> Option<&str> {
    message.get("id").and_then(Value::as_str)
}

/// Linearize the parent-pointer tree. The mapping is untrusted input: the
/// walk keeps a visited set so a cycle or dangling parent terminates, and
/// every message the walk never reaches is appended afterwards in timestamp
/// order instead of being dropped.
fn ordered_messages(record: &Value) -> Vec<&Value> {
    let Some(mapping) = record.get("mapping").and_then(Value::as_object) else {
        return Vec::new();
    };

    let mut ordered: Vec<&Value> = Vec::new();
    let mut visited: HashSet<&str> = HashSet::new();
    let mut cursor = record.get("current_node").and_then(Value::as_str);

    while let Some(node_id) = cursor {
        if visited.contains(node_id) {
            break;
        }
        let Some(node) = mapping.get(node_id) else {
            break;
        };
        visited.insert(node_id);
        if let Some(message) = node.get("message").filter(|m| m.is_object()) {
            ordered.push(message);
        }
        cursor = node.get("parent").and_then(Value::as_str);
    }
    ordered.reverse();

    let mut seen_messages: HashSet<&str> =
        ordered.iter().filter_map(|m| message_id(m)).collect();
    let mut orphans: Vec<&Value> = Vec::new();
    for node in mapping.values() {
        let Some(message) = node.get("message").filter(|m| m.is_object()) else {
            continue;
        };
        if let Some(id) = message_id(message)
            && seen_messages.contains(id)
        {
            continue;
        }
        orphans.push(message);
    }
    orphans.sort_by_key(|message| message_timestamp_ms(message));
    for message in orphans {
        if let Some(id) = message_id(message) {
            seen_messages.insert(id);
        }
        ordered.push(message);
    }

    ordered
}

fn role_of(message: &Value) -> String {
    message
        .get("author")
        .and_then(|author| author.get("role"))
        .and_then(Value::as_str)
        .map(|role| role.to_ascii_lowercase())
        .unwrap_or_else(|| "system".to_string())
}

fn role_label(role: &str) -> String {
    match role {
        "assistant" => DEFAULT_AI_NAME.to_string(),
        "user" => DEFAULT_HUMAN_AUTHOR.to_string(),
        "system" => "System".to_string(),
        other => {
            let mut chars = other.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => "System".to_string(),
            }
        }
    }
}

fn push_text_block(out: &mut String, text: &str) {
    if text.is_empty() {
        return;
    }
    // Fenced or multi-line text renders as a block; the fence markers
    // themselves are stripped.
    if text.trim_start().starts_with("```") || text.contains('\n') {
        let mut cleaned = text.trim().to_string();
        if let Some(rest) = cleaned.strip_prefix("```") {
            let rest = rest
                .split_once('\n')
                .map(|(_, body)| body.to_string())
                .unwrap_or_else(|| rest.trim_start_matches(|c: char| !c.is_whitespace()).to_string());
            cleaned = rest;
        }
        if let Some(rest) = cleaned.strip_suffix("```") {
            cleaned = rest.to_string();
        }
        out.push_str("<pre>");
        out.push_str(&escape_html(&cleaned));
        out.push_str("</pre>\n");
        return;
    }
    out.push_str("<p>");
    out.push_str(&escape_html(text));
    out.push_str("</p>\n");
}

fn push_part(out: &mut String, part: &Value) {
    match part {
        Value::String(text) => push_text_block(out, text),
        Value::Object(map) => {
            if let Some(text) = map.get("text").and_then(Value::as_str) {
                push_text_block(out, text);
                return;
            }
            if map.get("type").and_then(Value::as_str) == Some("text")
                && let Some(content) = map.get("content").and_then(Value::as_str)
            {
                push_text_block(out, content);
                return;
            }
            if map.get("type").and_then(Value::as_str) == Some("image_url")
                && let Some(image) = map.get("image_url")
                && let Some(url) = image.get("url").and_then(Value::as_str)
            {
                out.push_str("<figure><img src=\"");
                out.push_str(&escape_html(url));
                out.push_str("\">");
                if let Some(alt) = image.get("alt_text").and_then(Value::as_str) {
                    out.push_str("<figcaption>");
                    out.push_str(&escape_html(alt));
                    out.push_str("</figcaption>");
                }
                out.push_str("</figure>\n");
                return;
            }
            // Unrecognized structured parts are preserved verbatim rather
            // than silently dropped.
            let serialized = serde_json::to_string_pretty(part).unwrap_or_default();
            out.push_str("<pre>");
            out.push_str(&escape_html(&serialized));
            out.push_str("</pre>\n");
        }
        _ => {}
    }
}

fn push_message_body(out: &mut String, message: &Value) {
    let before = out.len();
    if let Some(content) = message.get("content") {
        if let Some(parts) = content.get("parts").and_then(Value::as_array) {
            for part in parts {
                push_part(out, part);
            }
        } else if let Some(text) = content.get("text").and_then(Value::as_str) {
            push_text_block(out, text);
        }
    }
    if out.len() == before
        && let Some(text) = message.get("text").and_then(Value::as_str)
    {
        push_text_block(out, text);
    }
    if out.len() == before {
        push_text_block(out, "[empty response]");
    }
}

/// Render the conversation payload into a static transcript document, one
/// section per message in traversal order. Tool-role messages are internal
/// plumbing and are excluded.
pub fn render_conversation(
    payload: &Value,
    snapshot_url: Option<&str>,
    offset: FixedOffset,
) -> Option<RenderedDocument> {
    let record = conversation_record(payload)?;

    let title = payload
        .get("title")
        .or_else(|| record.get("title"))
        .and_then(Value::as_str)
        .map(normalize::trim_internal)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_TITLE.to_string());

    let mut info_parts: Vec<String> = Vec::new();
    if let Some(author) = record
        .get("metadata")
        .and_then(|meta| meta.get("author"))
        .or_else(|| payload.get("metadata").and_then(|meta| meta.get("share_author")))
        .and_then(Value::as_str)
    {
        info_parts.push(format!("Shared by {author}"));
    }
    if let Some(ms) = payload
        .get("update_time")
        .or_else(|| record.get("update_time"))
        .or_else(|| payload.get("create_time"))
        .or_else(|| record.get("create_time"))
        .and_then(parse_time_ms)
    {
        let formatted = normalize::format_offset_ms(ms, offset);
        if !formatted.is_empty() {
            info_parts.push(format!("Updated {formatted}"));
        }
    }

    let messages = ordered_messages(record);

    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"UTF-8\">\n");
    if let Some(url) = snapshot_url {
        html.push_str(&format!("<base href=\"{}\">\n", escape_html(url)));
    }
    html.push_str(&format!("<title>{}</title>\n", escape_html(&title)));
    html.push_str("<style>");
    html.push_str(STYLE);
    html.push_str("</style>\n</head>\n<body>\n<header>\n");
    html.push_str(&format!("<h1>{}</h1>\n", escape_html(&title)));
    if !info_parts.is_empty() {
        html.push_str(&format!("<p>{}</p>\n", escape_html(&info_parts.join(" • "))));
    }
    html.push_str("</header>\n<div class=\"conversation\">\n");

    let mut rendered = 0usize;
    for message in &messages {
        let role = role_of(message);
        if role == "tool" {
            continue;
        }
        html.push_str(&format!("<section class=\"message role-{}\">\n", escape_html(&role)));
        html.push_str("<div class=\"message-meta\"><span>");
        html.push_str(&escape_html(&role_label(&role)));
        html.push_str("</span>");
        let ts = message_timestamp_ms(message);
        if ts != 0 {
            let formatted = normalize::format_offset_ms(ts, offset);
            if !formatted.is_empty() {
                html.push_str(&format!("<span>{}</span>", escape_html(&formatted)));
            }
        }
        html.push_str("</div>\n<div class=\"message-body\">\n");
        push_message_body(&mut html, message);
        html.push_str("</div>\n</section>\n");
        rendered += 1;
    }

    html.push_str("</div>\n<footer>Snapshot rendered from the conversation transcript.</footer>\n</body>\n</html>\n");

    Some(RenderedDocument {
        html,
        title,
        message_count: rendered,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn two_turn_payload() -> Value {
        json!({
            "title": "Greeting",
            "current_node": "n2",
            "mapping": {
                "n1": {
                    "message": {
                        "id": "m1",
                        "author": {"role": "user"},
                        "content": {"parts": ["hi"]}
                    },
                    "parent": null
                },
                "n2": {
                    "message": {
                        "id": "m2",
                        "author": {"role": "assistant"},
                        "content": {"parts": ["hello"]}
                    },
                    "parent": "n1"
                }
            }
        })
    }

    #[test]
    fn transcript_is_chronological() {
        let doc = render_conversation(&two_turn_payload(), None, utc()).unwrap();
        assert_eq!(doc.message_count, 2);
        let user_at = doc.html.find("role-user").unwrap();
        let assistant_at = doc.html.find("role-assistant").unwrap();
        assert!(user_at < assistant_at);
        let hi_at = doc.html.find("<p>hi</p>").unwrap();
        let hello_at = doc.html.find("<p>hello</p>").unwrap();
        assert!(hi_at < hello_at);
    }

    #[test]
    fn cyclic_mapping_terminates() {
        let payload = json!({
            "current_node": "a",
            "mapping": {
                "a": {"message": {"id": "ma", "author": {"role": "user"}, "content": {"parts": ["one"]}}, "parent": "b"},
                "b": {"message": {"id": "mb", "author": {"role": "assistant"}, "content": {"parts": ["two"]}}, "parent": "a"}
            }
        });
        let doc = render_conversation(&payload, None, utc()).unwrap();
        // Each node visited at most once.
        assert_eq!(doc.message_count, 2);
    }

    #[test]
    fn orphans_are_appended_in_timestamp_order() {
        let payload = json!({
            "current_node": "n2",
            "mapping": {
                "n1": {"message": {"id": "m1", "author": {"role": "user"}, "create_time": 100, "content": {"parts": ["reachable-1"]}}, "parent": null},
                "n2": {"message": {"id": "m2", "author": {"role": "assistant"}, "create_time": 200, "content": {"parts": ["reachable-2"]}}, "parent": "n1"},
                "late": {"message": {"id": "m4", "author": {"role": "user"}, "create_time": 400, "content": {"parts": ["orphan-late"]}}, "parent": "ghost"},
                "early": {"message": {"id": "m3", "author": {"role": "user"}, "create_time": 300, "content": {"parts": ["orphan-early"]}}, "parent": "ghost"}
            }
        });
        let doc = render_conversation(&payload, None, utc()).unwrap();
        let early = doc.html.find("orphan-early").unwrap();
        let late = doc.html.find("orphan-late").unwrap();
        let reachable = doc.html.find("reachable-2").unwrap();
        assert!(reachable < early);
        assert!(early < late);
    }

    #[test]
    fn tool_messages_are_excluded() {
        let payload = json!({
            "current_node": "n2",
            "mapping": {
                "n1": {"message": {"id": "m1", "author": {"role": "tool"}, "content": {"parts": ["internal"]}}, "parent": null},
                "n2": {"message": {"id": "m2", "author": {"role": "assistant"}, "content": {"parts": ["visible"]}}, "parent": "n1"}
            }
        });
        let doc = render_conversation(&payload, None, utc()).unwrap();
        assert_eq!(doc.message_count, 1);
        assert!(!doc.html.contains("internal"));
        assert!(doc.html.contains("visible"));
    }

    #[test]
    fn fenced_and_multiline_text_become_blocks() {
        let payload = json!({
            "current_node": "n1",
            "mapping": {
                "n1": {"message": {"id": "m1", "author": {"role": "assistant"},
                    "content": {"parts": ["```rust\nfn main() {}\n```", "line one\nline two"]}}, "parent": null}
            }
        });
        let doc = render_conversation(&payload, None, utc()).unwrap();
        assert!(doc.html.contains("<pre>fn main() {}"));
        assert!(doc.html.contains("<pre>line one\nline two</pre>"));
        assert!(!doc.html.contains("```"));
    }

    #[test]
    fn unknown_parts_are_serialized_verbatim() {
        let payload = json!({
            "current_node": "n1",
            "mapping": {
                "n1": {"message": {"id": "m1", "author": {"role": "assistant"},
                    "content": {"parts": [{"type": "audio_transcription", "len": 3}]}}, "parent": null}
            }
        });
        let doc = render_conversation(&payload, None, utc()).unwrap();
        assert!(doc.html.contains("audio_transcription"));
    }

    #[test]
    fn missing_mapping_yields_none() {
        assert!(render_conversation(&json!({"title": "x"}), None, utc()).is_none());
    }

    #[test]
    fn nested_conversation_record_is_accepted() {
        let payload = json!({
            "conversation": {
                "title": "Nested",
                "current_node": "n1",
                "mapping": {
                    "n1": {"message": {"id": "m1", "author": {"role": "user"}, "content": {"parts": ["hi"]}}, "parent": null}
                }
            }
        });
        let doc = render_conversation(&payload, None, utc()).unwrap();
        assert_eq!(doc.title, "Nested");
        assert_eq!(doc.message_count, 1);
    }
}
