//! Tolerant scans over saved page markup. The capture pipeline only needs a
//! handful of probes (metas, anchors, data attributes, embedded JSON), so
//! these work directly on the markup text instead of building a DOM tree.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use crate::normalize::trim_internal;
use crate::page::PageContext;

fn meta_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<meta\b[^>]*>").expect("valid meta tag regex"))
}

fn link_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<link\b[^>]*>").expect("valid link tag regex"))
}

fn anchor_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<a\b[^>]*>").expect("valid anchor tag regex"))
}

fn time_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<time\b[^>]*>").expect("valid time tag regex"))
}

fn title_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid title regex"))
}

fn script_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<script\b([^>]*)>(.*?)</script>").expect("valid script regex")
    })
}

fn attr_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"([a-zA-Z][a-zA-Z0-9_:.-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
            .expect("valid attribute regex")
    })
}

fn message_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)<[a-z][a-z0-9]*\b[^>]*data-message-author-role\s*=[^>]*>"#)
            .expect("valid message tag regex")
    })
}

fn parse_attrs(tag: &str) -> Vec<(String, String)> {
    attr_re()
        .captures_iter(tag)
        .filter_map(|caps| {
            let name = caps.get(1)?.as_str().to_ascii_lowercase();
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .map(|m| m.as_str().to_string())?;
            Some((name, unescape_entities(&value)))
        })
        .collect()
}

fn attr_of<'a>(attrs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

fn unescape_entities(value: &str) -> String {
    // `&amp;` last, so `&amp;lt;` decodes to `&lt;` and not `<`.
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// First `<meta>` whose `name` or `property` equals `key`, returning its
/// `content` (or `value`) attribute.
pub fn meta_content(markup: &str, key: &str) -> Option<String> {
    for tag in meta_tag_re().find_iter(markup) {
        let attrs = parse_attrs(tag.as_str());
        let matches = attr_of(&attrs, "name")
            .map(|v| v.eq_ignore_ascii_case(key))
            .unwrap_or(false)
            || attr_of(&attrs, "property")
                .map(|v| v.eq_ignore_ascii_case(key))
                .unwrap_or(false);
        if !matches {
            continue;
        }
        if let Some(content) = attr_of(&attrs, "content").or_else(|| attr_of(&attrs, "value")) {
            let trimmed = trim_internal(content);
            if !trimmed.is_empty() {
                return Some(trimmed);
            }
        }
    }
    None
}

/// All meta `content` attributes containing `needle`, in document order.
pub fn meta_contents_containing(markup: &str, needle: &str) -> Vec<String> {
    meta_tag_re()
        .find_iter(markup)
        .filter_map(|tag| {
            let attrs = parse_attrs(tag.as_str());
            attr_of(&attrs, "content")
                .filter(|v| v.contains(needle))
                .map(ToOwned::to_owned)
        })
        .collect()
}

pub fn link_href(markup: &str, rel: &str) -> Option<String> {
    for tag in link_tag_re().find_iter(markup) {
        let attrs = parse_attrs(tag.as_str());
        if attr_of(&attrs, "rel")
            .map(|v| v.eq_ignore_ascii_case(rel))
            .unwrap_or(false)
            && let Some(href) = attr_of(&attrs, "href")
        {
            let trimmed = trim_internal(href);
            if !trimmed.is_empty() {
                return Some(trimmed);
            }
        }
    }
    None
}

pub fn anchor_hrefs_containing(markup: &str, needle: &str, limit: usize) -> Vec<String> {
    let mut out = Vec::new();
    for tag in anchor_tag_re().find_iter(markup) {
        let attrs = parse_attrs(tag.as_str());
        if let Some(href) = attr_of(&attrs, "href")
            && href.contains(needle)
        {
            out.push(href.to_string());
            if out.len() >= limit {
                break;
            }
        }
    }
    out
}

/// Every value of `attr` anywhere in the markup, in document order.
pub fn attr_values(markup: &str, attr: &str) -> Vec<String> {
    let pattern = format!(
        r#"(?is){}\s*=\s*(?:"([^"]*)"|'([^']*)')"#,
        regex::escape(attr)
    );
    let Ok(re) = Regex::new(&pattern) else {
        return Vec::new();
    };
    re.captures_iter(markup)
        .filter_map(|caps| {
            caps.get(1)
                .or_else(|| caps.get(2))
                .map(|m| unescape_entities(m.as_str()))
        })
        .filter(|v| !v.trim().is_empty())
        .collect()
}

pub fn title_text(markup: &str) -> Option<String> {
    let caps = title_re().captures(markup)?;
    let text = trim_internal(&unescape_entities(caps.get(1)?.as_str()));
    (!text.is_empty()).then_some(text)
}

pub fn time_datetime(markup: &str) -> Option<String> {
    for tag in time_tag_re().find_iter(markup) {
        let attrs = parse_attrs(tag.as_str());
        if let Some(value) = attr_of(&attrs, "datetime") {
            let trimmed = trim_internal(value);
            if !trimmed.is_empty() {
                return Some(trimmed);
            }
        }
    }
    None
}

/// Parsed contents of embedded JSON script blocks (`application/json`,
/// `application/ld+json`, `__NEXT_DATA__`, `data-state`), skipping blocks
/// larger than `max_len`.
pub fn embedded_json_blocks(markup: &str, max_len: usize) -> Vec<Value> {
    let mut out = Vec::new();
    for caps in script_re().captures_iter(markup) {
        let attrs = parse_attrs(caps.get(1).map(|m| m.as_str()).unwrap_or(""));
        let type_is_json = attr_of(&attrs, "type")
            .map(|t| {
                let lowered = t.to_ascii_lowercase();
                lowered.contains("application/json") || lowered.contains("application/ld+json")
            })
            .unwrap_or(false);
        let is_next_data = attr_of(&attrs, "id")
            .map(|id| id == "__NEXT_DATA__")
            .unwrap_or(false);
        let has_state = attr_of(&attrs, "data-state").is_some();
        if !type_is_json && !is_next_data && !has_state {
            continue;
        }
        let Some(body) = caps.get(2).map(|m| m.as_str()) else {
            continue;
        };
        if body.len() > max_len {
            continue;
        }
        if let Ok(parsed) = serde_json::from_str::<Value>(body.trim()) {
            out.push(parsed);
        }
    }
    out
}

/// Hydrated transcripts mark every turn; their absence means the markup is a
/// pre-hydration shell that cannot serve as a snapshot.
pub fn has_hydration_markers(markup: &str) -> bool {
    markup.contains(r#"data-testid="conversation-turn""#)
        || markup.contains("data-message-author-role")
}

pub fn dom_title(page: &PageContext) -> Option<String> {
    let markup = page.markup()?;
    if let Some(text) = title_text(markup) {
        return Some(text);
    }
    for selector in ["conversation-title", "conversation-detail-title"] {
        if let Some(text) = tag_text_with_attr(markup, "data-testid", selector) {
            return Some(text);
        }
    }
    for key in ["og:title", "twitter:title", "title"] {
        if let Some(content) = meta_content(markup, key) {
            return Some(content);
        }
    }
    None
}

/// Inner text of the first tag carrying `attr="value"`, up to the next tag.
fn tag_text_with_attr(markup: &str, attr: &str, value: &str) -> Option<String> {
    let pattern = format!(
        r#"(?is)<[a-z][a-z0-9]*\b[^>]*{}\s*=\s*"{}"[^>]*>([^<]*)"#,
        regex::escape(attr),
        regex::escape(value)
    );
    let re = Regex::new(&pattern).ok()?;
    let caps = re.captures(markup)?;
    let text = trim_internal(&unescape_entities(caps.get(1)?.as_str()));
    (!text.is_empty()).then_some(text)
}

pub fn dom_human_author(page: &PageContext) -> Option<String> {
    let markup = page.markup()?;

    for raw in attr_values(markup, "data-conversation-owner") {
        if let Some(name) = reject_platform_name(&raw) {
            return Some(name);
        }
    }
    for key in [
        "author",
        "profile:username",
        "profile:last_name",
        "twitter:creator",
    ] {
        if let Some(raw) = meta_content(markup, key)
            && let Some(name) = reject_platform_name(&raw)
        {
            return Some(name);
        }
    }
    for key in ["og:title", "twitter:title"] {
        if let Some(raw) = meta_content(markup, key)
            && let Some(name) = name_from_title_like(&raw)
        {
            return Some(name);
        }
    }
    title_text(markup).and_then(|raw| name_from_title_like(&raw))
}

fn reject_platform_name(value: &str) -> Option<String> {
    let trimmed = trim_internal(value);
    if trimmed.is_empty() {
        return None;
    }
    let lowered = trimmed.to_ascii_lowercase();
    if lowered.contains("chatgpt") || lowered.contains("openai") {
        return None;
    }
    Some(trimmed)
}

/// Social titles often read "Name — Conversation title"; try each segment.
fn name_from_title_like(value: &str) -> Option<String> {
    let trimmed = trim_internal(value);
    if trimmed.is_empty() {
        return None;
    }
    for separator in [" — ", " – ", " - ", ": "] {
        if trimmed.contains(separator) {
            for part in trimmed.split(separator) {
                if let Some(name) = reject_platform_name(part) {
                    return Some(name);
                }
            }
        }
    }
    None
}

pub fn dom_ai_model(page: &PageContext) -> Option<String> {
    let markup = page.markup()?;
    for key in ["ai-model", "model", "ai:model"] {
        if let Some(content) = meta_content(markup, key) {
            return Some(content);
        }
    }
    for attr in ["data-ai-model", "data-model"] {
        if let Some(value) = attr_values(markup, attr).into_iter().next() {
            return Some(value);
        }
    }
    None
}

pub fn dom_date(page: &PageContext) -> Option<String> {
    let markup = page.markup()?;
    if let Some(value) = time_datetime(markup) {
        return Some(value);
    }
    for key in ["article:published_time", "date", "timestamp"] {
        if let Some(content) = meta_content(markup, key) {
            return Some(content);
        }
    }
    None
}

/// Raw conversation-id candidates from data attributes and metas; the caller
/// owns extraction and normalization.
pub fn dom_conversation_id_candidates(page: &PageContext) -> Vec<String> {
    let Some(markup) = page.markup() else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for attr in [
        "data-conversation-id",
        "data-conversationid",
        "data-conversation",
    ] {
        out.extend(attr_values(markup, attr));
    }
    for key in ["conversation-id", "conversationId"] {
        if let Some(content) = meta_content(markup, key) {
            out.push(content);
        }
    }
    out
}

/// Message ids of the latest user prompt and latest assistant response in
/// hydrated transcript markup.
pub fn last_message_ids(markup: &str) -> (Option<String>, Option<String>) {
    let mut last_prompt = None;
    let mut last_response = None;
    for tag in message_tag_re().find_iter(markup) {
        let attrs = parse_attrs(tag.as_str());
        let Some(role) = attr_of(&attrs, "data-message-author-role") else {
            continue;
        };
        let Some(id) = attr_of(&attrs, "data-message-id") else {
            continue;
        };
        match role {
            "user" => last_prompt = Some(id.to_string()),
            "assistant" => last_response = Some(id.to_string()),
            _ => {}
        }
    }
    (last_prompt, last_response)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_with(markup: &str) -> PageContext {
        let mut page = PageContext::new("https://chatgpt.com/c/0190aaaa-bbbb-cccc-dddd-eeeeffff0000");
        page.markup = Some(markup.to_string());
        page
    }

    #[test]
    fn meta_content_matches_name_and_property() {
        let markup = r#"<meta property="og:title" content="Borrow checker — Alice">
                        <meta name="date" content="2024-01-15">"#;
        assert_eq!(
            meta_content(markup, "og:title").as_deref(),
            Some("Borrow checker — Alice")
        );
        assert_eq!(meta_content(markup, "date").as_deref(), Some("2024-01-15"));
        assert_eq!(meta_content(markup, "missing"), None);
    }

    #[test]
    fn title_text_unescapes_and_trims() {
        let markup = "<title>  Rust &amp; lifetimes \n</title>";
        assert_eq!(title_text(markup).as_deref(), Some("Rust & lifetimes"));
    }

    #[test]
    fn anchors_respect_limit() {
        let markup = r#"<a href="/share/a">1</a><a href="/share/b">2</a><a href="/share/c">3</a>"#;
        let hrefs = anchor_hrefs_containing(markup, "/share/", 2);
        assert_eq!(hrefs, vec!["/share/a".to_string(), "/share/b".to_string()]);
    }

    #[test]
    fn embedded_json_blocks_filter_by_kind() {
        let markup = r#"
            <script type="application/json">{"a": 1}</script>
            <script>var ignored = {"b": 2};</script>
            <script id="__NEXT_DATA__" type="application/json">{"c": 3}</script>
        "#;
        let blocks = embedded_json_blocks(markup, 1_000);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0]["a"], 1);
        assert_eq!(blocks[1]["c"], 3);
    }

    #[test]
    fn human_author_skips_platform_names() {
        let page = page_with(
            r#"<meta name="author" content="ChatGPT">
               <meta property="og:title" content="Ada Lovelace — Notes on engines">"#,
        );
        assert_eq!(dom_human_author(&page).as_deref(), Some("Ada Lovelace"));
    }

    #[test]
    fn last_message_ids_take_latest_per_role() {
        let markup = r#"
            <div data-message-author-role="user" data-message-id="u1"></div>
            <div data-message-author-role="assistant" data-message-id="a1"></div>
            <div data-message-author-role="user" data-message-id="u2"></div>
        "#;
        let (prompt, response) = last_message_ids(markup);
        assert_eq!(prompt.as_deref(), Some("u2"));
        assert_eq!(response.as_deref(), Some("a1"));
    }

    #[test]
    fn hydration_markers_detected() {
        assert!(has_hydration_markers(r#"<div data-testid="conversation-turn">"#));
        assert!(!has_hydration_markers("<html><body>loading</body></html>"));
    }
}
