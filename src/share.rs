use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use crate::dom;

/// Nested payloads are untrusted; bound the visitor so adversarial nesting
/// cannot blow the stack.
const MAX_SCAN_DEPTH: usize = 64;
const MAX_EMBEDDED_SCRIPT_LEN: usize = 750_000;
const MAX_ANCHOR_CANDIDATES: usize = 4;

fn share_url_re() -> &'static Regex {
    static SHARE_URL_RE: OnceLock<Regex> = OnceLock::new();
    SHARE_URL_RE.get_or_init(|| {
        Regex::new(r"(?i)https?://(chatgpt\.com|chat\.openai\.com)/share/([0-9a-f-]{36})")
            .expect("valid share url regex")
    })
}

fn share_path_re() -> &'static Regex {
    static SHARE_PATH_RE: OnceLock<Regex> = OnceLock::new();
    SHARE_PATH_RE.get_or_init(|| {
        Regex::new(r"(?i)^/?share/([0-9a-f-]{36})").expect("valid share path regex")
    })
}

fn share_id_re() -> &'static Regex {
    static SHARE_ID_RE: OnceLock<Regex> = OnceLock::new();
    SHARE_ID_RE.get_or_init(|| Regex::new(r"(?i)[0-9a-f-]{36}").expect("valid share id regex"))
}

/// Normalize one share-link candidate to `https://<host>/share/<id>` in
/// lowercase. Escaped path separators are unescaped first; a bare
/// identifier-shaped string is accepted only when the context hint (the
/// enclosing JSON key, selector, or attribute name) mentions "share".
pub fn normalize_candidate(candidate: &str, context_hint: &str, default_host: &str) -> Option<String> {
    let mut cleaned = candidate.trim().to_string();
    if cleaned.is_empty() {
        return None;
    }
    if cleaned.to_ascii_lowercase().contains("\\u002f") {
        cleaned = replace_ascii_ci(&cleaned, "\\u002f", "/");
    }

    if let Some(caps) = share_url_re().captures(&cleaned) {
        let host = caps.get(1).map(|m| m.as_str().to_ascii_lowercase())?;
        let id = caps.get(2).map(|m| m.as_str().to_ascii_lowercase())?;
        return Some(format!("https://{host}/share/{id}"));
    }
    if let Some(caps) = share_path_re().captures(&cleaned) {
        let id = caps.get(1).map(|m| m.as_str().to_ascii_lowercase())?;
        return Some(format!("{default_host}/share/{id}"));
    }
    if context_hint.to_ascii_lowercase().contains("share")
        && let Some(found) = share_id_re().find(&cleaned)
    {
        return Some(format!(
            "{default_host}/share/{}",
            found.as_str().to_ascii_lowercase()
        ));
    }
    None
}

fn replace_ascii_ci(input: &str, needle: &str, replacement: &str) -> String {
    let lowered = input.to_ascii_lowercase();
    let needle = needle.to_ascii_lowercase();
    let mut out = String::with_capacity(input.len());
    let mut cursor = 0usize;
    while let Some(found) = lowered[cursor..].find(&needle) {
        let at = cursor + found;
        out.push_str(&input[cursor..at]);
        out.push_str(replacement);
        cursor = at + needle.len();
    }
    out.push_str(&input[cursor..]);
    out
}

/// Search an arbitrary JSON value for a share-link candidate. Object keys act
/// as the context hint for their values, so `{"share_id": "<36 chars>"}`
/// is accepted while a random UUID elsewhere is not.
pub fn find_in_value(value: &Value, context_hint: &str, default_host: &str) -> Option<String> {
    find_in_value_bounded(value, context_hint, default_host, 0)
}

fn find_in_value_bounded(
    value: &Value,
    context_hint: &str,
    default_host: &str,
    depth: usize,
) -> Option<String> {
    if depth > MAX_SCAN_DEPTH {
        return None;
    }
    match value {
        Value::String(s) => normalize_candidate(s, context_hint, default_host),
        Value::Array(items) => items
            .iter()
            .find_map(|entry| find_in_value_bounded(entry, context_hint, default_host, depth + 1)),
        Value::Object(map) => map
            .iter()
            .find_map(|(key, entry)| find_in_value_bounded(entry, key, default_host, depth + 1)),
        _ => None,
    }
}

/// Prioritized markup scan: canonical/social metas first, then share anchors,
/// data attributes, and finally embedded JSON script blocks.
pub fn find_in_markup(markup: &str, default_host: &str) -> Option<String> {
    const META_KEYS: [&str; 5] = ["og:url", "twitter:url", "share-url", "shareUrl", "canonical"];
    for key in META_KEYS {
        let value = if key == "canonical" {
            dom::link_href(markup, "canonical")
        } else {
            dom::meta_content(markup, key)
        };
        if let Some(raw) = value
            && let Some(found) = normalize_candidate(&raw, key, default_host)
        {
            return Some(found);
        }
    }

    for raw in dom::meta_contents_containing(markup, "/share/") {
        if let Some(found) = normalize_candidate(&raw, "meta", default_host) {
            return Some(found);
        }
    }

    for raw in dom::anchor_hrefs_containing(markup, "/share/", MAX_ANCHOR_CANDIDATES) {
        if let Some(found) = normalize_candidate(&raw, "anchor", default_host) {
            return Some(found);
        }
    }

    for attr in ["data-share-url", "data-share-link", "data-public-share-url"] {
        for raw in dom::attr_values(markup, attr) {
            if let Some(found) = normalize_candidate(&raw, attr, default_host) {
                return Some(found);
            }
        }
    }

    for block in dom::embedded_json_blocks(markup, MAX_EMBEDDED_SCRIPT_LEN) {
        if let Some(found) = find_in_value(&block, "", default_host) {
            return Some(found);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const HOST: &str = "https://chatgpt.com";
    const ID: &str = "0190aaaa-bbbb-cccc-dddd-eeeeffff0000";

    #[test]
    fn escaped_separators_are_unescaped() {
        let candidate = format!("https:\\u002F\\u002Fchatgpt.com\\u002Fshare\\u002F{ID}");
        assert_eq!(
            normalize_candidate(&candidate, "", HOST).as_deref(),
            Some(format!("{HOST}/share/{ID}").as_str())
        );
    }

    #[test]
    fn host_alias_is_preserved_and_lowercased() {
        let candidate = format!("HTTPS://Chat.OpenAI.com/share/{}", ID.to_uppercase());
        assert_eq!(
            normalize_candidate(&candidate, "", HOST).as_deref(),
            Some(format!("https://chat.openai.com/share/{ID}").as_str())
        );
    }

    #[test]
    fn bare_path_uses_default_host() {
        assert_eq!(
            normalize_candidate(&format!("/share/{ID}"), "", HOST).as_deref(),
            Some(format!("{HOST}/share/{ID}").as_str())
        );
    }

    #[test]
    fn bare_id_needs_share_hint() {
        assert_eq!(normalize_candidate(ID, "conversation_id", HOST), None);
        assert_eq!(
            normalize_candidate(ID, "share_id", HOST).as_deref(),
            Some(format!("{HOST}/share/{ID}").as_str())
        );
    }

    #[test]
    fn json_search_uses_keys_as_hints() {
        let payload = json!({
            "title": "irrelevant",
            "nested": [{"share_id": ID}],
        });
        assert_eq!(
            find_in_value(&payload, "", HOST).as_deref(),
            Some(format!("{HOST}/share/{ID}").as_str())
        );

        let no_hint = json!({"conversation_id": ID});
        assert_eq!(find_in_value(&no_hint, "", HOST), None);
    }

    #[test]
    fn deep_nesting_terminates() {
        let mut payload = json!(ID);
        for _ in 0..200 {
            payload = json!({ "wrap": payload });
        }
        assert_eq!(find_in_value(&payload, "", HOST), None);
    }

    #[test]
    fn markup_scan_prefers_metas_over_anchors() {
        let markup = format!(
            r#"<html><head>
              <meta property="og:url" content="https://chatgpt.com/share/{ID}">
            </head><body>
              <a href="/share/ffffffff-ffff-ffff-ffff-ffffffffffff">other</a>
            </body></html>"#
        );
        assert_eq!(
            find_in_markup(&markup, HOST).as_deref(),
            Some(format!("{HOST}/share/{ID}").as_str())
        );
    }

    #[test]
    fn markup_scan_reads_embedded_json() {
        let markup = format!(
            r#"<script type="application/json">{{"state":{{"shareUrl":"https://chatgpt.com/share/{ID}"}}}}</script>"#
        );
        assert_eq!(
            find_in_markup(&markup, HOST).as_deref(),
            Some(format!("{HOST}/share/{ID}").as_str())
        );
    }
}
