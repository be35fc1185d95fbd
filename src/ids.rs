use regex::Regex;
use std::sync::OnceLock;

use crate::dom;
use crate::normalize::normalize_conversation_id;
use crate::page::PageContext;
use crate::share;

fn share_path_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)/share/(?:e/|embed/)?([0-9a-f-]{36})(?:$|[/?#])")
            .expect("valid share path id regex")
    })
}

fn conversation_path_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)/(?:app/)?c/([0-9a-f-]{36})(?:$|[/?#])|/conversation/([0-9a-f-]{36})(?:$|[/?#])")
            .expect("valid conversation path id regex")
    })
}

fn project_conversation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^/?g/([^/]+)/c/([0-9a-f-]{36})(?:$|[/?#])")
            .expect("valid project conversation regex")
    })
}

fn conversation_page_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^https?://(?:chatgpt\.com|chat\.openai\.com)/(?:c/|share(?:/e)?/|g/[^/]+/c/)")
            .expect("valid conversation page regex")
    })
}

fn project_page_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^https?://(?:chatgpt\.com|chat\.openai\.com)/g/[^/]+/project(?:$|[/?#])")
            .expect("valid project page regex")
    })
}

fn bare_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)[0-9a-f-]{36}").expect("valid bare id regex"))
}

/// What kind of capture a URL supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Conversation,
    Project,
    Other,
}

pub fn detect_page_kind(url: &str) -> PageKind {
    if project_page_re().is_match(url) {
        PageKind::Project
    } else if conversation_page_re().is_match(url) {
        PageKind::Conversation
    } else {
        PageKind::Other
    }
}

pub fn is_share_url(url: &str) -> bool {
    url.to_ascii_lowercase().contains("/share")
}

/// Identifier bundle for one conversation page. Derived once per capture and
/// treated as immutable afterwards.
#[derive(Debug, Clone, Default)]
pub struct ConversationIdentity {
    pub conversation_id: Option<String>,
    pub last_prompt_id: Option<String>,
    pub last_response_id: Option<String>,
    pub project_slug: Option<String>,
}

/// Pull a conversation or share identifier out of a URL-shaped string.
pub fn extract_conversation_id(value: &str) -> Option<String> {
    if let Some(caps) = share_path_id_re().captures(value) {
        return caps.get(1).map(|m| m.as_str().to_ascii_lowercase());
    }
    if let Some(caps) = conversation_path_id_re().captures(value) {
        return caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str().to_ascii_lowercase());
    }
    None
}

pub fn extract_project_slug(value: &str) -> Option<String> {
    let pathname = crate::urls::pathname_of(value);
    let caps = project_conversation_re()
        .captures(&pathname)
        .or_else(|| {
            static SLUG_RE: OnceLock<Regex> = OnceLock::new();
            SLUG_RE
                .get_or_init(|| Regex::new(r"(?i)/g/([^/]+)").expect("valid slug regex"))
                .captures(&pathname)
        })?;
    let raw = caps.get(1)?.as_str().trim();
    if raw.is_empty() {
        return None;
    }
    let decoded = percent_encoding::percent_decode_str(raw)
        .decode_utf8()
        .map(|v| v.into_owned())
        .unwrap_or_else(|_| raw.to_string());
    let slug = decoded.split('/').next().unwrap_or("").trim().to_string();
    (!slug.is_empty()).then_some(slug)
}

/// Split a project conversation path into (slug, conversation id).
pub fn split_project_conversation(pathname: &str) -> Option<(String, String)> {
    let caps = project_conversation_re().captures(pathname)?;
    let slug = caps.get(1)?.as_str().to_string();
    let cid = normalize_conversation_id(caps.get(2)?.as_str())?;
    Some((slug, cid))
}

/// Resolve the identity for the current page: URL patterns first, then DOM
/// probes, then whatever share URL the markup exposes.
pub fn resolve_identity(page: &PageContext, url_override: Option<&str>) -> ConversationIdentity {
    let mut conversation_id = None;

    if let Some(url) = url_override {
        conversation_id = extract_conversation_id(url);
    }
    if conversation_id.is_none() {
        conversation_id = extract_conversation_id(&page.url);
    }

    if conversation_id.is_none() {
        for candidate in dom::dom_conversation_id_candidates(page) {
            if let Some(found) = extract_conversation_id(&candidate).or_else(|| {
                bare_id_re()
                    .find(&candidate)
                    .map(|m| m.as_str().to_ascii_lowercase())
            }) {
                conversation_id = Some(found);
                break;
            }
        }
    }

    if conversation_id.is_none()
        && let Some(markup) = page.markup()
        && let Some(share_url) = share::find_in_markup(markup, page.default_share_host())
    {
        conversation_id = extract_conversation_id(&share_url);
    }

    let project_slug = url_override
        .and_then(extract_project_slug)
        .or_else(|| extract_project_slug(&page.url));

    let (last_prompt_id, last_response_id) = match page.markup() {
        Some(markup) => dom::last_message_ids(markup),
        None => (None, None),
    };

    ConversationIdentity {
        conversation_id: conversation_id.and_then(|id| normalize_conversation_id(&id)),
        last_prompt_id,
        last_response_id,
        project_slug,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "0190aaaa-bbbb-cccc-dddd-eeeeffff0000";

    #[test]
    fn conversation_urls_yield_ids() {
        assert_eq!(
            extract_conversation_id(&format!("https://chatgpt.com/c/{ID}")).as_deref(),
            Some(ID)
        );
        assert_eq!(
            extract_conversation_id(&format!("https://chatgpt.com/share/e/{ID}")).as_deref(),
            Some(ID)
        );
        assert_eq!(
            extract_conversation_id(&format!("https://chatgpt.com/g/g-spark/c/{ID}?x=1")).as_deref(),
            Some(ID)
        );
        assert_eq!(extract_conversation_id("https://chatgpt.com/"), None);
    }

    #[test]
    fn ids_are_lowercased() {
        let upper = ID.to_uppercase();
        assert_eq!(
            extract_conversation_id(&format!("https://chatgpt.com/c/{upper}")).as_deref(),
            Some(ID)
        );
    }

    #[test]
    fn page_kind_detection() {
        assert_eq!(
            detect_page_kind(&format!("https://chatgpt.com/c/{ID}")),
            PageKind::Conversation
        );
        assert_eq!(
            detect_page_kind("https://chatgpt.com/g/g-spark/project"),
            PageKind::Project
        );
        assert_eq!(detect_page_kind("https://example.com/"), PageKind::Other);
    }

    #[test]
    fn project_slug_extraction_decodes() {
        assert_eq!(
            extract_project_slug(&format!("https://chatgpt.com/g/g-my%20proj/c/{ID}")).as_deref(),
            Some("g-my proj")
        );
        assert_eq!(extract_project_slug("https://chatgpt.com/c/abc"), None);
    }

    #[test]
    fn identity_falls_back_to_dom_share_url() {
        let mut page = PageContext::new("https://chatgpt.com/");
        page.markup = Some(format!(
            r#"<meta property="og:url" content="https://chatgpt.com/share/{ID}">"#
        ));
        let ids = resolve_identity(&page, None);
        assert_eq!(ids.conversation_id.as_deref(), Some(ID));
    }
}
