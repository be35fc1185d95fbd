use regex::Regex;
use reqwest::Url;
use std::sync::OnceLock;

use crate::ids::{self, ConversationIdentity};
use crate::page::PageContext;
use crate::share;

fn project_page_path_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)/g/[^/]+/project(?:$|[/?#])").expect("valid project path regex")
    })
}

/// The URL vocabulary of one capture. `item` is what the saved record points
/// at and prefers the public link (re-resolvable without a session);
/// `snapshot` is what gets captured and prefers the private link (the
/// authoritative, fullest copy). Discovered share links upgrade the set in
/// place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UrlSet {
    pub page: Option<String>,
    pub private: Option<String>,
    pub public: Option<String>,
    pub item: Option<String>,
    pub snapshot: Option<String>,
    pub project: Option<String>,
}

pub fn pathname_of(value: &str) -> String {
    match Url::parse(value) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => value.to_string(),
    }
}

/// Absolute URL with the fragment dropped; relative inputs resolve against
/// the page origin.
fn normalize_url(value: &str, page: &PageContext) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    let parsed = match Url::parse(trimmed) {
        Ok(url) => Some(url),
        Err(_) => page.parsed_url().and_then(|base| base.join(trimmed).ok()),
    };
    match parsed {
        Some(mut url) => {
            url.set_fragment(None);
            Some(url.to_string())
        }
        None => {
            let cleaned = trimmed.split('#').next().unwrap_or("").trim();
            (!cleaned.is_empty()).then(|| cleaned.to_string())
        }
    }
}

fn private_url(page: &PageContext, page_url: Option<&str>) -> Option<String> {
    let mut candidates = Vec::new();
    if let Some(url) = page_url {
        candidates.push(url.to_string());
    }
    candidates.push(page.url.clone());

    for candidate in candidates {
        let Some(normalized) = normalize_url(&candidate, page) else {
            continue;
        };
        if ids::is_share_url(&normalized) {
            continue;
        }
        return Some(normalized);
    }
    None
}

fn public_url(page: &PageContext, page_url: Option<&str>) -> Option<String> {
    let host = page.default_share_host();
    if let Some(url) = page_url
        && let Some(found) = share::normalize_candidate(url, "page", host)
    {
        return Some(found);
    }
    if let Some(found) = share::normalize_candidate(&page.url, "page", host) {
        return Some(found);
    }
    page.markup()
        .and_then(|markup| share::find_in_markup(markup, host))
}

fn is_project_conversation_url(value: &str) -> bool {
    ids::split_project_conversation(&pathname_of(value)).is_some()
}

fn has_project_path(value: &str) -> bool {
    project_page_path_re().is_match(value)
}

fn build_project_conversation_url(
    conversation_id: &str,
    slug: &str,
    origin: &str,
) -> Option<String> {
    let clean_origin = origin.trim_end_matches('/');
    let clean_slug = slug.trim_start_matches('/').split('/').next().unwrap_or("");
    if clean_origin.is_empty() || clean_slug.is_empty() || conversation_id.is_empty() {
        return None;
    }
    Some(format!("{clean_origin}/g/{clean_slug}/c/{conversation_id}"))
}

/// Derive the full URL set for a capture. `page_url` overrides the page
/// location when the host iterates a list of conversations.
pub fn resolve_urls(
    page: &PageContext,
    page_url: Option<&str>,
    ids: &ConversationIdentity,
) -> UrlSet {
    let normalized_page = page_url
        .and_then(|value| normalize_url(value, page))
        .or_else(|| normalize_url(&page.url, page));

    let project = [page.url.as_str()]
        .into_iter()
        .chain(page_url)
        .find(|candidate| {
            ids::detect_page_kind(candidate) == ids::PageKind::Project
        })
        .and_then(|candidate| normalize_url(candidate, page));

    let private = private_url(page, page_url);
    let public = public_url(page, page_url);

    let (item, snapshot) = match (&private, &public) {
        (Some(private), Some(public)) => (Some(public.clone()), Some(private.clone())),
        (Some(only), None) | (None, Some(only)) => (Some(only.clone()), Some(only.clone())),
        (None, None) => (None, None),
    };

    let mut result = UrlSet {
        page: normalized_page,
        private,
        public,
        item,
        snapshot,
        project,
    };

    // Project dashboards list conversations under /g/<slug>/project; rebuild
    // the direct conversation URL so the record never points at the dashboard.
    if let Some(cid) = ids.conversation_id.as_deref() {
        let existing = [&result.private, &result.page, &result.item, &result.public]
            .into_iter()
            .flatten()
            .find(|candidate| is_project_conversation_url(candidate))
            .cloned();
        let rebuilt = match existing {
            Some(found) => Some(found),
            None => {
                let slug_hint = ids
                    .project_slug
                    .clone()
                    .or_else(|| result.project.as_deref().and_then(ids::extract_project_slug))
                    .or_else(|| result.page.as_deref().and_then(ids::extract_project_slug))
                    .or_else(|| result.private.as_deref().and_then(ids::extract_project_slug))
                    .or_else(|| result.public.as_deref().and_then(ids::extract_project_slug));
                let origin = page
                    .origin()
                    .unwrap_or_else(|| "https://chatgpt.com".to_string());
                slug_hint.and_then(|slug| build_project_conversation_url(cid, &slug, &origin))
            }
        };
        if let Some(conversation_url) = rebuilt
            && is_project_conversation_url(&conversation_url)
        {
            for slot in [&mut result.item, &mut result.snapshot, &mut result.private] {
                let replace = match slot.as_deref() {
                    None => true,
                    Some(existing) => has_project_path(existing),
                };
                if replace {
                    *slot = Some(conversation_url.clone());
                }
            }
        }
    }

    result
}

impl UrlSet {
    /// Upgrade the set with a share link discovered after the initial pass.
    /// `item` moves to the public link; `snapshot` stays on the private copy
    /// when one exists and follows the share link otherwise.
    pub fn apply_share_hints(&mut self, share_url: &str) {
        if self.public.is_none() {
            self.public = Some(share_url.to_string());
        }
        if self.item.is_none() || self.item == self.private || self.item == self.page {
            self.item = Some(share_url.to_string());
        }
        if self.private.is_none()
            && (self.snapshot.is_none() || self.snapshot == self.page)
        {
            self.snapshot = Some(share_url.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::resolve_identity;

    const ID: &str = "0190aaaa-bbbb-cccc-dddd-eeeeffff0000";

    fn conversation_page(markup: Option<String>) -> PageContext {
        let mut page = PageContext::new(format!("https://chatgpt.com/c/{ID}"));
        page.markup = markup;
        page
    }

    #[test]
    fn private_and_public_split_item_and_snapshot() {
        let markup = format!(
            r#"<meta property="og:url" content="https://chatgpt.com/share/{ID}">"#
        );
        let page = conversation_page(Some(markup));
        let ids = resolve_identity(&page, None);
        let urls = resolve_urls(&page, None, &ids);

        let private = format!("https://chatgpt.com/c/{ID}");
        let public = format!("https://chatgpt.com/share/{ID}");
        assert_eq!(urls.private.as_deref(), Some(private.as_str()));
        assert_eq!(urls.public.as_deref(), Some(public.as_str()));
        assert_eq!(urls.item.as_deref(), Some(public.as_str()));
        assert_eq!(urls.snapshot.as_deref(), Some(private.as_str()));
    }

    #[test]
    fn single_url_serves_both_roles() {
        let page = conversation_page(None);
        let ids = resolve_identity(&page, None);
        let urls = resolve_urls(&page, None, &ids);

        let only = format!("https://chatgpt.com/c/{ID}");
        assert_eq!(urls.item.as_deref(), Some(only.as_str()));
        assert_eq!(urls.snapshot.as_deref(), Some(only.as_str()));
        assert_eq!(urls.public, None);
    }

    #[test]
    fn share_page_is_public_everywhere() {
        let page = PageContext::new(format!("https://chatgpt.com/share/{ID}"));
        let ids = resolve_identity(&page, None);
        let urls = resolve_urls(&page, None, &ids);

        let public = format!("https://chatgpt.com/share/{ID}");
        assert_eq!(urls.private, None);
        assert_eq!(urls.public.as_deref(), Some(public.as_str()));
        assert_eq!(urls.item.as_deref(), Some(public.as_str()));
        assert_eq!(urls.snapshot.as_deref(), Some(public.as_str()));
    }

    #[test]
    fn share_hint_upgrades_item_but_not_private_snapshot() {
        let page = conversation_page(None);
        let ids = resolve_identity(&page, None);
        let mut urls = resolve_urls(&page, None, &ids);

        let share = format!("https://chatgpt.com/share/{ID}");
        urls.apply_share_hints(&share);

        let private = format!("https://chatgpt.com/c/{ID}");
        assert_eq!(urls.public.as_deref(), Some(share.as_str()));
        assert_eq!(urls.item.as_deref(), Some(share.as_str()));
        assert_eq!(urls.snapshot.as_deref(), Some(private.as_str()));
    }

    #[test]
    fn project_selection_rebuilds_conversation_url() {
        let page = PageContext::new("https://chatgpt.com/g/g-spark/project");
        let ids = ConversationIdentity {
            conversation_id: Some(ID.to_string()),
            project_slug: Some("g-spark".to_string()),
            ..Default::default()
        };
        let urls = resolve_urls(&page, None, &ids);

        let expected = format!("https://chatgpt.com/g/g-spark/c/{ID}");
        assert_eq!(urls.item.as_deref(), Some(expected.as_str()));
        assert_eq!(urls.snapshot.as_deref(), Some(expected.as_str()));
        assert_eq!(urls.private.as_deref(), Some(expected.as_str()));
        assert_eq!(
            urls.project.as_deref(),
            Some("https://chatgpt.com/g/g-spark/project")
        );
    }

    #[test]
    fn fragments_are_stripped() {
        let page = PageContext::new(format!("https://chatgpt.com/c/{ID}#section"));
        let ids = resolve_identity(&page, None);
        let urls = resolve_urls(&page, None, &ids);
        assert_eq!(
            urls.page.as_deref(),
            Some(format!("https://chatgpt.com/c/{ID}").as_str())
        );
    }
}
