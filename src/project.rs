use std::collections::HashSet;

use crate::dom;
use crate::ids;
use crate::normalize::trim_internal;
use crate::page::PageContext;
use crate::urls::pathname_of;

/// One selectable conversation on a project dashboard.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectConversation {
    pub absolute_url: String,
    pub conversation_id: String,
    pub project_slug: Option<String>,
    pub label: String,
}

fn absolute_url(page: &PageContext, href: &str) -> Option<String> {
    let resolved = page.resolve(href);
    let cleaned = resolved.split('#').next().unwrap_or("").trim().to_string();
    (!cleaned.is_empty()).then_some(cleaned)
}

fn anchor_label(markup: &str, href: &str) -> Option<String> {
    // Inner text of the anchor carrying this href, up to the closing tag.
    let pattern = format!(
        r#"(?is)<a\b[^>]*href\s*=\s*"{}"[^>]*>(.*?)</a>"#,
        regex::escape(href)
    );
    let re = regex::Regex::new(&pattern).ok()?;
    let caps = re.captures(markup)?;
    let inner = caps.get(1)?.as_str();
    // Strip nested tags before trimming.
    let mut text = String::with_capacity(inner.len());
    let mut in_tag = false;
    for ch in inner.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => text.push(ch),
            _ => {}
        }
    }
    let trimmed = trim_internal(&text);
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Collect the project conversations linked from a dashboard page, one entry
/// per resolved URL, in document order.
pub fn project_conversations(page: &PageContext) -> Vec<ProjectConversation> {
    let Some(markup) = page.markup() else {
        return Vec::new();
    };

    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();

    for href in dom::anchor_hrefs_containing(markup, "/c/", usize::MAX) {
        let Some(absolute) = absolute_url(page, &href) else {
            continue;
        };
        let Some((slug, conversation_id)) =
            ids::split_project_conversation(&pathname_of(&absolute))
        else {
            continue;
        };
        if !seen.insert(absolute.clone()) {
            continue;
        }

        let label = anchor_label(markup, &href)
            .unwrap_or_else(|| format!("Conversation {}", &conversation_id[..8]));

        out.push(ProjectConversation {
            absolute_url: absolute,
            conversation_id,
            project_slug: Some(slug),
            label,
        });
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID_A: &str = "0190aaaa-bbbb-cccc-dddd-eeeeffff0001";
    const ID_B: &str = "0190aaaa-bbbb-cccc-dddd-eeeeffff0002";

    fn dashboard(markup: String) -> PageContext {
        let mut page = PageContext::new("https://chatgpt.com/g/g-spark/project");
        page.markup = Some(markup);
        page
    }

    #[test]
    fn dashboard_anchors_become_candidates() {
        let page = dashboard(format!(
            r#"<a href="/g/g-spark/c/{ID_A}">Parser sketch</a>
               <a href="/g/g-spark/c/{ID_B}"><span>Codegen notes</span></a>
               <a href="/g/g-spark/c/{ID_A}">duplicate</a>
               <a href="/settings">not a conversation</a>"#
        ));

        let conversations = project_conversations(&page);
        assert_eq!(conversations.len(), 2);
        assert_eq!(conversations[0].label, "Parser sketch");
        assert_eq!(conversations[0].conversation_id, ID_A);
        assert_eq!(
            conversations[0].absolute_url,
            format!("https://chatgpt.com/g/g-spark/c/{ID_A}")
        );
        assert_eq!(conversations[0].project_slug.as_deref(), Some("g-spark"));
        assert_eq!(conversations[1].label, "Codegen notes");
    }

    #[test]
    fn unlabeled_anchor_gets_id_prefix_label() {
        let page = dashboard(format!(r#"<a href="/g/g-spark/c/{ID_A}"></a>"#));
        let conversations = project_conversations(&page);
        assert_eq!(conversations.len(), 1);
        assert_eq!(
            conversations[0].label,
            format!("Conversation {}", &ID_A[..8])
        );
    }

    #[test]
    fn no_markup_means_no_candidates() {
        let page = PageContext::new("https://chatgpt.com/g/g-spark/project");
        assert!(project_conversations(&page).is_empty());
    }
}
