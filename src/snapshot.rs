use std::thread;
use std::time::{Duration, Instant};

use crate::chatgpt::{Backend, PayloadSource};
use crate::dom;
use crate::error::WarnCode;
use crate::ids::{self, ConversationIdentity};
use crate::net::client::CallOptions;
use crate::net::transport::FallbackMode;
use crate::normalize;
use crate::page::PageContext;
use crate::record::Attachment;
use crate::render;
use crate::urls::UrlSet;

/// How a snapshot document was obtained, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotMethod {
    Inline,
    HttpFetch,
    Emulated,
    UrlOnly,
}

impl SnapshotMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inline => "inline",
            Self::HttpFetch => "http-fetch",
            Self::Emulated => "emulated",
            Self::UrlOnly => "url-only",
        }
    }
}

/// The snapshot targets the fullest copy available: the authenticated page
/// first, then whatever else is known.
pub fn pick_snapshot_url(urls: &UrlSet, page: &PageContext) -> Option<String> {
    [
        urls.private.as_ref(),
        urls.snapshot.as_ref(),
        urls.item.as_ref(),
        urls.page.as_ref(),
        urls.public.as_ref(),
    ]
    .into_iter()
    .flatten()
    .next()
    .cloned()
    .or_else(|| (!page.url.is_empty()).then(|| page.url.clone()))
}

fn urls_equivalent(a: &str, b: &str) -> bool {
    a.trim_end_matches('/') == b.trim_end_matches('/')
}

/// Fetch the snapshot target's markup through the page-context mechanism,
/// polling on a fixed interval up to the hydration ceiling. When the ceiling
/// is hit, the last markup wins whether or not it hydrated: a degraded
/// result, not a retry loop.
fn fetch_markup_with_hydration(backend: &Backend, snapshot_url: &str) -> Option<String> {
    let cfg = backend.client().config();
    let deadline = Instant::now() + Duration::from_millis(cfg.hydration.wait_ms);
    let poll = Duration::from_millis(cfg.hydration.poll_ms);

    let mut last = None;
    loop {
        let auth = backend.auth();
        let mut options = CallOptions::html(snapshot_url)
            .timeout_ms(cfg.timeouts.snapshot_ms.max(cfg.timeouts.request_ms))
            .fallback(FallbackMode::Prefer);
        if let Some(token) = &auth.token {
            options = options.bearer(token);
        }
        let response = backend.client().call(options);
        if response.ok && !response.raw.trim().is_empty() {
            if dom::has_hydration_markers(&response.raw) {
                return Some(response.raw);
            }
            last = Some(response.raw);
        }
        if Instant::now() >= deadline {
            break;
        }
        thread::sleep(poll);
    }
    last
}

/// Synthesize a document from the conversation payload: public share copy
/// first, then the authenticated copy.
pub fn emulate_document(
    backend: &Backend,
    identity: &ConversationIdentity,
    urls: &UrlSet,
    snapshot_url: Option<&str>,
) -> Option<render::RenderedDocument> {
    let share_id = [snapshot_url, urls.public.as_deref()]
        .into_iter()
        .flatten()
        .filter(|candidate| ids::is_share_url(candidate))
        .find_map(ids::extract_conversation_id);

    let (payload, source) = backend.conversation_payload(
        identity.conversation_id.as_deref(),
        share_id.as_deref(),
    )?;

    let rendered = render::render_conversation(&payload, snapshot_url, normalize::local_offset());
    if let Some(doc) = &rendered {
        backend.client().trace().debug(format!(
            "emulated snapshot source={} messages={}",
            match source {
                PayloadSource::Public => "public",
                PayloadSource::Private => "private",
            },
            doc.message_count
        ));
    }
    rendered
}

/// Produce the attachment list for a capture. When the snapshot target is
/// the page being viewed, the page markup itself is the snapshot. Otherwise
/// the target must be fetched; when its markup never hydrates, the
/// transcript is synthesized from the conversation payload. With detached
/// emulation disabled, the attachment degrades to a URL-only reference.
pub fn acquire_attachments(
    backend: &Backend,
    page: &PageContext,
    urls: &UrlSet,
    identity: &ConversationIdentity,
) -> Vec<Attachment> {
    let cfg = backend.client().config();
    let trace = backend.client().trace();
    let Some(snapshot_url) = pick_snapshot_url(urls, page) else {
        return Vec::new();
    };

    let needs_background = !urls_equivalent(&snapshot_url, &page.url);

    if !needs_background {
        if let Some(markup) = page.markup() {
            trace.debug(format!(
                "attaching inline snapshot url={snapshot_url} method={}",
                SnapshotMethod::Inline.as_str()
            ));
            return vec![Attachment::document_snapshot(
                Some(snapshot_url),
                markup.to_string(),
            )];
        }
        // Viewing the page without its markup (URL-only invocation): a
        // synthesized transcript still beats a bare link when reachable.
        if !cfg.offline
            && let Some(rendered) = emulate_document(backend, identity, urls, Some(&snapshot_url))
        {
            return vec![Attachment::document_snapshot(
                Some(snapshot_url),
                rendered.html,
            )];
        }
        return vec![Attachment::url_only(snapshot_url)];
    }

    if !cfg.snapshot.emulate_when_detached {
        trace.debug(format!(
            "skipping detached snapshot (emulation disabled) url={snapshot_url}"
        ));
        return vec![Attachment::url_only(snapshot_url)];
    }

    if !cfg.offline {
        if let Some(markup) = fetch_markup_with_hydration(backend, &snapshot_url) {
            if dom::has_hydration_markers(&markup) {
                trace.debug(format!(
                    "attaching fetched snapshot url={snapshot_url} method={}",
                    SnapshotMethod::HttpFetch.as_str()
                ));
                return vec![Attachment::document_snapshot(Some(snapshot_url), markup)];
            }
            trace.warn(
                WarnCode::W004SnapshotDegraded,
                "snapshot",
                &snapshot_url,
                "markup_never_hydrated",
            );
        }
        if let Some(rendered) = emulate_document(backend, identity, urls, Some(&snapshot_url)) {
            trace.debug(format!(
                "attaching emulated snapshot url={snapshot_url} method={}",
                SnapshotMethod::Emulated.as_str()
            ));
            return vec![Attachment::document_snapshot(
                Some(snapshot_url),
                rendered.html,
            )];
        }
    }

    trace.debug(format!(
        "attaching url-only snapshot url={snapshot_url} method={}",
        SnapshotMethod::UrlOnly.as_str()
    ));
    vec![Attachment::url_only(snapshot_url)]
}
