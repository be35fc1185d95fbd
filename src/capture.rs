use crate::chatgpt::Backend;
use crate::fields;
use crate::ids::{self, ConversationIdentity};
use crate::page::PageContext;
use crate::record::Record;
use crate::snapshot;
use crate::urls;

/// Overrides supplied when the host iterates a list of conversations instead
/// of capturing the page it is displaying.
#[derive(Debug, Clone, Default)]
pub struct CaptureOverrides {
    pub page_url: Option<String>,
    pub conversation_id: Option<String>,
    pub project_slug: Option<String>,
    pub project_url: Option<String>,
}

/// Capture one conversation into a complete record: resolve identity and
/// URL set once, then run the field cascade. Later fields reuse the metadata
/// summary cached by earlier ones, so resolution is strictly sequential.
pub fn capture_record(
    backend: &Backend,
    page: &PageContext,
    overrides: &CaptureOverrides,
) -> Record {
    let mut identity = ids::resolve_identity(page, overrides.page_url.as_deref());
    if let Some(cid) = &overrides.conversation_id {
        identity.conversation_id = Some(cid.to_ascii_lowercase());
    }
    if let Some(slug) = &overrides.project_slug {
        identity.project_slug = Some(slug.clone());
    }

    let mut urls = urls::resolve_urls(page, overrides.page_url.as_deref(), &identity);
    if let Some(project_url) = &overrides.project_url {
        urls.project = Some(project_url.clone());
    }

    let mut record = Record::instant_message();
    record.title = fields::resolve_title(backend, page, &mut urls, &identity);
    record.creators = fields::resolve_creators(backend, page, &mut urls, &identity);
    if let Some(model) = fields::resolve_ai_model(backend, page, &mut urls, &identity) {
        // The model label qualifies the AI participant, e.g. "ChatGPT (gpt-5.1)".
        if let Some(ai) = record.creators.first_mut() {
            ai.name = format!("{} ({model})", ai.name);
        }
    }
    record.date = fields::resolve_date(backend, page, &mut urls, &identity);
    record.url = urls.item.clone().or_else(|| urls.page.clone());
    record.extra = fields::resolve_extra(&urls);
    record.attachments = snapshot::acquire_attachments(backend, page, &urls, &identity);

    let trace = backend.client().trace();
    trace.debug(format!(
        "capture done cid={} title=\"{}\" date={} url={} attachments={}",
        identity.conversation_id.as_deref().unwrap_or("-"),
        record.title,
        record.date,
        record.url.as_deref().unwrap_or("-"),
        record.attachments.len()
    ));

    record
}

/// Keep the identity visible to callers that need it after capture.
pub fn identity_for(page: &PageContext, overrides: &CaptureOverrides) -> ConversationIdentity {
    ids::resolve_identity(page, overrides.page_url.as_deref())
}
