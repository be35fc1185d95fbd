use serde_json::Value;

use crate::chatgpt::Backend;
use crate::dom;
use crate::error::WarnCode;
use crate::ids::ConversationIdentity;
use crate::normalize::{
    self, DEFAULT_AI_NAME, DEFAULT_HUMAN_AUTHOR, DEFAULT_TITLE, normalize_ai_model,
    normalize_date, normalize_human_author, normalize_title,
};
use crate::page::PageContext;
use crate::record::Creator;
use crate::urls::UrlSet;

/// Where a resolved value came from. Diagnostics only; correctness never
/// depends on the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Cache,
    Api,
    Dom,
    Fallback,
}

impl SourceKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Api => "api",
            Self::Dom => "dom",
            Self::Fallback => "fallback",
        }
    }
}

/// Tagged outcome of one resolution attempt.
#[derive(Debug, Clone)]
pub struct FieldSource<T> {
    pub kind: SourceKind,
    pub value: Option<T>,
}

impl<T> FieldSource<T> {
    fn usable(kind: SourceKind, value: Option<T>) -> Option<Self> {
        value.map(|value| Self {
            kind,
            value: Some(value),
        })
    }
}

fn trace_field<T>(backend: &Backend, field: &str, source: &FieldSource<T>) {
    backend
        .client()
        .trace()
        .debug(format!("{field} resolved source={}", source.kind.as_str()));
}

/// Title: API summary, then DOM, then the static default. Values equal to
/// the platform's own brand text never survive normalization, so the
/// cascade keeps searching past them.
pub fn resolve_title(
    backend: &Backend,
    page: &PageContext,
    urls: &mut UrlSet,
    identity: &ConversationIdentity,
) -> String {
    let summary = backend.metadata(identity, urls);

    let resolved = FieldSource::usable(
        SourceKind::Api,
        summary
            .as_ref()
            .and_then(|s| s.title.as_deref())
            .and_then(normalize_title),
    )
    .or_else(|| {
        let raw = dom::dom_title(page);
        let normalized = raw.as_deref().and_then(normalize_title);
        if raw.is_some() && normalized.is_none() {
            backend.client().trace().warn(
                WarnCode::W005GenericValue,
                "title",
                identity.conversation_id.as_deref().unwrap_or("-"),
                "dom_title_generic",
            );
        }
        FieldSource::usable(SourceKind::Dom, normalized)
    })
    .unwrap_or(FieldSource {
        kind: SourceKind::Fallback,
        value: Some(DEFAULT_TITLE.to_string()),
    });

    trace_field(backend, "title", &resolved);
    resolved.value.unwrap_or_else(|| DEFAULT_TITLE.to_string())
}

/// Creators: the AI participant first, then the human. Both are single-field
/// creators; a human candidate spelling the platform name is rejected so the
/// human slot never duplicates the AI slot.
pub fn resolve_creators(
    backend: &Backend,
    page: &PageContext,
    urls: &mut UrlSet,
    identity: &ConversationIdentity,
) -> Vec<Creator> {
    let summary = backend.metadata(identity, urls);

    let ai = FieldSource::usable(
        SourceKind::Api,
        summary.as_ref().map(|s| s.ai_name.clone()).filter(|name| {
            !normalize::trim_internal(name).is_empty()
        }),
    )
    .unwrap_or(FieldSource {
        kind: SourceKind::Fallback,
        value: Some(DEFAULT_AI_NAME.to_string()),
    });
    trace_field(backend, "ai-name", &ai);

    let human = FieldSource::usable(
        SourceKind::Api,
        summary
            .as_ref()
            .and_then(|s| s.human_author.as_deref())
            .and_then(normalize_human_author),
    )
    .or_else(|| {
        FieldSource::usable(
            SourceKind::Dom,
            dom::dom_human_author(page)
                .as_deref()
                .and_then(normalize_human_author),
        )
    })
    .unwrap_or(FieldSource {
        kind: SourceKind::Fallback,
        value: Some(DEFAULT_HUMAN_AUTHOR.to_string()),
    });
    trace_field(backend, "human-author", &human);

    vec![
        Creator::single_field(ai.value.unwrap_or_else(|| DEFAULT_AI_NAME.to_string())),
        Creator::single_field(
            human
                .value
                .unwrap_or_else(|| DEFAULT_HUMAN_AUTHOR.to_string()),
        ),
    ]
}

/// Model label: API summary, then DOM, else nothing; there is no meaningful
/// static default for a model name.
pub fn resolve_ai_model(
    backend: &Backend,
    page: &PageContext,
    urls: &mut UrlSet,
    identity: &ConversationIdentity,
) -> Option<String> {
    let summary = backend.metadata(identity, urls);

    let resolved = FieldSource::usable(
        SourceKind::Api,
        summary
            .as_ref()
            .and_then(|s| s.ai_model.as_deref())
            .map(|m| Value::String(m.to_string()))
            .as_ref()
            .and_then(normalize_ai_model),
    )
    .or_else(|| {
        FieldSource::usable(
            SourceKind::Dom,
            dom::dom_ai_model(page)
                .map(Value::String)
                .as_ref()
                .and_then(normalize_ai_model),
        )
    });

    if let Some(found) = resolved {
        trace_field(backend, "ai-model", &found);
        return found.value;
    }
    None
}

/// Date: API summary (already offset-qualified), then DOM, then now. The
/// record always carries a timestamp.
pub fn resolve_date(
    backend: &Backend,
    page: &PageContext,
    urls: &mut UrlSet,
    identity: &ConversationIdentity,
) -> String {
    let summary = backend.metadata(identity, urls);

    let resolved = FieldSource::usable(
        SourceKind::Api,
        summary
            .as_ref()
            .and_then(|s| s.iso_date.as_deref())
            .and_then(normalize_date),
    )
    .or_else(|| {
        FieldSource::usable(
            SourceKind::Dom,
            dom::dom_date(page).as_deref().and_then(normalize_date),
        )
    })
    .unwrap_or(FieldSource {
        kind: SourceKind::Fallback,
        value: Some(normalize::now_local_iso()),
    });

    trace_field(backend, "date", &resolved);
    resolved.value.unwrap_or_else(normalize::now_local_iso)
}

/// Extra metadata: the private URL is recorded when it differs from the
/// public one, so the saved record keeps a pointer back to the
/// authenticated copy.
pub fn resolve_extra(urls: &UrlSet) -> Option<String> {
    match (&urls.private, &urls.public) {
        (Some(private), Some(public)) if private != public => {
            Some(format!("Private URL: {private}"))
        }
        _ => None,
    }
}
