use chrono::FixedOffset;
use serde_json::Value;

use crate::chatgpt::session::AuthInfo;
use crate::error::WarnCode;
use crate::net::client::{ApiClient, CallOptions};
use crate::normalize::{self, format_offset_ms, normalize_title, parse_time_ms};
use crate::share;
use crate::urls::UrlSet;

/// API-derived metadata for one conversation. Fields stay `None` when the
/// payload does not carry them; the cascade decides what to do next.
#[derive(Debug, Clone)]
pub struct ConversationSummary {
    pub cid: String,
    pub title: Option<String>,
    pub iso_date: Option<String>,
    pub ai_name: String,
    pub human_author: Option<String>,
    pub ai_model: Option<String>,
}

impl ConversationSummary {
    pub fn empty(cid: &str) -> Self {
        Self {
            cid: cid.to_string(),
            title: None,
            iso_date: None,
            ai_name: normalize::DEFAULT_AI_NAME.to_string(),
            human_author: None,
            ai_model: None,
        }
    }
}

/// Newest timestamp anywhere in the payload wins: the conversation's own
/// update/create times plus every mapping message's times and embedded
/// metadata timestamp.
pub fn pick_iso_date(conversation: &Value, offset: FixedOffset) -> Option<String> {
    let mut times: Vec<i64> = Vec::new();
    let mut push = |value: Option<&Value>| {
        if let Some(ms) = value.and_then(parse_time_ms) {
            times.push(ms);
        }
    };

    push(conversation.get("update_time"));
    push(conversation.get("create_time"));
    if let Some(mapping) = conversation.get("mapping").and_then(Value::as_object) {
        for node in mapping.values() {
            let Some(message) = node.get("message") else {
                continue;
            };
            push(message.get("update_time"));
            push(message.get("create_time"));
            push(message.get("metadata").and_then(|meta| meta.get("timestamp")));
        }
    }

    let newest = times.into_iter().max()?;
    let formatted = format_offset_ms(newest, offset);
    (!formatted.is_empty()).then_some(formatted)
}

/// Model label: the conversation-level slug, else the first message metadata
/// that names one.
pub fn extract_model(conversation: &Value) -> Option<String> {
    if let Some(slug) = conversation
        .get("default_model_slug")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        return Some(slug.to_string());
    }
    let mapping = conversation.get("mapping").and_then(Value::as_object)?;
    for node in mapping.values() {
        let Some(metadata) = node.get("message").and_then(|m| m.get("metadata")) else {
            continue;
        };
        for key in ["model_slug", "model"] {
            if let Some(model) = metadata
                .get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
            {
                return Some(model.to_string());
            }
        }
    }
    None
}

/// `GET /backend-api/conversation/<cid>` as a raw payload for rendering.
pub fn fetch_payload(client: &ApiClient, cid: &str, auth: &AuthInfo) -> Option<Value> {
    let token = auth.token.as_deref()?;
    let response = client.call(
        CallOptions::json(format!("/backend-api/conversation/{cid}")).bearer(token),
    );
    if !response.ok {
        if response.is_auth_failure() {
            client.trace().warn(
                WarnCode::W002AuthExpired,
                "conversation",
                cid,
                "http_error",
            );
        }
        return None;
    }
    response.data
}

/// `GET /backend-api/public/conversation/<share-id>`: the unauthenticated
/// copy exposed by a share link.
pub fn fetch_public_payload(client: &ApiClient, share_id: &str) -> Option<Value> {
    let response = client.call(CallOptions::json(format!(
        "/backend-api/public/conversation/{share_id}"
    )));
    if !response.ok {
        return None;
    }
    response.data
}

/// Fetch the conversation and distill the summary. A share URL embedded in
/// the payload upgrades the URL set in place.
pub fn fetch_summary(
    client: &ApiClient,
    cid: &str,
    auth: &AuthInfo,
    urls: &mut UrlSet,
) -> ConversationSummary {
    let mut summary = ConversationSummary::empty(cid);
    summary.human_author = auth.user_name.clone();

    let Some(conversation) = fetch_payload(client, cid, auth) else {
        return summary;
    };

    if !conversation.is_object() {
        client.trace().warn(
            WarnCode::W003MalformedPayload,
            "conversation",
            cid,
            "not_an_object",
        );
        return summary;
    }

    summary.title = conversation
        .get("title")
        .and_then(Value::as_str)
        .and_then(normalize_title);
    summary.iso_date = pick_iso_date(&conversation, normalize::local_offset());
    summary.ai_model = extract_model(&conversation);

    if let Some(share_url) =
        share::find_in_value(&conversation, "", client.page().default_share_host())
    {
        client
            .trace()
            .debug(format!("conversation payload exposed share url {share_url}"));
        urls.apply_share_hints(&share_url);
    }

    summary
}
