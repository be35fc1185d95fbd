use serde_json::Value;

use crate::chatgpt::session::AuthInfo;
use crate::error::WarnCode;
use crate::net::client::{ApiClient, CallOptions};
use crate::normalize::{self, format_offset_ms, parse_time_ms};
use crate::share;

/// Result of the targeted share probe. A 404 is a definitive "no share is
/// published" and suppresses the (slower) list scan.
#[derive(Debug, Clone, Default)]
pub struct ShareProbe {
    pub share_url: Option<String>,
    pub iso_date: Option<String>,
    pub confirmed_none: bool,
}

#[derive(Debug, Clone)]
pub struct ShareListEntry {
    pub share_url: String,
    pub iso_date: Option<String>,
}

/// Title/date/URL for a public share page, from the unauthenticated endpoint.
#[derive(Debug, Clone)]
pub struct PublicShareMeta {
    pub title: Option<String>,
    pub iso_date: Option<String>,
    pub share_url: String,
}

fn newest_share_time(value: &Value) -> Option<i64> {
    let mut times = Vec::new();
    let mut push = |candidate: Option<&Value>| {
        if let Some(ms) = candidate.and_then(parse_time_ms) {
            times.push(ms);
        }
    };
    push(value.get("update_time"));
    push(value.get("create_time"));
    if let Some(messages) = value.get("messages").and_then(Value::as_array) {
        for message in messages {
            push(message.get("update_time"));
            push(message.get("create_time"));
        }
    }
    times.into_iter().max()
}

/// `GET /backend-api/conversation/<cid>/share` with the short probe timeout.
pub fn probe(client: &ApiClient, cid: &str, auth: &AuthInfo) -> Option<ShareProbe> {
    let token = auth.token.as_deref()?;
    let response = client.call(
        CallOptions::json(format!("/backend-api/conversation/{cid}/share"))
            .bearer(token)
            .timeout_ms(client.config().timeouts.share_probe_ms),
    );

    if response.status == 404 {
        client.trace().debug(format!("share probe confirmed none cid={cid}"));
        return Some(ShareProbe {
            confirmed_none: true,
            ..ShareProbe::default()
        });
    }
    if !response.ok {
        return None;
    }

    let host = client.page().default_share_host();
    let data = response.data.as_ref();
    let share_url = data
        .and_then(|value| share::find_in_value(value, "", host))
        .or_else(|| {
            data.and_then(|value| value.get("share_id"))
                .and_then(Value::as_str)
                .map(|id| format!("{host}/share/{}", id.to_ascii_lowercase()))
        });
    let iso_date = data
        .and_then(newest_share_time)
        .map(|ms| format_offset_ms(ms, normalize::local_offset()))
        .filter(|s| !s.is_empty());

    Some(ShareProbe {
        share_url,
        iso_date,
        confirmed_none: false,
    })
}

/// `GET /backend-api/shared_conversations?order=created`: scan the account's
/// shared conversations for this conversation id; the newest entry wins.
pub fn list_lookup(client: &ApiClient, cid: &str, auth: &AuthInfo) -> Option<ShareListEntry> {
    let token = auth.token.as_deref()?;
    let response = client.call(
        CallOptions::json("/backend-api/shared_conversations?order=created")
            .bearer(token)
            .timeout_ms(client.config().timeouts.share_list_ms),
    );

    if !response.ok {
        if response.is_auth_failure() {
            client.trace().warn(
                WarnCode::W002AuthExpired,
                "share-list",
                cid,
                "http_error",
            );
        }
        return None;
    }

    let Some(items) = response
        .data
        .as_ref()
        .and_then(|data| data.get("items"))
        .and_then(Value::as_array)
    else {
        client.trace().warn(
            WarnCode::W003MalformedPayload,
            "share-list",
            cid,
            "items_missing",
        );
        return None;
    };

    let mut matches: Vec<&Value> = items
        .iter()
        .filter(|entry| entry.get("conversation_id").and_then(Value::as_str) == Some(cid))
        .collect();
    if matches.is_empty() {
        client
            .trace()
            .debug(format!("share list had no entry for cid={cid}"));
        return None;
    }

    matches.sort_by_key(|entry| {
        std::cmp::Reverse(
            entry
                .get("update_time")
                .or_else(|| entry.get("create_time"))
                .and_then(parse_time_ms)
                .unwrap_or(0),
        )
    });

    let best = matches[0];
    let share_id = best
        .get("id")
        .or_else(|| best.get("share_id"))
        .and_then(Value::as_str)?;
    let host = client.page().default_share_host();
    let iso_date = best
        .get("update_time")
        .or_else(|| best.get("create_time"))
        .and_then(parse_time_ms)
        .map(|ms| format_offset_ms(ms, normalize::local_offset()))
        .filter(|s| !s.is_empty());

    Some(ShareListEntry {
        share_url: format!("{host}/share/{}", share_id.to_ascii_lowercase()),
        iso_date,
    })
}

/// Metadata for a public share page.
pub fn public_meta(client: &ApiClient, share_id: &str) -> Option<PublicShareMeta> {
    let share_id = share_id.to_ascii_lowercase();
    let response = client.call(CallOptions::json(format!(
        "/backend-api/public/conversation/{share_id}"
    )));
    if !response.ok {
        return None;
    }

    let host = client.page().default_share_host();
    let data = response.data.as_ref();
    let title = data
        .and_then(|value| value.get("title"))
        .and_then(Value::as_str)
        .and_then(crate::normalize::normalize_title);
    let iso_date = data
        .and_then(newest_share_time)
        .map(|ms| format_offset_ms(ms, normalize::local_offset()))
        .filter(|s| !s.is_empty());

    Some(PublicShareMeta {
        title,
        iso_date,
        share_url: format!("{host}/share/{share_id}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn newest_share_time_scans_messages() {
        let payload = json!({
            "update_time": 1_700_000_000,
            "messages": [
                {"create_time": 1_700_000_300},
                {"update_time": 1_700_000_200},
            ]
        });
        assert_eq!(newest_share_time(&payload), Some(1_700_000_300_000));
        assert_eq!(newest_share_time(&json!({})), None);
    }
}
