pub mod conversation;
pub mod session;
pub mod share;

use std::cell::RefCell;
use std::collections::HashMap;

use crate::ids::{self, ConversationIdentity};
use crate::net::client::ApiClient;
use crate::normalize::normalize_date;
use crate::urls::UrlSet;

pub use conversation::ConversationSummary;
pub use session::AuthInfo;

/// The platform surface plus the per-page caches. Both caches are
/// write-once-per-key: the session auth result is fetched at most once per
/// page, and each conversation's metadata summary is fetched at most once,
/// keyed by the conversation id rather than object identity. A new page
/// context gets a new `Backend`.
pub struct Backend<'a> {
    client: ApiClient<'a>,
    auth_cache: RefCell<Option<AuthInfo>>,
    summary_cache: RefCell<HashMap<String, ConversationSummary>>,
}

impl<'a> Backend<'a> {
    pub fn new(client: ApiClient<'a>) -> Self {
        Self {
            client,
            auth_cache: RefCell::new(None),
            summary_cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn client(&self) -> &ApiClient<'a> {
        &self.client
    }

    pub fn auth(&self) -> AuthInfo {
        if let Some(cached) = self.auth_cache.borrow().as_ref() {
            return cached.clone();
        }
        let fetched = session::fetch_auth(&self.client);
        *self.auth_cache.borrow_mut() = Some(fetched.clone());
        fetched
    }

    /// The cascade's API source: one metadata summary per conversation.
    ///
    /// Share discovery runs in a fixed order: share link embedded in the
    /// conversation payload, then whatever the DOM pass already placed in
    /// `urls.public`, then the targeted probe, then the full list scan.
    /// Each hit upgrades `urls` in place, and the probe's 404 suppresses
    /// the list scan.
    pub fn metadata(
        &self,
        identity: &ConversationIdentity,
        urls: &mut UrlSet,
    ) -> Option<ConversationSummary> {
        let cid = identity.conversation_id.as_deref()?;

        if let Some(cached) = self.summary_cache.borrow().get(cid) {
            self.client
                .trace()
                .debug(format!("metadata cache hit cid={cid}"));
            return Some(cached.clone());
        }

        let summary = self.fetch_metadata(cid, urls);
        self.summary_cache
            .borrow_mut()
            .insert(cid.to_string(), summary.clone());
        Some(summary)
    }

    fn fetch_metadata(&self, cid: &str, urls: &mut UrlSet) -> ConversationSummary {
        let page_is_share = urls
            .page
            .as_deref()
            .map(ids::is_share_url)
            .unwrap_or(false);

        if page_is_share {
            let mut summary = ConversationSummary::empty(cid);
            if let Some(meta) = share::public_meta(&self.client, cid) {
                summary.title = meta.title;
                summary.iso_date = meta.iso_date.as_deref().and_then(normalize_date);
                urls.apply_share_hints(&meta.share_url);
            }
            return summary;
        }

        let auth = self.auth();
        let mut summary = conversation::fetch_summary(&self.client, cid, &auth, urls);

        if urls.public.is_none() {
            let mut skip_list = false;
            if let Some(probe) = share::probe(&self.client, cid, &auth) {
                if let Some(share_url) = &probe.share_url {
                    urls.apply_share_hints(share_url);
                }
                skip_list = probe.confirmed_none;
            }
            if !skip_list
                && urls.public.is_none()
                && let Some(entry) = share::list_lookup(&self.client, cid, &auth)
            {
                urls.apply_share_hints(&entry.share_url);
                if summary.iso_date.is_none() {
                    summary.iso_date = entry.iso_date;
                }
            }
        }

        summary
    }

    /// Raw conversation payload for the renderer: the public copy when a
    /// share id is known, else the authenticated copy.
    pub fn conversation_payload(
        &self,
        cid: Option<&str>,
        share_id: Option<&str>,
    ) -> Option<(serde_json::Value, PayloadSource)> {
        if let Some(share_id) = share_id
            && let Some(payload) = conversation::fetch_public_payload(&self.client, share_id)
        {
            return Some((payload, PayloadSource::Public));
        }
        let cid = cid?;
        let auth = self.auth();
        conversation::fetch_payload(&self.client, cid, &auth)
            .map(|payload| (payload, PayloadSource::Private))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadSource {
    Public,
    Private,
}
