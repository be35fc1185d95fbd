use anyhow::{Context, Result, bail};
use serde_json::Value;
use std::fs;
use std::path::PathBuf;

use crate::chatgpt::Backend;
use crate::commands::cite::build_page;
use crate::config::CiteConfig;
use crate::ids;
use crate::net::client::ApiClient;
use crate::net::http;
use crate::normalize;
use crate::render;
use crate::snapshot;
use crate::trace::Trace;
use crate::urls;

#[derive(Debug, Clone)]
pub struct SnapshotOptions {
    pub url: String,
    pub page: Option<PathBuf>,
    pub from_json: Option<PathBuf>,
    pub cookie: Option<String>,
    pub offline: bool,
    pub out: Option<PathBuf>,
}

fn write_or_print(html: &str, out: Option<&PathBuf>) -> Result<()> {
    match out {
        Some(path) => fs::write(path, html.as_bytes())
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => println!("{html}"),
    }
    Ok(())
}

pub fn run(opts: &SnapshotOptions, cfg: &CiteConfig, trace: &Trace) -> Result<()> {
    let mut cfg = cfg.clone();
    if opts.offline {
        cfg.offline = true;
    }
    // The snapshot command exists to produce a document; the batch-path
    // feature flag does not apply here.
    cfg.snapshot.emulate_when_detached = true;

    // A saved conversation payload renders directly, no network involved.
    if let Some(path) = &opts.from_json {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read conversation payload {}", path.display()))?;
        let payload: Value = serde_json::from_str(&raw)
            .with_context(|| format!("invalid conversation payload {}", path.display()))?;
        let Some(rendered) =
            render::render_conversation(&payload, Some(&opts.url), normalize::local_offset())
        else {
            bail!("conversation payload has no mapping to render");
        };
        trace.debug(format!(
            "rendered snapshot from payload messages={}",
            rendered.message_count
        ));
        return write_or_print(&rendered.html, opts.out.as_ref());
    }

    let page = build_page(&opts.url, opts.page.as_ref(), opts.cookie.as_deref(), None)?;
    let chain = http::build_chain(&page, &cfg);
    let backend = Backend::new(ApiClient::new(&page, chain, &cfg, trace));

    let identity = ids::resolve_identity(&page, None);
    let url_set = urls::resolve_urls(&page, None, &identity);

    let attachments = snapshot::acquire_attachments(&backend, &page, &url_set, &identity);
    let Some(attachment) = attachments.first() else {
        bail!("no snapshot target could be resolved for {}", opts.url);
    };
    match &attachment.document {
        Some(document) => write_or_print(document, opts.out.as_ref()),
        None => {
            bail!(
                "no snapshot document obtainable; reference URL: {}",
                attachment.url.as_deref().unwrap_or(&opts.url)
            )
        }
    }
}
