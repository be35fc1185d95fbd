use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::PathBuf;

use crate::capture::{CaptureOverrides, capture_record};
use crate::chatgpt::Backend;
use crate::config::CiteConfig;
use crate::net::client::ApiClient;
use crate::net::http;
use crate::page::PageContext;
use crate::record::Record;
use crate::trace::Trace;

#[derive(Debug, Clone)]
pub struct CiteOptions {
    pub url: String,
    pub page: Option<PathBuf>,
    pub cookie: Option<String>,
    pub language: Option<String>,
    pub offline: bool,
    pub pretty: bool,
    pub out: Option<PathBuf>,
}

fn cookie_from_env() -> Option<String> {
    match env::var("CHATCITE_COOKIE") {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

/// Build the page context a capture runs against: location, cookie jar, and
/// optionally the saved markup of the page.
pub fn build_page(
    url: &str,
    page_file: Option<&PathBuf>,
    cookie: Option<&str>,
    language: Option<&str>,
) -> Result<PageContext> {
    let mut page = PageContext::new(url);
    if let Some(path) = page_file {
        let markup = fs::read_to_string(path)
            .with_context(|| format!("failed to read page markup {}", path.display()))?;
        page.markup = Some(markup);
    }
    page.cookie = cookie
        .map(ToOwned::to_owned)
        .or_else(cookie_from_env);
    page.language = language.map(ToOwned::to_owned);
    Ok(page)
}

pub fn emit_record(record: &Record, pretty: bool, out: Option<&PathBuf>) -> Result<()> {
    let serialized = if pretty {
        serde_json::to_string_pretty(record)?
    } else {
        serde_json::to_string(record)?
    };
    match out {
        Some(path) => fs::write(path, serialized.as_bytes())
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => println!("{serialized}"),
    }
    Ok(())
}

pub fn run(opts: &CiteOptions, cfg: &CiteConfig, trace: &Trace) -> Result<()> {
    let mut cfg = cfg.clone();
    if opts.offline {
        cfg.offline = true;
    }

    let page = build_page(
        &opts.url,
        opts.page.as_ref(),
        opts.cookie.as_deref(),
        opts.language.as_deref(),
    )?;

    let chain = http::build_chain(&page, &cfg);
    let backend = Backend::new(ApiClient::new(&page, chain, &cfg, trace));
    let record = capture_record(&backend, &page, &CaptureOverrides::default());

    emit_record(&record, opts.pretty, opts.out.as_ref())
}
